//! Interactive prompts - hidden password input and confirmations

use anyhow::{bail, Context, Result};
use pass_core::Secret;
use std::io::{self, Write};
use zeroize::Zeroize;

use crate::entry::DELIMITER;

/// Prompt for the master password. Database creation passes `confirm` to
/// require a matching repeat entry before proceeding.
pub fn master_password(confirm: bool) -> Result<Secret> {
    let first = rpassword::prompt_password("Master password: ")
        .context("Unable to read the master password.")?;

    if confirm {
        // wait for a matching repeat
        loop {
            let mut repeat = rpassword::prompt_password("Repeat password: ")
                .context("Unable to read the master password.")?;
            let matched = repeat == first;
            repeat.zeroize();
            if matched {
                break;
            }
        }
    }

    Ok(Secret::new(first))
}

/// Prompt for a user-supplied entry password, repeated until confirmed.
/// The line delimiter cannot be stored and is rejected outright.
pub fn user_password() -> Result<Secret> {
    let mut first =
        rpassword::prompt_password("Secret: ").context("Unable to read the secret.")?;

    if first.contains(DELIMITER) {
        first.zeroize();
        bail!("Secret must not contain the '{}' character.", DELIMITER);
    }

    loop {
        let mut repeat =
            rpassword::prompt_password("Repeat secret: ").context("Unable to read the secret.")?;
        let matched = repeat == first;
        repeat.zeroize();
        if matched {
            break;
        }
    }

    Ok(Secret::new(first))
}

pub fn confirm_overwrite() -> Result<bool> {
    print!("Overwrite existing password in the database? (Y/N): ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "Y" | "y"))
}
