//! Clipboard copy - pipe the password to a clipboard subprocess

use anyhow::{bail, Result};
use std::io::Write;
use std::process::{Command, Stdio};

/// Candidates tried in order when no override is configured.
const CANDIDATES: &[&[&str]] = &[
    &["wl-copy"],
    &["xclip", "-selection", "clipboard"],
    &["xsel", "--clipboard", "--input"],
    &["pbcopy"],
];

/// Hand the password to the clipboard on the subprocess's stdin.
pub fn copy(text: &str, command_override: Option<&str>) -> Result<()> {
    if let Some(command) = command_override {
        let argv: Vec<&str> = command.split_whitespace().collect();
        if argv.is_empty() || pipe_to(&argv, text).is_err() {
            bail!("Unable to copy password to your clipboard.");
        }
        return Ok(());
    }

    for argv in CANDIDATES {
        if pipe_to(argv, text).is_ok() {
            return Ok(());
        }
    }
    bail!("Unable to copy password to your clipboard.")
}

fn pipe_to(argv: &[&str], text: &str) -> Result<()> {
    let mut child = Command::new(argv[0])
        .args(&argv[1..])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes())?;
    }

    let status = child.wait()?;
    if !status.success() {
        bail!("clipboard command exited with {}", status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_command() {
        // cat consumes stdin and exits 0; stands in for a real clipboard tool
        copy("s3cret", Some("cat")).unwrap();
    }

    #[test]
    fn test_missing_command_fails() {
        assert!(copy("s3cret", Some("definitely-not-a-clipboard-tool")).is_err());
    }

    #[test]
    fn test_empty_override_fails() {
        assert!(copy("s3cret", Some("")).is_err());
    }
}
