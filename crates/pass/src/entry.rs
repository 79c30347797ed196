//! Entry line codec, identifier rules, password generation
//!
//! Decrypted database plaintext is one line per entry:
//! `identifier|password`. The delimiter never appears in base64 output and
//! is rejected in user-supplied passwords; identifiers are restricted to
//! alphanumeric, dash and underscore, so it cannot appear there either.

use anyhow::{bail, Context, Result};
use pass_core::Secret;
use std::process::Command;
use zeroize::Zeroize;

/// Separates identifier and password within one plaintext line.
pub const DELIMITER: char = '|';

/// One identifier/password pair.
pub struct Entry {
    pub identifier: String,
    password: Secret,
}

impl Entry {
    pub fn new(identifier: String, password: Secret) -> Self {
        Self {
            identifier,
            password,
        }
    }

    pub fn password(&self) -> &Secret {
        &self.password
    }

    pub fn set_password(&mut self, password: Secret) {
        self.password = password;
    }

    /// Parse one plaintext line. Broken lines yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (identifier, password) = line.split_once(DELIMITER)?;
        if identifier.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self::new(identifier.to_string(), Secret::from(password)))
    }

    pub fn to_line(&self) -> String {
        format!("{}{}{}", self.identifier, DELIMITER, self.password.as_str())
    }
}

/// Identifiers may only contain ASCII alphanumerics, underscore and dash.
pub fn valid_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn find(entries: &[Entry], identifier: &str) -> Option<usize> {
    entries.iter().position(|e| e.identifier == identifier)
}

/// Generate a random password: base64 of `byte_count` random bytes from the
/// openssl CLI.
pub fn generate_password(byte_count: u32) -> Result<Secret> {
    let output = Command::new("openssl")
        .args(["rand", "-base64"])
        .arg(byte_count.to_string())
        .output()
        .context("Unable to generate a new password.")?;

    if !output.status.success() {
        bail!("Unable to generate a new password.");
    }

    let mut text =
        String::from_utf8(output.stdout).context("Unable to generate a new password.")?;
    let secret = Secret::from(text.trim_end());
    text.zeroize();

    if secret.is_empty() {
        bail!("Unable to generate a new password.");
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let entry = Entry::parse_line("github|s3cret").unwrap();
        assert_eq!(entry.identifier, "github");
        assert_eq!(entry.password().as_str(), "s3cret");
    }

    #[test]
    fn test_parse_strips_line_endings() {
        let entry = Entry::parse_line("mail|hunter2\n").unwrap();
        assert_eq!(entry.password().as_str(), "hunter2");
    }

    #[test]
    fn test_parse_broken_lines() {
        assert!(Entry::parse_line("").is_none());
        assert!(Entry::parse_line("no-delimiter").is_none());
        assert!(Entry::parse_line("|password-only").is_none());
        assert!(Entry::parse_line("identifier-only|").is_none());
    }

    #[test]
    fn test_to_line_roundtrip() {
        let entry = Entry::new("github".to_string(), Secret::from("s3cret"));
        let line = entry.to_line();
        assert_eq!(line, "github|s3cret");

        let parsed = Entry::parse_line(&line).unwrap();
        assert_eq!(parsed.identifier, entry.identifier);
        assert_eq!(parsed.password().as_str(), "s3cret");
    }

    #[test]
    fn test_valid_identifier() {
        assert!(valid_identifier("github"));
        assert!(valid_identifier("my_site-2"));
        assert!(!valid_identifier(""));
        assert!(!valid_identifier("has space"));
        assert!(!valid_identifier("pipe|char"));
        assert!(!valid_identifier("umlaut-ä"));
    }

    #[test]
    fn test_find() {
        let entries = vec![
            Entry::new("a".to_string(), Secret::from("1")),
            Entry::new("b".to_string(), Secret::from("2")),
        ];
        assert_eq!(find(&entries, "b"), Some(1));
        assert_eq!(find(&entries, "c"), None);
    }

    #[test]
    fn test_generate_password() {
        if Command::new("openssl").arg("version").output().is_err() {
            eprintln!("openssl not available, skipping");
            return;
        }

        let password = generate_password(15).unwrap();
        assert!(!password.is_empty());
        // base64 output can never contain the delimiter
        assert!(!password.as_str().contains(DELIMITER));
    }
}
