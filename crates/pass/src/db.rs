//! Encrypted database - the external openssl collaborator
//!
//! The on-disk container is produced and consumed entirely by the openssl
//! CLI as a subprocess; this module only shells out, feeds plaintext lines
//! in, and parses plaintext lines out. A non-zero exit from the decrypt
//! invocation means the master password is wrong.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use pass_core::Secret;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroize;

use crate::entry::Entry;

const OPENSSL: &str = "openssl";
const CIPHER_ARGS: &[&str] = &["enc", "-aes-256-cbc", "-pbkdf2", "-iter", "100000"];

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Unable to open database file.")]
    OpenFailed(#[source] std::io::Error),

    #[error("Unable to decrypt database file.")]
    MasterPassword,

    #[error("Unable to save database file.")]
    SaveFailed,

    #[error("Invalid version of OpenSSL detected. Please use at least version 3.0.")]
    OpensslVersion,
}

/// Verify an OpenSSL >= 3 binary is on PATH before touching the database.
pub fn check_openssl() -> Result<(), DbError> {
    let output = Command::new(OPENSSL)
        .arg("version")
        .output()
        .map_err(|_| DbError::OpensslVersion)?;
    if !output.status.success() {
        return Err(DbError::OpensslVersion);
    }

    // "OpenSSL 3.0.13 30 Jan 2024"
    let text = String::from_utf8_lossy(&output.stdout);
    let major = text
        .split_whitespace()
        .nth(1)
        .and_then(|version| version.split('.').next())
        .and_then(|major| major.parse::<u32>().ok());

    match major {
        Some(major) if major >= 3 => Ok(()),
        _ => Err(DbError::OpensslVersion),
    }
}

/// The encrypted entry database at a fixed path.
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Create a fresh database holding no entries.
    pub fn create(&self, master: &Secret) -> Result<(), DbError> {
        self.save(master, &[])
    }

    /// Decrypt the database and parse the entry lines. Broken lines are
    /// skipped rather than failing the whole read.
    pub fn load(&self, master: &Secret) -> Result<Vec<Entry>, DbError> {
        let output = Command::new(OPENSSL)
            .args(CIPHER_ARGS)
            .arg("-d")
            .arg("-in")
            .arg(&self.path)
            .arg("-pass")
            .arg(format!("pass:{}", master.as_str()))
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(DbError::OpenFailed)?;

        // openssl force-quits on a passphrase that does not decrypt
        if !output.status.success() {
            return Err(DbError::MasterPassword);
        }

        let mut plaintext = output.stdout;
        let entries = String::from_utf8_lossy(&plaintext)
            .lines()
            .filter_map(Entry::parse_line)
            .collect::<Vec<_>>();
        plaintext.zeroize();

        debug!(entries = entries.len(), "database decrypted");
        Ok(entries)
    }

    /// Re-encrypt the full entry set, rewriting the container in place.
    pub fn save(&self, master: &Secret, entries: &[Entry]) -> Result<(), DbError> {
        let mut child = Command::new(OPENSSL)
            .args(CIPHER_ARGS)
            .arg("-out")
            .arg(&self.path)
            .arg("-pass")
            .arg(format!("pass:{}", master.as_str()))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(DbError::OpenFailed)?;

        {
            let mut stdin = child.stdin.take().ok_or(DbError::SaveFailed)?;
            for entry in entries {
                let mut line = entry.to_line();
                let written = writeln!(stdin, "{}", line);
                line.zeroize();
                written.map_err(|_| DbError::SaveFailed)?;
            }
        }

        let status = child.wait().map_err(DbError::OpenFailed)?;
        if !status.success() {
            return Err(DbError::SaveFailed);
        }

        debug!(entries = entries.len(), "database saved");
        Ok(())
    }
}
