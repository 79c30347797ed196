//! Standard paths used by pass

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Resolved on-disk locations
pub struct Paths {
    /// Encrypted database file
    pub database: PathBuf,
    /// JSON configuration file
    pub config_file: PathBuf,
}

impl Paths {
    pub fn resolve() -> Result<Self> {
        let config_file = dirs::config_dir()
            .context("Unable to access your home directory.")?
            .join("pass")
            .join("config.json");

        Ok(Self {
            database: Self::database_path()?,
            config_file,
        })
    }

    /// User's home directory for release builds and the current working
    /// directory for debug builds.
    fn database_path() -> Result<PathBuf> {
        if cfg!(debug_assertions) {
            Ok(PathBuf::from("./passdb"))
        } else {
            let home = dirs::home_dir().context("Unable to access your home directory.")?;
            Ok(home.join("passdb"))
        }
    }
}
