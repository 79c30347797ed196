//! Invocation coordination - cache, prompt, validate, arm expiry
//!
//! Sequencing contract for one command invocation:
//! 1. Attach the session cache for the target database (degrade to
//!    prompting every run if shared memory is unavailable).
//! 2. Use the cached master password if available, otherwise prompt and
//!    hold the candidate locally.
//! 3. Validate the candidate by decrypting the database. A failed
//!    validation never marks the cache available.
//! 4. On success, write the password to the cache; the invocation whose
//!    publish performed the false-to-true transition spawns the expiry
//!    daemon.
//! 5. The cache mapping detaches via Drop on every exit path.

use anyhow::{Context, Result};
use pass_core::{daemon, Config, Secret, SessionCache};
use tracing::warn;

use crate::db::{Database, DbError};
use crate::entry::Entry;
use crate::prompt;

/// An unlocked database: the validated master password and the decrypted
/// entry set for one invocation.
pub struct Session {
    db: Database,
    master: Secret,
    pub entries: Vec<Entry>,
    // Held for the invocation's lifetime so the mapping is released on
    // every exit path.
    _cache: Option<SessionCache>,
}

impl Session {
    /// Open the database, going through the session cache. Creates the
    /// database (with a confirmed master password) on first use.
    pub fn open(db: Database, config: &Config) -> Result<Self> {
        let cache = match SessionCache::attach(db.path()) {
            Ok(cache) => Some(cache),
            Err(err) => {
                warn!("session cache unavailable, prompting every run: {}", err);
                None
            }
        };

        if !db.exists() {
            println!("No database found, creating one now.");
            let master = prompt::master_password(true)?;
            db.create(&master)
                .context("Unable to create initial database file.")?;
            // the password just created the database; validated by construction
            cache_validated(cache.as_ref(), &master, config, &db);
            return Ok(Self {
                db,
                master,
                entries: Vec::new(),
                _cache: cache,
            });
        }

        let cached = cache.as_ref().and_then(|c| c.read_password());
        let from_cache = cached.is_some();
        let master = match cached {
            Some(secret) => secret,
            None => prompt::master_password(false)?,
        };

        let entries = match db.load(&master) {
            Ok(entries) => entries,
            Err(DbError::MasterPassword) => {
                // A cache-sourced password that no longer decrypts is stale;
                // scrub it so the next run re-prompts.
                if from_cache {
                    if let Some(cache) = cache.as_ref() {
                        cache.clear();
                    }
                }
                return Err(DbError::MasterPassword.into());
            }
            Err(err) => return Err(err.into()),
        };

        if !from_cache {
            cache_validated(cache.as_ref(), &master, config, &db);
        }

        Ok(Self {
            db,
            master,
            entries,
            _cache: cache,
        })
    }

    /// Re-encrypt the current entry set.
    pub fn save(&self) -> Result<()> {
        self.db.save(&self.master, &self.entries)?;
        Ok(())
    }
}

/// Store a validated master password and, on the false-to-true availability
/// transition, arm the expiry daemon. Exactly one daemon per availability
/// period: only the transitioning invocation spawns.
fn cache_validated(cache: Option<&SessionCache>, master: &Secret, config: &Config, db: &Database) {
    let Some(cache) = cache else {
        return;
    };

    if let Err(err) = cache.store_password(master) {
        warn!("not caching master password: {}", err);
        return;
    }

    if cache.publish() {
        if let Err(err) = daemon::spawn(db.path(), config.cache_ttl()) {
            // without the daemon the password would stay cached forever
            warn!("expiry daemon failed to start, clearing cache: {}", err);
            cache.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::entry;
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn openssl_available() -> bool {
        db::check_openssl().is_ok()
    }

    fn temp_database() -> Database {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        Database::new(&env::temp_dir().join(format!(
            "passdb_session_{}_{}",
            std::process::id(),
            id
        )))
    }

    fn cleanup(db: &Database) {
        SessionCache::unlink(db.path());
        let _ = std::fs::remove_file(db.path());
    }

    #[test]
    fn test_cached_password_skips_prompt() {
        if !openssl_available() {
            eprintln!("openssl not available, skipping");
            return;
        }

        let db = temp_database();
        let master = Secret::from("correct-horse");
        db.create(&master).unwrap();

        // Invocation A validated the password and made it available.
        let warmer = SessionCache::attach(db.path()).unwrap();
        warmer.store_password(&master).unwrap();
        assert!(warmer.publish());

        // Invocation B finds it without prompting (a prompt would fail here,
        // there is no terminal).
        let session = Session::open(Database::new(db.path()), &Config::default()).unwrap();
        assert!(session.entries.is_empty());

        drop(session);
        drop(warmer);
        cleanup(&db);
    }

    #[test]
    fn test_stale_cached_password_is_scrubbed() {
        if !openssl_available() {
            eprintln!("openssl not available, skipping");
            return;
        }

        let db = temp_database();
        db.create(&Secret::from("right")).unwrap();

        let warmer = SessionCache::attach(db.path()).unwrap();
        warmer.store_password(&Secret::from("wrong")).unwrap();
        assert!(warmer.publish());

        let result = Session::open(Database::new(db.path()), &Config::default());
        assert!(result.is_err());
        // failed validation leaves nothing available for the next run
        assert!(!warmer.is_available());
        assert!(warmer.read_password().is_none());

        drop(warmer);
        cleanup(&db);
    }

    #[test]
    fn test_mutate_and_reopen() {
        if !openssl_available() {
            eprintln!("openssl not available, skipping");
            return;
        }

        let db = temp_database();
        let master = Secret::from("correct-horse");
        db.create(&master).unwrap();

        let warmer = SessionCache::attach(db.path()).unwrap();
        warmer.store_password(&master).unwrap();
        assert!(warmer.publish());

        let mut session = Session::open(Database::new(db.path()), &Config::default()).unwrap();
        session
            .entries
            .push(Entry::new("github".to_string(), Secret::from("s3cret")));
        session.save().unwrap();
        drop(session);

        let session = Session::open(Database::new(db.path()), &Config::default()).unwrap();
        let idx = entry::find(&session.entries, "github").unwrap();
        assert_eq!(session.entries[idx].password().as_str(), "s3cret");

        drop(session);
        drop(warmer);
        cleanup(&db);
    }
}
