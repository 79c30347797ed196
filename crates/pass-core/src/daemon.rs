//! Expiry daemon - timed scrub of the cached master password
//!
//! The invocation that makes the master password available forks a small
//! detached process whose only job is to wait out the configured window and
//! then zero the cache. It survives the parent's exit and the parent's
//! terminal session, never re-reads the password for any other purpose, and
//! exits after the scrub.
//!
//! Fixed-window expiry: reads of the cache do not reset the timer. A new
//! window starts only when availability transitions false-to-true again,
//! which bumps the cache generation; a watcher from an older window sees the
//! changed generation and leaves the newer password alone.

use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheError, SessionCache};

/// Fork the expiry daemon for the cache behind `db_path`.
///
/// The parent returns immediately; the child never returns. Call this only
/// when [`SessionCache::publish`] reported the false-to-true transition, so
/// that exactly one daemon is armed per availability period.
pub fn spawn(db_path: &Path, ttl: Duration) -> Result<(), CacheError> {
    // The child inherits stdio buffers; flush so nothing is replayed twice.
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    match unsafe { libc::fork() } {
        -1 => Err(CacheError::Spawn(std::io::Error::last_os_error())),
        0 => run_detached(db_path, ttl),
        pid => {
            debug!(pid, ttl_secs = ttl.as_secs(), "spawned expiry daemon");
            Ok(())
        }
    }
}

/// Child side of the fork: detach from the controlling session, drop the
/// inherited stdio, and run the timer against a fresh cache mapping.
fn run_detached(db_path: &Path, ttl: Duration) -> ! {
    unsafe {
        libc::setsid();
    }
    redirect_stdio_to_devnull();

    let code = match SessionCache::attach(db_path) {
        Ok(cache) => {
            expire(&cache, ttl);
            0
        }
        Err(_) => 1,
    };
    std::process::exit(code)
}

/// Wait out one availability period, then scrub the cache.
///
/// The generation is recorded up front; if a newer period began while we
/// slept (expiry raced with a fresh publish), the scrub is skipped - the
/// newer period's own watcher handles it.
pub fn expire(cache: &SessionCache, ttl: Duration) {
    let generation = cache.generation();
    thread::sleep(ttl);

    if cache.generation() == generation {
        cache.clear();
        debug!(generation, "expiry window elapsed, cache scrubbed");
    } else {
        debug!(generation, "stale expiry watcher, leaving newer password");
    }
}

/// Point fds 0/1/2 at /dev/null so the daemon holds no terminal streams open.
fn redirect_stdio_to_devnull() {
    let devnull = std::ffi::CString::new("/dev/null").expect("static path");
    unsafe {
        let fd = libc::open(devnull.as_ptr(), libc::O_RDWR);
        if fd >= 0 {
            libc::dup2(fd, libc::STDIN_FILENO);
            libc::dup2(fd, libc::STDOUT_FILENO);
            libc::dup2(fd, libc::STDERR_FILENO);
            if fd > libc::STDERR_FILENO {
                libc::close(fd);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::Secret;
    use std::env;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_db_path() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        env::temp_dir().join(format!("passdb_daemon_{}_{}", std::process::id(), id))
    }

    #[test]
    fn test_expire_clears_after_window() {
        let path = temp_db_path();
        let cache = SessionCache::attach(&path).unwrap();
        cache.store_password(&Secret::from("timed-out")).unwrap();
        assert!(cache.publish());

        // Window of 2 time units: readable at t=1, scrubbed by t=3.
        let watcher_path = path.clone();
        let watcher = thread::spawn(move || {
            let cache = SessionCache::attach(&watcher_path).unwrap();
            expire(&cache, Duration::from_millis(200));
        });

        thread::sleep(Duration::from_millis(100));
        assert!(cache.is_available());
        assert_eq!(cache.read_password().unwrap().as_str(), "timed-out");

        watcher.join().unwrap();
        assert!(!cache.is_available());
        assert!(cache.read_password().is_none());

        drop(cache);
        SessionCache::unlink(&path);
    }

    #[test]
    fn test_stale_watcher_does_not_scrub_newer_period() {
        let path = temp_db_path();
        let cache = SessionCache::attach(&path).unwrap();
        cache.store_password(&Secret::from("first")).unwrap();
        assert!(cache.publish());

        let watcher_path = path.clone();
        let watcher = thread::spawn(move || {
            let cache = SessionCache::attach(&watcher_path).unwrap();
            expire(&cache, Duration::from_millis(200));
        });

        // A new availability period begins while the watcher sleeps.
        thread::sleep(Duration::from_millis(50));
        cache.clear();
        cache.store_password(&Secret::from("second")).unwrap();
        assert!(cache.publish());

        watcher.join().unwrap();
        assert!(cache.is_available());
        assert_eq!(cache.read_password().unwrap().as_str(), "second");

        drop(cache);
        SessionCache::unlink(&path);
    }

    #[test]
    fn test_expire_is_sole_actor() {
        // No other process action required: store, publish, wait out the
        // window through the watcher alone.
        let path = temp_db_path();
        let cache = SessionCache::attach(&path).unwrap();
        cache.store_password(&Secret::from("untouched")).unwrap();
        assert!(cache.publish());

        expire(&cache, Duration::from_millis(50));

        assert!(!cache.is_available());

        drop(cache);
        SessionCache::unlink(&path);
    }
}
