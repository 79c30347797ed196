//! Session cache - master-password state shared across invocations
//!
//! Each command runs as its own short-lived process, so "enter the master
//! password once" needs state that outlives any single invocation. The cache
//! is a small POSIX shared-memory block keyed by the database path: an
//! availability flag, a generation counter, and a fixed-capacity password
//! buffer. Invocations attach to the same block and see each other's writes
//! without any message passing.
//!
//! The flag/buffer pair is a best-effort cache, not a transaction. Two
//! invocations racing before either has published will both prompt and one
//! write wins; both still hold a password they validated themselves. This
//! narrow race is accepted.

use std::cell::UnsafeCell;
use std::collections::hash_map::DefaultHasher;
use std::ffi::CString;
use std::hash::{Hash, Hasher};
use std::mem;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use thiserror::Error;
use tracing::debug;
use zeroize::Zeroize;

use crate::secret::Secret;

/// Maximum supported master-password length in bytes.
pub const PASSWORD_CAPACITY: usize = 128;

/// Session-cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Error allocating shared memory: {0}")]
    Unavailable(#[source] std::io::Error),

    #[error("Master password exceeds {PASSWORD_CAPACITY} bytes")]
    PasswordTooLong,

    #[error("Unable to start the expiry daemon: {0}")]
    Spawn(#[source] std::io::Error),
}

/// The shared block. Layout is fixed: every process mapping the segment must
/// agree on it, and a fresh segment must be valid when zero-filled
/// (unavailable, generation 0, empty buffer).
#[repr(C)]
struct CacheBlock {
    /// 0 = no valid password cached, 1 = cached and inside the expiry window.
    available: AtomicU32,
    /// Bumped on every false-to-true availability transition. An expiry
    /// watcher records it at spawn and refuses to scrub a newer period.
    generation: AtomicU32,
    /// Live byte length of the cached password.
    len: AtomicU32,
    password: UnsafeCell<[u8; PASSWORD_CAPACITY]>,
}

/// One process's mapping of the shared cache block.
///
/// Dropping the handle unmaps this process's view only; the shared state
/// stays behind for the next invocation.
pub struct SessionCache {
    block: *mut CacheBlock,
}

// The block lives in shared memory and is concurrently touched by other
// processes regardless; threads of one process are no different.
unsafe impl Send for SessionCache {}
unsafe impl Sync for SessionCache {}

/// Derive the shared-memory name for a database path. One cache instance
/// exists per database the user operates on.
fn shm_name(db_path: &Path) -> CString {
    let mut hasher = DefaultHasher::new();
    db_path.hash(&mut hasher);
    // shm names must start with '/' and contain no further slashes
    CString::new(format!("/passdb-{:016x}", hasher.finish()))
        .expect("hex name has no interior NUL")
}

impl SessionCache {
    /// Obtain or create the shared cache for a database path.
    ///
    /// Creation is idempotent: `O_CREAT` without `O_EXCL` reuses an existing
    /// segment as-is, and a fresh segment comes back zero-filled (reads as
    /// "unavailable"). Re-initializing here would wipe a cached password
    /// still valid for another invocation.
    pub fn attach(db_path: &Path) -> Result<Self, CacheError> {
        let name = shm_name(db_path);
        let size = mem::size_of::<CacheBlock>();

        let fd = unsafe {
            libc::shm_open(
                name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR,
                0o600 as libc::mode_t,
            )
        };
        if fd < 0 {
            return Err(CacheError::Unavailable(std::io::Error::last_os_error()));
        }

        // No-op when the segment already has this size.
        if unsafe { libc::ftruncate(fd, size as libc::off_t) } != 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(CacheError::Unavailable(err));
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        unsafe { libc::close(fd) };
        if ptr == libc::MAP_FAILED {
            return Err(CacheError::Unavailable(std::io::Error::last_os_error()));
        }

        // Best effort: keep the secret out of swap.
        if unsafe { libc::mlock(ptr, size) } != 0 {
            debug!(
                "mlock failed for session cache: {}",
                std::io::Error::last_os_error()
            );
        }

        debug!(shm = %name.to_string_lossy(), "attached session cache");
        Ok(Self {
            block: ptr as *mut CacheBlock,
        })
    }

    fn block(&self) -> &CacheBlock {
        unsafe { &*self.block }
    }

    /// Whether a validated master password is currently cached.
    pub fn is_available(&self) -> bool {
        self.block().available.load(Ordering::SeqCst) != 0
    }

    /// Read the cached master password, if one is available.
    pub fn read_password(&self) -> Option<Secret> {
        let block = self.block();
        if block.available.load(Ordering::SeqCst) == 0 {
            return None;
        }

        let len = block.len.load(Ordering::SeqCst) as usize;
        if len == 0 || len > PASSWORD_CAPACITY {
            return None;
        }

        let buf = unsafe { &*block.password.get() };
        let mut bytes = vec![0u8; len];
        bytes.copy_from_slice(&buf[..len]);

        match String::from_utf8(bytes) {
            Ok(text) => Some(Secret::new(text)),
            Err(err) => {
                // Torn concurrent write; treat as not cached.
                let mut bytes = err.into_bytes();
                bytes.zeroize();
                None
            }
        }
    }

    /// Write the password bytes without flipping availability.
    ///
    /// Callers must validate the password against the encrypted database
    /// before calling [`publish`](Self::publish) - marking an unvalidated
    /// password available would start the expiry countdown on a wrong
    /// password and wrongly suppress re-prompting on the next run.
    pub fn store_password(&self, secret: &Secret) -> Result<(), CacheError> {
        if secret.len() > PASSWORD_CAPACITY {
            return Err(CacheError::PasswordTooLong);
        }

        let block = self.block();
        let buf = unsafe { &mut *block.password.get() };
        buf.zeroize();
        buf[..secret.len()].copy_from_slice(secret.as_bytes());
        block.len.store(secret.len() as u32, Ordering::SeqCst);
        Ok(())
    }

    /// Flip the availability flag on.
    ///
    /// Returns `true` iff this call performed the false-to-true transition;
    /// that caller is the one responsible for spawning the expiry daemon.
    pub fn publish(&self) -> bool {
        let block = self.block();
        let transitioned = block.available.swap(1, Ordering::SeqCst) == 0;
        if transitioned {
            block.generation.fetch_add(1, Ordering::SeqCst);
            debug!(generation = self.generation(), "session cache published");
        }
        transitioned
    }

    /// Zero the password bytes and mark the cache unavailable.
    pub fn clear(&self) {
        let block = self.block();
        block.available.store(0, Ordering::SeqCst);
        block.len.store(0, Ordering::SeqCst);
        unsafe { &mut *block.password.get() }.zeroize();
        debug!("session cache cleared");
    }

    /// Current availability period. See [`CacheBlock::generation`].
    pub fn generation(&self) -> u32 {
        self.block().generation.load(Ordering::SeqCst)
    }

    /// Remove the backing segment for a database path. The next attach
    /// starts from a fresh zeroed block. Intended for tests and cleanup;
    /// normal operation leaves the segment behind for the next invocation.
    pub fn unlink(db_path: &Path) {
        let name = shm_name(db_path);
        let _ = unsafe { libc::shm_unlink(name.as_ptr()) };
    }
}

impl Drop for SessionCache {
    fn drop(&mut self) {
        let _ = unsafe { libc::munmap(self.block as *mut libc::c_void, mem::size_of::<CacheBlock>()) };
    }
}
