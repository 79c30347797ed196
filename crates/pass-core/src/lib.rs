//! Pass Core - Shared functionality for the pass password manager
//!
//! The interesting part of an offline password manager is not the storage,
//! it is remembering the master password between invocations. This crate
//! holds that machinery: a shared-memory session cache visible to every
//! invocation operating on the same database, and a detached expiry daemon
//! that scrubs the cached secret after a fixed window.

pub mod cache;
pub mod config;
pub mod daemon;
pub mod paths;
pub mod secret;

pub use cache::{CacheError, SessionCache};
pub use config::Config;
pub use paths::Paths;
pub use secret::Secret;
