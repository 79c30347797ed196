//! pass - Offline password manager
//!
//! "Remember one password and forget about the rest."
//!
//! Identifier/password pairs live in one flat file encrypted by the openssl
//! CLI with a master password. The master password is cached across
//! invocations in a shared-memory session cache (see pass-core) and scrubbed
//! by a detached expiry daemon after a fixed window.

pub mod clipboard;
pub mod db;
pub mod entry;
pub mod prompt;
pub mod session;

pub use db::{Database, DbError};
pub use entry::Entry;
pub use session::Session;
