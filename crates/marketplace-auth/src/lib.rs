//! Credential storage and renewal for the marketplace API
//!
//! Provides the key-value storage seam the client persists tokens through,
//! a typed view of the stored credential pair, and the refresh-token call.
//! This crate has no knowledge of the request path; `marketplace-client`
//! decides when a refresh is needed.
//!
//! Credential flow:
//! 1. Login returns a pair, saved via `CredentialStore::store()`
//! 2. Every request reads `CredentialStore::access_token()` fresh
//! 3. On 401 the client calls `token::refresh_token()` with the stored refresh token
//! 4. The new pair replaces the old one; on failure `CredentialStore::clear()` runs

pub mod constants;
pub mod credentials;
pub mod error;
pub mod storage;
pub mod token;

pub use constants::*;
pub use credentials::{CredentialPair, CredentialStore};
pub use error::{Error, Result};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StoreFuture};
pub use token::{TokenResponse, refresh_token};
