//! Typed view of the stored credential pair
//!
//! The pair lives under two storage keys. Both are written with one
//! `multi_set` and removed with one `multi_remove`; the store gives no
//! cross-key atomicity, so readers treat a half-present pair as absent.

use std::sync::Arc;

use common::Secret;
use tracing::debug;

use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::error::Result;
use crate::storage::KeyValueStore;

/// Access and refresh token, always handled together.
#[derive(Debug, Clone)]
pub struct CredentialPair {
    /// Short-lived bearer token attached to every request
    pub access: Secret<String>,
    /// Long-lived token used only against the refresh endpoint
    pub refresh: Secret<String>,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: Secret::new(access.into()),
            refresh: Secret::new(refresh.into()),
        }
    }
}

/// Reads and writes the credential pair through a shared `KeyValueStore`.
///
/// Cheap to clone; every clone sees the same backing store.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The underlying store, for callers persisting their own keys.
    pub fn backing(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Current access token. Empty strings read as absent.
    pub async fn access_token(&self) -> Result<Option<Secret<String>>> {
        self.read(ACCESS_TOKEN_KEY).await
    }

    /// Current refresh token. Empty strings read as absent.
    pub async fn refresh_token(&self) -> Result<Option<Secret<String>>> {
        self.read(REFRESH_TOKEN_KEY).await
    }

    /// Both tokens, or `None` if either is missing.
    pub async fn load(&self) -> Result<Option<CredentialPair>> {
        let access = self.access_token().await?;
        let refresh = self.refresh_token().await?;
        Ok(match (access, refresh) {
            (Some(access), Some(refresh)) => Some(CredentialPair { access, refresh }),
            _ => None,
        })
    }

    /// Persist a pair, replacing whatever was stored.
    pub async fn store(&self, pair: &CredentialPair) -> Result<()> {
        self.store
            .multi_set(vec![
                (ACCESS_TOKEN_KEY.to_owned(), pair.access.expose().clone()),
                (REFRESH_TOKEN_KEY.to_owned(), pair.refresh.expose().clone()),
            ])
            .await?;
        debug!("stored credential pair");
        Ok(())
    }

    /// Remove both tokens. Clearing an empty store is not an error.
    pub async fn clear(&self) -> Result<()> {
        self.store
            .multi_remove(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])
            .await?;
        debug!("cleared credential pair");
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Secret<String>>> {
        Ok(self
            .store
            .get(key)
            .await?
            .map(Secret::new)
            .filter(|token| !token.is_blank()))
    }
}
