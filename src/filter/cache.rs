//! Cached auth information and the shared-store adapter
//!
//! Entries live in the host's shared key-value store as JSON:
//! `{"expiration": <unix seconds>, "cachedHeaders": [{"name": .., "value": ..}]}`.
//!
//! Writes are optimistic. A write carries the version observed by the read
//! that preceded the provider call, so of two requests that missed the cache
//! at the same time only the first write lands. The losing write is dropped
//! and never retried.

use crate::filter::host::{HostError, SharedData};
use crate::filter::types::{CacheId, HeaderList};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors raised while reading or writing cache entries
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to encode cache entry: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode cache entry: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Cache entry for {key} changed since it was read")]
    StaleVersion { key: String },

    #[error("Shared store error: {0}")]
    Store(#[from] HostError),
}

/// Headers cached for one slot together with their expiry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAuthInformation {
    #[serde(rename = "expiration")]
    pub expiration_time: i64,
    #[serde(rename = "cachedHeaders")]
    pub cached_headers: HeaderList,
}

impl CachedAuthInformation {
    pub fn new(expiration_time: i64, cached_headers: HeaderList) -> Self {
        Self {
            expiration_time,
            cached_headers,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(self).map_err(CacheError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CacheError> {
        serde_json::from_slice(bytes).map_err(CacheError::Decode)
    }

    /// Whether the entry may still be served at `now` (unix seconds)
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.expiration_time > now
    }
}

/// Result of a successful cache read
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheLookup {
    pub data: Bytes,
    /// Version to hand back on the next write of the same slot
    pub version: Option<u32>,
}

/// Get-with-version / set-with-version over the host's shared store
#[derive(Clone, Debug)]
pub struct CacheStore<S> {
    store: S,
}

impl<S: SharedData> CacheStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Reads a slot; missing keys and store failures both read as `None`
    pub fn read(&self, cache_id: CacheId) -> Option<CacheLookup> {
        let key = cache_id.shared_data_key();
        match self.store.get_shared_data(&key) {
            Ok((Some(data), version)) => Some(CacheLookup { data, version }),
            Ok((None, _)) => None,
            Err(e) => {
                debug!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Compare-and-swap write against the version observed at read time
    pub fn write(
        &self,
        cache_id: CacheId,
        data: &[u8],
        version: Option<u32>,
    ) -> Result<(), CacheError> {
        let key = cache_id.shared_data_key();
        match self.store.set_shared_data(&key, data, version) {
            Ok(()) => Ok(()),
            Err(HostError::CasMismatch(_)) => Err(CacheError::StaleVersion { key }),
            Err(e) => Err(CacheError::Store(e)),
        }
    }
}
