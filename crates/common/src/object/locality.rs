use serde::{Deserialize, Serialize};

use super::ContentHash;
use crate::store::StoreError;

/// Raw locality answer from a store.
///  Any of the fields may be missing depending on what
///  the store knows; see [`LocalityStat::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalityStat {
    /// Whether the store was able to compute locality at all
    pub with_locality: bool,
    /// The store's own verdict, if it gave one
    pub local: Option<bool>,
    pub size_local: Option<u64>,
    pub size_total: Option<u64>,
}

impl LocalityStat {
    /// Stat for content that is entirely present
    pub fn complete(size: u64) -> Self {
        Self {
            with_locality: true,
            local: Some(true),
            size_local: Some(size),
            size_total: Some(size),
        }
    }

    /// Stat for content of which only `size_local` bytes are present
    pub fn partial(size_local: u64, size_total: u64) -> Self {
        Self {
            with_locality: true,
            local: Some(size_local == size_total),
            size_local: Some(size_local),
            size_total: Some(size_total),
        }
    }

    /// Turn the raw stat into a [`Locality`].
    ///  Missing sizes are never defaulted: a stat without
    ///  `size_local`/`size_total`, or with more local bytes
    ///  than total bytes, is a [`StoreError::MissingSize`].
    pub fn validate(self, hash: &ContentHash) -> Result<Locality, StoreError> {
        let size_local = self.size_local.ok_or_else(|| StoreError::MissingSize {
            hash: hash.clone(),
            reason: "local size is not present",
        })?;
        let size_total = self.size_total.ok_or_else(|| StoreError::MissingSize {
            hash: hash.clone(),
            reason: "total size is not present",
        })?;
        if size_local > size_total {
            return Err(StoreError::MissingSize {
                hash: hash.clone(),
                reason: "local size exceeds total size",
            });
        }

        let is_local = self.with_locality && self.local.unwrap_or(size_local == size_total);

        Ok(Locality {
            size_local,
            size_total,
            is_local,
        })
    }
}

/// Validated locality of a hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locality {
    pub size_local: u64,
    pub size_total: u64,
    pub is_local: bool,
}

impl Locality {
    pub fn percent(&self) -> f64 {
        if self.size_total == 0 {
            return 100.0;
        }
        100.0 * self.size_local as f64 / self.size_total as f64
    }
}
