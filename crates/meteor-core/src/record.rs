//! The record envelope carried between pipeline stages.

use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::asset::Asset;

/// An immutable envelope around one [`Asset`].
///
/// Records are cheap to clone so the fanout stage can hand the same record
/// to every sink without copying the asset. Processors that rewrite an
/// asset take the record apart with [`Record::into_asset`] and wrap the
/// result in a fresh envelope.
#[derive(Debug, Clone)]
pub struct Record {
    asset: Arc<Asset>,
}

impl Record {
    pub fn new(asset: Asset) -> Self {
        Self {
            asset: Arc::new(asset),
        }
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    /// Unwraps the asset, cloning only when the record has been shared.
    pub fn into_asset(self) -> Asset {
        Arc::try_unwrap(self.asset).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl From<Asset> for Record {
    fn from(asset: Asset) -> Self {
        Self::new(asset)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.asset.serialize(serializer)
    }
}
