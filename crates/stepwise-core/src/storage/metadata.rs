//! Schema metadata recorded inside every store.

use crate::catalog::SchemaVersion;
use crate::error::Error;
use rkyv::{Archive, Deserialize, Serialize};

/// Get the current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Physical metadata identifying which schema a store conforms to.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Id of the version the store was stamped with.
    pub schema_id: String,
    /// Structural fingerprint of that version.
    pub fingerprint: [u8; 32],
    /// When the store was stamped (microseconds since epoch).
    pub stamped_at: u64,
}

impl StoreMetadata {
    /// Metadata for a store conforming to `schema`.
    pub fn for_schema(schema: &SchemaVersion) -> Self {
        Self {
            schema_id: schema.id().to_string(),
            fingerprint: *schema.fingerprint().as_bytes(),
            stamped_at: current_timestamp(),
        }
    }

    /// Short hex form of the fingerprint.
    pub fn fingerprint_hex(&self) -> String {
        hex::encode(&self.fingerprint[..8])
    }

    /// Serialize the metadata to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize metadata from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}
