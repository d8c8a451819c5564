use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use super::PlacementError;

/// Opaque reference to binary content held in the blob store.
///
/// Well-formed references are 24 hexadecimal characters, the textual form of a
/// document-store object id. Every backend hands out ids in that shape.
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    pub const LEN: usize = 24;

    /// Parse a reference, rejecting anything that is not a well-formed store id.
    pub fn parse(value: &str) -> Result<Self, PlacementError> {
        let blob_id = Self(value.to_string());
        if !blob_id.is_well_formed() {
            return Err(PlacementError::validation("invalid file id"));
        }
        Ok(blob_id)
    }

    /// Wrap a stored value without validation. Use `is_well_formed` before touching the store.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a fresh id for backends that do not assign their own.
    pub fn generate() -> Self {
        let bytes = Uuid::new_v4().into_bytes();
        Self(hex::encode(&bytes[..Self::LEN / 2]))
    }

    pub fn is_well_formed(&self) -> bool {
        self.0.len() == Self::LEN && hex::decode(&self.0).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Binary payload handed to the blob store on upload.
#[derive(Debug, Clone)]
pub struct NewBlob {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl NewBlob {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
