use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use placement_core::{BlobId, NewBlob, PlacementError};

/// Chunked binary content read back from a blob store.
pub type ByteStream = BoxStream<'static, Result<Bytes, PlacementError>>;

/// Binary storage addressed by opaque ids.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, blob: &NewBlob) -> Result<BlobId, PlacementError>;

    /// Open a read stream. Returns `None` when no blob has this id.
    async fn open_download(&self, id: &BlobId) -> Result<Option<ByteStream>, PlacementError>;

    /// Delete a blob. Returns `false` when it did not exist.
    async fn delete(&self, id: &BlobId) -> Result<bool, PlacementError>;
}

/// Collect a download stream into memory.
pub async fn read_to_end(mut stream: ByteStream) -> Result<Vec<u8>, PlacementError> {
    use futures::StreamExt;

    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk?);
    }
    Ok(out)
}
