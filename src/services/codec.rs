//! Blob transform applied to records on their way into and out of the database.
//!
//! Compression and signing live outside this crate; they plug in through [`BlobCodec`].

use thiserror::Error;

/// Failures raised by a [`BlobCodec`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload could not be encoded (e.g. the compressor failed).
    #[error("failed to encode blob: {0}")]
    Encode(String),
    /// The stored blob could not be decoded or did not pass verification.
    #[error("failed to decode blob: {0}")]
    Decode(String),
}

/// Transform applied to every record blob: encode before storing, decode after loading.
///
/// Implementations typically compress then sign on `encode` and verify then decompress on
/// `decode`; `decode(encode(x))` must yield `x`.
pub trait BlobCodec: Send + Sync {
    /// Turn serialized record bytes into the blob that gets stored.
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
    /// Recover the serialized record bytes from a stored blob.
    fn decode(&self, blob: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Stores blobs unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughCodec;

impl BlobCodec for PassThroughCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn decode(&self, blob: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(blob.to_vec())
    }
}
