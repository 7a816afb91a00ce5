//! Shared types used by the MongoDB store and helpers.

use thiserror::Error;

/// Errors returned while interacting with MongoDB.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Driver failed to reach the server or the server rejected the operation.
    #[error("MongoDB request failed: {0}")]
    Driver(#[from] mongodb::error::Error),
    /// Value could not be converted into BSON.
    #[error("Failed to encode document: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),
    /// GridFS download stream broke while reading.
    #[error("Failed to read blob: {0}")]
    Blob(#[from] std::io::Error),
}

/// Flag image loaded from GridFS together with its stored metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    /// Upload filename, used to infer a MIME type.
    pub filename: Option<String>,
    /// Content type recorded at upload time.
    pub content_type: Option<String>,
    /// File contents.
    pub bytes: Vec<u8>,
}
