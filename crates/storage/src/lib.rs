//! Blob storage boundary.
//!
//! Document tools read and write binary files only through the
//! [`BlobStore`] trait: upload, retrieval, and a URL the caller can
//! fetch. Backed by `object_store` (local filesystem, S3, or in-memory
//! for tests).

pub mod backend;
pub mod error;

pub use backend::{BlobBackend, BlobStore};
pub use error::StorageError;
