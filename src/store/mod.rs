//! Object store client abstraction.
//!
//! The pipeline talks to storage only through [`ObjectStore`]. Two backends
//! exist: [`appwrite::AppwriteStorage`] speaks the hosting platform's REST
//! API, [`memory::MemoryStore`] keeps everything in process and is what the
//! tests and local dry runs use.

pub mod appwrite;
pub mod memory;

use crate::{
    config::StoreSettings,
    errors::CauseDetails,
    models::{file::ObjectMetadata, reference::ObjectReference},
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store answered with a structured error.
    #[error("{message}")]
    Api {
        code: u16,
        kind: String,
        message: String,
        response: String,
    },
    #[error("invalid store client setting: {0}")]
    InvalidSetting(String),
    #[error("`{0}` is not a usable object id")]
    InvalidId(String),
    #[error("unexpected store response: {0}")]
    Decode(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Structured detail payload for the invocation result.
    ///
    /// Store-native errors expose their code, type and raw body; everything
    /// else is reported by name and message.
    pub fn cause_details(&self) -> CauseDetails {
        match self {
            StoreError::Api {
                code,
                kind,
                response,
                ..
            } => CauseDetails::Native {
                code: *code,
                kind: kind.clone(),
                response: response.clone(),
            },
            StoreError::InvalidSetting(_) => CauseDetails::generic("ConfigError", self),
            StoreError::InvalidId(_) => CauseDetails::generic("InvalidIdError", self),
            StoreError::Decode(_) => CauseDetails::generic("DecodeError", self),
            StoreError::Http(_) => CauseDetails::generic("HttpError", self),
        }
    }
}

/// Bucket/file-keyed object store with per-object permission lists.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the raw bytes of a file.
    async fn download_file(&self, reference: &ObjectReference) -> StoreResult<Bytes>;

    /// Fetch a file's metadata record.
    async fn get_file(&self, reference: &ObjectReference) -> StoreResult<ObjectMetadata>;

    /// Replace the content of an existing file, keeping its id.
    async fn update_file_content(
        &self,
        reference: &ObjectReference,
        content: Bytes,
    ) -> StoreResult<()>;

    async fn delete_file(&self, reference: &ObjectReference) -> StoreResult<()>;

    /// Create a file under a caller-chosen id.
    async fn create_file(
        &self,
        reference: &ObjectReference,
        content: Bytes,
        name: &str,
        read_permissions: &[String],
        write_permissions: &[String],
    ) -> StoreResult<()>;
}

/// Produces a ready store handle from validated per-invocation settings.
pub trait StoreConnector: Send + Sync {
    fn connect(&self, settings: &StoreSettings) -> StoreResult<Arc<dyn ObjectStore>>;
}
