//! In-process object store.
//!
//! Keeps file records and payloads in a map keyed by `(bucket, file)`,
//! computes an md5 etag per payload, and journals every operation so callers
//! can assert which store calls a run made. Failures can be injected per
//! operation to exercise partial-failure paths.

use super::{ObjectStore, StoreConnector, StoreError, StoreResult};
use crate::{
    config::StoreSettings,
    models::{file::ObjectMetadata, reference::ObjectReference},
};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::debug;

/// Store operation kinds, as recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    GetFile,
    Download,
    Update,
    Delete,
    Create,
}

impl OpKind {
    pub fn is_mutation(self) -> bool {
        matches!(self, OpKind::Update | OpKind::Delete | OpKind::Create)
    }
}

/// One journaled store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOp {
    pub kind: OpKind,
    pub reference: ObjectReference,
}

/// A stored file: its record, payload and md5 etag.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub metadata: ObjectMetadata,
    pub content: Bytes,
    pub etag: String,
}

#[derive(Debug, Clone)]
struct Failure {
    kind: OpKind,
    file_id: Option<String>,
    code: u16,
    error_type: String,
}

#[derive(Debug, Default)]
struct Inner {
    files: HashMap<ObjectReference, StoredFile>,
    journal: Vec<StoreOp>,
    failures: Vec<Failure>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a panicking test thread; the data is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a file without journaling it.
    pub fn insert(&self, reference: ObjectReference, metadata: ObjectMetadata, content: Bytes) {
        let etag = etag(&content);
        self.lock().files.insert(
            reference,
            StoredFile {
                metadata,
                content,
                etag,
            },
        );
    }

    pub fn file(&self, reference: &ObjectReference) -> Option<StoredFile> {
        self.lock().files.get(reference).cloned()
    }

    /// Ids of every file currently held in `bucket_id`, sorted.
    pub fn file_ids(&self, bucket_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .lock()
            .files
            .keys()
            .filter(|r| r.bucket_id == bucket_id)
            .map(|r| r.file_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn journal(&self) -> Vec<StoreOp> {
        self.lock().journal.clone()
    }

    /// Whether any call that changes stored state was made.
    pub fn mutated(&self) -> bool {
        self.lock().journal.iter().any(|op| op.kind.is_mutation())
    }

    /// Make every `kind` call fail with a store error, optionally only for one file id.
    pub fn fail(&self, kind: OpKind, file_id: Option<&str>, code: u16, error_type: &str) {
        self.lock().failures.push(Failure {
            kind,
            file_id: file_id.map(str::to_string),
            code,
            error_type: error_type.to_string(),
        });
    }

    /// Journal the call and apply any injected failure.
    fn begin(&self, kind: OpKind, reference: &ObjectReference) -> StoreResult<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        inner.journal.push(StoreOp {
            kind,
            reference: reference.clone(),
        });
        debug!("memory store {:?} {}", kind, reference);

        let failure = inner
            .failures
            .iter()
            .find(|f| {
                f.kind == kind
                    && f.file_id
                        .as_deref()
                        .is_none_or(|id| id == reference.file_id)
            })
            .cloned();
        match failure {
            Some(f) => Err(api_error(
                f.code,
                &f.error_type,
                "Injected failure for this operation.",
            )),
            None => Ok(inner),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn download_file(&self, reference: &ObjectReference) -> StoreResult<Bytes> {
        let inner = self.begin(OpKind::Download, reference)?;
        inner
            .files
            .get(reference)
            .map(|f| f.content.clone())
            .ok_or_else(not_found)
    }

    async fn get_file(&self, reference: &ObjectReference) -> StoreResult<ObjectMetadata> {
        let inner = self.begin(OpKind::GetFile, reference)?;
        inner
            .files
            .get(reference)
            .map(|f| f.metadata.clone())
            .ok_or_else(not_found)
    }

    async fn update_file_content(
        &self,
        reference: &ObjectReference,
        content: Bytes,
    ) -> StoreResult<()> {
        let mut inner = self.begin(OpKind::Update, reference)?;
        let file = inner.files.get_mut(reference).ok_or_else(not_found)?;
        file.etag = etag(&content);
        file.content = content;
        Ok(())
    }

    async fn delete_file(&self, reference: &ObjectReference) -> StoreResult<()> {
        let mut inner = self.begin(OpKind::Delete, reference)?;
        inner
            .files
            .remove(reference)
            .map(|_| ())
            .ok_or_else(not_found)
    }

    async fn create_file(
        &self,
        reference: &ObjectReference,
        content: Bytes,
        name: &str,
        read_permissions: &[String],
        write_permissions: &[String],
    ) -> StoreResult<()> {
        let mut inner = self.begin(OpKind::Create, reference)?;
        if inner.files.contains_key(reference) {
            return Err(api_error(
                409,
                "storage_file_already_exists",
                "A storage file with the requested ID already exists.",
            ));
        }

        let mime_type = image::guess_format(&content)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        let etag = etag(&content);
        inner.files.insert(
            reference.clone(),
            StoredFile {
                metadata: ObjectMetadata {
                    mime_type,
                    name: name.to_string(),
                    read_permissions: read_permissions.to_vec(),
                    write_permissions: write_permissions.to_vec(),
                },
                content,
                etag,
            },
        );
        Ok(())
    }
}

impl StoreConnector for MemoryStore {
    fn connect(&self, _settings: &StoreSettings) -> StoreResult<Arc<dyn ObjectStore>> {
        Ok(Arc::new(self.clone()))
    }
}

fn etag(content: &[u8]) -> String {
    format!("{:x}", md5::compute(content))
}

fn not_found() -> StoreError {
    api_error(
        404,
        "storage_file_not_found",
        "The requested file could not be found.",
    )
}

/// Error shaped like the REST API's error responses.
fn api_error(code: u16, error_type: &str, message: &str) -> StoreError {
    let response = json!({
        "message": message,
        "code": code,
        "type": error_type,
        "version": "memory",
    });
    StoreError::Api {
        code,
        kind: error_type.to_string(),
        message: message.to_string(),
        response: response.to_string(),
    }
}
