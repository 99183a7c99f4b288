//! Identifies the object a pipeline run operates on and how it was triggered.

use std::fmt;

/// A canonical `(bucket, file)` pair addressing one stored object.
///
/// Both ids are non-empty store ids (`[A-Za-z0-9._-]`, leading letter or
/// digit) once constructed through the resolver.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectReference {
    /// Bucket holding the file.
    pub bucket_id: String,

    /// File id within the bucket.
    pub file_id: String,
}

impl ObjectReference {
    pub fn new(bucket_id: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            bucket_id: bucket_id.into(),
            file_id: file_id.into(),
        }
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket_id, self.file_id)
    }
}

/// Which trigger shape started the invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerSource {
    /// Explicit request payload carrying `bucketId` and `fileId`.
    Direct,
    /// Storage-change event delivered through the event-data variable.
    Event,
}

impl TriggerSource {
    /// Write-back strategy bound to this trigger shape.
    pub fn strategy(self) -> SyncStrategy {
        match self {
            TriggerSource::Direct => SyncStrategy::Update,
            TriggerSource::Event => SyncStrategy::DeleteRecreate,
        }
    }
}

/// How stripped bytes are written back to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Replace the content of the existing object in place.
    Update,
    /// Delete the object and create it again under the same id.
    DeleteRecreate,
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStrategy::Update => f.write_str("update"),
            SyncStrategy::DeleteRecreate => f.write_str("delete-recreate"),
        }
    }
}
