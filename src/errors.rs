//! Error taxonomy of a sanitization run.
//!
//! Every failure a run can hit is one [`SanitizeError`] variant. The
//! pipeline never lets one escape: it is rendered into a failed
//! [`PipelineResult`](crate::models::result::PipelineResult) using the
//! stage message and detail payload chosen here per variant.

use crate::{
    models::reference::ObjectReference, services::stripper::StripError, store::StoreError,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Store operation a storage failure happened in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStep {
    GetFile,
    Download,
    Update,
    Stage,
    Delete,
    Recreate,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStep::GetFile => "get file",
            SyncStep::Download => "download",
            SyncStep::Update => "update",
            SyncStep::Stage => "stage",
            SyncStep::Delete => "delete",
            SyncStep::Recreate => "recreate",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SanitizeError {
    #[error("missing required variables: {}", .missing.join(", "))]
    Config { missing: Vec<&'static str> },
    #[error("failed to initialize store client: {0}")]
    ClientInit(#[source] StoreError),
    #[error("missing bucketId or fileId")]
    InvalidReference,
    #[error("event data variable is not set")]
    NoEventData,
    #[error("malformed event data: {0}")]
    MalformedEventData(#[from] serde_json::Error),
    #[error("file is not an image (mime type `{mime_type}`)")]
    NotAnImage { mime_type: String },
    #[error(transparent)]
    Processing(#[from] StripError),
    #[error("{step} failed: {source}")]
    Storage {
        #[source]
        source: StoreError,
        step: SyncStep,
        /// Whether the original object was already deleted when this failed.
        original_removed: bool,
        /// Staging copy still holding the stripped bytes, if any.
        staged: Option<ObjectReference>,
    },
}

impl SanitizeError {
    /// Storage failure that left the original object in place.
    pub fn storage(step: SyncStep, source: StoreError) -> Self {
        SanitizeError::Storage {
            source,
            step,
            original_removed: false,
            staged: None,
        }
    }

    /// Human-readable message for the failed stage.
    pub fn message(&self) -> &'static str {
        match self {
            SanitizeError::Config { .. } => {
                "Server configuration error: Missing environment variables"
            }
            SanitizeError::ClientInit(_) => "Failed to initialize Appwrite client",
            SanitizeError::InvalidReference | SanitizeError::NoEventData => {
                "Invalid event payload"
            }
            SanitizeError::MalformedEventData(_) => "Invalid event data",
            SanitizeError::NotAnImage { .. } => "File is not an image",
            SanitizeError::Processing(_) | SanitizeError::Storage { .. } => {
                "Error processing image"
            }
        }
    }

    /// Underlying error message, for variants caused by another error.
    pub fn cause_message(&self) -> Option<String> {
        match self {
            SanitizeError::ClientInit(err) => Some(err.to_string()),
            SanitizeError::MalformedEventData(err) => Some(err.to_string()),
            SanitizeError::Processing(err) => Some(err.to_string()),
            SanitizeError::Storage { source, .. } => Some(source.to_string()),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<ErrorDetails> {
        let details = match self {
            SanitizeError::Config { missing } => {
                ErrorDetails::Text(format!("Missing variables: {}", missing.join(", ")))
            }
            SanitizeError::ClientInit(_) => return None,
            SanitizeError::InvalidReference => {
                ErrorDetails::Text("Missing bucketId or fileId".into())
            }
            SanitizeError::NoEventData => ErrorDetails::Text("Missing event data".into()),
            SanitizeError::MalformedEventData(err) => {
                ErrorDetails::Cause(CauseDetails::generic("ParseError", err))
            }
            SanitizeError::NotAnImage { mime_type } => {
                ErrorDetails::Text(format!("Mime type: {}", mime_type))
            }
            SanitizeError::Processing(err) => {
                ErrorDetails::Cause(CauseDetails::generic("ProcessingError", err))
            }
            SanitizeError::Storage {
                source,
                step,
                original_removed,
                staged,
            } => ErrorDetails::Storage {
                cause: source.cause_details(),
                step: *step,
                original_removed: *original_removed,
                staged_bucket_id: staged.as_ref().map(|s| s.bucket_id.clone()),
                staged_file_id: staged.as_ref().map(|s| s.file_id.clone()),
            },
        };
        Some(details)
    }
}

/// Structured `details` field of a failed result.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ErrorDetails {
    Text(String),
    Cause(CauseDetails),
    Storage {
        #[serde(flatten)]
        cause: CauseDetails,
        step: SyncStep,
        #[serde(rename = "originalRemoved")]
        original_removed: bool,
        #[serde(rename = "stagedBucketId", skip_serializing_if = "Option::is_none")]
        staged_bucket_id: Option<String>,
        #[serde(rename = "stagedFileId", skip_serializing_if = "Option::is_none")]
        staged_file_id: Option<String>,
    },
}

/// What is known about the error behind a failure.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum CauseDetails {
    /// Error reported by the store itself.
    Native {
        code: u16,
        #[serde(rename = "type")]
        kind: String,
        response: String,
    },
    /// Any other error, by name and message.
    Generic { name: String, message: String },
}

impl CauseDetails {
    pub fn generic(name: &str, err: impl fmt::Display) -> Self {
        CauseDetails::Generic {
            name: name.to_string(),
            message: err.to_string(),
        }
    }
}
