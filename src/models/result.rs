//! The single result object an invocation produces.

use crate::{
    errors::{ErrorDetails, SanitizeError},
    models::reference::ObjectReference,
};
use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub const SUCCESS_MESSAGE: &str = "EXIF metadata stripped successfully";

/// Terminal output of one pipeline run.
///
/// `fileId` and `bucketId` are present whenever the reference was resolved
/// before the run ended.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_id: Option<String>,
}

impl PipelineResult {
    pub fn success(reference: &ObjectReference) -> Self {
        Self {
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
            error: None,
            details: None,
            file_id: Some(reference.file_id.clone()),
            bucket_id: Some(reference.bucket_id.clone()),
        }
    }

    pub fn failure(err: &SanitizeError, reference: Option<&ObjectReference>) -> Self {
        Self {
            success: false,
            message: err.message().to_string(),
            error: err.cause_message(),
            details: err.details(),
            file_id: reference.map(|r| r.file_id.clone()),
            bucket_id: reference.map(|r| r.bucket_id.clone()),
        }
    }
}

/// Results are the function's response payload, whatever the outcome.
impl IntoResponse for PipelineResult {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
