//! Function invocation endpoint.

use crate::{
    models::{invocation::FunctionRequest, result::PipelineResult},
    services::pipeline::Pipeline,
};
use axum::{body::Bytes, extract::State};
use serde_json::Value;
use tracing::{debug, warn};

/// `POST /`
///
/// Runs one invocation and answers with its result. Failures are reported
/// inside the result, so the status is always 200. A body that is not a
/// request object is forwarded as a raw string payload.
pub async fn invoke(State(pipeline): State<Pipeline>, body: Bytes) -> PipelineResult {
    pipeline.run(parse_request(&body)).await
}

fn parse_request(body: &[u8]) -> FunctionRequest {
    if body.iter().all(u8::is_ascii_whitespace) {
        return FunctionRequest::default();
    }
    match serde_json::from_slice::<FunctionRequest>(body) {
        Ok(req) => {
            debug!("Invocation with {} variables", req.variables.len());
            req
        }
        Err(err) => {
            warn!("Request body is not an invocation object: {}", err);
            FunctionRequest {
                payload: Some(Value::String(String::from_utf8_lossy(body).into_owned())),
                ..Default::default()
            }
        }
    }
}
