//! Resolves which object an invocation targets.
//!
//! Direct invocations carry `{bucketId, fileId}` in the payload. Event
//! invocations carry the storage event envelope, serialized as JSON, in the
//! event-data variable; the file id is the envelope's `$id`.

use crate::{
    config::{EVENT_DATA_VAR, TRIGGER_VAR},
    errors::SanitizeError,
    models::{
        invocation::FunctionRequest,
        reference::{ObjectReference, TriggerSource},
    },
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
struct DirectPayload {
    #[serde(rename = "bucketId")]
    bucket_id: Option<String>,
    #[serde(rename = "fileId")]
    file_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "bucketId")]
    bucket_id: Option<String>,
    #[serde(rename = "$id")]
    file_id: Option<String>,
}

/// Pick the trigger shape from the invocation's trigger variable.
pub fn trigger_source(req: &FunctionRequest) -> TriggerSource {
    match req.variable(TRIGGER_VAR) {
        Some("event") => TriggerSource::Event,
        _ => TriggerSource::Direct,
    }
}

/// Resolve the object reference for the given trigger shape.
pub fn resolve(
    source: TriggerSource,
    req: &FunctionRequest,
) -> Result<ObjectReference, SanitizeError> {
    match source {
        TriggerSource::Direct => resolve_direct(req.payload.as_ref()),
        TriggerSource::Event => resolve_event(req.variable(EVENT_DATA_VAR)),
    }
}

/// Read `bucketId`/`fileId` from a direct payload.
///
/// The runtime may forward the body as a JSON string; a string that is not
/// JSON counts as an empty payload.
pub fn resolve_direct(payload: Option<&Value>) -> Result<ObjectReference, SanitizeError> {
    let parsed = match payload {
        Some(Value::String(raw)) => serde_json::from_str::<DirectPayload>(raw).unwrap_or_default(),
        Some(value) => DirectPayload::deserialize(value).unwrap_or_default(),
        None => DirectPayload::default(),
    };
    valid_pair(parsed.bucket_id, parsed.file_id)
}

/// Parse the serialized event envelope.
pub fn resolve_event(event_data: Option<&str>) -> Result<ObjectReference, SanitizeError> {
    let raw = event_data.ok_or(SanitizeError::NoEventData)?;
    let envelope: EventEnvelope = serde_json::from_str(raw)?;
    valid_pair(envelope.bucket_id, envelope.file_id)
}

fn valid_pair(
    bucket_id: Option<String>,
    file_id: Option<String>,
) -> Result<ObjectReference, SanitizeError> {
    match (bucket_id, file_id) {
        (Some(bucket), Some(file)) if is_object_id(&bucket) && is_object_id(&file) => {
            Ok(ObjectReference::new(bucket, file))
        }
        _ => Err(SanitizeError::InvalidReference),
    }
}

/// Store ids: `[A-Za-z0-9._-]`, starting with a letter or digit.
fn is_object_id(id: &str) -> bool {
    id.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direct_payload_object() {
        let payload = json!({"bucketId": "b1", "fileId": "f1"});
        let reference = resolve_direct(Some(&payload)).unwrap();
        assert_eq!(reference, ObjectReference::new("b1", "f1"));
    }

    #[test]
    fn direct_payload_as_json_string() {
        let payload = Value::String(r#"{"bucketId":"b1","fileId":"f1"}"#.into());
        let reference = resolve_direct(Some(&payload)).unwrap();
        assert_eq!(reference, ObjectReference::new("b1", "f1"));
    }

    #[test]
    fn direct_payload_missing_or_empty_fields() {
        for payload in [
            json!({"bucketId": "b1"}),
            json!({"fileId": "f1"}),
            json!({"bucketId": "", "fileId": "f1"}),
            json!({"bucketId": "b1", "fileId": 7}),
            Value::String("not json".into()),
        ] {
            assert!(matches!(
                resolve_direct(Some(&payload)),
                Err(SanitizeError::InvalidReference)
            ));
        }
        assert!(matches!(
            resolve_direct(None),
            Err(SanitizeError::InvalidReference)
        ));
    }

    #[test]
    fn ids_outside_the_store_alphabet_are_rejected() {
        for file_id in ["f1/../../users/u1", "f1?x=", "..", ".hidden", "f 1", "f1%2F"] {
            let payload = json!({"bucketId": "b1", "fileId": file_id});
            assert!(
                matches!(
                    resolve_direct(Some(&payload)),
                    Err(SanitizeError::InvalidReference)
                ),
                "{} should be rejected",
                file_id
            );
        }

        let raw = r#"{"bucketId":"../buckets","$id":"f2"}"#;
        assert!(matches!(
            resolve_event(Some(raw)),
            Err(SanitizeError::InvalidReference)
        ));

        let payload = json!({"bucketId": "user-uploads_2", "fileId": "65a1.f3-x_9"});
        assert_eq!(
            resolve_direct(Some(&payload)).unwrap(),
            ObjectReference::new("user-uploads_2", "65a1.f3-x_9")
        );
    }

    #[test]
    fn event_envelope_uses_dollar_id() {
        let raw = r#"{"bucketId":"b2","$id":"f2","name":"photo.png","sizeOriginal":42}"#;
        assert_eq!(
            resolve_event(Some(raw)).unwrap(),
            ObjectReference::new("b2", "f2")
        );
    }

    #[test]
    fn event_envelope_errors() {
        assert!(matches!(resolve_event(None), Err(SanitizeError::NoEventData)));
        assert!(matches!(
            resolve_event(Some("{not json")),
            Err(SanitizeError::MalformedEventData(_))
        ));
        assert!(matches!(
            resolve_event(Some(r#"{"bucketId":"b2","fileId":"f2"}"#)),
            Err(SanitizeError::InvalidReference)
        ));
    }

    #[test]
    fn trigger_variable_selects_source() {
        let mut req = FunctionRequest::default();
        assert_eq!(trigger_source(&req), TriggerSource::Direct);

        req.variables.insert(TRIGGER_VAR.into(), "http".into());
        assert_eq!(trigger_source(&req), TriggerSource::Direct);

        req.variables.insert(TRIGGER_VAR.into(), "event".into());
        assert_eq!(trigger_source(&req), TriggerSource::Event);
    }
}
