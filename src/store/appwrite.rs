//! REST client for the hosting platform's storage API.
//!
//! Authenticates with the project id and an API key on every request.
//! Uploads above [`CHUNK_SIZE`] are split into chunks the way the platform
//! SDKs do it: each chunk carries a `Content-Range` header and every chunk
//! after the first names the target file in `x-appwrite-id`.

use super::{ObjectStore, StoreConnector, StoreError, StoreResult};
use crate::{
    config::StoreSettings,
    models::{file::ObjectMetadata, reference::ObjectReference},
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    Client, Method, Response, StatusCode, Url,
    header::{CONTENT_RANGE, HeaderMap, HeaderName, HeaderValue},
    multipart::{Form, Part},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub const CHUNK_SIZE: usize = 5 * 1024 * 1024;

const PROJECT_HEADER: HeaderName = HeaderName::from_static("x-appwrite-project");
const KEY_HEADER: HeaderName = HeaderName::from_static("x-appwrite-key");
const ID_HEADER: HeaderName = HeaderName::from_static("x-appwrite-id");

#[derive(Clone)]
pub struct AppwriteStorage {
    client: Client,
    endpoint: Url,
}

/// Error body returned by the API.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    code: Option<u16>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl AppwriteStorage {
    pub fn new(settings: &StoreSettings) -> StoreResult<Self> {
        let url = Url::parse(&settings.endpoint).map_err(|e| {
            StoreError::InvalidSetting(format!("endpoint `{}`: {}", settings.endpoint, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(StoreError::InvalidSetting(format!(
                "endpoint `{}` must use http or https",
                settings.endpoint
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(PROJECT_HEADER, header_value("project id", &settings.project_id)?);
        let mut key = header_value("API key", &settings.api_key)?;
        key.set_sensitive(true);
        headers.insert(KEY_HEADER, key);

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("media-sanitizer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: url,
        })
    }

    /// Endpoint extended by `segments`, each percent-encoded as a single path segment.
    ///
    /// Empty and dot segments would be dropped or resolved away, so they are refused.
    fn url(&self, segments: &[&str]) -> StoreResult<Url> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(StoreError::InvalidId(bad.to_string()));
        }
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                StoreError::InvalidSetting(format!("endpoint `{}` cannot carry a path", self.endpoint))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn files_url(&self, bucket_id: &str) -> StoreResult<Url> {
        self.url(&["storage", "buckets", bucket_id, "files"])
    }

    fn file_url(&self, reference: &ObjectReference) -> StoreResult<Url> {
        self.url(&[
            "storage",
            "buckets",
            &reference.bucket_id,
            "files",
            &reference.file_id,
        ])
    }

    /// Send `content` as one or more multipart chunks.
    async fn upload(
        &self,
        method: Method,
        url: Url,
        reference: &ObjectReference,
        content: Bytes,
        name: &str,
        permissions: Option<(&[String], &[String])>,
    ) -> StoreResult<()> {
        let total = content.len();
        let chunked = total > CHUNK_SIZE;
        let mut start = 0;

        loop {
            let end = (start + CHUNK_SIZE).min(total);
            let chunk = content.slice(start..end);

            let mut form = Form::new()
                .text("fileId", reference.file_id.clone())
                .part("file", Part::bytes(chunk.to_vec()).file_name(name.to_string()));
            if let Some((read, write)) = permissions {
                for entry in read {
                    form = form.text("read[]", entry.clone());
                }
                for entry in write {
                    form = form.text("write[]", entry.clone());
                }
            }

            let mut request = self.client.request(method.clone(), url.clone()).multipart(form);
            if chunked {
                let range = format!("bytes {}-{}/{}", start, end.saturating_sub(1), total);
                request = request.header(CONTENT_RANGE, range);
                if start > 0 {
                    request = request.header(ID_HEADER, reference.file_id.as_str());
                }
            }

            debug!("{} {} bytes {}..{} of {}", method, url, start, end, total);
            check(request.send().await?).await?;

            start = end;
            if start >= total {
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl ObjectStore for AppwriteStorage {
    async fn download_file(&self, reference: &ObjectReference) -> StoreResult<Bytes> {
        let url = self.url(&[
            "storage",
            "buckets",
            &reference.bucket_id,
            "files",
            &reference.file_id,
            "download",
        ])?;
        debug!("GET {}", url);
        let response = check(self.client.get(url).send().await?).await?;
        Ok(response.bytes().await?)
    }

    async fn get_file(&self, reference: &ObjectReference) -> StoreResult<ObjectMetadata> {
        let url = self.file_url(reference)?;
        debug!("GET {}", url);
        let response = check(self.client.get(url).send().await?).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn update_file_content(
        &self,
        reference: &ObjectReference,
        content: Bytes,
    ) -> StoreResult<()> {
        let url = self.file_url(reference)?;
        self.upload(Method::PUT, url, reference, content, &reference.file_id, None)
            .await
    }

    async fn delete_file(&self, reference: &ObjectReference) -> StoreResult<()> {
        let url = self.file_url(reference)?;
        debug!("DELETE {}", url);
        check(self.client.delete(url).send().await?).await?;
        Ok(())
    }

    async fn create_file(
        &self,
        reference: &ObjectReference,
        content: Bytes,
        name: &str,
        read_permissions: &[String],
        write_permissions: &[String],
    ) -> StoreResult<()> {
        let url = self.files_url(&reference.bucket_id)?;
        self.upload(
            Method::POST,
            url,
            reference,
            content,
            name,
            Some((read_permissions, write_permissions)),
        )
        .await
    }
}

/// Builds [`AppwriteStorage`] clients from invocation settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppwriteConnector;

impl StoreConnector for AppwriteConnector {
    fn connect(&self, settings: &StoreSettings) -> StoreResult<Arc<dyn ObjectStore>> {
        Ok(Arc::new(AppwriteStorage::new(settings)?))
    }
}

fn header_value(what: &str, value: &str) -> StoreResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| StoreError::InvalidSetting(format!("{} is not a valid header value", what)))
}

/// Pass successful responses through; turn error responses into `StoreError::Api`.
async fn check(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            debug!("Failed to read {} error body: {}", status, err);
            String::new()
        }
    };
    Err(api_error(status, body))
}

fn api_error(status: StatusCode, body: String) -> StoreError {
    let parsed = serde_json::from_str::<ApiErrorBody>(&body).ok();
    let (message, code, kind) = match parsed {
        Some(err) => (err.message, err.code, err.kind),
        None => (None, None, None),
    };

    StoreError::Api {
        code: code.unwrap_or(status.as_u16()),
        kind: kind.unwrap_or_else(|| "unknown".to_string()),
        message: message.unwrap_or_else(|| status.to_string()),
        response: body,
    }
}
