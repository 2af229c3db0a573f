use crate::api::ContentForm;
use crate::config::{ClientConfig, KeyFromEnv, DEFAULT_BASE_URL};
use crate::core::{ApiRequest, ApiResponse, RequestBody, ResponseBody, Transport};
use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// reqwest-backed transport against a running backend.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: Client,
}

impl KeyFromEnv for HttpTransport {
    const KEY_NAME: &'static str = "STUDY_API_BASE_URL";
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Self::find_key().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()))
    }
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        debug!(base_url = %base_url, "Creating new HTTP transport");
        Self { base_url, client: Client::new() }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.base_url.clone())
    }

    fn url(&self, request: &ApiRequest) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), request.endpoint.path())
    }
}

fn build_form(form: ContentForm) -> Form {
    let mut multipart = Form::new();
    for (name, value) in form.text_fields() {
        multipart = multipart.text(name, value);
    }
    for file in form.files {
        let part = Part::bytes(file.bytes).file_name(file.file_name.clone());
        let part = match file.mime.as_deref() {
            Some(mime) => match part.mime_str(mime) {
                Ok(part) => part,
                Err(e) => {
                    warn!(file = %file.file_name, mime, error = %e, "Dropping unusable mime type");
                    continue;
                }
            },
            None => part,
        };
        multipart = multipart.part("files", part);
    }
    multipart
}

fn classify(e: reqwest::Error, request: &ApiRequest, timeout: Duration) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout { endpoint: request.endpoint.to_string(), seconds: timeout.as_secs() }
    } else if e.status().is_none() && (e.is_connect() || e.is_request()) {
        ApiError::Connectivity(e.to_string())
    } else {
        ApiError::Http {
            status: e.status().map_or(0, |s| s.as_u16()),
            message: e.to_string(),
            details: Vec::new(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(endpoint = %request.endpoint, timeout_secs = timeout.as_secs()))]
    async fn send(&self, request: ApiRequest, timeout: Duration) -> Result<ApiResponse, ApiError> {
        let builder = self
            .client
            .post(self.url(&request))
            .timeout(timeout)
            .header(ACCEPT, "application/json");

        let builder = match &request.body {
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(form) => builder.multipart(build_form(form.clone())),
        };

        let response = builder.send().await.map_err(|e| {
            error!(error = %e, "HTTP request failed");
            classify(e, &request, timeout)
        })?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map_or(false, |value| value.contains("application/json"));

        // Read text first so a broken JSON body can still be reported
        let text = response.text().await.map_err(|e| classify(e, &request, timeout))?;
        debug!(status = %status, is_json, body_len = text.len(), "Received response");

        let body = if is_json {
            let value = serde_json::from_str(&text).map_err(|e| {
                error!(status = %status, error = %e, "Failed to parse JSON response");
                ApiError::InvalidJson { status: status.as_u16() }
            })?;
            ResponseBody::Json(value)
        } else {
            ResponseBody::Text(text)
        };

        Ok(ApiResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }

    fn clone_box(&self) -> Box<dyn Transport> {
        Box::new(self.clone())
    }
}
