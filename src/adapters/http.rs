//! reqwest-backed transport.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, RETRY_AFTER};
use reqwest::multipart::{Form, Part};

use super::{EgressReply, EgressRequest, HttpTransport, Method, TransportError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Production transport over a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

fn build_form(body: super::MultipartBody) -> Result<Form, TransportError> {
    let mut form = Form::new();
    if let Some(payload_json) = body.payload_json {
        form = form.text("payload_json", payload_json);
    }
    for file in body.files {
        let part = Part::bytes(file.bytes)
            .file_name(file.filename)
            .mime_str(&file.content_type)
            .map_err(|e| TransportError::Other(e.to_string()))?;
        form = form.part(file.field, part);
    }
    Ok(form)
}

/// Pull a retry-after delay from the header or, for rate-limit replies,
/// from the JSON body's `retry_after` field.
fn retry_after_from(status: u16, headers: &reqwest::header::HeaderMap, body: &str) -> Option<f64> {
    if let Some(value) = headers.get(RETRY_AFTER) {
        if let Ok(secs) = value.to_str().unwrap_or("").parse::<f64>() {
            return Some(secs);
        }
    }
    if status == 429 {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
            return json.get("retry_after").and_then(|v| v.as_f64());
        }
    }
    None
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: EgressRequest) -> Result<EgressReply, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
        };

        if let Some(token) = &request.auth_token {
            builder = builder.header(AUTHORIZATION, format!("token {token}"));
        }
        if let Some(accept) = request.accept {
            builder = builder.header(ACCEPT, accept);
        }
        if let Some(json) = &request.json {
            builder = builder.json(json);
        }
        if let Some(multipart) = request.multipart {
            builder = builder.multipart(build_form(multipart)?);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(map_reqwest_error)?;
        let retry_after = retry_after_from(status, &headers, &body);

        Ok(EgressReply {
            status,
            retry_after,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_prefers_header() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(RETRY_AFTER, "5".parse().unwrap());
        let body = r#"{"retry_after": 2.5}"#;
        assert_eq!(retry_after_from(429, &headers, body), Some(5.0));
    }

    #[test]
    fn retry_after_falls_back_to_body_on_429() {
        let headers = reqwest::header::HeaderMap::new();
        let body = r#"{"retry_after": 2.5}"#;
        assert_eq!(retry_after_from(429, &headers, body), Some(2.5));
        assert_eq!(retry_after_from(500, &headers, body), None);
    }
}
