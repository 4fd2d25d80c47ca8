use std::time::Duration;

use anyhow::{anyhow, Context};
use reqwest::{Method, StatusCode};
use serde_json::Value;

/// Thin HTTP client for the School API envelope format
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            http: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<Value> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Option<Value>) -> anyhow::Result<Value> {
        self.send(Method::POST, path, body).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> anyhow::Result<Value> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    /// Send a request and unwrap the `data` member of a success envelope
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> anyhow::Result<Value> {
        let url = self.url(path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .timeout(Duration::from_secs(30));

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        tracing::debug!("{} {}", method, url);
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;
        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);

        extract_data(status, payload)
    }
}

fn extract_data(status: StatusCode, payload: Value) -> anyhow::Result<Value> {
    if status.is_success() && payload.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(payload.get("data").cloned().unwrap_or(Value::Null));
    }

    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("request failed");
    let code = payload.get("code").and_then(Value::as_str).unwrap_or("UNKNOWN");
    Err(anyhow!("{} ({}, HTTP {})", message, code, status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_success_envelope() {
        let data = extract_data(StatusCode::OK, json!({"success": true, "data": {"studentsAdvanced": 3}})).unwrap();
        assert_eq!(data["studentsAdvanced"], 3);
    }

    #[test]
    fn reports_error_body() {
        let err = extract_data(
            StatusCode::FORBIDDEN,
            json!({"error": true, "message": "ADMIN role required", "code": "FORBIDDEN"}),
        )
        .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("ADMIN role required"));
        assert!(text.contains("403"));
    }

    #[test]
    fn trims_trailing_slash() {
        let client = ApiClient::new("http://localhost:3000/", None);
        assert_eq!(client.url("/health"), "http://localhost:3000/health");
    }
}
