use reqwest::{Client, Method, StatusCode};
use serde_json::Value as JsonValue;

use crate::error::{internal_error, not_found, transport, StoreError, StoreResult};

use super::TokenProviderArc;

/// Thin JSON-over-HTTPS transport: one request, one decoded response, no
/// retries. Attaches a bearer token when the provider yields one.
#[derive(Clone)]
pub struct Connection {
    client: Client,
    token_provider: TokenProviderArc,
}

impl Connection {
    pub fn new(token_provider: TokenProviderArc) -> StoreResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|err| internal_error(err.to_string()))?;
        Ok(Self {
            client,
            token_provider,
        })
    }

    pub async fn invoke(
        &self,
        method: Method,
        url: &str,
        body: Option<&JsonValue>,
    ) -> StoreResult<JsonValue> {
        let mut request = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        if let Some(token) = self.token_provider.token().await? {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| internal_error(format!("Request failed: {err}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| internal_error(format!("Failed to read response body: {err}")))?;

        if status.is_success() {
            if text.is_empty() {
                Ok(JsonValue::Null)
            } else {
                serde_json::from_str(&text)
                    .map_err(|err| internal_error(format!("Invalid response body: {err}")))
            }
        } else {
            Err(map_http_error(status, &text))
        }
    }
}

/// Translates a non-2xx response into a typed error carrying the HTTP status
/// and, when the body parses, the server's detail message.
pub fn map_http_error(status: StatusCode, body: &str) -> StoreError {
    let message = format!(
        "Error {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("HTTP error")
    );
    let error = if status == StatusCode::NOT_FOUND {
        not_found(status.as_u16(), message)
    } else {
        transport(status.as_u16(), message)
    };
    match extract_details(body) {
        Some(details) => error.with_details(details),
        None => error,
    }
}

/// Pulls `Error <code>: <message>` out of an error body. Single-write bodies
/// carry `{error: {...}}`; batched commits answer with an array of them.
fn extract_details(body: &str) -> Option<String> {
    let parsed: JsonValue = serde_json::from_str(body).ok()?;
    let error = match &parsed {
        JsonValue::Array(entries) => entries.first()?.get("error")?,
        other => other.get("error")?,
    };
    let code = error.get("code").and_then(JsonValue::as_i64)?;
    let message = error.get("message").and_then(JsonValue::as_str)?;
    Some(format!("Error {code}: {message}"))
}
