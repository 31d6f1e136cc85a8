//! Webhook delivery client.
//!
//! Executes a chat webhook with `wait=true` so the endpoint answers with the
//! created message, and returns that message's id. One attempt per call:
//! failures are returned to the caller, never retried.

use reqwest::{Client, StatusCode};
use tracing::{debug, info};

use crate::error::DeliveryError;
use crate::model::embed::{WebhookMessage, WebhookPayload};

/// HTTP client bound to one webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: Client,
    url: String,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver `payload` and return the id of the created message.
    pub async fn execute(&self, payload: &WebhookPayload) -> Result<String, DeliveryError> {
        let body = serde_json::to_vec(payload).map_err(DeliveryError::Serialize)?;

        let request = self
            .http
            .post(&self.url)
            .query(&[("wait", "true")])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .build()
            .map_err(DeliveryError::BuildRequest)?;

        debug!(url = %request.url(), embeds = payload.embeds.len(), "executing webhook");

        let response = self
            .http
            .execute(request)
            .await
            .map_err(DeliveryError::Send)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DeliveryError::BadStatus {
                code: status.as_u16(),
                message: status.to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(DeliveryError::ReadBody)?;
        let message: WebhookMessage =
            serde_json::from_slice(&bytes).map_err(|source| DeliveryError::ParseBody {
                source,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            })?;

        info!(tag = "webhook_success", message_id = %message.id, "webhook execution successful");
        Ok(message.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_fails_before_sending() {
        let client = WebhookClient::new("not a url");
        let err = client.execute(&WebhookPayload::default()).await.unwrap_err();
        assert_eq!(err.tag(), "failed_create_request");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_send_failure() {
        // Reserve a free port, then close it so nothing is listening there.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = WebhookClient::new(format!("http://127.0.0.1:{port}/webhook"));
        let err = client.execute(&WebhookPayload::default()).await.unwrap_err();
        assert_eq!(err.tag(), "failed_send_request");
    }
}
