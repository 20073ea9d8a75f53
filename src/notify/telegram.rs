//! Message delivery over the Telegram Bot API.

use crate::error::DeliveryError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Public Telegram Bot API endpoint.
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Delivers a formatted message to one recipient.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DispatchChannel: Send + Sync {
    async fn send(&self, address: &str, message: &str) -> Result<(), DeliveryError>;
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

/// Telegram bot that sends plain-text messages to chat ids.
#[derive(Debug, Clone)]
pub struct TelegramChannel {
    client: Client,
    send_url: String,
}

impl TelegramChannel {
    /// Create a channel for the public Bot API.
    pub fn new(bot_token: &str) -> Result<Self> {
        Self::with_api_url(TELEGRAM_API_URL, bot_token)
    }

    /// Create a channel against a custom Bot API server.
    pub fn with_api_url(api_url: &str, bot_token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            send_url: format!("{}/bot{}/sendMessage", api_url.trim_end_matches('/'), bot_token),
        })
    }
}

#[async_trait]
impl DispatchChannel for TelegramChannel {
    #[instrument(skip(self, message), name = "telegram_send")]
    async fn send(&self, address: &str, message: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.send_url)
            .json(&SendMessageRequest {
                chat_id: address,
                text: message,
                disable_web_page_preview: true,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Telegram message delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_send_posts_to_bot_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "123456",
                "text": "hello"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let channel = TelegramChannel::with_api_url(&server.uri(), "TEST:TOKEN").unwrap();
        channel.send("123456", "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_reports_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bot was blocked by the user"))
            .mount(&server)
            .await;

        let channel = TelegramChannel::with_api_url(&server.uri(), "T").unwrap();
        let err = channel.send("1", "hi").await.unwrap_err();

        match err {
            DeliveryError::Rejected { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("blocked"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
