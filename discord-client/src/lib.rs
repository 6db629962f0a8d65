use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use subwatch_core::{CoreError, DiscordApiError, DiscordCredentials, NotificationSink};
use tracing::{debug, error, info};

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

/// REST-only Discord client: posts messages to one channel with a bot
/// token. No gateway connection is held; sending is the only concern.
#[derive(Debug)]
pub struct DiscordApiClient {
    http_client: Client,
    token: String,
    channel_id: u64,
}

impl DiscordApiClient {
    pub fn new(credentials: DiscordCredentials, channel_id: u64) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            token: credentials.token,
            channel_id,
        }
    }

    pub async fn send_message(&self, text: &str) -> Result<(), CoreError> {
        let url = format!(
            "{}/channels/{}/messages",
            DISCORD_API_BASE, self.channel_id
        );

        debug!("Sending Discord message to channel {}", self.channel_id);
        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&CreateMessage { content: text })
            .send()
            .await
            .map_err(|e| {
                error!("Network error sending Discord message: {}", e);
                if e.is_timeout() {
                    CoreError::DiscordApi(DiscordApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!("Discord message delivered to channel {}", self.channel_id);
            return Ok(());
        }

        error!(
            "Discord send failed with status {} for channel {}",
            status, self.channel_id
        );
        match status.as_u16() {
            401 => Err(CoreError::DiscordApi(DiscordApiError::InvalidToken)),
            403 => Err(CoreError::DiscordApi(DiscordApiError::Forbidden {
                channel_id: self.channel_id,
            })),
            404 => Err(CoreError::DiscordApi(DiscordApiError::ChannelNotFound {
                channel_id: self.channel_id,
            })),
            429 => {
                let retry_after_ms = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<f64>().ok())
                    .map(|secs| (secs * 1000.0) as u64)
                    .unwrap_or(1000);
                Err(CoreError::DiscordApi(DiscordApiError::RateLimited {
                    retry_after_ms,
                }))
            }
            code if status.is_server_error() => {
                Err(CoreError::DiscordApi(DiscordApiError::ServerError {
                    status_code: code,
                }))
            }
            code => Err(CoreError::DiscordApi(DiscordApiError::InvalidResponse {
                details: format!("unexpected status {}", code),
            })),
        }
    }

    /// Optional startup announcement. Failure is logged by the caller
    /// and never aborts startup.
    pub async fn announce(&self, text: &str) -> Result<(), CoreError> {
        info!("Sending startup announcement to channel {}", self.channel_id);
        self.send_message(text).await
    }
}

#[async_trait]
impl NotificationSink for DiscordApiClient {
    async fn send(&self, text: &str) -> Result<(), CoreError> {
        self.send_message(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = DiscordApiClient::new(
            DiscordCredentials {
                token: "bot-token".to_string(),
            },
            42,
        );
        assert_eq!(client.channel_id, 42);
        assert_eq!(client.token, "bot-token");
    }

    #[test]
    fn test_create_message_body() {
        let body = serde_json::to_string(&CreateMessage {
            content: "New post found: [H] Selling widget\nhttps://example.com",
        })
        .unwrap();
        assert!(body.contains("\"content\""));
        assert!(body.contains("Selling widget"));
    }
}
