use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use subwatch_core::{CoreError, RedditApiError, RedditCredentials};
use tokio::sync::Mutex;
use tracing::{debug, info};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

// Refresh the token a minute early rather than racing its expiry.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Script-app OAuth for Reddit: a `client_credentials` grant against
/// the token endpoint, authenticated with HTTP basic auth. The token is
/// cached and refreshed shortly before it expires.
#[derive(Debug)]
pub struct RedditAuth {
    http_client: Client,
    credentials: RedditCredentials,
    token: Mutex<Option<CachedToken>>,
}

impl RedditAuth {
    pub fn new(http_client: Client, credentials: RedditCredentials) -> Self {
        Self {
            http_client,
            credentials,
            token: Mutex::new(None),
        }
    }

    /// Return a valid access token, requesting a fresh one if the cache
    /// is empty or about to expire.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at - REFRESH_MARGIN_SECS > Utc::now().timestamp() {
                return Ok(token.access_token.clone());
            }
            debug!("Reddit access token near expiry, refreshing");
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn request_token(&self) -> Result<CachedToken, CoreError> {
        let response = self
            .http_client
            .post(TOKEN_URL)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .header("User-Agent", &self.credentials.user_agent)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(CoreError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: format!("token endpoint returned {}", status),
            }));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse token response: {}", e),
            })
        })?;

        info!(
            "Obtained Reddit access token, valid for {} seconds",
            token.expires_in
        );

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now().timestamp() + token.expires_in,
        })
    }
}
