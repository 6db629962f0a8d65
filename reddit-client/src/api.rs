use crate::auth::RedditAuth;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header::HeaderMap, Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use subwatch_core::{CoreError, Post, PostSource, QuotaStatus, RedditApiError, RedditCredentials};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    pub url: String,
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub stickied: bool,
}

impl From<RedditPostData> for Post {
    fn from(post_data: RedditPostData) -> Self {
        Self {
            id: post_data.id,
            title: post_data.title,
            url: post_data.url,
            created_utc: post_data.created_utc as i64,
        }
    }
}

/// Reads the `x-ratelimit-remaining` / `x-ratelimit-reset` headers
/// Reddit attaches to every OAuth response. `remaining` arrives as a
/// float ("596.0"), `reset` as seconds until the window refills.
pub fn quota_from_headers(headers: &HeaderMap, now: i64) -> Option<QuotaStatus> {
    let header_f64 = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok())
    };

    let remaining = header_f64("x-ratelimit-remaining")?;
    let reset = header_f64("x-ratelimit-reset")?;

    Some(QuotaStatus {
        remaining: remaining.max(0.0) as u32,
        reset_at: now + reset.max(0.0) as i64,
    })
}

/// Reddit API client for a single subreddit's `new` listing.
#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    auth: RedditAuth,
    subreddit: String,
    user_agent: String,
    quota: Mutex<QuotaStatus>,
}

impl RedditApiClient {
    pub fn new(credentials: RedditCredentials, subreddit: String) -> Self {
        let user_agent = credentials.user_agent.clone();

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        let auth = RedditAuth::new(http_client.clone(), credentials);

        Self {
            http_client,
            auth,
            subreddit,
            user_agent,
            quota: Mutex::new(QuotaStatus::unlimited()),
        }
    }

    /// Request a token and touch the subreddit's `about` endpoint.
    /// Called once at startup; a failure here is fatal.
    pub async fn verify_access(&self) -> Result<(), CoreError> {
        let endpoint = format!("/r/{}/about", self.subreddit);
        self.make_request(&endpoint, None).await?;
        info!("Verified Reddit access to r/{}", self.subreddit);
        Ok(())
    }

    async fn make_request(
        &self,
        endpoint: &str,
        query_params: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", REDDIT_API_BASE, endpoint);
        let access_token = self.auth.access_token().await?;

        let mut request_builder = self
            .http_client
            .get(&url)
            .bearer_auth(&access_token)
            .header("User-Agent", &self.user_agent);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }

        debug!("Making Reddit API request: GET {}", endpoint);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for GET {}: {}", endpoint, e);
                if e.is_timeout() {
                    return Err(CoreError::RedditApi(RedditApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        // Quota headers come back on failures too; record them before
        // any status check bails out.
        if let Some(quota) = quota_from_headers(response.headers(), Utc::now().timestamp()) {
            *self.quota.lock().await = quota;
        }

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        match status.as_u16() {
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                warn!("Rate limited, retry after {} seconds", retry_after);
                Err(CoreError::RedditApi(RedditApiError::RateLimitExceeded {
                    retry_after,
                }))
            }
            401 => Err(CoreError::RedditApi(RedditApiError::InvalidToken)),
            403 => Err(CoreError::RedditApi(RedditApiError::Forbidden {
                resource: endpoint.to_string(),
            })),
            404 => Err(CoreError::RedditApi(RedditApiError::SubredditNotFound {
                subreddit: self.subreddit.clone(),
            })),
            code => Err(CoreError::RedditApi(RedditApiError::ServerError {
                status_code: code,
            })),
        }
    }

    /// Fetch the newest posts from the monitored subreddit.
    pub async fn fetch_new_posts(&self, limit: u32) -> Result<Vec<Post>, CoreError> {
        let endpoint = format!("/r/{}/new", self.subreddit);
        let limit_str = limit.to_string();
        let params = [("limit", limit_str.as_str())];

        let response = self.make_request(&endpoint, Some(&params)).await?;

        let listing: RedditListing<RedditPostData> = response.json().await.map_err(|e| {
            error!("Failed to parse subreddit posts: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse posts for r/{}", self.subreddit),
            })
        })?;

        let posts: Vec<Post> = listing
            .data
            .children
            .into_iter()
            .map(|child| child.data.into())
            .collect();

        info!("Retrieved {} posts from r/{}", posts.len(), self.subreddit);
        Ok(posts)
    }
}

#[async_trait]
impl PostSource for RedditApiClient {
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<Post>, CoreError> {
        self.fetch_new_posts(limit).await
    }

    async fn quota(&self) -> QuotaStatus {
        *self.quota.lock().await
    }
}
