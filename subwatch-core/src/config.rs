use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_FETCH_LIMIT: u32 = 10;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_EXPIRE_AFTER_SECS: u64 = 7 * 24 * 3600;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
const DEFAULT_LEDGER_PATH: &str = "subwatch-ledger.json";

/// Validated watcher configuration.
///
/// Loaded from a TOML file; the three secrets (Reddit client id and
/// secret, Discord bot token) may instead come from the environment
/// variables `REDDIT_CLIENT_ID`, `REDDIT_CLIENT_SECRET` and
/// `DISCORD_TOKEN`, which take precedence over the file.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub subreddit: String,
    pub keywords: Vec<String>,
    pub channel_id: u64,
    pub fetch_limit: u32,
    pub poll_interval: Duration,
    pub expire_after: Duration,
    pub sweep_interval: Duration,
    pub announce_startup: bool,
    pub ledger_path: PathBuf,
    pub reddit: RedditCredentials,
    pub discord: DiscordCredentials,
}

#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct DiscordCredentials {
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    subreddit: String,
    keywords: Vec<String>,
    channel_id: u64,
    fetch_limit: Option<u32>,
    poll_interval_secs: Option<u64>,
    expire_after_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    announce_startup: Option<bool>,
    ledger_path: Option<PathBuf>,
    #[serde(default)]
    reddit: RawRedditSection,
    #[serde(default)]
    discord: RawDiscordSection,
}

#[derive(Debug, Default, Deserialize)]
struct RawRedditSection {
    client_id: Option<String>,
    client_secret: Option<String>,
    user_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDiscordSection {
    token: Option<String>,
}

impl WatchConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ConfigError::ReadFailed {
                    path: path.display().to_string(),
                    source,
                }
            }
        })?;

        let raw: RawConfig = toml::from_str(&contents)?;
        Self::from_raw(raw, |var| std::env::var(var).ok())
    }

    // The environment lookup is injected so tests never depend on the
    // real process environment.
    fn from_raw(raw: RawConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self {
            subreddit: raw.subreddit,
            keywords: raw.keywords,
            channel_id: raw.channel_id,
            fetch_limit: raw.fetch_limit.unwrap_or(DEFAULT_FETCH_LIMIT),
            poll_interval: Duration::from_secs(
                raw.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            expire_after: Duration::from_secs(
                raw.expire_after_secs.unwrap_or(DEFAULT_EXPIRE_AFTER_SECS),
            ),
            sweep_interval: Duration::from_secs(
                raw.sweep_interval_secs.unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
            ),
            announce_startup: raw.announce_startup.unwrap_or(true),
            ledger_path: raw
                .ledger_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_PATH)),
            reddit: RedditCredentials {
                client_id: secret("REDDIT_CLIENT_ID", raw.reddit.client_id, &env)?,
                client_secret: secret("REDDIT_CLIENT_SECRET", raw.reddit.client_secret, &env)?,
                user_agent: raw
                    .reddit
                    .user_agent
                    .unwrap_or_else(|| format!("subwatch/{}", env!("CARGO_PKG_VERSION"))),
            },
            discord: DiscordCredentials {
                token: secret("DISCORD_TOKEN", raw.discord.token, &env)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Startup validation. Any failure here is fatal: the watcher must
    /// not enter its poll loop with a config it cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subreddit.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "subreddit".to_string(),
            });
        }
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::EmptyKeywordList);
        }
        if self.channel_id == 0 {
            return Err(ConfigError::InvalidValue {
                field: "channel_id".to_string(),
                value: "0".to_string(),
            });
        }
        if self.fetch_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch_limit".to_string(),
                value: "0".to_string(),
            });
        }
        for (field, interval) in [
            ("poll_interval_secs", self.poll_interval),
            ("expire_after_secs", self.expire_after),
            ("sweep_interval_secs", self.sweep_interval),
        ] {
            if interval.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: "0".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn secret(
    var_name: &str,
    file_value: Option<String>,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    match env(var_name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => file_value
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingEnvironmentVariable {
                var_name: var_name.to_string(),
            }),
    }
}
