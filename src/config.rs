use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Process-level settings read once at startup. Workspace-level settings
/// (setup sections) live in the workspace database instead.
#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            api_base_url: None,
            api_token: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let http_timeout = match env_non_empty("SHIKSHAN_HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .with_context(|| format!("SHIKSHAN_HTTP_TIMEOUT_SECS is not a number: {raw}"))?,
            ),
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };
        Ok(Self {
            workspace: env_non_empty("SHIKSHAN_WORKSPACE").map(PathBuf::from),
            api_base_url: env_non_empty("SHIKSHAN_API_URL"),
            api_token: env_non_empty("SHIKSHAN_API_TOKEN"),
            http_timeout,
        })
    }
}
