mod local;
mod remote;

pub use local::LocalBackend;
pub use remote::RemoteBackend;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// Remote when an API URL is configured, otherwise the workspace store.
    Auto,
    Local,
    Remote,
}

impl BackendMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "local" => Some(Self::Local),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendTarget {
    Local,
    Remote { base_url: String },
}

pub fn select_target(
    mode: BackendMode,
    workspace_url: Option<String>,
    config: &Config,
) -> Result<BackendTarget, String> {
    let base_url = workspace_url.or_else(|| config.api_base_url.clone());
    match (mode, base_url) {
        (BackendMode::Local, _) => Ok(BackendTarget::Local),
        (BackendMode::Remote, Some(base_url)) | (BackendMode::Auto, Some(base_url)) => {
            Ok(BackendTarget::Remote { base_url })
        }
        (BackendMode::Remote, None) => {
            Err("remote backend selected but no API base URL is configured".to_string())
        }
        (BackendMode::Auto, None) => Ok(BackendTarget::Local),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_prefers_workspace_url_over_env() {
        let config = Config {
            api_base_url: Some("https://env.example".into()),
            ..Config::default()
        };
        assert_eq!(
            select_target(BackendMode::Auto, Some("https://ws.example".into()), &config),
            Ok(BackendTarget::Remote {
                base_url: "https://ws.example".into()
            })
        );
        assert_eq!(
            select_target(BackendMode::Auto, None, &Config::default()),
            Ok(BackendTarget::Local)
        );
        assert!(select_target(BackendMode::Remote, None, &Config::default()).is_err());
        assert_eq!(
            select_target(BackendMode::Local, None, &config),
            Ok(BackendTarget::Local)
        );
    }
}
