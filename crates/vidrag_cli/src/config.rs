//! CLI configuration: TOML file, then environment, then flags.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use vidrag_client::ClientConfig;
use vidrag_core::SessionConfig;

/// Everything the CLI needs to reach the backend and drive a session.
///
/// ```toml
/// [api]
/// base_url = "http://localhost:8000"
/// request_timeout_ms = 30000
///
/// [session]
/// poll_interval_ms = 2000
/// max_poll_secs = 1800
/// ask_policy = "exclusive"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ClientConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Resolve the configuration for one invocation.
    pub fn load(path: Option<&Path>, api_url: Option<&str>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.merge_env()?.with_api_url(api_url)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn merge_env(self) -> Result<Self> {
        Ok(Self {
            api: self.api.merge_env(),
            session: self.session.merge_env().context("Invalid session config")?,
        })
    }

    fn with_api_url(mut self, api_url: Option<&str>) -> Result<Self> {
        if let Some(url) = api_url {
            self.api.base_url = url.to_string();
        }
        self.session.validate().context("Invalid session config")?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use tempfile::NamedTempFile;
    use vidrag_core::AskPolicy;

    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.session.poll_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_from_file_with_partial_sections() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[api]\nbase_url = \"http://rag.internal:9000\"\n\n[session]\nask_policy = \"pipelined\""
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();

        assert_eq!(config.api.base_url, "http://rag.internal:9000");
        assert_eq!(config.session.ask_policy, AskPolicy::Pipelined);
        assert_eq!(config.session.poll_interval_ms, 2000);
    }

    #[test]
    fn test_flag_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nbase_url = \"http://from-file:8000\"").unwrap();

        let config = AppConfig::from_file(file.path())
            .unwrap()
            .with_api_url(Some("http://from-flag:8000"))
            .unwrap();

        assert_eq!(config.api.base_url, "http://from-flag:8000");
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[session]\npoll_interval_ms = \"soon\"").unwrap();

        let err = AppConfig::from_file(file.path()).unwrap_err();

        assert!(err.to_string().contains("Invalid config file"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = AppConfig::default();
        config.session.poll_interval_ms = 0;

        assert!(config.with_api_url(None).is_err());
    }
}
