//! Router configuration loader.
//!
//! Reads `switchboard.toml` and deserializes it into [`SwitchboardConfig`].
//! A router cannot run on guessed providers, so unlike optional settings a
//! missing or malformed file is an error rather than a silent default.

use std::path::{Path, PathBuf};

use switchboard_types::config::SwitchboardConfig;
use switchboard_types::error::ConfigError;

/// File name looked up inside the data directory.
pub const CONFIG_FILE_NAME: &str = "switchboard.toml";

/// Resolve the data directory.
///
/// `SWITCHBOARD_DATA_DIR` wins, then `~/.switchboard`, then `./.switchboard`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SWITCHBOARD_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".switchboard");
    }

    PathBuf::from(".switchboard")
}

/// `{data_dir}/switchboard.toml`.
pub fn default_config_path() -> PathBuf {
    resolve_data_dir().join(CONFIG_FILE_NAME)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<SwitchboardConfig, ConfigError> {
    let config: SwitchboardConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Load and validate the config file at `path`.
pub async fn load_config(path: &Path) -> Result<SwitchboardConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Read(format!("{}: {e}", path.display())))?;

    let config = parse_config(&content)?;
    tracing::debug!(
        path = %path.display(),
        providers = config.providers.len(),
        strategy = %config.router.strategy,
        "Loaded router config"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_types::config::SelectionStrategy;
    use switchboard_types::provider::TaskType;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[router]
max_retries_per_provider = 3
cool_down_secs = 120
strategy = "round_robin"

[[providers]]
id = "groq"
tier = 0
rpm_limit = 30
tpm_limit = 6000
buffer_percent = 80
task_affinities = ["chat", "code"]
model = "llama-3.3-70b"
endpoint = "https://api.groq.com/openai/v1"
auth_ref = "GROQ_API_KEY"

[[providers]]
id = "gemini"
tier = 1
rpm_limit = 15
tpm_limit = 1000000
model = "gemini-2.0-flash"
endpoint = "https://generativelanguage.googleapis.com"
"#;

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, SAMPLE).await.unwrap();

        let config = load_config(&path).await.unwrap();
        assert_eq!(config.router.max_retries_per_provider, 3);
        assert_eq!(config.router.cool_down_secs, 120);
        assert_eq!(config.router.strategy, SelectionStrategy::RoundRobin);
        // Unset router fields keep their defaults.
        assert_eq!(config.router.backoff_base_ms, 250);

        assert_eq!(config.providers.len(), 2);
        let groq = &config.providers[0];
        assert_eq!(groq.effective_rpm(), 24);
        assert!(groq.has_affinity(TaskType::Code));
        assert_eq!(groq.auth_ref.as_deref(), Some("GROQ_API_KEY"));

        let gemini = &config.providers[1];
        assert_eq!(gemini.buffer_percent, 80);
        assert!(gemini.task_affinities.is_empty());
    }

    #[tokio::test]
    async fn load_config_missing_file_is_read_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_config(&tmp.path().join("absent.toml")).await.unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }

    #[tokio::test]
    async fn load_config_invalid_toml_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let err = load_config(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn parse_config_rejects_semantic_errors() {
        let duplicate = r#"
[[providers]]
id = "a"
rpm_limit = 1
tpm_limit = 1
model = "m"
endpoint = "e"

[[providers]]
id = "a"
rpm_limit = 1
tpm_limit = 1
model = "m"
endpoint = "e"
"#;
        assert_eq!(
            parse_config(duplicate).unwrap_err(),
            ConfigError::DuplicateProvider("a".to_string())
        );

        let bad_router = "[router]\nbackoff_base_ms = 500\nbackoff_max_ms = 100\n";
        assert!(matches!(
            parse_config(bad_router).unwrap_err(),
            ConfigError::InvalidSetting(_)
        ));
    }

    #[test]
    fn parse_config_unknown_strategy_is_parse_error() {
        let err = parse_config("[router]\nstrategy = \"fastest\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn default_config_path_ends_with_file_name() {
        assert!(default_config_path().ends_with(CONFIG_FILE_NAME));
    }
}
