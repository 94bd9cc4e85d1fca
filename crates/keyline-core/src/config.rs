//! Configuration management for keyline.
//!
//! Loads configuration from ${KEYLINE_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default backend base URL when neither env, flag nor config provide one.
pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";

/// Environment variable that overrides the configured backend URL.
pub const API_URL_ENV: &str = "KEYLINE_API_URL";

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Merges user config values into the default template.
///
/// This ensures new comments/sections from the template are always present,
/// while preserving user's customized values.
fn merge_with_template(user_config: &str) -> Result<String> {
    use toml_edit::DocumentMut;

    let mut doc: DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;

    let user_doc: DocumentMut = user_config.parse().context("Failed to parse user config")?;

    merge_items(doc.as_table_mut(), user_doc.as_table());

    Ok(doc.to_string())
}

/// Copies every user-set item over the template's, keeping template comments for the rest.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    for (key, value) in source.iter() {
        if !value.is_none() {
            target[key] = value.clone();
        }
    }
}

pub mod paths {
    //! Path resolution for keyline configuration and session data.
    //!
    //! KEYLINE_HOME resolution order:
    //! 1. KEYLINE_HOME environment variable (if set)
    //! 2. ~/.config/keyline (default)

    use std::path::PathBuf;

    /// Returns the keyline home directory.
    pub fn keyline_home() -> PathBuf {
        if let Ok(home) = std::env::var("KEYLINE_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".keyline"),
            |h| h.join(".config").join("keyline"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        keyline_home().join("config.toml")
    }

    /// Returns the path to the persisted session file.
    pub fn session_path() -> PathBuf {
        keyline_home().join("session.json")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the authentication backend
    pub api_url: Option<String>,

    /// Timeout for each backend request in seconds (0 disables)
    pub request_timeout_secs: u32,

    /// Whether a 401 on profile refresh ends the local session
    pub clear_session_on_unauthorized: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
            clear_session_on_unauthorized: true,
        }
    }
}

impl Config {
    const DEFAULT_REQUEST_TIMEOUT_SECS: u32 = 30;

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Returns the configured API URL if set and non-empty.
    pub fn configured_api_url(&self) -> Option<&str> {
        self.api_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Resolves the backend base URL with precedence: env > config > default.
    ///
    /// # Errors
    /// Returns an error if the env or config value is not a valid URL.
    pub fn effective_api_url(&self) -> Result<String> {
        resolve_base_url(self.configured_api_url(), API_URL_ENV, DEFAULT_API_URL)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.request_timeout_secs)))
        }
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Saves only the api_url field to a specific config file path.
    ///
    /// Creates the file with default template if it doesn't exist.
    /// If file exists, merges user values into the latest template.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the file cannot be updated.
    pub fn save_api_url_to(path: &Path, api_url: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let api_url = api_url.trim();
        validate_url(api_url)?;

        let contents = if path.exists() {
            let user_config = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            merge_with_template(&user_config)?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["api_url"] = value(api_url);

        Self::write_config(path, &doc.to_string())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

/// Resolves a base URL with precedence: env > config > default.
///
/// # Errors
/// Returns an error if a non-empty env or config value is not a valid URL.
pub fn resolve_base_url(
    config_base_url: Option<&str>,
    env_var: &str,
    default_url: &str,
) -> Result<String> {
    if let Ok(env_url) = std::env::var(env_var) {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.to_string());
        }
    }

    if let Some(config_url) = config_base_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.to_string());
        }
    }

    Ok(default_url.to_string())
}

/// Validates that a URL is well-formed.
///
/// # Errors
/// Returns an error if the URL cannot be parsed.
pub fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid API base URL: {url}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.clear_session_on_unauthorized);
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "api_url = \"https://auth.example.com/api\"\n").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(
            config.configured_api_url(),
            Some("https://auth.example.com/api")
        );
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_load_invalid_toml_fails_with_path() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "api_url = [").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(format!("{err:#}").contains("config.toml"));
    }

    #[test]
    fn test_init_creates_config_with_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("subdir").join("config.toml");

        Config::init(&config_path).unwrap();

        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("# Keyline Configuration"));
        assert!(contents.contains("# api_url ="));
        assert_eq!(Config::load_from(&config_path).unwrap(), Config::default());
    }

    #[test]
    fn test_init_fails_if_exists() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "").unwrap();

        assert!(Config::init(&config_path).is_err());
    }

    #[test]
    fn test_configured_api_url_blank_is_none() {
        let config = Config {
            api_url: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.configured_api_url(), None);
    }

    #[test]
    fn test_request_timeout_zero_disables() {
        let config = Config {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.request_timeout(), None);
        assert_eq!(
            Config::default().request_timeout(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_resolve_base_url_config_then_default() {
        let env_var = "KEYLINE_TEST_UNSET_URL_VAR";
        assert_eq!(
            resolve_base_url(Some("https://cfg.example.com"), env_var, DEFAULT_API_URL).unwrap(),
            "https://cfg.example.com"
        );
        assert_eq!(
            resolve_base_url(None, env_var, DEFAULT_API_URL).unwrap(),
            DEFAULT_API_URL
        );
        assert_eq!(
            resolve_base_url(Some("  "), env_var, DEFAULT_API_URL).unwrap(),
            DEFAULT_API_URL
        );
    }

    #[test]
    fn test_resolve_base_url_rejects_malformed() {
        let env_var = "KEYLINE_TEST_UNSET_URL_VAR";
        assert!(resolve_base_url(Some("not a url"), env_var, DEFAULT_API_URL).is_err());
    }

    #[test]
    fn test_save_api_url_creates_file_with_template() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("config.toml");

        Config::save_api_url_to(&config_path, "https://auth.example.com/api").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(
            config.configured_api_url(),
            Some("https://auth.example.com/api")
        );
        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("# Keyline Configuration"));
    }

    #[test]
    fn test_save_api_url_preserves_other_fields() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(
            &config_path,
            "request_timeout_secs = 5\nclear_session_on_unauthorized = false\n",
        )
        .unwrap();

        Config::save_api_url_to(&config_path, "http://127.0.0.1:9000/api").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.configured_api_url(), Some("http://127.0.0.1:9000/api"));
        assert_eq!(config.request_timeout_secs, 5);
        assert!(!config.clear_session_on_unauthorized);
    }

    #[test]
    fn test_save_api_url_keeps_user_tables() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(
            &config_path,
            "request_timeout_secs = 5\n\n[profiles.work]\napi_url = \"https://work.example.com/api\"\n",
        )
        .unwrap();

        Config::save_api_url_to(&config_path, "https://auth.example.com/api").unwrap();

        let doc: toml_edit::DocumentMut = fs::read_to_string(&config_path)
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(
            doc["profiles"]["work"]["api_url"].as_str(),
            Some("https://work.example.com/api")
        );
        assert_eq!(doc["api_url"].as_str(), Some("https://auth.example.com/api"));
        assert_eq!(doc["request_timeout_secs"].as_integer(), Some(5));
    }

    #[test]
    fn test_save_api_url_rejects_malformed_without_writing() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        assert!(Config::save_api_url_to(&config_path, "localhost 8080").is_err());
        assert!(!config_path.exists());
    }
}
