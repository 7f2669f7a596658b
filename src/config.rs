//! Configuration management
//!
//! Server, database, provider, quiz and auth settings, stored as TOML in
//! the platform config directory. The provider API key is never written
//! to disk; it is read from the environment variable named in
//! `provider.api_key_env`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::generation::ProviderConfig;
use crate::quiz::{QuizSettings, RECENT_WINDOW, WEAK_THRESHOLD};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub quiz: QuizConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; defaults to `<data dir>/smart-quiz.db`
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used for every generation
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4-turbo".to_string()
}

fn default_api_key_env() -> String {
    "SMART_QUIZ_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizConfig {
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,
    #[serde(default = "default_weak_threshold")]
    pub weak_threshold: f64,
    #[serde(default = "default_weak_quiz_questions")]
    pub weak_quiz_questions: usize,
    #[serde(default = "default_question_max_tokens")]
    pub question_max_tokens: u32,
    #[serde(default = "default_quiz_max_tokens")]
    pub quiz_max_tokens: u32,
    #[serde(default = "default_explanation_max_tokens")]
    pub explanation_max_tokens: u32,
    #[serde(default = "default_path_max_tokens")]
    pub path_max_tokens: u32,
}

fn default_recent_window() -> usize {
    RECENT_WINDOW
}

fn default_weak_threshold() -> f64 {
    WEAK_THRESHOLD
}

fn default_weak_quiz_questions() -> usize {
    3
}

fn default_question_max_tokens() -> u32 {
    100
}

fn default_quiz_max_tokens() -> u32 {
    500
}

fn default_explanation_max_tokens() -> u32 {
    150
}

fn default_path_max_tokens() -> u32 {
    100
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            recent_window: default_recent_window(),
            weak_threshold: default_weak_threshold(),
            weak_quiz_questions: default_weak_quiz_questions(),
            question_max_tokens: default_question_max_tokens(),
            quiz_max_tokens: default_quiz_max_tokens(),
            explanation_max_tokens: default_explanation_max_tokens(),
            path_max_tokens: default_path_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// JWT secret key (generated on first use if not set)
    pub jwt_secret: Option<String>,
    /// Access token expiration (minutes)
    #[serde(default = "default_token_expiry")]
    pub access_token_expiry_minutes: i64,
    /// Refresh token expiration (days)
    #[serde(default = "default_refresh_expiry")]
    pub refresh_token_expiry_days: i64,
}

fn default_token_expiry() -> i64 {
    60
}

fn default_refresh_expiry() -> i64 {
    7
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            access_token_expiry_minutes: default_token_expiry(),
            refresh_token_expiry_days: default_refresh_expiry(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, writing defaults
    /// (with a fresh JWT secret) if absent
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let mut config = Config::default();
            config.ensure_jwt_secret();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Reject values the quiz flows cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.quiz.recent_window == 0 {
            anyhow::bail!("quiz.recent_window must be at least 1");
        }
        if self.quiz.weak_quiz_questions == 0 {
            anyhow::bail!("quiz.weak_quiz_questions must be at least 1");
        }
        if !(0.0..=100.0).contains(&self.quiz.weak_threshold) {
            anyhow::bail!("quiz.weak_threshold must be within 0..=100");
        }
        if self.provider.timeout_secs == 0 {
            anyhow::bail!("provider.timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Settings for the quiz service
    pub fn quiz_settings(&self) -> QuizSettings {
        QuizSettings {
            recent_window: self.quiz.recent_window,
            weak_threshold: self.quiz.weak_threshold,
            weak_quiz_questions: self.quiz.weak_quiz_questions,
            question_max_tokens: self.quiz.question_max_tokens,
            quiz_max_tokens: self.quiz.quiz_max_tokens,
            explanation_max_tokens: self.quiz.explanation_max_tokens,
            path_max_tokens: self.quiz.path_max_tokens,
            generation_timeout: Duration::from_secs(self.provider.timeout_secs),
        }
    }

    /// Provider configuration with the API key taken from the environment
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        let api_key = std::env::var(&self.provider.api_key_env).with_context(|| {
            format!(
                "Provider API key not found; set the {} environment variable",
                self.provider.api_key_env
            )
        })?;

        Ok(ProviderConfig::with_url(
            self.provider.base_url.clone(),
            api_key,
            self.provider.model.clone(),
        )
        .timeout(Duration::from_secs(self.provider.timeout_secs)))
    }

    /// SQLite database location
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("smart-quiz.db")),
        }
    }

    /// Return the JWT secret, generating one in memory if not set
    pub fn ensure_jwt_secret(&mut self) -> String {
        if let Some(secret) = &self.auth.jwt_secret {
            return secret.clone();
        }

        let secret = crate::server::auth::generate_jwt_secret();
        self.auth.jwt_secret = Some(secret.clone());
        secret
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "smart-quiz", "smart-quiz")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "smart-quiz", "smart-quiz")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}

/// Print the effective configuration
pub fn show_config(config: &Config) {
    println!("Server:    {}:{}", config.server.host, config.server.port);
    match config.database_path() {
        Ok(path) => println!("Database:  {}", path.display()),
        Err(e) => println!("Database:  unavailable ({})", e),
    }
    println!("Provider:  {} ({})", config.provider.base_url, config.provider.model);
    println!(
        "API key:   ${} {}",
        config.provider.api_key_env,
        if std::env::var(&config.provider.api_key_env).is_ok() { "(set)" } else { "(not set)" }
    );
    println!("Timeout:   {}s", config.provider.timeout_secs);
    println!(
        "Quiz:      window {}, weak below {}, {} questions per weak-topic quiz",
        config.quiz.recent_window, config.quiz.weak_threshold, config.quiz.weak_quiz_questions
    );
    println!(
        "Auth:      JWT secret {}",
        if config.auth.jwt_secret.is_some() { "configured" } else { "generated per run" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        let settings = config.quiz_settings();
        assert_eq!(settings.recent_window, 5);
        assert_eq!(settings.weak_threshold, 50.0);
        assert_eq!(settings.weak_quiz_questions, 3);
        assert_eq!(settings.question_max_tokens, 100);
        assert_eq!(settings.quiz_max_tokens, 500);
        assert_eq!(settings.generation_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9090\n\n[provider]\nmodel = \"gpt-4o-mini\"\ntimeout_secs = 5\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.api_key_env, "SMART_QUIZ_API_KEY");
        assert_eq!(config.quiz_settings().generation_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = Config::default();
        config.quiz.weak_threshold = 60.0;
        config.database.path = Some(PathBuf::from("/tmp/quiz.db"));
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.quiz.weak_threshold, 60.0);
        assert_eq!(loaded.database_path().unwrap(), PathBuf::from("/tmp/quiz.db"));
    }

    #[test]
    fn test_rejects_zero_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[quiz]\nrecent_window = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_missing_api_key_env() {
        let mut config = Config::default();
        config.provider.api_key_env = "SMART_QUIZ_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        assert!(config.provider_config().is_err());
    }

    #[test]
    fn test_ensure_jwt_secret_is_stable() {
        let mut config = Config::default();
        let first = config.ensure_jwt_secret();
        assert_eq!(config.ensure_jwt_secret(), first);
    }

    #[test]
    fn test_default_toml_parses() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.server.port, 8080);
    }
}
