use std::env;
use std::time::Duration;

use quiz_core::model::QuizId;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Pass threshold assumed until the metadata endpoint answers.
pub const DEFAULT_PASS_SCORE: u32 = 13;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub quiz_id: QuizId,
    pub default_pass_score: u32,
}

impl ServiceConfig {
    /// Build a config for `base_url` with default settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBaseUrl` if the URL cannot be parsed or is not http(s).
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            quiz_id: QuizId::default(),
            default_pass_score: DEFAULT_PASS_SCORE,
        })
    }

    /// Read `QUIZ_API_BASE_URL`, `QUIZ_API_TIMEOUT_SECS`, `QUIZ_ID` and `QUIZ_PASS_SCORE`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env::var("QUIZ_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let mut config = Self::new(&base_url)?;

        if let Some(raw) = non_empty_var("QUIZ_API_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "QUIZ_API_TIMEOUT_SECS",
                raw: raw.clone(),
            })?;
            config.timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(raw) = non_empty_var("QUIZ_ID") {
            config.quiz_id = QuizId::new(raw);
        }
        if let Some(raw) = non_empty_var("QUIZ_PASS_SCORE") {
            config.default_pass_score = raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "QUIZ_PASS_SCORE",
                raw: raw.clone(),
            })?;
        }
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBaseUrl` if the URL cannot be parsed or is not http(s).
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_quiz_id(mut self, quiz_id: QuizId) -> Self {
        self.quiz_id = quiz_id;
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

/// Relative endpoint paths are joined onto the base, so it must end with `/`.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let mut url = Url::parse(trimmed).map_err(|_| ConfigError::InvalidBaseUrl(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl(raw.to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
