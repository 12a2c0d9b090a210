//! Runtime configuration: the API key and translation service settings.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::error::CoreError;

pub const API_KEY_VAR: &str = "API_KEY";

pub const DEFAULT_ENDPOINT: &str = "https://aiplatform.googleapis.com";
pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_TEMPERATURE: f32 = 0.05;

/// Secret used to authenticate against the translation service.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl FnOnce(&str) -> Option<String>) -> Result<Self, CoreError> {
        match lookup(API_KEY_VAR) {
            Some(value) if !value.trim().is_empty() => Ok(Self(value)),
            _ => Err(CoreError::MissingApiKey),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Loads `.env` from the working directory or one of its ancestors.
///
/// Returns the path that was loaded, or `None` when no file exists.
pub fn load_dotenv() -> Result<Option<PathBuf>, CoreError> {
    match dotenvy::dotenv() {
        Ok(path) => {
            debug!(path = %path.display(), "loaded .env");
            Ok(Some(path))
        }
        Err(err) if err.not_found() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslatorConfig {
    pub endpoint: String,
    pub api_version: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Option<Duration>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            api_version: DEFAULT_API_VERSION.into(),
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: None,
        }
    }
}

impl TranslatorConfig {
    pub fn stream_url(&self) -> String {
        format!(
            "{}/{}/publishers/google/models/{}:streamGenerateContent",
            self.endpoint.trim_end_matches('/'),
            self.api_version,
            self.model
        )
    }
}
