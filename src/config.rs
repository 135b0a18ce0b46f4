/// Runtime configuration
///
/// Everything comes from the process environment and is resolved once at
/// startup, before the UI is built. A missing API key is a configuration
/// error that replaces the whole UI with remediation instructions.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Preferred variable holding the API key
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
/// Fallback variable holding the API key
pub const API_KEY_FALLBACK_VAR: &str = "API_KEY";

const API_BASE_VAR: &str = "CHARACTER_STUDIO_API_BASE";
const IMAGE_MODEL_VAR: &str = "CHARACTER_STUDIO_IMAGE_MODEL";
const VIDEO_MODEL_VAR: &str = "CHARACTER_STUDIO_VIDEO_MODEL";
const VIDEO_POLL_VAR: &str = "CHARACTER_STUDIO_VIDEO_POLL_SECS";

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
const DEFAULT_VIDEO_MODEL: &str = "veo-2.0-generate-001";
const DEFAULT_VIDEO_POLL_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no API key found: set GEMINI_API_KEY (or API_KEY) in the environment")]
    MissingApiKey,

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("could not determine a cache directory for generated videos")]
    NoCacheDir,

    #[error("could not initialize the HTTP client: {0}")]
    HttpClient(String),
}

impl ConfigError {
    /// Remediation text shown on the configuration error screen
    pub fn remediation(&self) -> String {
        match self {
            ConfigError::MissingApiKey => format!(
                "Export your key before launching, e.g.\n\n    export {API_KEY_VAR}=<your key>\n\nthen restart Character Studio."
            ),
            ConfigError::Invalid { var, .. } => {
                format!("Fix or unset {var} and restart Character Studio.")
            }
            ConfigError::NoCacheDir => {
                "Set HOME (or XDG_CACHE_HOME) so a cache directory can be created.".to_string()
            }
            ConfigError::HttpClient(_) => {
                "Check the system TLS setup and restart Character Studio.".to_string()
            }
        }
    }
}

/// Resolved application configuration
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_key: String,
    pub api_base: String,
    pub image_model: String,
    pub video_model: String,
    pub video_poll_interval: Duration,
    /// Where generated videos are written while the session holds them
    pub video_dir: PathBuf,
}

impl AppConfig {
    /// Resolve configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let cache = dirs::cache_dir()
            .or_else(dirs::home_dir)
            .ok_or(ConfigError::NoCacheDir)?;
        Self::from_lookup(|var| std::env::var(var).ok(), cache)
    }

    /// Resolve configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F, cache_root: PathBuf) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        let api_key = non_empty(API_KEY_VAR)
            .or_else(|| non_empty(API_KEY_FALLBACK_VAR))
            .ok_or(ConfigError::MissingApiKey)?;

        let video_poll_secs = match non_empty(VIDEO_POLL_VAR) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: VIDEO_POLL_VAR,
                        reason: format!("expected a positive number of seconds, got {raw:?}"),
                    })
                }
            },
            None => DEFAULT_VIDEO_POLL_SECS,
        };

        let mut video_dir = cache_root;
        video_dir.push("character-studio");
        video_dir.push("videos");

        Ok(Self {
            api_key: api_key.trim().to_string(),
            api_base: non_empty(API_BASE_VAR)
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            image_model: non_empty(IMAGE_MODEL_VAR)
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            video_model: non_empty(VIDEO_MODEL_VAR)
                .unwrap_or_else(|| DEFAULT_VIDEO_MODEL.to_string()),
            video_poll_interval: Duration::from_secs(video_poll_secs),
            video_dir,
        })
    }
}

// Keep the key out of logs
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_base", &self.api_base)
            .field("image_model", &self.image_model)
            .field("video_model", &self.video_model)
            .field("video_poll_interval", &self.video_poll_interval)
            .field("video_dir", &self.video_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|var| vars.get(var).cloned(), PathBuf::from("/tmp/cache"))
    }

    #[test]
    fn test_missing_key_is_an_error() {
        assert_eq!(resolve(&[]), Err(ConfigError::MissingApiKey));
        assert_eq!(resolve(&[(API_KEY_VAR, "  ")]), Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn test_defaults() {
        let config = resolve(&[(API_KEY_VAR, "secret")]).unwrap();
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.video_model, DEFAULT_VIDEO_MODEL);
        assert_eq!(config.video_poll_interval, Duration::from_secs(10));
        assert_eq!(
            config.video_dir,
            PathBuf::from("/tmp/cache/character-studio/videos")
        );
    }

    #[test]
    fn test_fallback_key_and_overrides() {
        let config = resolve(&[
            (API_KEY_FALLBACK_VAR, "fallback"),
            (API_BASE_VAR, "http://localhost:8080/v1/"),
            (VIDEO_POLL_VAR, "3"),
        ])
        .unwrap();
        assert_eq!(config.api_key, "fallback");
        assert_eq!(config.api_base, "http://localhost:8080/v1");
        assert_eq!(config.video_poll_interval, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_poll_interval() {
        let err = resolve(&[(API_KEY_VAR, "k"), (VIDEO_POLL_VAR, "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: VIDEO_POLL_VAR, .. }));
    }

    #[test]
    fn test_debug_hides_key() {
        let config = resolve(&[(API_KEY_VAR, "super-secret")]).unwrap();
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
