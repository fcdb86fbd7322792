//! Runtime settings gathered from the environment.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default tmcloud API base URL
pub const DEFAULT_API_URL: &str = "https://api.tmcloud.dev";

/// Base URL override
pub const ENV_API_URL: &str = "TMCLOUD_API_URL";

/// Default organization override
pub const ENV_ORG: &str = "TMCLOUD_ORG";

/// Config directory override
pub const ENV_CONFIG_DIR: &str = "TMCLOUD_CONFIG_DIR";

/// Application directory name under the per-user config directory
const APP_DIR: &str = "tmcloud";

/// Token store fallback filename
const TOKEN_FILENAME: &str = "tokens.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub org_override: Option<String>,
    pub config_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            org_override: None,
            config_dir: dirs::config_dir().map(|dir| dir.join(APP_DIR)),
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// This is the only place the library looks at environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            api_url: non_empty(ENV_API_URL)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            org_override: non_empty(ENV_ORG),
            config_dir: non_empty(ENV_CONFIG_DIR)
                .map(PathBuf::from)
                .or(defaults.config_dir),
        }
    }

    /// Path of the token store fallback file, if a config directory is known.
    pub fn token_file(&self) -> Option<PathBuf> {
        self.config_dir.as_ref().map(|dir| dir.join(TOKEN_FILENAME))
    }
}

/// Load `.env` and install the tracing subscriber.
///
/// Logs go to stderr so command output on stdout stays clean.
pub fn init_runtime() {
    // Load .env file from the working directory if present
    let _ = dotenvy::dotenv();

    // Default: warn for most crates, info for ours
    // Use RUST_LOG=debug for per-request logs
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,tmcloud=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
