//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.copilot-chat/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::core::route::Route;
use crate::inference::providers::gemini;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub copilot: CopilotConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub start_route: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CopilotConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UiConfig {
    pub toast_ttl_secs: Option<u64>,
    pub suggestion_delay_ms: Option<u64>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TOAST_TTL_SECS: u64 = 4;
pub const DEFAULT_SUGGESTION_DELAY_MS: u64 = 1000;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub start_route: Route,
    pub backend_url: String,
    pub anon_key: String,
    /// `None` means the public Gemini endpoint.
    pub copilot_base_url: Option<String>,
    pub copilot_api_key: Option<String>,
    pub copilot_model: String,
    pub request_timeout: Duration,
    pub toast_ttl: Duration,
    pub suggestion_delay: Duration,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// A required setting has no value at any level.
    #[error("missing setting: {0}")]
    Missing(&'static str),
}

// ============================================================================
// Loading
// ============================================================================

/// `~/.copilot-chat`, home of the config and the stored session.
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".copilot-chat"))
}

/// Returns the path to `~/.copilot-chat/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    data_dir().map(|d| d.join("config.toml"))
}

/// Load config from `~/.copilot-chat/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `ChatConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<ChatConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(ChatConfig::default());
        }
    };
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<ChatConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(ChatConfig::default());
    }

    let contents = fs::read_to_string(path)?;
    let config: ChatConfig = toml::from_str(&contents)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# Copilot Chat Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# start_route = "/chat"               # "/", "/login", "/register", "/chat", "/profile"

# [backend]
# url = "https://<project>.supabase.co"   # Or set SUPABASE_URL
# anon_key = "eyJ..."                      # Or set SUPABASE_ANON_KEY

# [copilot]
# api_key = "AIza..."                 # Or set GEMINI_API_KEY
# base_url = "https://proxy.example.com/v1beta"   # Or GEMINI_BASE_URL; a proxy may inject the key
# model = "gemini-1.5-flash"          # Or set GEMINI_MODEL
# request_timeout_secs = 30

# [ui]
# toast_ttl_secs = 4
# suggestion_delay_ms = 1000
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(
    config: &ChatConfig,
    cli_route: Option<&str>,
) -> Result<ResolvedConfig, ConfigError> {
    resolve_with(config, cli_route, |key| std::env::var(key).ok())
}

/// `resolve` with an injectable environment lookup.
pub fn resolve_with(
    config: &ChatConfig,
    cli_route: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig, ConfigError> {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    // Start route: CLI → config → landing page
    let start_route = cli_route
        .map(str::to_string)
        .or_else(|| config.general.start_route.clone())
        .map(|path| Route::parse(&path))
        .unwrap_or(Route::Landing);

    // Backend: env → config, both required
    let backend_url = non_empty(env("SUPABASE_URL"))
        .or_else(|| config.backend.url.clone())
        .ok_or(ConfigError::Missing("backend url (SUPABASE_URL)"))?;
    let anon_key = non_empty(env("SUPABASE_ANON_KEY"))
        .or_else(|| config.backend.anon_key.clone())
        .ok_or(ConfigError::Missing("backend anon key (SUPABASE_ANON_KEY)"))?;

    // Copilot: env → config → default
    let copilot_api_key =
        non_empty(env("GEMINI_API_KEY")).or_else(|| non_empty(config.copilot.api_key.clone()));
    let copilot_base_url =
        non_empty(env("GEMINI_BASE_URL")).or_else(|| config.copilot.base_url.clone());
    let copilot_model = non_empty(env("GEMINI_MODEL"))
        .or_else(|| config.copilot.model.clone())
        .unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string());

    Ok(ResolvedConfig {
        start_route,
        backend_url,
        anon_key,
        copilot_base_url,
        copilot_api_key,
        copilot_model,
        request_timeout: Duration::from_secs(
            config
                .copilot
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        ),
        toast_ttl: Duration::from_secs(config.ui.toast_ttl_secs.unwrap_or(DEFAULT_TOAST_TTL_SECS)),
        suggestion_delay: Duration::from_millis(
            config
                .ui
                .suggestion_delay_ms
                .unwrap_or(DEFAULT_SUGGESTION_DELAY_MS),
        ),
    })
}
