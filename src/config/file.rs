//! TOML configuration file loading
//!
//! Supports `~/.config/geoassist/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Assistant backend endpoint
    pub backend_url: Option<String>,

    /// Path to a POI registry JSON file
    pub pois: Option<String>,

    /// Location polling and sources
    #[serde(default)]
    pub location: LocationFileConfig,

    /// Session defaults
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Backend relay (`geoassist serve`)
    #[serde(default)]
    pub relay: RelayFileConfig,
}

/// Location configuration
#[derive(Debug, Default, Deserialize)]
pub struct LocationFileConfig {
    /// Seconds between scheduled fetches
    pub poll_secs: Option<u64>,
    /// Deadline for one fix in milliseconds
    pub timeout_ms: Option<u64>,
    /// Fixed latitude (requires `longitude`)
    pub latitude: Option<f64>,
    /// Fixed longitude (requires `latitude`)
    pub longitude: Option<f64>,
    /// Geo-IP lookup URL
    pub geoip_url: Option<String>,
}

/// Session defaults
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Attach the nearby place to queries
    pub use_location_context: Option<bool>,
    /// Speak replies aloud
    pub auto_speak: Option<bool>,
    /// Seconds a notice stays visible
    pub notice_secs: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,
    /// STT model (e.g. "whisper-1", "deepgram/nova-2")
    pub stt_model: Option<String>,
    /// TTS model (e.g. "tts-1", "elevenlabs/eleven_monolingual_v1")
    pub tts_model: Option<String>,
    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,
    /// TTS speed multiplier
    pub tts_speed: Option<f64>,
    /// Seconds of audio recorded per voice input
    pub capture_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Relay server configuration
#[derive(Debug, Default, Deserialize)]
pub struct RelayFileConfig {
    /// Port to listen on
    pub port: Option<u16>,
    /// OpenAI-compatible upstream base URL
    pub upstream_url: Option<String>,
    /// Upstream model identifier
    pub model: Option<String>,
    /// Upstream API key
    pub api_key: Option<String>,
    /// Forward `top_k` to the upstream (not accepted by `OpenAI`)
    pub send_top_k: Option<bool>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    config_file_path().map_or_else(ConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from `path`
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file_from(path: &Path) -> ConfigFile {
    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/geoassist/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("geoassist").join("config.toml"))
}
