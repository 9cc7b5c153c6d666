//! Configuration management for the geo assistant
//!
//! Every setting resolves as env > toml > default. Resolution is a pure
//! function of the parsed file and an environment lookup, see
//! [`Config::resolve`].

pub mod file;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::assistant::DEFAULT_BACKEND_URL;
use crate::geo::Coordinate;
use crate::location::{
    DEFAULT_LOCATION_TIMEOUT, DEFAULT_POLL_INTERVAL, FixedLocationSource, GeoIpLocationSource,
    LocationSource, UnsupportedLocationSource,
};
use crate::notice::DEFAULT_NOTICE_TTL;
use crate::session::SessionPreferences;
use crate::{Error, Result};

pub use file::ConfigFile;

/// Geo assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Assistant backend endpoint the session posts to
    pub backend_url: String,

    /// POI registry file; the embedded registry is used when unset
    pub pois_path: Option<PathBuf>,

    /// Time between scheduled location fetches
    pub poll_interval: Duration,

    /// Deadline for one position fix
    pub location_timeout: Duration,

    /// How long a notice stays visible
    pub notice_ttl: Duration,

    /// Initial session toggles
    pub preferences: SessionPreferences,

    /// Where position fixes come from
    pub location: LocationSourceConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Backend relay configuration
    pub relay: RelayConfig,
}

/// Position source selection
#[derive(Debug, Clone, PartialEq)]
pub enum LocationSourceConfig {
    /// Always report the same position
    Fixed(Coordinate),
    /// Look the position up over HTTP
    GeoIp(String),
    /// No source configured; every fetch fails as unsupported
    None,
}

impl LocationSourceConfig {
    /// Build the configured source
    #[must_use]
    pub fn build(&self) -> Arc<dyn LocationSource> {
        match self {
            Self::Fixed(coordinate) => Arc::new(FixedLocationSource::new(*coordinate)),
            Self::GeoIp(url) => Arc::new(GeoIpLocationSource::new(url.clone())),
            Self::None => Arc::new(UnsupportedLocationSource),
        }
    }
}

/// Voice configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Whether voice input/output is enabled
    pub enabled: bool,
    /// STT model (e.g. "whisper-1", "deepgram/nova-2")
    pub stt_model: String,
    /// TTS model (e.g. "tts-1", "elevenlabs/eleven_monolingual_v1")
    pub tts_model: String,
    /// TTS voice
    pub tts_voice: String,
    /// TTS speed multiplier
    pub tts_speed: f64,
    /// Recording window per voice input
    pub capture_window: Duration,
}

impl VoiceConfig {
    /// Key for the configured STT provider
    #[must_use]
    pub fn stt_key<'a>(&self, keys: &'a ApiKeys) -> Option<&'a str> {
        if self.stt_model.starts_with("deepgram/") {
            keys.deepgram.as_deref()
        } else {
            keys.openai.as_deref()
        }
    }

    /// Key for the configured TTS provider
    #[must_use]
    pub fn tts_key<'a>(&self, keys: &'a ApiKeys) -> Option<&'a str> {
        if self.tts_model.starts_with("elevenlabs/") {
            keys.elevenlabs.as_deref()
        } else {
            keys.openai.as_deref()
        }
    }
}

/// API keys for external services
///
/// `Debug` output shows only whether each key is set.
#[derive(Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` key (Whisper STT, `OpenAI` TTS, relay upstream fallback)
    pub openai: Option<String>,
    /// Deepgram key (`deepgram/*` STT models)
    pub deepgram: Option<String>,
    /// ElevenLabs key (`elevenlabs/*` TTS models)
    pub elevenlabs: Option<String>,
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("openai", &redacted(self.openai.as_ref()))
            .field("deepgram", &redacted(self.deepgram.as_ref()))
            .field("elevenlabs", &redacted(self.elevenlabs.as_ref()))
            .finish()
    }
}

/// Backend relay configuration
#[derive(Clone)]
pub struct RelayConfig {
    /// Port to listen on
    pub port: u16,
    /// OpenAI-compatible upstream base URL
    pub upstream_url: String,
    /// Upstream model
    pub model: String,
    /// Upstream API key
    pub api_key: Option<String>,
    /// Forward `top_k` upstream; off for `OpenAI`, on for vLLM or llama.cpp
    pub send_top_k: bool,
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("port", &self.port)
            .field("upstream_url", &self.upstream_url)
            .field("model", &self.model)
            .field("api_key", &redacted(self.api_key.as_ref()))
            .field("send_top_k", &self.send_top_k)
            .finish()
    }
}

fn redacted(secret: Option<&String>) -> Option<&'static str> {
    secret.map(|_| "<redacted>")
}

const DEFAULT_RELAY_PORT: u16 = 8000;
const DEFAULT_UPSTREAM_URL: &str = "https://api.openai.com";
const DEFAULT_UPSTREAM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_CAPTURE_SECS: u64 = 5;

impl Config {
    /// Load configuration from the config file and process environment
    ///
    /// # Errors
    ///
    /// Returns error if a setting is out of range
    pub fn load() -> Result<Self> {
        // Load optional TOML config file (env > toml > default)
        let fc = file::load_config_file();
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// Unparseable numeric env values fall through to the file value.
    ///
    /// # Errors
    ///
    /// Returns error if the poll interval or location timeout is zero, or
    /// if only one fixed coordinate is given
    pub fn resolve(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let parsed = |key: &str| env(key).and_then(|s| s.trim().parse::<u64>().ok());

        let backend_url = env("GEOASSIST_BACKEND_URL")
            .or(fc.backend_url)
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let pois_path = env("GEOASSIST_POIS").or(fc.pois).map(PathBuf::from);

        let poll_interval = parsed("GEOASSIST_POLL_SECS")
            .or(fc.location.poll_secs)
            .map_or(DEFAULT_POLL_INTERVAL, Duration::from_secs);
        if poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be positive".to_string()));
        }

        let location_timeout = parsed("GEOASSIST_LOCATION_TIMEOUT_MS")
            .or(fc.location.timeout_ms)
            .map_or(DEFAULT_LOCATION_TIMEOUT, Duration::from_millis);
        if location_timeout.is_zero() {
            return Err(Error::Config("location timeout must be positive".to_string()));
        }

        let notice_ttl = parsed("GEOASSIST_NOTICE_SECS")
            .or(fc.session.notice_secs)
            .map_or(DEFAULT_NOTICE_TTL, Duration::from_secs);

        let defaults = SessionPreferences::default();
        let preferences = SessionPreferences {
            use_location_context: env("GEOASSIST_USE_LOCATION")
                .and_then(|v| parse_bool(&v))
                .or(fc.session.use_location_context)
                .unwrap_or(defaults.use_location_context),
            auto_speak: env("GEOASSIST_AUTO_SPEAK")
                .and_then(|v| parse_bool(&v))
                .or(fc.session.auto_speak)
                .unwrap_or(defaults.auto_speak),
        };

        let parsed_f64 = |key: &str| env(key).and_then(|s| s.trim().parse::<f64>().ok());
        let latitude = parsed_f64("GEOASSIST_LAT").or(fc.location.latitude);
        let longitude = parsed_f64("GEOASSIST_LON").or(fc.location.longitude);
        let geoip_url = env("GEOASSIST_GEOIP_URL").or(fc.location.geoip_url);
        let location = match (latitude, longitude) {
            (Some(lat), Some(lon)) => LocationSourceConfig::Fixed(Coordinate::new(lat, lon)),
            (Some(_), None) | (None, Some(_)) => {
                return Err(Error::Config(
                    "fixed location needs both latitude and longitude".to_string(),
                ));
            }
            (None, None) => geoip_url.map_or(LocationSourceConfig::None, LocationSourceConfig::GeoIp),
        };

        // Load API keys (env > toml > None)
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
        };

        let voice = VoiceConfig {
            enabled: fc.voice.enabled.unwrap_or(true),
            stt_model: env("GEOASSIST_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_model: env("GEOASSIST_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: env("GEOASSIST_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| "alloy".to_string()),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0),
            capture_window: Duration::from_secs(
                parsed("GEOASSIST_CAPTURE_SECS")
                    .or(fc.voice.capture_secs)
                    .unwrap_or(DEFAULT_CAPTURE_SECS)
                    .max(1),
            ),
        };

        let relay = RelayConfig {
            port: env("GEOASSIST_PORT")
                .and_then(|p| p.trim().parse().ok())
                .or(fc.relay.port)
                .unwrap_or(DEFAULT_RELAY_PORT),
            upstream_url: env("GEOASSIST_UPSTREAM_URL")
                .or(fc.relay.upstream_url)
                .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string()),
            model: env("GEOASSIST_UPSTREAM_MODEL")
                .or(fc.relay.model)
                .unwrap_or_else(|| DEFAULT_UPSTREAM_MODEL.to_string()),
            api_key: env("GEOASSIST_UPSTREAM_KEY")
                .or(fc.relay.api_key)
                .or_else(|| api_keys.openai.clone()),
            send_top_k: env("GEOASSIST_UPSTREAM_TOP_K")
                .and_then(|v| parse_bool(&v))
                .or(fc.relay.send_top_k)
                .unwrap_or(false),
        };

        Ok(Self {
            backend_url,
            pois_path,
            poll_interval,
            location_timeout,
            notice_ttl,
            preferences,
            location,
            voice,
            api_keys,
            relay,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
