//! Geo Assistant - location-aware conversational client
//!
//! This library provides the core functionality for the geo assistant:
//! - Location polling and POI proximity detection
//! - Voice capture and spoken replies (Idle / Listening / Speaking)
//! - Query dispatch to an assistant backend with optional place context
//! - A backend relay serving the same HTTP contract
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                       │
//! │        REPL  │  ask  │  locate  │  serve            │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                     Session                         │
//! │   LocationPoller  │  VoiceController  │  Notices    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               Assistant backend                     │
//! │   POST {prompt, nearby_place}  →  {response}        │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod assistant;
pub mod config;
pub mod error;
pub mod geo;
pub mod location;
pub mod notice;
pub mod server;
pub mod session;
pub mod voice;

pub use assistant::{Assistant, DEFAULT_BACKEND_URL, HttpAssistant, PendingQuery};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use geo::{Coordinate, Poi, PoiRegistry, ProximityState, haversine_distance};
pub use location::{
    LocationFailure, LocationPoller, LocationProvider, LocationSnapshot, LocationSource,
    LocationState,
};
pub use notice::{Notice, Notices};
pub use session::{
    DispatchOutcome, Session, SessionPreferences, SessionView, VoiceInputOutcome,
};
pub use voice::{CaptureOutcome, SpeechCapture, SpeechPlayback, VoiceController, VoiceState};
