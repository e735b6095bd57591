// src/errors.rs
use thiserror::Error;

/// Why a single event could not be turned into a local date-time.
/// Contained inside the schedule module; callers only ever see a skipped entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Event not present in timings: {0}")]
    MissingEvent(String),

    #[error("Malformed time for {event}: {raw:?}")]
    MalformedTime { event: String, raw: String },

    #[error("Local time {0} does not exist in the target timezone")]
    NonexistentLocalTime(String),
}

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Lookup failed with status: {0}")]
    Status(reqwest::StatusCode),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Invalid lookup endpoint: {0}")]
    InvalidEndpoint(String),
}

#[derive(Error, Debug)]
pub enum LocationError {
    #[error("Location unavailable: {0}")]
    Unavailable(String),

    #[error("No place found for {0:?}. Try the 'City, Country' form")]
    NotFound(String),

    #[error("Invalid coordinates: {latitude}, {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Config parsing error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}
