// src/config.rs
use crate::errors::ConfigError;
use crate::location::{Coordinates, DEFAULT_GEOCODER_BASE_URL};
use crate::methods::{Madhab, lookup_method};
use crate::notifier::DEFAULT_TWILIO_BASE_URL;
use crate::timings_api::DEFAULT_API_BASE_URL;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "salahwatch.toml";
pub const DEFAULT_REMINDER_THRESHOLD_SECS: u64 = 300;
/// Upper bound for the check and refresh intervals (one week).
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

const TWILIO_ENV_VARS: [&str; 4] = [
    "TWILIO_ACCOUNT_SID",
    "TWILIO_AUTH_TOKEN",
    "TWILIO_PHONE_NUMBER",
    "TWILIO_TO_PHONE_NUMBER",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub method: u8,
    pub school: Madhab,
    pub reminder_threshold_secs: u64,
    pub check_interval_secs: u64,
    pub refresh_interval_secs: u64,
    pub api_base_url: String,
    pub twilio_base_url: String,
    pub geocoder_base_url: String,
    /// Geocoded when no fixed `[location]` is set.
    pub city: Option<String>,
    pub location: Option<LocationSettings>,
    pub twilio: Option<TwilioSettings>,
}

/// Command-line values that take precedence over the settings file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    pub method: Option<u8>,
    pub school: Option<u8>,
    pub reminder_threshold_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationSettings {
    pub latitude: f64,
    pub longitude: f64,
    pub label: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TwilioSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub to_number: String,
}

// Keeps the token out of logs.
impl fmt::Debug for TwilioSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioSettings")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"***")
            .field("from_number", &self.from_number)
            .field("to_number", &self.to_number)
            .finish()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            method: 2,
            school: Madhab::Shafi,
            reminder_threshold_secs: DEFAULT_REMINDER_THRESHOLD_SECS,
            check_interval_secs: 60,
            refresh_interval_secs: 3600,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            twilio_base_url: DEFAULT_TWILIO_BASE_URL.to_string(),
            geocoder_base_url: DEFAULT_GEOCODER_BASE_URL.to_string(),
            city: None,
            location: None,
            twilio: None,
        }
    }
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads `path`, else `./salahwatch.toml` when present, else defaults;
    /// then applies TWILIO_* from the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let candidate: Option<PathBuf> = match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                default_path.exists().then_some(default_path)
            }
        };

        let mut settings: Settings = match candidate {
            Some(p) => {
                debug!("Settings: reading {}", p.display());
                let text: String = std::fs::read_to_string(&p)
                    .map_err(|source| ConfigError::Io { path: p.display().to_string(), source })?;
                toml::from_str(&text)?
            }
            None => Settings::default(),
        };

        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Messaging is only configured from the environment when all four variables are set.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        let values: [Option<String>; 4] =
            TWILIO_ENV_VARS.map(|key| lookup(key).filter(|v| !v.trim().is_empty()));
        let any_set: bool = values.iter().any(Option::is_some);
        if let [Some(account_sid), Some(auth_token), Some(from_number), Some(to_number)] = values {
            self.twilio = Some(TwilioSettings { account_sid, auth_token, from_number, to_number });
        } else if any_set {
            warn!("Settings: some TWILIO_* variables are set but not all four, ignoring them");
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if lookup_method(self.method).is_none() {
            return Err(ConfigError::Invalid {
                key: "method",
                reason: format!("unknown calculation method {}", self.method),
            });
        }
        for (key, value) in [
            ("check_interval_secs", self.check_interval_secs),
            ("refresh_interval_secs", self.refresh_interval_secs),
        ] {
            if !(1..=MAX_INTERVAL_SECS).contains(&value) {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("must be between 1 and {} seconds, got {}", MAX_INTERVAL_SECS, value),
                });
            }
        }
        if self.city.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(ConfigError::Invalid { key: "city", reason: "must not be blank".to_string() });
        }
        for (key, value) in [
            ("api_base_url", &self.api_base_url),
            ("twilio_base_url", &self.twilio_base_url),
            ("geocoder_base_url", &self.geocoder_base_url),
        ] {
            Url::parse(value)
                .map_err(|e| ConfigError::Invalid { key, reason: format!("{}: {}", value, e) })?;
        }
        self.coordinates()?;
        Ok(())
    }

    /// Applies command-line values, then re-validates. Coordinates and a city
    /// each replace the other's file setting; giving both is an error.
    pub fn apply_overrides(&mut self, overrides: Overrides) -> Result<(), ConfigError> {
        if let Some(method) = overrides.method {
            self.method = method;
        }
        if let Some(school) = overrides.school {
            self.school = Madhab::try_from(school).map_err(|reason| ConfigError::Invalid { key: "school", reason })?;
        }
        if let Some(threshold) = overrides.reminder_threshold_secs {
            self.reminder_threshold_secs = threshold;
        }
        match (overrides.latitude, overrides.longitude, overrides.city) {
            (Some(_), Some(_), Some(_)) => {
                return Err(ConfigError::Invalid {
                    key: "location",
                    reason: "give either --lat/--lon or --city, not both".to_string(),
                });
            }
            (Some(latitude), Some(longitude), None) => {
                self.location = Some(LocationSettings { latitude, longitude, label: Some("Manual".to_string()) });
                self.city = None;
            }
            (None, None, Some(city)) => {
                self.city = Some(city);
                self.location = None;
            }
            (None, None, None) => {}
            _ => {
                return Err(ConfigError::Invalid {
                    key: "location",
                    reason: "--lat and --lon must be given together".to_string(),
                });
            }
        }
        self.validate()
    }

    pub fn coordinates(&self) -> Result<Option<Coordinates>, ConfigError> {
        match &self.location {
            Some(loc) => Coordinates::new(loc.latitude, loc.longitude)
                .map(Some)
                .map_err(|e| ConfigError::Invalid { key: "location", reason: e.to_string() }),
            None => Ok(None),
        }
    }
}
