// src/timings_api.rs
use crate::errors::LookupError;
use crate::location::Coordinates;
use crate::methods::Madhab;
use crate::prayer::{DailySchedule, PrayerTimings};
use async_trait::async_trait;
use chrono_tz::Tz;
use log::{debug, info, warn};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://api.aladhan.com/v1";

pub(crate) const APP_USER_AGENT: &str = concat!("salahwatch/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingsQuery {
    pub coordinates: Coordinates,
    pub method: u8,
    pub school: Madhab,
}

// ===== payload
#[derive(Debug, Deserialize)]
struct AladhanResponse {
    data: AladhanData,
}

#[derive(Debug, Deserialize)]
struct AladhanData {
    timings: BTreeMap<String, serde_json::Value>,
    date: Option<AladhanDate>,
    meta: AladhanMeta,
}

#[derive(Debug, Deserialize)]
struct AladhanDate {
    readable: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AladhanMeta {
    timezone: String,
}

/// Turns an Aladhan `/timings` body into a schedule.
/// Timing values that are not strings are dropped; string values are kept as-is
/// and validated later, per entry, by the resolver.
pub fn parse_timings_payload(body: &str) -> Result<DailySchedule, LookupError> {
    let parsed: AladhanResponse =
        serde_json::from_str(body).map_err(|e| LookupError::MalformedPayload(e.to_string()))?;

    let timezone: Tz = parsed
        .data
        .meta
        .timezone
        .parse()
        .map_err(|_| LookupError::UnknownTimezone(parsed.data.meta.timezone.clone()))?;

    let timings: PrayerTimings = parsed
        .data
        .timings
        .into_iter()
        .filter_map(|(name, value)| match value {
            serde_json::Value::String(time) => Some((name, time)),
            other => {
                warn!("parse_timings_payload: dropping non-string timing {}: {}", name, other);
                None
            }
        })
        .collect();

    let date_label: Option<String> = parsed.data.date.and_then(|d| d.readable);
    Ok(DailySchedule::new(timings, timezone, date_label))
}

// ===== fetcher
#[async_trait]
pub trait TimingsFetcher: Send + Sync {
    async fn fetch(&self, query: &TimingsQuery) -> Result<DailySchedule, LookupError>;
}

// ===== Live http fetcher
pub struct AladhanFetcher {
    client: Client,
    base_url: String,
}

impl AladhanFetcher {
    pub fn new(base_url: &str) -> Result<Self, LookupError> {
        let client: Client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    fn timings_url(&self, query: &TimingsQuery) -> Result<Url, LookupError> {
        let endpoint: String = format!("{}/timings", self.base_url);
        Url::parse_with_params(
            &endpoint,
            &[
                ("latitude", query.coordinates.latitude().to_string()),
                ("longitude", query.coordinates.longitude().to_string()),
                ("method", query.method.to_string()),
                ("school", query.school.id().to_string()),
            ],
        )
        .map_err(|e| LookupError::InvalidEndpoint(format!("{}: {}", endpoint, e)))
    }
}

#[async_trait]
impl TimingsFetcher for AladhanFetcher {
    async fn fetch(&self, query: &TimingsQuery) -> Result<DailySchedule, LookupError> {
        let url: Url = self.timings_url(query)?;
        info!("AladhanFetcher: fetching {}", url);

        let response: Response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(LookupError::Status(response.status()));
        }
        let body: String = response.text().await?;
        debug!("AladhanFetcher: received {} bytes", body.len());

        let schedule: DailySchedule = parse_timings_payload(&body)?;
        info!(
            "AladhanFetcher: {} timings in {}",
            schedule.timings().len(),
            schedule.timezone().name()
        );
        Ok(schedule)
    }
}

// ===== Fake fetcher for testing
/// Returns a canned schedule, or a 503 when none is set. Counts calls.
pub struct FakeFetcher {
    schedule: Mutex<Option<DailySchedule>>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new(schedule: Option<DailySchedule>) -> Self {
        Self { schedule: Mutex::new(schedule), calls: AtomicUsize::new(0) }
    }

    /// Swaps the canned answer; `None` makes later fetches fail.
    pub fn set_schedule(&self, schedule: Option<DailySchedule>) {
        if let Ok(mut current) = self.schedule.lock() {
            *current = schedule;
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimingsFetcher for FakeFetcher {
    async fn fetch(&self, _query: &TimingsQuery) -> Result<DailySchedule, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let schedule: Option<DailySchedule> = self.schedule.lock().ok().and_then(|s| s.clone());
        schedule.ok_or(LookupError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE))
    }
}
