// src/schedule.rs
//! Next-prayer selection.
//!
//! Timings arrive as naive `HH:MM` strings plus an IANA zone. Everything here
//! is pure: each call works only from its arguments and keeps no state, so a
//! refresh loop can call it as often as it likes with an advancing `now`.
use crate::errors::ResolveError;
use crate::prayer::{DailySchedule, PRIORITY_ORDER, Prayer, PrayerTimings};
use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use log::{debug, warn};
use std::fmt;

const SOON_SECS: u64 = 15 * 60;

// ===== time-of-day parsing

/// Strict `H:MM` / `HH:MM` parse. No suffixes, no whitespace, no seconds.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let (hour_part, minute_part) = raw.split_once(':')?;
    let is_field =
        |part: &str| (1..=2).contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit());
    if !is_field(hour_part) || !is_field(minute_part) {
        return None;
    }
    let hour: u32 = hour_part.parse().ok()?;
    let minute: u32 = minute_part.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

// Ambiguous wall clock (fall back) takes the earlier instant; a wall clock inside a
// spring-forward gap moves one hour later.
fn localize(tz: Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>, ResolveError> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => tz
            .from_local_datetime(&(naive + TimeDelta::hours(1)))
            .earliest()
            .ok_or_else(|| ResolveError::NonexistentLocalTime(naive.to_string())),
    }
}

// ===== event resolver

/// Resolves `prayer` against an explicit calendar date in `tz`.
pub fn resolve_on(
    timings: &PrayerTimings,
    prayer: Prayer,
    tz: Tz,
    date: NaiveDate,
) -> Result<DateTime<Tz>, ResolveError> {
    let raw: &str =
        timings.get(prayer).ok_or_else(|| ResolveError::MissingEvent(prayer.to_string()))?;
    let time: NaiveTime = parse_time_of_day(raw).ok_or_else(|| ResolveError::MalformedTime {
        event: prayer.to_string(),
        raw: raw.to_string(),
    })?;
    localize(tz, date.and_time(time))
}

/// Resolves `prayer` on the same calendar date as `now_local`, in `now_local`'s zone.
pub fn resolve_event(
    timings: &PrayerTimings,
    prayer: Prayer,
    now_local: &DateTime<Tz>,
) -> Result<DateTime<Tz>, ResolveError> {
    resolve_on(timings, prayer, now_local.timezone(), now_local.date_naive())
}

// ===== next-event selector

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextEvent {
    prayer: Prayer,
    tomorrow: bool,
    at: DateTime<Tz>,
    seconds_remaining: u64,
}

impl NextEvent {
    fn new(prayer: Prayer, tomorrow: bool, at: DateTime<Tz>, now_local: &DateTime<Tz>) -> Self {
        let seconds_remaining: u64 = at.signed_duration_since(now_local).num_seconds().max(0) as u64;
        Self { prayer, tomorrow, at, seconds_remaining }
    }

    pub fn prayer(&self) -> Prayer {
        self.prayer
    }

    pub fn is_tomorrow(&self) -> bool {
        self.tomorrow
    }

    pub fn at(&self) -> &DateTime<Tz> {
        &self.at
    }

    pub fn seconds_remaining(&self) -> u64 {
        self.seconds_remaining
    }

    /// "Isha", or "Fajr (Tomorrow)" after rollover.
    pub fn label(&self) -> String {
        if self.tomorrow {
            format!("{} (Tomorrow)", self.prayer)
        } else {
            self.prayer.to_string()
        }
    }

    pub fn time_str(&self) -> String {
        self.at.format("%H:%M").to_string()
    }
}

impl fmt::Display for NextEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {} ({})", self.label(), self.time_str(), describe_remaining(self.seconds_remaining))
    }
}

/// Picks the first event in `order` strictly after `now`, evaluated in `tz`.
///
/// When every event today has passed, the first entry of `order` is resolved
/// against tomorrow's date. `None` means nothing usable was found: an empty
/// `order`, or every candidate (including the rollover one) missing or malformed.
pub fn next_event(
    timings: &PrayerTimings,
    tz: Tz,
    order: &[Prayer],
    now: DateTime<Utc>,
) -> Option<NextEvent> {
    let now_local: DateTime<Tz> = now.with_timezone(&tz);

    for prayer in order.iter().copied() {
        if !timings.contains(prayer) {
            debug!("next_event: {} not in timings, skipping", prayer);
            continue;
        }
        match resolve_event(timings, prayer, &now_local) {
            Ok(at) if at > now_local => return Some(NextEvent::new(prayer, false, at, &now_local)),
            Ok(_) => {}
            Err(e) => warn!("next_event: skipping {}: {}", prayer, e),
        }
    }

    let first: Prayer = *order.first()?;
    let tomorrow: NaiveDate = now_local.date_naive().succ_opt()?;
    match resolve_on(timings, first, tz, tomorrow) {
        Ok(at) => Some(NextEvent::new(first, true, at, &now_local)),
        Err(e) => {
            warn!("next_event: no rollover candidate: {}", e);
            None
        }
    }
}

/// `next_event` over the canonical five prayers.
pub fn next_prayer(schedule: &DailySchedule, now: DateTime<Utc>) -> Option<NextEvent> {
    next_event(schedule.timings(), schedule.timezone(), &PRIORITY_ORDER, now)
}

// ===== countdown helpers

pub fn format_countdown(seconds: u64) -> String {
    let hours: u64 = seconds / 3600;
    let minutes: u64 = (seconds % 3600) / 60;
    let secs: u64 = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

pub fn describe_remaining(seconds: u64) -> String {
    let minutes: u64 = seconds / 60;
    if minutes <= 60 {
        format!("{} minutes remaining", minutes)
    } else {
        format!("{}h {}m remaining", minutes / 60, minutes % 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Imminent,
    Soon,
    Later,
}

impl Urgency {
    pub fn of(seconds_remaining: u64, threshold_secs: u64) -> Self {
        if seconds_remaining <= threshold_secs {
            Urgency::Imminent
        } else if seconds_remaining <= SOON_SECS {
            Urgency::Soon
        } else {
            Urgency::Later
        }
    }
}
