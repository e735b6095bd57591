// src/prayer.rs
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// === EVENT VOCABULARY ===
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Prayer {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
    Imsak,
    Midnight,
    Sunset,
    Firstthird,
    Lastthird,
}

/// The events that can be "next". Fixed, and in canonical day order.
pub const PRIORITY_ORDER: [Prayer; 5] =
    [Prayer::Fajr, Prayer::Dhuhr, Prayer::Asr, Prayer::Maghrib, Prayer::Isha];

/// The main schedule grid. Anything else in the timings is an additional time.
pub const DISPLAY_ORDER: [Prayer; 6] =
    [Prayer::Fajr, Prayer::Sunrise, Prayer::Dhuhr, Prayer::Asr, Prayer::Maghrib, Prayer::Isha];

impl Prayer {
    pub const ALL: [Prayer; 11] = [
        Prayer::Fajr,
        Prayer::Sunrise,
        Prayer::Dhuhr,
        Prayer::Asr,
        Prayer::Maghrib,
        Prayer::Isha,
        Prayer::Imsak,
        Prayer::Midnight,
        Prayer::Sunset,
        Prayer::Firstthird,
        Prayer::Lastthird,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Prayer::Fajr => "Fajr",
            Prayer::Sunrise => "Sunrise",
            Prayer::Dhuhr => "Dhuhr",
            Prayer::Asr => "Asr",
            Prayer::Maghrib => "Maghrib",
            Prayer::Isha => "Isha",
            Prayer::Imsak => "Imsak",
            Prayer::Midnight => "Midnight",
            Prayer::Sunset => "Sunset",
            Prayer::Firstthird => "Firstthird",
            Prayer::Lastthird => "Lastthird",
        }
    }

    pub fn is_schedulable(&self) -> bool {
        PRIORITY_ORDER.contains(self)
    }
}

impl fmt::Display for Prayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPrayer(pub String);

impl fmt::Display for UnknownPrayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown prayer name: {}", self.0)
    }
}

impl std::error::Error for UnknownPrayer {}

impl FromStr for Prayer {
    type Err = UnknownPrayer;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Prayer::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPrayer(s.to_string()))
    }
}

// === TIMINGS (event name -> "HH:MM") ===
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerTimings(BTreeMap<String, String>);

impl PrayerTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, time: &str) {
        self.0.insert(name.to_string(), time.to_string());
    }

    pub fn get(&self, prayer: Prayer) -> Option<&str> {
        self.0.get(prayer.as_str()).map(String::as_str)
    }

    pub fn contains(&self, prayer: Prayer) -> bool {
        self.0.contains_key(prayer.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Main grid entries present in the timings, in display order.
    pub fn main_times(&self) -> Vec<(Prayer, &str)> {
        DISPLAY_ORDER.iter().filter_map(|p| self.get(*p).map(|t| (*p, t))).collect()
    }

    /// Everything outside the main grid, including names outside the vocabulary.
    pub fn additional_times(&self) -> Vec<(&str, &str)> {
        self.0
            .iter()
            .filter(|(name, _)| !DISPLAY_ORDER.iter().any(|p| p.as_str() == name.as_str()))
            .map(|(name, time)| (name.as_str(), time.as_str()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PrayerTimings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        PrayerTimings(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// === ONE LOOKUP RESULT ===
#[derive(Debug, Clone)]
pub struct DailySchedule {
    timings: PrayerTimings,
    timezone: Tz,
    date_label: Option<String>,
}

impl DailySchedule {
    pub fn new(timings: PrayerTimings, timezone: Tz, date_label: Option<String>) -> Self {
        Self { timings, timezone, date_label }
    }

    pub fn timings(&self) -> &PrayerTimings {
        &self.timings
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn date_label(&self) -> Option<&str> {
        self.date_label.as_deref()
    }
}

impl fmt::Display for DailySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(date) = &self.date_label {
            writeln!(f, "Date        : {}", date)?;
        }
        writeln!(f, "Timezone    : {}", self.timezone.name())?;
        for (prayer, time) in self.timings.main_times() {
            writeln!(f, "{:<12}: {}", prayer.as_str(), time)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prayer_from_str_is_case_insensitive() {
        assert_eq!("fajr".parse::<Prayer>(), Ok(Prayer::Fajr));
        assert_eq!("ISHA".parse::<Prayer>(), Ok(Prayer::Isha));
        assert_eq!("Lastthird".parse::<Prayer>(), Ok(Prayer::Lastthird));
        assert!("Tahajjud".parse::<Prayer>().is_err());
    }

    #[test]
    fn test_only_five_prayers_are_schedulable() {
        let schedulable: Vec<Prayer> =
            Prayer::ALL.iter().copied().filter(Prayer::is_schedulable).collect();
        assert_eq!(schedulable, PRIORITY_ORDER.to_vec());
        assert!(!Prayer::Sunrise.is_schedulable());
        assert!(!Prayer::Imsak.is_schedulable());
    }

    #[test]
    fn test_main_and_additional_times_split() {
        let timings: PrayerTimings = [
            ("Isha", "20:00"),
            ("Fajr", "05:00"),
            ("Sunrise", "06:30"),
            ("Imsak", "04:50"),
            ("Midnight", "00:40"),
            ("Custom", "01:00"),
        ]
        .into_iter()
        .collect();

        let main = timings.main_times();
        assert_eq!(main, vec![(Prayer::Fajr, "05:00"), (Prayer::Sunrise, "06:30"), (Prayer::Isha, "20:00")]);

        let extra = timings.additional_times();
        assert_eq!(extra, vec![("Custom", "01:00"), ("Imsak", "04:50"), ("Midnight", "00:40")]);
    }
}
