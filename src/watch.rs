// src/watch.rs
//! Headless reminder loop: a timer drives periodic, independent selector runs.
use crate::notifier::{Notifier, NotifyOutcome, ReminderGate};
use crate::prayer::DailySchedule;
use crate::schedule::{NextEvent, next_prayer};
use crate::timings_api::{TimingsFetcher, TimingsQuery};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    LookupFailed(String),
    NoNextEvent,
    Waiting(NextEvent),
    Reminded { next: NextEvent, outcome: NotifyOutcome },
}

struct CachedSchedule {
    schedule: DailySchedule,
    fetched_at: DateTime<Utc>,
    local_date: NaiveDate,
}

pub struct ReminderLoop {
    fetcher: Arc<dyn TimingsFetcher>,
    notifier: Arc<dyn Notifier>,
    query: TimingsQuery,
    gate: ReminderGate,
    refresh_every: TimeDelta,
    cached: Option<CachedSchedule>,
}

impl ReminderLoop {
    pub fn new(
        fetcher: Arc<dyn TimingsFetcher>,
        notifier: Arc<dyn Notifier>,
        query: TimingsQuery,
        threshold_secs: u64,
        refresh_every_secs: u64,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            query,
            gate: ReminderGate::new(threshold_secs),
            refresh_every: i64::try_from(refresh_every_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::MAX),
            cached: None,
        }
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match &self.cached {
            None => true,
            Some(c) => {
                now - c.fetched_at >= self.refresh_every
                    || now.with_timezone(&c.schedule.timezone()).date_naive() != c.local_date
            }
        }
    }

    /// Re-fetches when stale. A failed fetch keeps a cached schedule for the
    /// same local date and only errors when nothing usable is left.
    async fn refresh(&mut self, now: DateTime<Utc>) -> Result<(), String> {
        if !self.is_stale(now) {
            return Ok(());
        }
        debug!("ReminderLoop: refreshing timings");
        match self.fetcher.fetch(&self.query).await {
            Ok(schedule) => {
                let local_date: NaiveDate = now.with_timezone(&schedule.timezone()).date_naive();
                self.cached = Some(CachedSchedule { schedule, fetched_at: now, local_date });
                Ok(())
            }
            Err(e) => match &self.cached {
                Some(c) if now.with_timezone(&c.schedule.timezone()).date_naive() == c.local_date => {
                    warn!("ReminderLoop: refresh failed, keeping today's timings: {}", e);
                    Ok(())
                }
                _ => Err(e.to_string()),
            },
        }
    }

    pub fn schedule(&self) -> Option<&DailySchedule> {
        self.cached.as_ref().map(|c| &c.schedule)
    }

    /// One check: refresh timings if stale, select the next prayer, remind if due.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        if let Err(e) = self.refresh(now).await {
            error!("ReminderLoop: lookup failed, skipping cycle: {}", e);
            return CycleReport::LookupFailed(e);
        }
        let Some(schedule) = self.schedule() else {
            return CycleReport::LookupFailed("no schedule".to_string());
        };
        let Some(next) = next_prayer(schedule, now) else {
            return CycleReport::NoNextEvent;
        };

        if self.gate.claim(&next) {
            let outcome: NotifyOutcome = self.notifier.notify(&next.label(), &next.time_str()).await;
            info!("ReminderLoop: reminder for {}: {}", next.label(), outcome);
            CycleReport::Reminded { next, outcome }
        } else {
            CycleReport::Waiting(next)
        }
    }

    /// Ticks every `period` until Ctrl-C. `on_report` sees each cycle's outcome.
    pub async fn run<F: FnMut(&CycleReport)>(&mut self, period: Duration, mut on_report: F) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report: CycleReport = self.run_cycle(Utc::now()).await;
                    on_report(&report);
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("ReminderLoop: interrupted, stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Coordinates;
    use crate::methods::Madhab;
    use crate::notifier::RecordingNotifier;
    use crate::prayer::{Prayer, PrayerTimings};
    use crate::timings_api::FakeFetcher;
    use chrono::TimeZone;
    use chrono_tz::Europe::London;

    fn schedule() -> DailySchedule {
        let timings: PrayerTimings = [
            ("Fajr", "03:00"),
            ("Dhuhr", "13:05"),
            ("Asr", "17:30"),
            ("Maghrib", "21:20"),
            ("Isha", "22:45"),
        ]
        .into_iter()
        .collect();
        DailySchedule::new(timings, London, None)
    }

    fn query() -> TimingsQuery {
        TimingsQuery { coordinates: Coordinates::new(51.5074, -0.1278).unwrap(), method: 3, school: Madhab::Shafi }
    }

    fn london(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        London.with_ymd_and_hms(2025, 6, d, h, m, 0).unwrap().with_timezone(&Utc)
    }

    fn setup(
        schedule: Option<DailySchedule>,
    ) -> (Arc<FakeFetcher>, Arc<RecordingNotifier>, ReminderLoop) {
        setup_with_refresh(schedule, 3600)
    }

    fn setup_with_refresh(
        schedule: Option<DailySchedule>,
        refresh_every_secs: u64,
    ) -> (Arc<FakeFetcher>, Arc<RecordingNotifier>, ReminderLoop) {
        let _ = env_logger::builder().is_test(true).try_init();
        let fetcher = Arc::new(FakeFetcher::new(schedule));
        let notifier = Arc::new(RecordingNotifier::default());
        let reminder = ReminderLoop::new(fetcher.clone(), notifier.clone(), query(), 300, refresh_every_secs);
        (fetcher, notifier, reminder)
    }

    #[tokio::test]
    async fn test_cycle_waits_then_reminds_once() {
        let (fetcher, notifier, mut reminder) = setup(Some(schedule()));

        match reminder.run_cycle(london(15, 12, 10)).await {
            CycleReport::Waiting(next) => assert_eq!(next.prayer(), Prayer::Dhuhr),
            other => panic!("unexpected report: {:?}", other),
        }
        assert!(matches!(
            reminder.run_cycle(london(15, 13, 1)).await,
            CycleReport::Reminded { outcome: NotifyOutcome::Dispatched { .. }, .. }
        ));
        assert!(matches!(reminder.run_cycle(london(15, 13, 2)).await, CycleReport::Waiting(_)));

        assert_eq!(notifier.sent(), vec![("Dhuhr".to_string(), "13:05".to_string())]);
        // all three cycles within the refresh window share one lookup
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_refetches_once_refresh_window_passes() {
        let (fetcher, _notifier, mut reminder) = setup(Some(schedule()));
        reminder.run_cycle(london(15, 12, 0)).await;
        reminder.run_cycle(london(15, 12, 59)).await;
        assert_eq!(fetcher.calls(), 1);
        reminder.run_cycle(london(15, 13, 1)).await;
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_huge_refresh_interval_never_refetches_same_day() {
        let (fetcher, _notifier, mut reminder) = setup_with_refresh(Some(schedule()), u64::MAX);
        reminder.run_cycle(london(15, 12, 0)).await;
        reminder.run_cycle(london(15, 22, 0)).await;
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_same_day_timings() {
        let (fetcher, notifier, mut reminder) = setup(Some(schedule()));
        reminder.run_cycle(london(15, 12, 0)).await;
        fetcher.set_schedule(None);

        let report = reminder.run_cycle(london(15, 17, 27)).await;
        assert_eq!(fetcher.calls(), 2);
        assert!(matches!(report, CycleReport::Reminded { .. }));
        assert_eq!(notifier.sent(), vec![("Asr".to_string(), "17:30".to_string())]);

        // yesterday's timings are not reused after midnight
        assert!(matches!(reminder.run_cycle(london(16, 0, 10)).await, CycleReport::LookupFailed(_)));
    }

    #[tokio::test]
    async fn test_refetches_on_local_date_change() {
        let (fetcher, notifier, mut reminder) = setup(Some(schedule()));

        reminder.run_cycle(london(15, 23, 30)).await;
        let report = reminder.run_cycle(london(16, 0, 10)).await;
        assert_eq!(fetcher.calls(), 2);

        match report {
            CycleReport::Waiting(next) => {
                assert_eq!(next.prayer(), Prayer::Fajr);
                assert!(!next.is_tomorrow());
            }
            other => panic!("unexpected report: {:?}", other),
        }
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reminds_for_fajr_before_dawn() {
        let (_fetcher, notifier, mut reminder) = setup(Some(schedule()));
        reminder.run_cycle(london(15, 2, 56)).await;
        assert_eq!(notifier.sent(), vec![("Fajr".to_string(), "03:00".to_string())]);
    }

    // SAD PATHS

    #[tokio::test]
    async fn test_lookup_failure_skips_cycle() {
        let (fetcher, notifier, mut reminder) = setup(None);
        assert!(matches!(reminder.run_cycle(london(15, 12, 0)).await, CycleReport::LookupFailed(_)));
        assert!(matches!(reminder.run_cycle(london(15, 12, 1)).await, CycleReport::LookupFailed(_)));
        assert_eq!(fetcher.calls(), 2);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_no_next_event_without_fajr() {
        let timings: PrayerTimings = [("Isha", "22:45")].into_iter().collect();
        let (_fetcher, _notifier, mut reminder) = setup(Some(DailySchedule::new(timings, London, None)));
        assert_eq!(reminder.run_cycle(london(15, 23, 0)).await, CycleReport::NoNextEvent);
    }
}
