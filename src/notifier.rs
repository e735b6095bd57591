// src/notifier.rs
use crate::config::TwilioSettings;
use crate::prayer::Prayer;
use crate::schedule::NextEvent;
use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

pub const DEFAULT_TWILIO_BASE_URL: &str = "https://api.twilio.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Dispatched { id: String },
    NotConfigured,
    ProviderError(String),
}

impl NotifyOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, NotifyOutcome::Dispatched { .. })
    }
}

impl fmt::Display for NotifyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyOutcome::Dispatched { id } => write!(f, "SMS queued (SID: {})", id),
            NotifyOutcome::NotConfigured => {
                write!(f, "SMS notifications are not configured (set the TWILIO_* variables)")
            }
            NotifyOutcome::ProviderError(msg) => write!(f, "SMS error: {}", msg),
        }
    }
}

pub fn reminder_body(event: &str, time: &str) -> String {
    format!("🕌 Reminder: {} at {}. Wudhu & prepare!", event, time)
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &str, time: &str) -> NotifyOutcome;
}

// ===== Twilio SMS
#[derive(Debug, Deserialize)]
struct TwilioReply {
    sid: Option<String>,
    message: Option<String>,
}

pub struct SmsNotifier {
    client: Client,
    credentials: Option<TwilioSettings>,
    base_url: String,
}

impl SmsNotifier {
    pub fn new(credentials: Option<TwilioSettings>, base_url: &str) -> Result<Self, reqwest::Error> {
        if credentials.is_none() {
            warn!("SmsNotifier: Twilio credentials missing, reminders will not be sent");
        }
        let client: Client =
            reqwest::Client::builder().timeout(std::time::Duration::from_secs(10)).build()?;
        Ok(Self { client, credentials, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn notify(&self, event: &str, time: &str) -> NotifyOutcome {
        let Some(creds) = &self.credentials else {
            return NotifyOutcome::NotConfigured;
        };
        let url: String =
            format!("{}/2010-04-01/Accounts/{}/Messages.json", self.base_url, creds.account_sid);
        let body: String = reminder_body(event, time);

        let response = match self
            .client
            .post(&url)
            .basic_auth(&creds.account_sid, Some(&creds.auth_token))
            .form(&[
                ("Body", body.as_str()),
                ("From", creds.from_number.as_str()),
                ("To", creds.to_number.as_str()),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("SmsNotifier: request failed: {}", e);
                return NotifyOutcome::ProviderError(e.to_string());
            }
        };

        let status = response.status();
        let text: String = response.text().await.unwrap_or_default();
        let reply: Option<TwilioReply> = serde_json::from_str(&text).ok();

        match (status.is_success(), reply) {
            (true, Some(TwilioReply { sid: Some(sid), .. })) => {
                info!("SmsNotifier: SMS sent, SID={}", sid);
                NotifyOutcome::Dispatched { id: sid }
            }
            (true, _) => NotifyOutcome::ProviderError("reply carried no message SID".to_string()),
            (false, reply) => {
                let msg: String =
                    reply.and_then(|r| r.message).unwrap_or_else(|| status.to_string());
                error!("SmsNotifier: Twilio API error ({}): {}", status, msg);
                NotifyOutcome::ProviderError(msg)
            }
        }
    }
}

// ===== Recording notifier for testing
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &str, time: &str) -> NotifyOutcome {
        let Ok(mut sent) = self.sent.lock() else {
            return NotifyOutcome::ProviderError("recorder poisoned".to_string());
        };
        sent.push((event.to_string(), time.to_string()));
        NotifyOutcome::Dispatched { id: format!("fake-{}", sent.len()) }
    }
}

// ===== Reminder gate
/// Decides when a refresh loop should remind, at most once per event instant.
#[derive(Debug, Clone)]
pub struct ReminderGate {
    threshold_secs: u64,
    reminded: HashSet<(Prayer, i64)>,
}

impl ReminderGate {
    pub fn new(threshold_secs: u64) -> Self {
        Self { threshold_secs, reminded: HashSet::new() }
    }

    pub fn threshold_secs(&self) -> u64 {
        self.threshold_secs
    }

    pub fn is_due(&self, next: &NextEvent) -> bool {
        next.seconds_remaining() <= self.threshold_secs
    }

    /// True the first time `next` is due. Forgets events older than `next`.
    pub fn claim(&mut self, next: &NextEvent) -> bool {
        if !self.is_due(next) {
            return false;
        }
        let key: (Prayer, i64) = (next.prayer(), next.at().timestamp());
        self.reminded.retain(|(_, ts)| *ts >= key.1);
        self.reminded.insert(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prayer::{PRIORITY_ORDER, PrayerTimings};
    use crate::schedule::next_event;
    use chrono::{TimeZone, Utc};
    use chrono_tz::Asia::Karachi;
    use mockito::Matcher;

    fn creds() -> TwilioSettings {
        TwilioSettings {
            account_sid: "AC123".to_string(),
            auth_token: "secret".to_string(),
            from_number: "+15550001111".to_string(),
            to_number: "+15550002222".to_string(),
        }
    }

    fn next_at(h: u32, m: u32, s: u32) -> NextEvent {
        let timings: PrayerTimings =
            [("Fajr", "04:30"), ("Dhuhr", "12:20"), ("Isha", "20:45")].into_iter().collect();
        let now = Karachi.with_ymd_and_hms(2025, 6, 15, h, m, s).unwrap().with_timezone(&Utc);
        next_event(&timings, Karachi, &PRIORITY_ORDER, now).unwrap()
    }

    #[test]
    fn test_reminder_body() {
        assert_eq!(reminder_body("Asr", "15:45"), "🕌 Reminder: Asr at 15:45. Wudhu & prepare!");
    }

    #[test]
    fn test_gate_fires_once_per_event() {
        let mut gate = ReminderGate::new(300);
        assert!(!gate.claim(&next_at(12, 10, 0))); // 10 minutes out
        assert!(gate.claim(&next_at(12, 15, 0))); // exactly 5 minutes out
        assert!(!gate.claim(&next_at(12, 16, 0)));
        assert!(!gate.claim(&next_at(12, 19, 59)));
        assert!(gate.claim(&next_at(20, 41, 0))); // Isha is a new event
    }

    #[tokio::test]
    async fn test_sms_notifier_not_configured() {
        let notifier = SmsNotifier::new(None, DEFAULT_TWILIO_BASE_URL).unwrap();
        assert!(!notifier.is_configured());
        assert_eq!(notifier.notify("Isha", "20:00").await, NotifyOutcome::NotConfigured);
    }

    #[tokio::test]
    async fn test_sms_notifier_posts_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/2010-04-01/Accounts/AC123/Messages.json")
            .match_header("authorization", Matcher::Regex("^Basic ".to_string()))
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("To".into(), "+15550002222".into()),
                Matcher::UrlEncoded("From".into(), "+15550001111".into()),
                Matcher::UrlEncoded("Body".into(), reminder_body("Isha", "20:00")),
            ]))
            .with_status(201)
            .with_body(r#"{"sid": "SM42", "status": "queued"}"#)
            .create_async()
            .await;

        let notifier = SmsNotifier::new(Some(creds()), &server.url()).unwrap();
        let outcome = notifier.notify("Isha", "20:00").await;

        mock.assert_async().await;
        assert_eq!(outcome, NotifyOutcome::Dispatched { id: "SM42".to_string() });
    }

    // SAD PATHS

    #[tokio::test]
    async fn test_sms_notifier_surfaces_provider_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/2010-04-01/Accounts/AC123/Messages.json")
            .with_status(400)
            .with_body(r#"{"code": 21211, "message": "The 'To' number is not valid.", "status": 400}"#)
            .create_async()
            .await;

        let notifier = SmsNotifier::new(Some(creds()), &server.url()).unwrap();
        assert_eq!(
            notifier.notify("Isha", "20:00").await,
            NotifyOutcome::ProviderError("The 'To' number is not valid.".to_string())
        );
    }

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = RecordingNotifier::default();
        assert!(notifier.notify("Fajr (Tomorrow)", "04:30").await.is_dispatched());
        assert_eq!(notifier.sent(), vec![("Fajr (Tomorrow)".to_string(), "04:30".to_string())]);
    }
}
