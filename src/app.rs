// src/app.rs
use crate::location::Located;
use crate::methods::Madhab;
use crate::notifier::{Notifier, NotifyOutcome};
use crate::prayer::DailySchedule;
use crate::schedule::{NextEvent, Urgency, next_prayer};
use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{error, info};
use ratatui::{Terminal, backend::Backend};
use std::io;
use std::sync::Arc;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Tab {
    #[default]
    PrayerTimes,
    Details,
}

impl Tab {
    pub const TITLES: [&'static str; 2] = ["Prayer Times", "Details"];

    pub fn index(&self) -> usize {
        match self {
            Tab::PrayerTimes => 0,
            Tab::Details => 1,
        }
    }

    fn toggle(self) -> Self {
        match self {
            Tab::PrayerTimes => Tab::Details,
            Tab::Details => Tab::PrayerTimes,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum UiAction {
    SendReminder { event: String, time: String },
}

pub struct App {
    pub should_quit: bool,
    pub schedule: DailySchedule,
    pub location: Located,
    pub method_name: String,
    pub school: Madhab,
    pub threshold_secs: u64,
    pub selected_tab: Tab,
    pub now_local: DateTime<Tz>,
    pub next: Option<NextEvent>,
    pub status: Option<String>,
}

impl App {
    pub fn new(
        schedule: DailySchedule,
        location: Located,
        method_name: String,
        school: Madhab,
        threshold_secs: u64,
    ) -> App {
        let now: DateTime<Utc> = Utc::now();
        let mut app = App {
            should_quit: false,
            now_local: now.with_timezone(&schedule.timezone()),
            schedule,
            location,
            method_name,
            school,
            threshold_secs,
            selected_tab: Tab::default(),
            next: None,
            status: None,
        };
        app.tick(now);
        app
    }

    /// Recomputes the next prayer for `now`. Called on every redraw.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        self.now_local = now.with_timezone(&self.schedule.timezone());
        let next: Option<NextEvent> = next_prayer(&self.schedule, now);

        if let Some(previous) = &self.next {
            let moved_on: bool = next.as_ref().map(|n| n.at() != previous.at()).unwrap_or(true);
            if moved_on && !previous.is_tomorrow() {
                info!("App: {} has begun", previous.label());
                self.status = Some(format!("{} time has begun!", previous.label()));
            }
        }
        self.next = next;
    }

    pub fn urgency(&self) -> Option<Urgency> {
        self.next.as_ref().map(|n| Urgency::of(n.seconds_remaining(), self.threshold_secs))
    }

    pub fn can_remind(&self) -> bool {
        self.urgency() == Some(Urgency::Imminent)
    }

    pub fn set_status(&mut self, status: String) {
        self.status = Some(status);
    }

    // --- Key Handler ---
    pub fn on_key(&mut self, key: KeyCode) -> Option<UiAction> {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                None
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Right | KeyCode::Left => {
                self.selected_tab = self.selected_tab.toggle();
                None
            }
            KeyCode::Char('s') => match &self.next {
                Some(next) if self.can_remind() => {
                    Some(UiAction::SendReminder { event: next.label(), time: next.time_str() })
                }
                Some(_) => {
                    self.status = Some(format!(
                        "Reminders can be sent within {} minutes of the next prayer.",
                        self.threshold_secs / 60
                    ));
                    None
                }
                None => {
                    self.status = Some("No upcoming prayer to remind about.".to_string());
                    None
                }
            },
            _ => None,
        }
    }
}

pub fn start_ui(mut app: App, notifier: Arc<dyn Notifier>) -> Result<()> {
    // Set up the terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app_loop(&mut terminal, &mut app, notifier.as_ref());

    // Restore the terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = &res {
        error!("App: loop ended with error: {}", e);
    }
    res
}

pub fn run_app_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    notifier: &dyn Notifier,
) -> Result<()> {
    while !app.should_quit {
        app.tick(Utc::now());
        terminal.draw(|f| crate::ui::ui(f, app))?;

        if event::poll(std::time::Duration::from_millis(250))? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(UiAction::SendReminder { event, time }) = app.on_key(key_event.code) {
                    app.set_status(format!("Sending reminder for {}...", event));
                    terminal.draw(|f| crate::ui::ui(f, app))?;
                    // The loop is synchronous; borrow the runtime for the one request.
                    let outcome: NotifyOutcome = tokio::task::block_in_place(|| {
                        tokio::runtime::Handle::current().block_on(notifier.notify(&event, &time))
                    });
                    app.set_status(outcome.to_string());
                }
            }
        }
    }

    Ok(())
}
