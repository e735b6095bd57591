use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use log::info;
use salahwatch::app::{self, App};
use salahwatch::config::{Overrides, Settings};
use salahwatch::location::{CityGeocoder, FixedLocation, IpLocator, Located, LocationProvider};
use salahwatch::logging;
use salahwatch::methods::{CALCULATION_METHODS, Madhab, REGION_RECOMMENDATIONS, lookup_method};
use salahwatch::notifier::{Notifier, SmsNotifier};
use salahwatch::prayer::DailySchedule;
use salahwatch::schedule::{Urgency, next_prayer};
use salahwatch::timings_api::{AladhanFetcher, TimingsFetcher, TimingsQuery};
use salahwatch::watch::{CycleReport, ReminderLoop};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TUI_LOG_FILE: &str = "salahwatch.log";

#[derive(Debug, Parser)]
#[command(name = "salahwatch", about = "Islamic prayer times with a next-prayer countdown and reminders")]
struct Cli {
    /// TOML settings file (default: ./salahwatch.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true, allow_negative_numbers = true)]
    lat: Option<f64>,
    #[arg(long, global = true, allow_negative_numbers = true)]
    lon: Option<f64>,
    /// City to geocode instead of coordinates, e.g. "Karachi, Pakistan"
    #[arg(long, global = true)]
    city: Option<String>,
    /// Calculation method id (see `methods`)
    #[arg(long, global = true)]
    method: Option<u8>,
    /// Asr juristic school: 0 Shafi'i/Maliki/Hanbali, 1 Hanafi
    #[arg(long, global = true)]
    school: Option<u8>,
    /// Send reminders this many seconds before a prayer
    #[arg(long, global = true)]
    threshold: Option<u64>,
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print today's schedule and the next prayer
    Show,
    /// Live countdown in the terminal
    Watch,
    /// Check periodically and send an SMS reminder before each prayer
    Notify {
        /// Run a single check and exit
        #[arg(long)]
        once: bool,
    },
    /// List calculation methods and regional recommendations
    Methods,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let command: Command = cli.command.unwrap_or(Command::Show);

    let log_file: Option<PathBuf> = match (&command, &cli.log_file) {
        (_, Some(path)) => Some(path.clone()),
        (Command::Watch, None) => Some(PathBuf::from(DEFAULT_TUI_LOG_FILE)),
        _ => None,
    };
    logging::init(cli.verbose, log_file.as_deref())?;

    if let Command::Methods = command {
        print_methods();
        return Ok(());
    }

    let mut settings: Settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    settings.apply_overrides(Overrides {
        latitude: cli.lat,
        longitude: cli.lon,
        city: cli.city,
        method: cli.method,
        school: cli.school,
        reminder_threshold_secs: cli.threshold,
    })?;
    info!("main: settings loaded: {:?}", settings);

    let located: Located = location_provider(&settings)?
        .locate()
        .await
        .context("Could not determine your location. Pass --city, or --lat and --lon, or set [location] in the config")?;
    let query = TimingsQuery { coordinates: located.coordinates, method: settings.method, school: settings.school };
    let fetcher: Arc<AladhanFetcher> = Arc::new(AladhanFetcher::new(&settings.api_base_url)?);
    let notifier: Arc<SmsNotifier> =
        Arc::new(SmsNotifier::new(settings.twilio.clone(), &settings.twilio_base_url)?);
    let method_name: String =
        lookup_method(settings.method).map(|m| m.name.to_string()).unwrap_or_default();

    match command {
        Command::Show => {
            let schedule: DailySchedule = fetch_schedule(fetcher.as_ref(), &query).await?;
            print_schedule(&located, &method_name, settings.school, &schedule, settings.reminder_threshold_secs);
        }
        Command::Watch => {
            let schedule: DailySchedule = fetch_schedule(fetcher.as_ref(), &query).await?;
            let app = App::new(schedule, located, method_name, settings.school, settings.reminder_threshold_secs);
            let notifier: Arc<dyn Notifier> = notifier;
            app::start_ui(app, notifier)?;
        }
        Command::Notify { once } => {
            if !notifier.is_configured() {
                eprintln!("warning: SMS is not configured; reminders will only be reported here.");
            }
            let threshold: u64 = settings.reminder_threshold_secs;
            let mut reminders = ReminderLoop::new(
                fetcher,
                notifier,
                query,
                threshold,
                settings.refresh_interval_secs,
            );
            println!("📡 Prayer time notifier for {}", located);
            if once {
                let report: CycleReport = reminders.run_cycle(Utc::now()).await;
                print_report(&report, threshold);
            } else {
                println!("Checking every {}s. Press Ctrl+C to stop.", settings.check_interval_secs);
                reminders
                    .run(Duration::from_secs(settings.check_interval_secs), |report| print_report(report, threshold))
                    .await;
            }
        }
        Command::Methods => {}
    }
    Ok(())
}

fn location_provider(settings: &Settings) -> Result<Box<dyn LocationProvider>> {
    if let Some(coordinates) = settings.coordinates()? {
        let label: Option<String> = settings.location.as_ref().and_then(|l| l.label.clone());
        return Ok(Box::new(FixedLocation::new(coordinates, label)));
    }
    match &settings.city {
        Some(city) => Ok(Box::new(CityGeocoder::new(city, &settings.geocoder_base_url)?)),
        None => Ok(Box::new(IpLocator::new()?)),
    }
}

async fn fetch_schedule(fetcher: &dyn TimingsFetcher, query: &TimingsQuery) -> Result<DailySchedule> {
    fetcher
        .fetch(query)
        .await
        .context("Failed to fetch prayer times. Please check your internet connection or try different settings")
}

fn print_schedule(located: &Located, method_name: &str, school: Madhab, schedule: &DailySchedule, threshold: u64) {
    println!("Location    : {}", located);
    println!("Method      : {}", method_name);
    println!("Asr method  : {}", school.label());
    print!("{}", schedule);

    let extra = schedule.timings().additional_times();
    if !extra.is_empty() {
        println!("\nAdditional times:");
        for (name, time) in extra {
            println!("  {:<10}: {}", name, time);
        }
    }

    println!();
    match next_prayer(schedule, Utc::now()) {
        Some(next) => {
            println!("🕓 Next prayer: {}", next);
            if Urgency::of(next.seconds_remaining(), threshold) == Urgency::Imminent {
                println!("🔔 Prayer time approaching!");
            }
            if next.is_tomorrow() {
                println!("✅ All prayers for today are complete.");
            }
        }
        None => println!("No upcoming prayer could be determined from today's timings."),
    }
}

fn print_report(report: &CycleReport, threshold: u64) {
    match report {
        CycleReport::LookupFailed(e) => eprintln!("❌ Failed to fetch prayer times: {}", e),
        CycleReport::NoNextEvent => println!("No upcoming prayer could be determined."),
        CycleReport::Waiting(next) => println!(
            "⏳ {}. Reminder goes out {} minutes before.",
            next,
            threshold / 60
        ),
        CycleReport::Reminded { next, outcome } => println!("📩 {}: {}", next.label(), outcome),
    }
}

fn print_methods() {
    println!("Calculation methods:");
    for method in CALCULATION_METHODS {
        println!("{}", method);
        println!("       {}", method.description);
    }
    println!("\nRegional recommendations:");
    for (region, id) in REGION_RECOMMENDATIONS {
        let name: &str = lookup_method(*id).map(|m| m.name).unwrap_or("?");
        println!("  {:<22} {:>3}  {}", region, id, name);
    }
}
