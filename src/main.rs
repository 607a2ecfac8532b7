use clap::Parser;
use log::{error, info, warn};
use serde_json::Value;
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};
use usagelock_lib::clock::{Clock, MonotonicClock};
use usagelock_lib::config::{default_config_path, Settings};
use usagelock_lib::db::{migrations, Database};
use usagelock_lib::host::{spawn_reader, ControlHost};
use usagelock_lib::lock::ChannelPresenter;
use usagelock_lib::probe::{ForegroundProbe, SqliteEventSource};
use usagelock_lib::service::SessionHandle;
use usagelock_lib::session::{Session, SessionOptions};
use usagelock_lib::tracker::{TrackerConfig, TrackerService};
use usagelock_lib::AppError;

/// Lock the screen once a daily budget for one app is used up.
///
/// Speaks the length-prefixed JSON control protocol on stdin/stdout; logs go
/// to stderr.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// App id to meter (bundle id on macOS, WM_CLASS instance on X11)
    #[arg(long)]
    target: Option<String>,

    /// Usage budget in minutes
    #[arg(long)]
    limit_minutes: Option<String>,

    /// Config file (defaults to config.json in the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Foreground event database
    #[arg(long)]
    database: Option<PathBuf>,

    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Level forced by `-v` flags. Without any, `RUST_LOG` decides (warn if unset).
fn verbosity_level(verbose: u8) -> Option<log::LevelFilter> {
    match verbose {
        0 => None,
        1 => Some(log::LevelFilter::Info),
        2 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    }
}

fn setup_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = verbosity_level(verbose) {
        builder.filter_level(level);
    }
    builder.init();
}

fn load_settings(cli: &Cli) -> Result<Settings, AppError> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut settings = Settings::load(&path)?;

    if let Some(target) = &cli.target {
        settings.target_app_id = Some(target.clone());
    }
    if let Some(limit) = &cli.limit_minutes {
        settings.usage_limit_minutes = Some(Value::String(limit.clone()));
    }
    if let Some(database) = &cli.database {
        settings.database_path = Some(database.clone());
    }
    Ok(settings)
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let settings = load_settings(cli)?;
    let monitor_config = settings.monitor_config()?;

    let db_path = settings.resolve_database_path()?;
    info!("Foreground event log: {}", db_path.display());
    let db = Database::open(&db_path)?;
    migrations::run(db.connection())?;
    let db = Arc::new(Mutex::new(db));

    let tracker = TrackerService::new(
        Arc::clone(&db),
        TrackerConfig {
            poll_interval_ms: settings.recorder_poll_ms,
            retention_ms: settings.event_retention_ms(),
            heartbeat_ms: settings.recorder_heartbeat_ms(),
        },
    );
    let tracker_thread = tracker.start();

    let probe = ForegroundProbe::new(Box::new(SqliteEventSource::new(Arc::clone(&db))), &settings.self_app_id)
        .with_lookback(settings.probe_lookback_ms);
    let (overlay_tx, overlay_rx) = crossbeam_channel::unbounded();
    let options = SessionOptions::from(&settings);
    let clock = MonotonicClock::new();

    info!(
        "Metering {} with a budget of {} ms",
        monitor_config.target_app_id(),
        monitor_config.usage_limit_millis()
    );
    let session = Session::start(
        monitor_config,
        Box::new(probe),
        ChannelPresenter::new(overlay_tx),
        options,
        clock.now_millis(),
    );
    let handle = SessionHandle::spawn(session, options, clock)?;

    let incoming = spawn_reader(std::io::stdin());
    let served = ControlHost::new(handle).run(&incoming, &overlay_rx, &mut std::io::stdout().lock());

    tracker.stop();
    if tracker_thread.join().is_err() {
        warn!("Foreground recorder thread panicked");
    }

    served
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        error!("{e}");
        process::exit(1);
    }
}
