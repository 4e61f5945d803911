//! geomemo command-line host.
//!
//! # Responsibility
//! - Manage memos in a local database (`add`, `list`, `done`, `show`, `near`).
//! - Host the monitoring pipeline against a scripted fix track (`run`).

mod adapters;

use adapters::{ConsolePrompt, EnvPermissions, ScriptedFixSource};
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use geomemo_core::{
    init_logging, planar_distance_meters, GeoPoint, LifecycleController, Memo, MemoDraft,
    MemoService, MemoStore, MonitorConfig, MonitorDeps, MonitorSupervisor, NotificationBoard,
    NotificationEvent, ProcessControl, ProximityEvaluator, SqliteMemoStore,
};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "geomemo")]
#[command(author, version, about = "Location-aware memo reminders")]
#[command(propagate_version = true)]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "GEOMEMO_DB", default_value = "geomemo.db", global = true)]
    db: PathBuf,

    /// Absolute directory for rolling log files (logging is off when unset)
    #[arg(long, env = "GEOMEMO_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, env = "GEOMEMO_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a memo, optionally anchored to a location
    Add {
        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        description: String,

        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Reminder time in unix epoch milliseconds
        #[arg(long, default_value_t = 0)]
        reminder_date: i64,
    },

    /// List open memos
    List {
        /// Include done memos
        #[arg(short, long)]
        all: bool,
    },

    /// Mark a memo as done
    Done { id: Uuid },

    /// Print one memo
    Show { id: Uuid },

    /// List open memos near a point
    Near {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        /// Search radius in meters (defaults to the monitoring radius)
        #[arg(long)]
        radius: Option<f64>,
    },

    /// Run monitoring against a file of `lat,lon` fixes
    Run {
        script: PathBuf,

        /// Real-time delay between delivered fixes
        #[arg(long, default_value_t = 500)]
        pace_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Some(log_dir) = &cli.log_dir {
        let level = cli
            .log_level
            .as_deref()
            .unwrap_or_else(|| geomemo_core::default_log_level());
        let log_dir = log_dir
            .to_str()
            .ok_or_else(|| anyhow!("log dir must be valid UTF-8"))?;
        init_logging(level, log_dir).map_err(|err| anyhow!(err))?;
    }

    let config = MonitorConfig::from_env();
    let store = SqliteMemoStore::open(&cli.db)
        .with_context(|| format!("failed to open database `{}`", cli.db.display()))?;

    match cli.command {
        Commands::Add {
            title,
            description,
            lat,
            lon,
            reminder_date,
        } => {
            let mut draft = MemoDraft::new(title, description).with_reminder_date(reminder_date);
            if let (Some(lat), Some(lon)) = (lat, lon) {
                draft = draft.with_location(GeoPoint::new(lat, lon));
            }
            let service = MemoService::new(store, Arc::new(NotificationBoard::new()));
            let memo = service.create_memo(draft).await?;
            println!("{}", memo.id);
        }
        Commands::List { all } => {
            let service = MemoService::new(store, Arc::new(NotificationBoard::new()));
            for memo in service.list_memos(all).await? {
                println!("{}", memo_line(&memo));
            }
        }
        Commands::Done { id } => {
            let service = MemoService::new(store, Arc::new(NotificationBoard::new()));
            let memo = service.complete_memo(id).await?;
            println!("{}", memo_line(&memo));
        }
        Commands::Show { id } => {
            let memo = store
                .get_by_id(id)
                .await?
                .ok_or_else(|| anyhow!("memo not found: {id}"))?;
            println!("{}", memo_line(&memo));
            if !memo.description.is_empty() {
                println!("  {}", memo.description);
            }
        }
        Commands::Near { lat, lon, radius } => {
            let center = GeoPoint::new(lat, lon);
            let radius = radius.unwrap_or(config.radius_meters);
            for memo in store.find_near(center, radius).await? {
                println!("{}", near_line(&memo, center));
            }
        }
        Commands::Run { script, pace_ms } => {
            run_monitoring(store, config, &script, Duration::from_millis(pace_ms)).await?;
        }
    }

    Ok(())
}

async fn run_monitoring(
    store: SqliteMemoStore,
    config: MonitorConfig,
    script: &Path,
    pace: Duration,
) -> anyhow::Result<()> {
    let fix_source = Arc::new(ScriptedFixSource::from_file(script, pace)?);
    let store: Arc<dyn MemoStore> = Arc::new(store);
    let board = Arc::new(NotificationBoard::new());
    let permissions = Arc::new(EnvPermissions);

    let evaluator = Arc::new(ProximityEvaluator::new(
        Arc::clone(&store),
        board.clone(),
        &config,
    ));
    let supervisor = MonitorSupervisor::new(MonitorDeps {
        evaluator,
        fix_source,
        permissions: permissions.clone(),
        notifier: board.clone(),
        request: config.fix_request(),
    });
    let controller = Arc::new(LifecycleController::new(
        Arc::clone(&store),
        permissions,
        Arc::new(ConsolePrompt),
        Arc::new(supervisor.clone()),
        board.clone(),
    ));

    let shutdown = CancellationToken::new();
    let printer = tokio::spawn(print_events(board.clone(), shutdown.clone()));

    let state = controller.on_boot_completed().await?;
    info!("event=cli_run module=cli status=ok state={state:?}");
    let observer = controller.spawn_observer(shutdown.clone());

    if supervisor.is_monitoring_running() {
        tokio::select! {
            _ = supervisor.wait_until_stopped() => {}
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    warn!("event=cli_run module=cli status=error error={err}");
                }
                supervisor.stop_and_wait().await;
            }
        }
    } else {
        eprintln!("monitoring not started (state: {state:?})");
    }

    shutdown.cancel();
    observer.await.context("lifecycle observer failed")?;
    printer.await.context("event printer failed")?;

    if let Some(failure) = supervisor.take_failure() {
        return Err(anyhow!(failure));
    }
    Ok(())
}

async fn print_events(board: Arc<NotificationBoard>, shutdown: CancellationToken) {
    let mut events = board.subscribe();
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(event) => print_event(&event),
            Err(RecvError::Lagged(skipped)) => {
                warn!("event=cli_print module=cli status=lagged skipped={skipped}");
            }
            Err(RecvError::Closed) => return,
        }
    }
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
}

fn print_event(event: &NotificationEvent) {
    match event {
        NotificationEvent::MemoAlerted {
            memo_id,
            title,
            body,
        } => println!("[alert] {memo_id} {title}: {body}"),
        NotificationEvent::MemoUpdated {
            memo_id,
            title,
            body,
        } => println!("[update] {memo_id} {title}: {body}"),
        NotificationEvent::MemoDismissed { memo_id } => println!("[dismiss] {memo_id}"),
        NotificationEvent::MonitoringStatusShown => println!("[status] monitoring nearby memos"),
        NotificationEvent::MonitoringStatusCleared => println!("[status] monitoring stopped"),
        NotificationEvent::MonitoringFailed { reason } => println!("[failure] {reason}"),
    }
}

fn memo_line(memo: &Memo) -> String {
    let status = if memo.done { "done" } else { "open" };
    match memo.location {
        Some(point) => format!("{} [{status}] {} @ {point}", memo.id, memo.title),
        None => format!("{} [{status}] {}", memo.id, memo.title),
    }
}

fn near_line(memo: &Memo, center: GeoPoint) -> String {
    match memo.location {
        Some(point) => format!(
            "{} ({:.0} m)",
            memo_line(memo),
            planar_distance_meters(center, point)
        ),
        None => memo_line(memo),
    }
}
