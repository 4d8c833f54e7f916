//! hearth-he (Heat Engine) - Nightly group momentum computation
//!
//! Computes daily completion rates, advances momentum scores, classifies
//! tiers and emits tier-transition events. Runs either as a one-shot batch
//! (`--once`, for cron) or as a resident service exposing the control API
//! on port 5740.

use anyhow::Result;
use clap::Parser;
use hearth_common::config;
use hearth_common::events::EventBus;
use hearth_common::params::load_params_from_db;
use hearth_common::time;
use hearth_he::{backfill, build_router, AppState};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "hearth-he", about = "Hearth heat engine")]
struct Args {
    /// Root folder override (highest-priority resolution tier)
    #[arg(long)]
    root_folder: Option<String>,

    /// Target date for the batch (YYYY-MM-DD), default today UTC
    #[arg(long)]
    date: Option<String>,

    /// Run one batch and exit instead of serving the control API
    #[arg(long)]
    once: bool,

    /// Backfill rate history and state from this date (YYYY-MM-DD)
    #[arg(long)]
    backfill_from: Option<String>,

    /// Backfill end date (YYYY-MM-DD), default yesterday UTC
    #[arg(long)]
    backfill_to: Option<String>,

    /// Listen port for the control API
    #[arg(long, default_value_t = 5740)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // [HEARTH-INIT-003] Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // [HEARTH-INIT-004] Log build identification immediately after tracing init
    info!(
        "Starting Hearth Heat Engine (hearth-he) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref());
    config::ensure_root_folder(&root_folder)?;
    let db_path = config::database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = hearth_common::db::init_database(&db_path).await?;

    // Malformed settings are a global blocker: abort before any run
    if let Err(e) = load_params_from_db(&pool).await {
        error!("Configuration error, refusing to start: {}", e);
        return Err(e.into());
    }

    let events = EventBus::new(1000);

    if let Some(from) = &args.backfill_from {
        let from = time::parse_date(from)?;
        let to = match &args.backfill_to {
            Some(s) => time::parse_date(s)?,
            None => time::default_target_date()
                .pred_opt()
                .expect("yesterday exists"),
        };
        let count = backfill::backfill_all(&pool, &events, from, to).await?;
        info!("Backfill finished for {} groups", count);
        return Ok(());
    }

    let state = AppState::new(pool, events);

    if args.once {
        let target_date = match &args.date {
            Some(s) => time::parse_date(s)?,
            None => time::default_target_date(),
        };
        let summary = state.driver.run(target_date).await?;
        info!(
            "One-shot batch for {} complete: {} succeeded, {} failed, {} skipped",
            summary.date, summary.succeeded, summary.failed, summary.skipped
        );
        if summary.failed > 0 {
            std::process::exit(1);
        }
        return Ok(());
    }

    let app = build_router(state);
    let addr = format!("127.0.0.1:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("hearth-he listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
