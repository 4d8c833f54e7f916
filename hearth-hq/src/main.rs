//! hearth-hq (Heat Query) - Read-only momentum query service
//!
//! Serves current momentum state, projected score history and the tier
//! boundary table over HTTP. Never writes to the shared database.
//!
//! [HEARTH-HQ-NF-010]: Zero-config startup
//! [HEARTH-HQ-NF-020]: Read-only database access
//! [HEARTH-HQ-NF-050]: Port 5741

use anyhow::Result;
use clap::Parser;
use hearth_common::config;
use hearth_common::params::load_params_from_db;
use hearth_hq::{build_router, AppState};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "hearth-hq", about = "Hearth heat query service")]
struct Args {
    /// Root folder override (highest-priority resolution tier)
    #[arg(long)]
    root_folder: Option<String>,

    /// Listen port
    #[arg(long, default_value_t = 5741)]
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
        "Starting Hearth Heat Query (hearth-hq) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref());
    let db_path = config::database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = match hearth_hq::db::connect_readonly(&db_path).await {
        Ok(pool) => {
            info!("Connected to database (read-only)");
            pool
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    // Tier labels and the history cap come from the settings table; a
    // malformed value is a global blocker here just as in the engine
    if let Err(e) = load_params_from_db(&pool).await {
        error!("Configuration error, refusing to start: {}", e);
        return Err(e.into());
    }

    let state = AppState::new(pool);
    let app = build_router(state);

    let addr = format!("127.0.0.1:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("hearth-hq listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
