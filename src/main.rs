//! Tollgate
//!
//! Dynamic RBAC engine with an HTTP admin API.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tollgate::{
    config::{AppConfig, DatabaseConfig, LogFormat, load_config},
    declarations::{DeclarationRegistry, DeclarationScanner},
    seed::seed_roles,
    server::{AppState, ListenConfig, run_server},
    store::{AccessStore, SqliteStore},
    sync::PermissionSync,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Tollgate - role-based access control with permission sync
#[derive(Parser, Debug)]
#[command(name = "tollgate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "TOLLGATE_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides logging.level
    #[arg(long, env = "TOLLGATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Admin API host; overrides server.host
    #[arg(long, env = "TOLLGATE_HOST")]
    host: Option<String>,

    /// Admin API port; overrides server.port
    #[arg(long, env = "TOLLGATE_PORT")]
    port: Option<u16>,

    /// SQLite URL; overrides database.url
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Seed roles, sync permissions (unless disabled) and serve the admin API
    #[default]
    Serve,
    /// Run one permission sync pass and print the report as JSON
    Sync,
    /// Print the permissions discovered from handler declarations
    Scan,
}

fn init_logging(config: &AppConfig, override_level: Option<&str>) {
    let level = override_level.unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

/// Connect to the configured database and apply migrations
async fn open_store(config: &DatabaseConfig) -> anyhow::Result<Arc<SqliteStore>> {
    let store = SqliteStore::connect(config)
        .await
        .inspect_err(|e| error!(error = %e, url = %config.url, "Failed to open database"))?;

    if config.run_migrations {
        store
            .migrate()
            .await
            .inspect_err(|e| error!(error = %e, "Database migration failed"))?;
    }

    Ok(Arc::new(store))
}

/// Seed roles and run the startup sync when enabled
async fn prepare(
    config: &AppConfig,
    store: &dyn AccessStore,
    sync: &PermissionSync,
) -> anyhow::Result<()> {
    seed_roles(store, &config.seed)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to seed roles"))?;

    if config.should_auto_sync_on_startup() {
        // Keep serving; the admin trigger can rerun the sync
        if let Err(e) = sync.run().await {
            warn!(error = %e, "Startup permission sync failed");
        }
    } else {
        info!(
            environment = %config.server.environment,
            "Startup permission sync disabled"
        );
    }

    Ok(())
}

async fn serve(
    args: &Args,
    config: AppConfig,
    registry: Arc<DeclarationRegistry>,
) -> anyhow::Result<()> {
    let sqlite = open_store(&config.database).await?;
    let store: Arc<dyn AccessStore> = sqlite.clone();
    let state = AppState::new(&config, store.clone(), registry)
        .inspect_err(|e| error!(error = %e, "Failed to build application state"))?;

    prepare(&config, store.as_ref(), &state.sync).await?;

    let host = args.host.as_deref().unwrap_or(&config.server.host);
    let port = args.port.unwrap_or(config.server.port);
    let listen = ListenConfig::new(host, port)
        .inspect_err(|e| error!(error = %e, host, port, "Invalid listen address"))?;

    let result = run_server(listen, state, CancellationToken::new()).await;
    sqlite.close().await;
    result
}

async fn sync_once(config: AppConfig, registry: Arc<DeclarationRegistry>) -> anyhow::Result<()> {
    let sqlite = open_store(&config.database).await?;
    let store: Arc<dyn AccessStore> = sqlite.clone();
    seed_roles(store.as_ref(), &config.seed).await?;

    let sync = PermissionSync::build(registry, store, &config.auto_assign)?;
    let report = sync
        .run()
        .await
        .inspect_err(|e| error!(error = %e, "Permission sync failed"))?;
    sqlite.close().await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn scan(registry: Arc<DeclarationRegistry>) {
    let scanned = DeclarationScanner::new(registry).scan();
    let width = scanned.keys().map(String::len).max().unwrap_or(0);

    for (slug, location) in &scanned {
        println!("{:<width$}  {}", slug, location, width = width);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let mut config = load_config(args.config.as_deref())?;
    if let Some(url) = &args.database_url {
        config.database.url = url.clone();
    }

    // Initialize logging
    init_logging(&config, args.log_level.as_deref());

    let registry = Arc::new(DeclarationRegistry::discovered());
    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.server.environment,
        declarations = registry.len(),
        database = %config.database.url,
        "Starting tollgate"
    );

    match args.command.unwrap_or_default() {
        Command::Serve => serve(&args, config, registry).await,
        Command::Sync => sync_once(config, registry).await,
        Command::Scan => {
            scan(registry);
            Ok(())
        }
    }
}
