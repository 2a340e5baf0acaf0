//! Gatekeeper - authenticated, rate-limited HTTP API service
//!
//! Loads configuration, initialises logging and storage, then serves the API
//! behind the gatekeeping pipeline.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use config::LogFormat;
use gatekeeper::{
    api, config, db,
    middleware::spawn_rate_limit_cleanup,
    models::Permission,
    services::{
        auth::{DEFAULT_ITERATIONS, DEFAULT_MEMORY_KIB},
        PasswordHasher,
    },
    utils::SystemClock,
    AppConfig, AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    // Check for --help flag
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    // Check for --version flag
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("Gatekeeper {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Check for --hash-password flag
    if let Some(pos) = args.iter().position(|arg| arg == "--hash-password") {
        let Some(password) = args.get(pos + 1) else {
            bail!("--hash-password requires a password argument");
        };
        let hasher = PasswordHasher::new(DEFAULT_MEMORY_KIB, DEFAULT_ITERATIONS)?;
        let hash = hasher.hash_password(password)?;
        println!("{}", hash);
        return Ok(());
    }

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    // The guard must be kept alive for the duration of the program
    // to ensure log messages are flushed to files
    let _log_guard = init_logging(&config);

    info!("Gatekeeper starting up");
    info!(
        issuer = %config.auth.issuer,
        audience = %config.auth.audience,
        request_limit = config.rate_limit.request_limit,
        window_secs = config.rate_limit.window_secs,
        "Configuration loaded successfully"
    );

    // Ensure data directory exists
    ensure_data_directory(&config)?;

    // Initialize database connection pool
    info!("Initializing database connection");
    let pool = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database")?;

    let hasher = Arc::new(
        config
            .auth
            .password_hasher()
            .context("Failed to initialize password hashing")?,
    );

    bootstrap_admin(&pool, &hasher).await?;

    let clock = Arc::new(SystemClock);
    let state = AppState::new(
        config.clone(),
        Arc::new(db::SqliteIdentityStore::new(pool.clone(), hasher)),
        Arc::new(db::SqlitePermissionStore::new(pool)),
        clock,
    )?;

    let limiter = state.rate_limiter();
    let _cleanup = spawn_rate_limit_cleanup(limiter.clone());

    let app = api::create_router(state, limiter);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address configuration")?;

    info!("Starting HTTP server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("HTTP server is ready to accept connections");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    info!("Gatekeeper stopped");
    Ok(())
}

/// Seed an administrator on an empty user table
///
/// Reads `GATEKEEPER_BOOTSTRAP_ADMIN` and `GATEKEEPER_BOOTSTRAP_PASSWORD`;
/// the user is granted every permission.
async fn bootstrap_admin(pool: &db::DbPool, hasher: &PasswordHasher) -> Result<()> {
    let (Ok(name), Ok(password)) = (
        env::var("GATEKEEPER_BOOTSTRAP_ADMIN"),
        env::var("GATEKEEPER_BOOTSTRAP_PASSWORD"),
    ) else {
        return Ok(());
    };

    let repo = db::UserRepository::new(pool.clone());
    if repo.count().await? > 0 {
        info!("Users already exist, skipping bootstrap admin");
        return Ok(());
    }

    if password.len() < 8 {
        warn!("Bootstrap password is shorter than 8 characters");
    }

    let hash = hasher.hash_password(&password)?;
    let user = repo.create(&name, &hash).await?;
    for permission in Permission::all() {
        repo.grant(user.id, permission).await?;
    }

    info!(user = %user.name, id = user.id, "Bootstrap admin created");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Initialize the logging/tracing infrastructure
fn init_logging(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use config::LogTarget;
    use tracing_subscriber::{prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let log_config = &config.logging;

    match &log_config.target {
        LogTarget::Console => {
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_console_logging(subscriber, &log_config.format);
            None
        }
        LogTarget::File => {
            let (writer, guard) = create_file_writer(log_config);
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_file_logging(subscriber, &log_config.format, writer);
            Some(guard)
        }
        LogTarget::Both => {
            let (writer, guard) = create_file_writer(log_config);
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_both_logging(subscriber, &log_config.format, writer);
            Some(guard)
        }
    }
}

/// Create a file writer with optional daily rotation
fn create_file_writer(
    log_config: &config::LoggingConfig,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    if let Err(e) = std::fs::create_dir_all(&log_config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_config.log_dir, e
        );
    }

    let file_appender = if log_config.daily_rotation {
        tracing_appender::rolling::daily(&log_config.log_dir, &log_config.log_prefix)
    } else {
        tracing_appender::rolling::never(&log_config.log_dir, &log_config.log_prefix)
    };

    tracing_appender::non_blocking(file_appender)
}

fn init_console_logging<S>(subscriber: S, format: &LogFormat)
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::{fmt, prelude::*};

    match format {
        LogFormat::Json => subscriber.with(fmt::layer().json()).init(),
        LogFormat::Compact => subscriber.with(fmt::layer().compact().with_target(false)).init(),
        LogFormat::Pretty => subscriber.with(fmt::layer().with_target(true)).init(),
    }
}

fn init_file_logging<S>(
    subscriber: S,
    format: &LogFormat,
    writer: tracing_appender::non_blocking::NonBlocking,
) where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::{fmt, prelude::*};

    match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_writer(writer))
            .init(),
        LogFormat::Compact => subscriber
            .with(fmt::layer().compact().with_target(false).with_writer(writer))
            .init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .init(),
    }
}

fn init_both_logging<S>(
    subscriber: S,
    format: &LogFormat,
    writer: tracing_appender::non_blocking::NonBlocking,
) where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::{fmt, prelude::*};

    match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json()) // Console
            .with(fmt::layer().json().with_writer(writer)) // File
            .init(),
        LogFormat::Compact => subscriber
            .with(fmt::layer().compact().with_target(false))
            .with(fmt::layer().compact().with_target(false).with_writer(writer))
            .init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().with_target(true))
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .init(),
    }
}

/// Ensure the data directory exists
fn ensure_data_directory(config: &AppConfig) -> Result<()> {
    if let Some(path) = config.database.url.strip_prefix("sqlite://") {
        let path = path.split('?').next().unwrap_or(path);
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create data directory")?;
                info!("Created data directory: {:?}", parent);
            }
        }
    }
    Ok(())
}

/// Print help message
fn print_help() {
    println!(
        r#"Gatekeeper {}

USAGE:
    gatekeeper [OPTIONS]

OPTIONS:
    -h, --help                  Print this help message
    -V, --version               Print version information
    --hash-password <PASSWORD>  Print an Argon2id hash for seeding a user

ENVIRONMENT:
    GATEKEEPER_CONFIG               Path to configuration file
    GATEKEEPER_SIGNING_KEY          Token signing key (at least 16 bytes)
    GATEKEEPER_RATE_LIMIT           Requests per client per window
    GATEKEEPER_RATE_WINDOW_SECS     Rate limit window length
    GATEKEEPER_BOOTSTRAP_ADMIN      Admin user created on an empty database
    GATEKEEPER_BOOTSTRAP_PASSWORD   Password for the bootstrap admin

CONFIGURATION:
    The application looks for configuration files in the following order:
    1. Path specified by GATEKEEPER_CONFIG environment variable
    2. ./config.yaml
    3. ./config/config.yaml
    4. /etc/gatekeeper/config.yaml
    5. The user configuration directory (gatekeeper/config.yaml)"#,
        env!("CARGO_PKG_VERSION")
    );
}
