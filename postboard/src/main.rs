use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use postboard_core::api::server::shutdown_signal;
use postboard_core::api::{ApiServer, AppState};
use postboard_core::config::AppConfig;
use postboard_core::logger::{self, Logger};
use postboard_core::middleware::ErrorHandling;
use postboard_core::observability::init_tracing;
use postboard_core::service::AuthService;
use postboard_core::storage::{MemoryStore, RedbStore};

mod seed;

#[derive(Parser)]
#[command(name = "postboard")]
#[command(about = "Users and posts REST API", long_about = None)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,

        /// Use a throwaway in-memory store
        #[arg(long)]
        in_memory: bool,
    },
    /// Insert demo users and posts
    Seed {
        /// Number of users to create
        #[arg(long, default_value_t = 5)]
        users: usize,

        /// Posts written by each user
        #[arg(long, default_value_t = 2)]
        posts_per_user: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    init_tracing(&config.logging).context("failed to initialise tracing")?;
    logger::init(config.logging.service_name.clone(), env!("CARGO_PKG_VERSION"));
    let logger = logger::global().clone();

    match cli.command {
        Commands::Serve { port, in_memory } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            config.database.in_memory |= in_memory;
            serve(config, logger).await
        }
        Commands::Seed {
            users,
            posts_per_user,
        } => {
            let state = build_state(&config, logger)?;
            let summary = seed::run(&state, users, posts_per_user).await?;
            tracing::info!(
                users = summary.users,
                posts = summary.posts,
                "Seeding complete"
            );
            Ok(())
        }
    }
}

async fn serve(config: AppConfig, logger: Logger) -> Result<()> {
    let state = build_state(&config, logger.clone())?;
    let handling = ErrorHandling::new(config.errors.handler_config(), logger);

    ApiServer::new(config.server.clone(), state, handling)
        .serve(shutdown_signal())
        .await
        .context("server failed")
}

fn build_state(config: &AppConfig, logger: Logger) -> Result<AppState> {
    let auth = AuthService::with_settings(
        &config.auth.secret_key,
        config.auth.token_ttl,
        config.auth.issuer.clone(),
    );

    if config.database.in_memory {
        tracing::warn!("Using in-memory storage; data is lost on exit");
        return Ok(AppState::from_store(Arc::new(MemoryStore::new()), auth, logger));
    }

    let store = RedbStore::open(&config.database.path).with_context(|| {
        format!("failed to open database at {}", config.database.path.display())
    })?;
    tracing::info!(path = %config.database.path.display(), "Opened database");
    Ok(AppState::from_store(Arc::new(store), auth, logger))
}
