/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Buildrelay CLI application
//!
//! Provides the command-line interface for the buildrelay service: the
//! `serve` command runs the webhook relay, `create-user` provisions a relay
//! user with their builds.sr.ht credentials.

use buildrelay_server::api;
use buildrelay_server::dal::DAL;
use buildrelay_server::db::create_shared_connection_pool;
use buildrelay_server::state::AppState;
use buildrelay_utils::config::Settings;
use buildrelay_utils::logging::prelude::*;
use buildrelay_models::models::users::NewUser;
use clap::{Parser, Subcommand};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tokio::signal;

/// Embedded migrations for the database
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("../buildrelay-models/migrations");

/// Command-line interface structure
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a configuration file overriding the embedded defaults
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the CLI
#[derive(Subcommand)]
enum Commands {
    /// Start the buildrelay server
    Serve,
    /// Create or update a relay user with their builds.sr.ht token
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        oauth_token: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Settings::new(cli.config.clone()).expect("Failed to load configuration");

    buildrelay_utils::logging::init_with_format(&config.log.level, &config.log.format)
        .expect("Failed to initialize logger");

    match cli.command {
        Commands::Serve => serve(config).await?,
        Commands::CreateUser {
            username,
            oauth_token,
        } => create_user(&config, username, oauth_token)?,
    }
    Ok(())
}

/// Starts the relay server: pool, migrations, state, router, graceful
/// shutdown on ctrl+c.
async fn serve(config: Settings) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting buildrelay application");

    info!("Creating database connection pool");
    let connection_pool = create_shared_connection_pool(&config.database.url, 5);
    info!("Database connection pool created successfully");

    info!("Running pending database migrations");
    let mut conn = connection_pool
        .pool
        .get()
        .expect("Failed to get DB connection");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run migrations");
    info!("Database migrations completed successfully");
    drop(conn);

    if config.github.enabled() {
        info!("GitHub task kinds enabled");
    }
    if config.gitlab.enabled {
        info!("GitLab task kinds enabled");
    }

    info!("Initializing Data Access Layer");
    let dal = DAL::new(connection_pool.pool.clone());

    let addr = config.server.bind.clone();
    let state = AppState::new(dal, config);

    info!("Configuring API routes");
    let app = api::configure_api_routes().with_state(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
        shutdown_tx.send(()).ok();
    });

    info!("buildrelay is now running");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Shutdown signal received, stopping server");
        })
        .await?;

    Ok(())
}

/// Provisions a relay user. Running it again for the same username
/// refreshes their builds.sr.ht token.
fn create_user(
    config: &Settings,
    username: String,
    oauth_token: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let pool = create_shared_connection_pool(&config.database.url, 1);
    let dal = DAL::new(pool.pool.clone());

    let new_user = NewUser::new(username, oauth_token)?;
    let user = dal.users().upsert(&new_user)?;
    info!("User {} provisioned ({})", user.username, user.id);
    Ok(())
}
