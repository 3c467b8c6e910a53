use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use persona_agent::TelegramConfig;
use persona_api::{
    bootstrap::{build_agent, connect_store, openai_client},
    build_router,
    cli::{run_chat, Cli, Commands},
    config::Config,
    logging::init_logging,
    state::AppState,
};
use persona_persist::{restore_from, PersistenceClient};
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config.logging);

    match cli.command() {
        Commands::Serve => serve(config).await,
        Commands::Chat { session } => chat(config, &session).await,
        Commands::Backup { dest } => backup(config, &dest).await,
        Commands::Restore { src, force } => {
            restore_from(&src, Path::new(&config.database.path), force).await?;
            println!("Restored {} to {}", src.display(), config.database.path);
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting Persona API server");

    let client = openai_client(&config)?;
    let store = connect_store(&config).await?;
    let telegram = TelegramConfig::from_env();
    let agent = build_agent(&config, client, &telegram, Arc::new(store.clone()))?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(
        config,
        agent,
        Arc::new(store.clone()),
        telegram.is_configured(),
    ));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("API docs: http://{}/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn chat(config: Config, session: &str) -> anyhow::Result<()> {
    let client = openai_client(&config)?;
    let store = connect_store(&config).await?;
    let agent = build_agent(
        &config,
        client,
        &TelegramConfig::from_env(),
        Arc::new(store.clone()),
    )?;

    let stdin = BufReader::new(tokio::io::stdin());
    let result = run_chat(&agent, session, stdin, tokio::io::stdout()).await;

    store.close().await;
    result
}

async fn backup(config: Config, dest: &Path) -> anyhow::Result<()> {
    let store = connect_store(&config).await?;
    let result = store.backup_to(dest).await;
    store.close().await;

    result?;
    println!("Backed up {} to {}", config.database.path, dest.display());
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
