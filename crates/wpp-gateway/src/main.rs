//! wpp-gateway: WhatsApp chatbot main binary
//!
//! Usage:
//!   wpp-gateway                       - Start the webhook server and workflow
//!   wpp-gateway --load-data <file>    - Load agent data items and exit
//!   wpp-gateway --help                - Show help

mod loader;
mod pipeline;

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use wpp_agent::{AgentAdapter, HttpAgentRuntime};
use wpp_core::storage::{change_stream, StreamConsumer};
use wpp_core::{Config, FileSecretStore, LocalParameterStore, SecretsHelper, SqliteTableStore};
use wpp_meta::MetaApi;

use crate::pipeline::{build_pipeline, Services};

/// Run mode
enum RunMode {
    /// Webhook server + workflow
    Server,
    /// Load a JSON file of items into the agent-data table
    LoadData(PathBuf),
    Help,
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = parse_args()?;

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("wpp-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;
    tracing::info!("Environment: {}", config.environment);

    match mode {
        RunMode::LoadData(path) => {
            let store = SqliteTableStore::new(
                &config.storage.db_path,
                &config.storage.agents_data_table,
            )?;
            loader::load_data(&store, &path).await?;
            Ok(())
        }
        RunMode::Server => run_server(config).await,
        _ => Ok(()),
    }
}

/// Parse command line arguments
fn parse_args() -> anyhow::Result<RunMode> {
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            "--load-data" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--load-data requires a file path"))?;
                return Ok(RunMode::LoadData(PathBuf::from(path)));
            }
            _ => {}
        }
    }

    Ok(RunMode::Server)
}

fn print_help() {
    println!("wpp-gateway - WhatsApp chatbot backend");
    println!();
    println!("Usage:");
    println!("  wpp-gateway                     Start the webhook server and workflow");
    println!("  wpp-gateway --load-data <file>  Load agent data items (JSON array) and exit");
    println!("  wpp-gateway --help              Show this help message");
    println!("  wpp-gateway --version           Show version");
    println!();
    println!("Configuration is read from wpp-gateway.toml when present.");
    println!();
    println!("Environment Variables:");
    println!("  ENVIRONMENT          Deployment environment (default: dev)");
    println!("  API_PORT             HTTP API port (default: 3000)");
    println!("  DB_PATH              SQLite database path");
    println!("  DYNAMODB_TABLE       Messages table name");
    println!("  TABLE_NAME           Agent data table name");
    println!("  SECRET_NAME          Secret holding Meta and webhook credentials");
    println!("  SECRETS_PATH         Local secrets file (default: secrets.json)");
    println!("  META_ENDPOINT        Graph API endpoint");
    println!("  META_API_VERSION     Graph API version (default: v20.0)");
    println!("  AGENT_RUNTIME_URL    Agent runtime base URL");
    println!("  AGENT_SESSION_ID     Agent session id (default: TempSessionBedrock)");
    println!("  AGENT_USER_ID        User whose data the action groups read");
    println!("  AGENT_ID             Agent id parameter value");
    println!("  AGENT_ALIAS_ID       Agent alias parameter value");
    println!("  EXECUTION_HISTORY    Finished executions kept (default: 1000)");
    println!("  STREAM_MAX_ATTEMPTS  Deliveries per stream record (default: 3)");
}

/// Run the webhook server and the change stream dispatcher
async fn run_server(config: Config) -> anyhow::Result<()> {
    let (stream_tx, stream_rx) = change_stream();

    let messages = Arc::new(
        SqliteTableStore::new(&config.storage.db_path, &config.storage.messages_table)?
            .with_stream(stream_tx),
    );
    let agents_data = Arc::new(SqliteTableStore::new(
        &config.storage.db_path,
        &config.storage.agents_data_table,
    )?);

    let secrets = Arc::new(SecretsHelper::new(
        config.secrets.secret_name.clone(),
        Arc::new(FileSecretStore::new(&config.secrets.path)),
    ));
    let parameters = Arc::new(LocalParameterStore::new(config.parameters.clone()));

    let meta_api = Arc::new(MetaApi::load(&config.meta, &secrets).await?);
    let runtime = Arc::new(HttpAgentRuntime::new(&config.agent.runtime_url));
    let agent = Arc::new(AgentAdapter::from_config(&config, runtime, parameters));

    let pipeline = build_pipeline(
        &config,
        Services {
            messages,
            agents_data,
            secrets,
            agent,
            sender: meta_api,
        },
    );

    // Track running services for graceful shutdown
    let mut service_handles = Vec::new();

    let dispatcher = pipeline.dispatcher;
    let stream = StreamConsumer::new(stream_rx, config.workflow.redrive_policy());
    service_handles.push(tokio::spawn(async move {
        dispatcher.run(stream).await;
    }));

    let state = pipeline.state;
    let api_port = config.api.port;
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = wpp_webhook::start_server(api_port, state, shutdown).await {
            tracing::error!("HTTP API error: {}", e);
        }
    });
    tracing::info!("HTTP API server started on port {}", api_port);

    tracing::info!("wpp-gateway initialized successfully");
    tracing::info!("Press Ctrl+C to exit");

    tokio::signal::ctrl_c().await?;
    tracing::info!(
        "Shutting down with {} executions on record",
        pipeline.machine.list_executions().await.len()
    );

    let _ = shutdown_tx.send(());
    if let Err(e) = server.await {
        tracing::warn!("HTTP API task ended abnormally: {}", e);
    }

    for handle in service_handles {
        handle.abort();
    }

    tracing::info!("wpp-gateway stopped");
    Ok(())
}
