mod config;

use clap::{Parser, Subcommand};
use config::FinsightConfig;
use finsight_agent::{LlmClient, Orchestrator};
use finsight_builtins::{register_builtins, BuiltinServices};
use finsight_data::{AnalyticsClient, FinancialPipeline};
use finsight_gateway::{AppState, AuthConfig, GatewayServer};
use finsight_skills::SkillRegistry;
use finsight_store::{FileStore, Storage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "finsight", about = "Finsight - streaming financial chat server")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "finsight.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Inspect the tool set
    Tools {
        #[command(subcommand)]
        action: ToolsAction,
    },
}

#[derive(Subcommand)]
enum ToolsAction {
    /// List the tools offered to the answer model
    List,
}

fn build_registry(config: &FinsightConfig, llm: LlmClient) -> SkillRegistry {
    let mut registry = SkillRegistry::new();
    register_builtins(
        &mut registry,
        BuiltinServices {
            llm,
            pipeline: FinancialPipeline::new(AnalyticsClient::new(config.analytics.clone())),
            weather: config.weather.clone(),
        },
    );
    registry
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = FinsightConfig::load(&cli.config).await?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            let store: Arc<dyn Storage> = Arc::new(FileStore::new(config.data_dir.clone()).await?);
            let answer = LlmClient::new(config.model.clone());
            let reasoning = LlmClient::new(config.reasoning_model().clone());

            let registry = build_registry(&config, answer.clone());
            info!(count = registry.skill_count(), "Built-in tools registered");

            let orchestrator = Arc::new(Orchestrator::new(
                reasoning,
                answer,
                Arc::new(registry),
                Arc::clone(&store),
                config.orchestrator.clone(),
            ));

            let auth = AuthConfig::new(config.auth.api_keys.clone());
            if auth.is_enabled() {
                info!(keys = auth.api_keys.len(), "API key auth enabled");
            }

            let state = Arc::new(AppState::new(orchestrator, store));
            let app = GatewayServer::build(state, auth);

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!(
                addr = %addr,
                analytics = %config.analytics.base_url,
                answer_model = %config.model.model_id,
                reasoning_model = %config.reasoning_model().model_id,
                "Finsight listening"
            );
            axum::serve(listener, app).await?;
        }
        Commands::Tools { action } => match action {
            ToolsAction::List => {
                let registry = build_registry(&config, LlmClient::new(config.model.clone()));
                let tools = registry.list_descriptors();
                println!("Registered tools:");
                for tool in &tools {
                    println!("  {} - {}", tool.name, tool.description);
                }
                println!("\nTotal: {} tool(s)", tools.len());
            }
        },
    }

    Ok(())
}
