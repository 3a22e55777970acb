//! IdeaForge Server
//!
//! Axum server exposing the document pipeline, plus a CLI mode that runs a
//! single idea end to end.

mod api;

use clap::{Parser, Subcommand};
use ideaforge_core::llm::RadkitModel;
use ideaforge_core::pipeline::{spawn_sweeper, PipelineService, RunOutcome};
use ideaforge_core::tools::SearxngSearch;
use ideaforge_core::workers::Approvals;
use ideaforge_core::PipelineConfig;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;

use api::AppState;

#[derive(Parser, Clone)]
#[command(author, version, about = "IdeaForge - product idea to investor documents")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Run one idea without the server, approving every proposed query
    Run {
        /// The product idea
        message: String,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn build_service(config: &PipelineConfig) -> anyhow::Result<Arc<PipelineService>> {
    let model = Arc::new(RadkitModel::new(config.clone()));
    let search = Arc::new(SearxngSearch::new(config.searxng_url.clone())?);
    Ok(Arc::new(PipelineService::new(config, model, search)))
}

async fn run_server(config: PipelineConfig, port: u16) -> anyhow::Result<()> {
    let service = build_service(&config)?;
    let _sweeper = spawn_sweeper(service.clone(), config.run_ttl(), config.sweep_interval());

    let app = api::router(Arc::new(AppState { service }));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("IdeaForge server running at http://{}", addr);
    tracing::info!("Routes: /api/v1/pipeline/start, /resume, /status, /events, /openapi.json");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_once(config: PipelineConfig, message: &str) -> anyhow::Result<()> {
    let service = build_service(&config)?;
    let mut outcome = service.start(message, None, None).await?;

    loop {
        match outcome {
            RunOutcome::Suspended {
                run_id,
                pending_fields,
                ..
            } => {
                let approvals: Approvals = pending_fields
                    .into_iter()
                    .map(|f| {
                        println!("  approved {}: {}", f.field_name, f.proposed_value);
                        (f.field_name, f.proposed_value)
                    })
                    .collect();
                outcome = service.resume(&run_id, approvals).await?;
            }
            RunOutcome::Completed {
                content, documents, ..
            } => {
                println!("{}", content);
                for doc in documents {
                    println!("  {}/{}", config.output_dir.display(), doc.filename);
                }
                return Ok(());
            }
            RunOutcome::Failed { error, .. } => anyhow::bail!("Run failed: {}", error),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Project-local keys first, then the working directory's .env
    let _ = dotenvy::from_path(".ideaforge/.env");
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = Args::parse();
    let config = PipelineConfig::load().with_env_overrides();

    match args.command {
        Some(CliCommand::Run { message }) => run_once(config, &message).await,
        Some(CliCommand::Serve { port }) => run_server(config, port).await,
        None => run_server(config, 8080).await,
    }
}
