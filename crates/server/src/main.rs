use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use immo_core::MemoryStore;
use immo_llm::ClaudeToolProvider;
use immo_notify::{Mailer, MemoryMailer, SmtpMailer};
use immo_session::SessionStore;
use immo_storage::BlobBackend;

use immo_server::router;
use immo_server::state::AppState;

/// Investor-portal assistant service.
#[derive(Parser, Debug)]
#[command(name = "immo-server", version, about)]
struct Cli {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Directory for sessions and locally stored documents.
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_api_key: String,

    /// Maximum agent-loop steps per turn.
    #[arg(long, env = "AGENT_MAX_STEPS", default_value_t = 10)]
    max_steps: usize,

    /// S3 bucket for documents; local filesystem storage when unset.
    #[arg(long, env = "S3_BUCKET")]
    s3_bucket: Option<String>,

    #[arg(long, env = "S3_REGION", default_value = "eu-central-1")]
    s3_region: String,

    /// SMTP relay host; without it outbound email stays in memory.
    #[arg(long, env = "SMTP_HOST")]
    smtp_host: Option<String>,

    #[arg(long, env = "SMTP_PORT")]
    smtp_port: Option<u16>,

    #[arg(long, env = "SMTP_FROM", default_value = "Portal <noreply@example.com>")]
    smtp_from: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    std::fs::create_dir_all(&cli.data_dir)?;
    let sessions = SessionStore::new(&cli.data_dir)?;

    let blobs = match &cli.s3_bucket {
        Some(bucket) => {
            info!(bucket = %bucket, region = %cli.s3_region, "using S3 document storage");
            BlobBackend::s3(bucket, &cli.s3_region)?
        }
        None => {
            info!(path = %cli.data_dir.display(), "using local document storage");
            BlobBackend::local(&cli.data_dir)?
        }
    };

    let mailer: Arc<dyn Mailer> = match &cli.smtp_host {
        Some(host) => Arc::new(SmtpMailer::from_config(
            host,
            cli.smtp_port,
            None,
            &cli.smtp_from,
        )?),
        None => {
            info!("no SMTP host configured, outbound email stays in memory");
            Arc::new(MemoryMailer::new())
        }
    };

    let provider = Arc::new(ClaudeToolProvider::with_defaults(cli.anthropic_api_key));

    let state = Arc::new(AppState::new(
        sessions,
        Arc::new(MemoryStore::new()),
        Arc::new(blobs),
        mailer,
        provider,
        cli.max_steps,
    ));

    let app = router::build_router(state);

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
