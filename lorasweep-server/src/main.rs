use anyhow::Result;
use clap::Parser;
use lorasweep_core::WebUiPipeline;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::{self, net::TcpListener};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;

use routes::AppState;

// Define command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "LoRA weight sweep server")]
struct Args {
    /// Base URL of the Stable-Diffusion web UI
    #[arg(long, env = "WEBUI_URL", default_value = "http://127.0.0.1:7860")]
    webui_url: String,

    /// Directory holding the `prompt` and `negative_prompt` template files
    #[arg(long, env = "LORASWEEP_TEMPLATES", default_value = "templates")]
    templates: PathBuf,

    /// Seconds to wait for a single generation request
    #[arg(long, env = "LORASWEEP_TIMEOUT_SECS", default_value_t = 600)]
    timeout_secs: u64,

    /// Host address to bind the server to
    #[arg(long, env = "LORASWEEP_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind the server to
    #[arg(long, env = "LORASWEEP_PORT", default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env has to be loaded before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let pipeline = WebUiPipeline::new(&args.webui_url, Duration::from_secs(args.timeout_secs));
    info!(endpoint = pipeline.endpoint(), templates = %args.templates.display(), "using web UI pipeline");

    let app_state = AppState {
        pipeline: Arc::new(pipeline),
        templates_dir: args.templates,
    };
    let app = routes::router(app_state);

    // --- Start the server ---
    let bind_address = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&bind_address).await?;
    info!("Started server on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
