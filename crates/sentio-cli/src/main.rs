use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sentio_ai::{CapabilityRegistry, ModelBindings, OnnxLoader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Serve text generation and sentiment analysis over HTTP.
#[derive(Debug, Parser)]
#[command(name = "sentio", version, about)]
struct Args {
    /// Address to bind.
    #[arg(long, env = "SENTIO_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    #[arg(long, env = "SENTIO_PORT", default_value_t = 8000)]
    port: u16,

    /// Directory holding one sub-directory per model identifier.
    #[arg(long, env = "SENTIO_MODELS_DIR", default_value = "models")]
    models_dir: PathBuf,

    /// Text generation model identifier.
    #[arg(long, default_value = "distilgpt2")]
    generation_model: String,

    /// Sentiment analysis model identifier.
    #[arg(
        long,
        default_value = "distilbert-base-uncased-finetuned-sst-2-english"
    )]
    sentiment_model: String,

    /// Origin allowed to call the API from a browser. Repeatable.
    #[arg(
        long = "cors-origin",
        default_values_t = [
            "http://localhost:5173".to_string(),
            "http://localhost:3000".to_string(),
        ]
    )]
    cors_origins: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("sentio v{}", env!("CARGO_PKG_VERSION"));

    let bindings = ModelBindings {
        text_generation: args.generation_model.clone(),
        sentiment_analysis: args.sentiment_model.clone(),
    };
    let loader = OnnxLoader::new(&args.models_dir);
    let registry = CapabilityRegistry::initialize(&bindings, &loader)
        .with_context(|| format!("loading models from {}", args.models_dir.display()))?;

    let app = sentio_server::router(Arc::new(registry))
        .layer(sentio_server::cors_layer(&args.cors_origins)?);

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
