//! rfm-serve: serve a pre-fitted RFM segmentation model over HTTP
//!
//! Startup loads both artifacts before anything is bound; a load failure
//! exits non-zero so the service never runs half-initialised.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rfm_serve::{load_segmenter, router, Args, Segmenter};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    init_logging(args.verbose);

    info!("rfm-serve v{}", env!("CARGO_PKG_VERSION"));
    info!("  Platform:  {:?}", args.platform);
    info!("  Model dir: {:?}", args.model_dir());

    let one_shot = args.parse_rfm_values()?;

    let model_dir = args.model_dir();
    let segmenter = load_segmenter(&model_dir)
        .with_context(|| format!("Failed to load artifacts from {:?}", model_dir))?;

    // Check if in prediction mode
    if let Some(features) = one_shot {
        run_prediction_mode(&segmenter, features)
    } else {
        run_server(&args, segmenter).await
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Score a single customer and print the response body
fn run_prediction_mode(segmenter: &Segmenter, features: rfm_serve::RfmFeatures) -> Result<()> {
    let cluster = segmenter
        .predict(&features)
        .with_context(|| format!("Failed to score {:?}", features))?;

    let output = serde_json::json!({
        "cluster": cluster,
        "input_data": features,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_server(args: &Args, segmenter: Segmenter) -> Result<()> {
    let app = router(Arc::new(segmenter));

    let (host, port) = args.bind_target();
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
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

    info!("Shutdown signal received");
}
