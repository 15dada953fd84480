//! HTTP API Server
//!
//! Axum-based web studio: upload a reference recording, get an automatic
//! transcript, generate cloned speech and play it back.
//!
//! The server starts listening before the models are ready; generation
//! answers 503 until the background loader installs them into [`AppState`].

use std::future::IntoFuture;

use anyhow::{Context, Result};

use crate::backend::{ModelConfig, SttConfig, load_models};
use crate::cli::{Args, ServeArgs};

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use state::{AppState, ServerConfig};

pub async fn start_server(args: &Args, serve: &ServeArgs) -> Result<()> {
    let config = ServerConfig::from(serve);
    config
        .ensure_dirs()
        .context("Failed to create data directories")?;

    let state = AppState::new(config);
    let app = routes::create_router(state.clone());

    let model_config = ModelConfig {
        tts_url: args.tts_url.clone(),
        model_dir: args.model_dir.clone(),
        device: args.resolved_device(),
        stt: (!serve.no_transcribe).then(|| SttConfig {
            url: serve.stt_url.clone(),
            model: serve.stt_model.clone(),
        }),
    };

    let loader = {
        let state = state.clone();
        tokio::spawn(async move {
            let models = load_models(&model_config).await?;
            state.install_models(models);
            Ok::<_, crate::backend::BackendError>(())
        })
    };

    // Resolves only if loading fails; a successful load leaves it pending
    let load_failure = async move {
        match loader.await {
            Ok(Ok(())) => std::future::pending::<anyhow::Error>().await,
            Ok(Err(e)) => anyhow::Error::new(e).context("Failed to load models"),
            Err(e) => anyhow::Error::new(e).context("Model loading task panicked"),
        }
    };

    let addr = format!("{}:{}", serve.host, serve.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(%addr, "voice studio listening");
    println!("Open http://localhost:{} in your browser.", serve.port);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    tokio::select! {
        result = server => result.context("Server error")?,
        err = load_failure => return Err(err),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
