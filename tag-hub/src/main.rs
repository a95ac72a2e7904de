use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tag_hub::api::{self, AppState};
use tag_hub::config::Config;
use tag_hub_core::auth::{Hs256Verifier, TokenVerifier};
use tag_hub_core::Hub;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut hub = match &config.data_dir {
        Some(dir) => Hub::open(dir)
            .with_context(|| format!("opening data directory {}", dir.display()))?,
        None => {
            warn!("no data directory configured, state will not survive a restart");
            Hub::in_memory()
        }
    };
    let grants = config.global_grants()?;
    let added = hub.bootstrap_grants(grants)?;
    if added > 0 {
        info!(added, "installed global grants");
    }

    let verifier: Option<Arc<dyn TokenVerifier>> = config.jwt_secret.clone().map(|secret| {
        let verifier = Hs256Verifier::new(secret);
        let verifier = if config.jwt_validate_exp {
            verifier.with_expiry()
        } else {
            verifier
        };
        Arc::new(verifier) as Arc<dyn TokenVerifier>
    });
    if verifier.is_none() && !config.trust_user_header {
        warn!("neither a JWT secret nor header trust is configured, every request will be rejected");
    }

    let state = AppState::new(hub, verifier, config.api_settings());
    let app = api::app(state);

    let listener = TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
