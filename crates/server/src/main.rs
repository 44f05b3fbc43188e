mod api;
mod live;
mod pipeline;
mod router;
mod sessions;
mod startup;
mod state;

use clap::Parser;
use tracing::info;

/// Parallel security-signal analysis service.
#[derive(Parser, Debug)]
#[command(name = "warden", version, about)]
struct Cli {
    /// Config profile; keys are read as `{PROFILE}_{KEY}` before `{KEY}`.
    #[arg(long, env = "WARDEN_PROFILE", default_value = "")]
    profile: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the shared store URL.
    #[arg(long)]
    redis_url: Option<String>,

    /// Disable the background signal generator.
    #[arg(long)]
    no_generator: bool,
}

impl Cli {
    fn into_config(self) -> warden_core::Config {
        let mut config = warden_core::Config::for_profile(&self.profile);
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = self.redis_url {
            config.store.redis_url = url;
        }
        if self.no_generator {
            config.generator.enabled = false;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,warden=debug")),
        )
        .init();

    let config = Cli::parse().into_config();
    config.log_summary();

    let state = startup::build_app_state(config).await;
    let background = startup::spawn_background_tasks(&state);
    let app = router::build_router(state.clone());

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        addr = %addr,
        instance = %state.store.instance_id(),
        store_mode = state.store.mode().as_str(),
        "warden listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown signal received");
    state.store.shutdown();
    for handle in background {
        handle.abort();
    }
    info!("warden exited cleanly");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl_c");
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to register SIGTERM handler");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
