use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chat_template_cache::config::Settings;
use chat_template_cache::server::{create_app, AppState};
use chat_template_cache::template::TemplateKind;
use chat_template_cache::TemplateManager;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let settings = Settings::new()?;
    tracing::info!(
        cache_root = %settings.cache.root_dir,
        upstream = %settings.upstream.base_url,
        "Configuration loaded"
    );

    let state = AppState::new(settings.clone())?;

    // Warm both namespaces in background
    let warmup_handle = tokio::spawn(warm_caches(state.manager.clone()));
    let cleanup_handle = tokio::spawn(sweep_render_states(
        state.manager.clone(),
        Duration::from_secs(settings.render.state_cleanup_interval_secs.max(1)),
    ));

    let app = create_app(state);

    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Template cache server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler())
        .await?;

    warmup_handle.abort();
    cleanup_handle.abort();
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` filters (default `info`); `LOG_FORMAT=json` switches to JSON lines
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn warm_caches(manager: Arc<TemplateManager>) {
    for kind in TemplateKind::ALL {
        match manager.load_template_list(kind).await {
            Ok(templates) => {
                tracing::info!(kind = %kind, count = templates.len(), "Template cache warmed");
            }
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Template cache warm-up failed");
            }
        }
    }
}

/// Periodically drop render states past their retention
async fn sweep_render_states(manager: Arc<TemplateManager>, every: Duration) {
    let mut timer = tokio::time::interval(every);
    // First tick completes immediately
    timer.tick().await;

    loop {
        timer.tick().await;
        let removed = manager.cleanup_render_states();
        if removed > 0 {
            tracing::debug!(removed = removed, "Render state sweep finished");
        }
    }
}

async fn shutdown_signal_handler() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
