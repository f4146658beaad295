use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use scrape_scheduler::api::task_routes;
use scrape_scheduler::app::build_state;
use scrape_scheduler::config::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env()?;

    // Stdout always; a daily-rolling file too when a log directory is set.
    // The guard must live until shutdown so buffered lines are flushed.
    let (file_layer, _log_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "scrape-scheduler.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    eprintln!("🕷  Scrape Scheduler v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Listen: http://{}", config.bind_addr);
    eprintln!("   Store: {}", config.store_url);
    eprintln!(
        "   Models: {} (images), {} (text), {} (summary)",
        config.llm.primary_model, config.llm.light_model, config.llm.summary_model
    );
    eprintln!("   Tick: {}ms\n", config.tick.as_millis());

    let state = build_state(&config).await?;
    let scheduler = state.scheduler.clone();
    scheduler.start().await;

    let app = task_routes(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "HTTP server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped, stopping scheduler");
    scheduler.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
