use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use nami_ledger::bot::Dispatcher;
use nami_ledger::channels::{Outbox, TelegramClient, UpdateSource, UpdateStream};
use nami_ledger::config::AppConfig;
use nami_ledger::lock::InstanceLock;
use nami_ledger::store::open_store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Invalid configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing(&config);

    let _lock = InstanceLock::acquire(&config.lock_file)?;

    let AppConfig {
        bot_token,
        store: store_config,
        stream: stream_config,
        allowed_chats,
        ..
    } = config;

    eprintln!("💰 Nami Ledger v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Track your berries. Nami is watching the wallet.");

    // ── Database ─────────────────────────────────────────────────────────
    let store = open_store(&store_config)
        .await
        .context("Failed to open database")?;

    // ── Telegram ─────────────────────────────────────────────────────────
    let telegram = Arc::new(TelegramClient::new(bot_token));
    if let Err(e) = telegram.health_check().await {
        tracing::warn!(error = %e, "Telegram health check failed; polling anyway");
    }

    eprintln!(
        "   Allowed chats: {}",
        if allowed_chats.iter().any(|c| c == "*") {
            "everyone".to_string()
        } else {
            allowed_chats.join(", ")
        }
    );

    let source: Arc<dyn UpdateSource> = telegram.clone();
    let outbox: Arc<dyn Outbox> = telegram;
    let messages = UpdateStream::new(source, stream_config).into_stream();

    let dispatcher = Dispatcher::new(store, outbox, allowed_chats);
    dispatcher.run(messages, shutdown_signal()).await;

    Ok(())
}

/// Console logging filtered by `RUST_LOG`, plus a daily file when configured.
fn init_tracing(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "nami-ledger.log");
            let (file_writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::io::stderr.and(file_writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
            None
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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
}
