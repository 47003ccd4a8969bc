use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use reef_server::{serve, Config, WorkerPool};
use reef_store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let store = Arc::new(
        Store::open(&config.dir, config.engine, config.shards)
            .with_context(|| format!("open data directory {}", config.dir.display()))?,
    );
    let pool = Arc::new(WorkerPool::start(Arc::clone(&store), config.worker_power));

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("bind {}:{}", config.host, config.port))?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        engine = %config.engine,
        shards = config.shards,
        "reef listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(wait_for_signal(shutdown_tx));

    serve(listener, Arc::clone(&pool), shutdown_rx).await?;

    // Listener first, then the workers, then flush the shards.
    pool.close();
    store.close()?;
    tracing::info!("reef exit, bye");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal(shutdown: watch::Sender<bool>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt()).expect("install SIGINT handler");
    let mut terminate = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    let mut quit = signal(SignalKind::quit()).expect("install SIGQUIT handler");
    let mut hangup = signal(SignalKind::hangup()).expect("install SIGHUP handler");
    let mut pipe = signal(SignalKind::pipe()).expect("install SIGPIPE handler");

    let received = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
        _ = hangup.recv() => "SIGHUP",
        _ = pipe.recv() => "SIGPIPE",
    };
    tracing::info!(signal = received, "shutting down");
    let _ = shutdown.send(true);
}

#[cfg(not(unix))]
async fn wait_for_signal(shutdown: watch::Sender<bool>) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("ctrl-c received, shutting down");
    let _ = shutdown.send(true);
}
