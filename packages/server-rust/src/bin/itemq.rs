//! `itemq` server binary: consumes item commands from an in-memory queue,
//! optionally driven by random producers, until interrupted.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use itemq_server::cli::Cli;
use itemq_server::ItemQueueServer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let server = Arc::new(ItemQueueServer::new(cli.server_config()));
    server.start().context("failed to start worker pool")?;

    let producers = server.spawn_producers(&cli.producers);
    let mut consumer = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.run().await }
    });

    let finished_early = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for interrupt")?;
            info!("interrupt received, shutting down");
            None
        }
        joined = &mut consumer => Some(joined),
    };

    let stats = server.shutdown().await;

    let consumed = match finished_early {
        Some(joined) => joined,
        None => consumer.await,
    };
    for producer in producers {
        match producer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "producer failed"),
            Err(e) => error!(error = %e, "producer task failed to join"),
        }
    }

    info!(
        completed = stats.completed,
        failed = stats.failed,
        panicked = stats.panicked,
        "itemq exited"
    );
    consumed.context("consumer task failed to join")??;
    Ok(())
}
