use std::time::Duration;

use smartstream::StreamError;
use smartstream::config::fetch_config;
use smartstream::fanout::{FeedReplica, timestamps_by_symbol};
use smartstream::instruments::InstrumentDirectory;
use tracing::info;

const REPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Mirrors the fan-out channel into a local quote table.
#[tokio::main]
async fn main() -> Result<(), StreamError> {
    tracing_subscriber::fmt::init();

    let app_config = fetch_config()?;
    let directory = match &app_config.instruments_path {
        Some(path) => InstrumentDirectory::load(path)?,
        None => InstrumentDirectory::with_indices(),
    };

    let replica = FeedReplica::new(app_config.fanout.port, app_config.fanout.stamped);
    let quotes = replica.quotes();
    let health = replica.health();
    let close = replica.close_signal();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REPORT_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let oldest = timestamps_by_symbol(&quotes, &directory).into_iter().next();
                    info!(
                        fresh = health.is_fresh(),
                        records = quotes.len(),
                        oldest = ?oldest,
                        "Replica status"
                    );
                }
                () = close.closed() => break,
            }
        }
    });

    let closer = replica.close_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, closing");
            closer.close();
        }
    });

    replica.run().await;

    Ok(())
}
