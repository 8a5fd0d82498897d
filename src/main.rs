use std::sync::Arc;

use smartstream::StreamError;
use smartstream::config::fetch_config;
use smartstream::fanout::FanoutPublisher;
use smartstream::instruments::InstrumentDirectory;
use smartstream::models::DEFAULT_SUBSCRIBE_MODE;
use smartstream::quotes::QuoteTable;
use smartstream::websocket::FeedSession;
use tracing::{info, warn};

/// Streams the feed, subscribing any tokens given as arguments.
#[tokio::main]
async fn main() -> Result<(), StreamError> {
    tracing_subscriber::fmt::init();

    let app_config = fetch_config()?;

    let directory = match &app_config.instruments_path {
        Some(path) => InstrumentDirectory::load(path)?,
        None => InstrumentDirectory::with_indices(),
    };

    let quotes = QuoteTable::new();
    let (mut session, manager, handle) =
        FeedSession::new(app_config.feed, Arc::new(directory), quotes);

    if app_config.fanout.enabled {
        let publisher = FanoutPublisher::bind(
            app_config.fanout.port,
            app_config.fanout.stamped,
            handle.close_signal(),
        )
        .await?;
        session = session.with_fanout(publisher);
    }

    let tokens: Vec<String> = std::env::args().skip(1).collect();
    if !tokens.is_empty() {
        let manager = manager.clone();
        tokio::spawn(async move {
            match manager.subscribe(&tokens, DEFAULT_SUBSCRIBE_MODE).await {
                Ok(outcome) => info!(sent = outcome.sent, skipped = ?outcome.skipped, "Requested tokens"),
                Err(e) => warn!("Subscription failed: {e}"),
            }
        });
    }

    let closer = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, closing");
            closer.close();
        }
    });

    session.run().await;
    info!(records = manager.current_usage(), "Exited");

    Ok(())
}
