use std::sync::Arc;

use tracing::info;

use pulsetick_core::SourceChain;
use pulsetick_trading::{PaperExecution, TradingConfig, TradingEngine};

use crate::error::CliError;

/// Engine loop with paper execution; Ctrl-C stops it gracefully.
pub async fn execute(config: &TradingConfig, chain: SourceChain) -> Result<(), CliError> {
    let engine = Arc::new(TradingEngine::new(
        config.clone(),
        chain,
        Arc::new(PaperExecution),
    )?);

    info!(
        watchlist = config.watchlist.len(),
        poll_secs = config.poll_interval_secs,
        slots = config.max_positions,
        "engine starting"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let loop_engine = Arc::clone(&engine);
    let runner = tokio::spawn(async move {
        loop_engine.run(shutdown_rx).await;
    });

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    let _ = shutdown_tx.send(true);

    runner
        .await
        .map_err(|e| CliError::Command(format!("engine loop panicked: {e}")))?;

    if engine.session_halted().await {
        eprintln!("note: session ended halted by the loss floor; restart clears the session");
    }

    Ok(())
}
