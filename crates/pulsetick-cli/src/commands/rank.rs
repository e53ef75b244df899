use std::sync::Arc;

use pulsetick_core::SourceChain;
use pulsetick_trading::{PaperExecution, TradingConfig, TradingEngine};

use crate::cli::{Cli, RankArgs};
use crate::error::CliError;
use crate::output;

/// One-shot pipeline: fetch, score, rank, print.
pub async fn execute(
    cli: &Cli,
    config: &TradingConfig,
    chain: SourceChain,
    args: &RankArgs,
) -> Result<(), CliError> {
    let engine = TradingEngine::new(config.clone(), chain, Arc::new(PaperExecution))?;

    let report = engine.run_cycle().await;
    if report.degraded > 0 {
        eprintln!(
            "warning: {} of {} symbols served degraded (synthetic or stale) data",
            report.degraded, report.scored
        );
    }

    let records = engine.rankings(args.min_score, args.limit);
    output::render_rankings(&records, cli.format, cli.pretty)
}
