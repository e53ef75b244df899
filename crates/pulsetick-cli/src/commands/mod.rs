mod rank;
mod run;
mod sources;

use pulsetick_core::{BlockingMode, ProviderId, SourceChain, SourceChainBuilder};
use pulsetick_trading::TradingConfig;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn dispatch(cli: &Cli) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let chain = build_chain(cli, &config);

    match &cli.command {
        Command::Rank(args) => rank::execute(cli, &config, chain, args).await,
        Command::Run => run::execute(&config, chain).await,
        Command::Sources => sources::execute(cli, chain).await,
    }
}

fn load_config(cli: &Cli) -> Result<TradingConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => TradingConfig::load(path)?,
        None => TradingConfig::default(),
    };
    if cli.mock {
        config.mock_mode = true;
    }
    Ok(config)
}

fn build_chain(cli: &Cli, config: &TradingConfig) -> SourceChain {
    let mut builder = SourceChainBuilder::new()
        .with_env_credentials()
        .with_blocking_mode(BlockingMode::Fail);
    if cli.mock || config.mock_mode {
        builder = builder.with_mock_mode();
    }
    if let Some(quota) = config.schwab_quota_per_min {
        builder = builder.with_quota_per_minute(ProviderId::Schwab, quota);
    }
    if let Some(quota) = config.alphavantage_quota_per_min {
        builder = builder.with_quota_per_minute(ProviderId::Alphavantage, quota);
    }
    builder.build()
}
