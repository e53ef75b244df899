use pulsetick_core::SourceChain;

use crate::cli::Cli;
use crate::error::CliError;
use crate::output;

/// Capability and health listing for every registered source.
pub async fn execute(cli: &Cli, chain: SourceChain) -> Result<(), CliError> {
    let snapshots = chain.snapshots().await;
    output::render_sources(&snapshots, cli.format, cli.pretty)
}
