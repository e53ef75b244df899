//! Rendering for rankings and source listings.

use pulsetick_core::SourceSnapshot;
use pulsetick_signals::ScoreRecord;

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render_rankings(
    records: &[ScoreRecord],
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => render_json(records, pretty),
        OutputFormat::Table => {
            render_rankings_table(records);
            Ok(())
        }
    }
}

fn render_json<T: serde::Serialize + ?Sized>(value: &T, pretty: bool) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{payload}");
    Ok(())
}

fn render_rankings_table(records: &[ScoreRecord]) {
    if records.is_empty() {
        println!("no rankings matched the filter");
        return;
    }

    println!(
        "{:<4} {:<8} {:>7} {:<12} {:<8} {:>8} {:<9}",
        "#", "SYMBOL", "SCORE", "TIER", "DIR", "ALIGNED", "DATA"
    );
    for (index, record) in records.iter().enumerate() {
        println!(
            "{:<4} {:<8} {:>7.1} {:<12} {:<8} {:>7}/7 {:<9}",
            index + 1,
            record.symbol,
            record.overall_score,
            record.tier.as_str(),
            record.direction.as_str(),
            record.aligned_signals,
            if record.degraded { "degraded" } else { "live" }
        );
    }
}

pub fn render_sources(
    snapshots: &[SourceSnapshot],
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = snapshots
                .iter()
                .map(|snapshot| {
                    serde_json::json!({
                        "source": snapshot.id.as_str(),
                        "quote": snapshot.capabilities.quote,
                        "candles": snapshot.capabilities.candles,
                        "status": snapshot.status_label(),
                    })
                })
                .collect();
            render_json(&rows, pretty)
        }
        OutputFormat::Table => {
            println!("{:<14} {:<7} {:<9} {:<12}", "SOURCE", "QUOTE", "CANDLES", "STATUS");
            for snapshot in snapshots {
                println!(
                    "{:<14} {:<7} {:<9} {:<12}",
                    snapshot.id.as_str(),
                    if snapshot.capabilities.quote { "yes" } else { "no" },
                    if snapshot.capabilities.candles { "yes" } else { "no" },
                    snapshot.status_label()
                );
            }
            Ok(())
        }
    }
}
