use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use smartstock_core::{ListingPrompt, ListingSessions, TableKind};
use smartstock_report::ReportPipeline;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "smartstock-cli")]
#[command(about = "SmartStock inventory analytics")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Health score, ranked views and category rollup.
    Analyze,
    Forecast {
        #[arg(long)]
        months: Option<usize>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        start_month: Option<u32>,
    },
    Restock {
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        start_month: Option<u32>,
    },
    /// Write a full report run under the reports directory.
    Report,
    /// Row counts, schema gaps and unmatched festival product names.
    Validate,
    /// Replace one source table with a local file.
    Upload {
        #[arg(long, value_enum)]
        table: TableArg,
        #[arg(long)]
        file: PathBuf,
    },
    /// Historical demand, festival-month patterns and the upcoming forecast.
    Demand,
    /// Monthly, top-product, seasonal and weekly sales tables.
    Sales,
    /// Walk a product listing conversation, one stdin line per message.
    Listing {
        #[arg(long, default_value = "cli")]
        session: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TableArg {
    Catalog,
    Sales,
    Trends,
    Festivals,
}

impl From<TableArg> for TableKind {
    fn from(value: TableArg) -> Self {
        match value {
            TableArg::Catalog => TableKind::Catalog,
            TableArg::Sales => TableKind::Sales,
            TableArg::Trends => TableKind::Trends,
            TableArg::Festivals => TableKind::Festivals,
        }
    }
}

fn init_logging() {
    let filter = std::env::var("SMARTSTOCK_LOG")
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match std::env::var("SMARTSTOCK_LOG_FORMAT").as_deref() {
        Ok("pretty") => builder.pretty().init(),
        Ok("json") => builder.json().init(),
        _ => builder.compact().init(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("serializing command output")?
    );
    Ok(())
}

fn run_listing(session: &str) -> Result<()> {
    let mut sessions = ListingSessions::default();
    sessions.start(session);
    eprintln!("send a product image file name to start listing");

    for line in std::io::stdin().lock().lines() {
        let line = line.context("reading listing input")?;
        match sessions.advance(session, &line) {
            Ok(prompt) => {
                print_json(&prompt)?;
                if let ListingPrompt::Listed { .. } = prompt {
                    sessions.finish(session);
                    break;
                }
            }
            Err(err) => eprintln!("{err}"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    // listing runs without any source tables, so the pipeline is built per command
    let pipeline = ReportPipeline::from_env;
    match cli.command.unwrap_or(Commands::Analyze) {
        Commands::Analyze => print_json(&pipeline()?.analyze()?)?,
        Commands::Forecast {
            months,
            start_month,
        } => print_json(&pipeline()?.forecast(months, start_month)?)?,
        Commands::Restock { start_month } => print_json(&pipeline()?.restock(start_month)?)?,
        Commands::Report => {
            let summary = pipeline()?.run_report().await?;
            println!(
                "report complete: run_id={} products={} health_score={} pages={} reports={}",
                summary.run_id,
                summary.products,
                summary.health_score,
                summary.pages,
                summary.reports_dir
            );
        }
        Commands::Validate => print_json(&pipeline()?.validate()?)?,
        Commands::Upload { table, file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let replaced = pipeline()?.upload(table.into(), &bytes).await?;
            println!(
                "upload complete: table={} path={} bytes={} sha256={}",
                replaced.table,
                replaced.path.display(),
                replaced.byte_size,
                replaced.content_hash
            );
        }
        Commands::Demand => print_json(&pipeline()?.demand()?)?,
        Commands::Sales => print_json(&pipeline()?.sales()?)?,
        Commands::Listing { session } => run_listing(&session)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_month_must_be_a_calendar_month() {
        assert!(Cli::try_parse_from(["smartstock-cli", "forecast", "--start-month", "13"]).is_err());
        assert!(Cli::try_parse_from(["smartstock-cli", "restock", "--start-month", "0"]).is_err());
        let cli = Cli::try_parse_from(["smartstock-cli", "forecast", "--start-month", "12"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Forecast {
                start_month: Some(12),
                ..
            })
        ));
    }

    #[test]
    fn listing_and_sales_parse() {
        let cli = Cli::try_parse_from(["smartstock-cli", "listing", "--session", "s1"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Listing { session }) if session == "s1"));
        let cli = Cli::try_parse_from(["smartstock-cli", "sales"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Sales)));
    }
}
