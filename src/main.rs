use anyhow::Result;
use clap::Parser;
use pibregiao::{config::RunConfig, process, report};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Print GDP per capita by macro-region for a population/GDP workbook.
#[derive(Debug, Parser)]
#[command(name = "pibregiao", version)]
struct Cli {
    /// Workbook (.xlsx) or directory of per-sheet CSV exports.
    #[arg(default_value = pibregiao::config::DEFAULT_WORKBOOK)]
    workbook: PathBuf,

    /// Also write the summary table as CSV.
    #[arg(long, value_name = "PATH")]
    csv_out: Option<PathBuf>,

    /// Also write the merged per-state table as Parquet.
    #[arg(long, value_name = "PATH")]
    parquet_out: Option<PathBuf>,
}

impl From<Cli> for RunConfig {
    fn from(cli: Cli) -> Self {
        Self {
            workbook: cli.workbook,
            csv_out: cli.csv_out,
            parquet_out: cli.parquet_out,
        }
    }
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    // stdout carries the table, so logs go to stderr
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cfg: RunConfig = Cli::parse().into();
    info!(workbook = %cfg.workbook.display(), "startup");

    // ─── 2) load, clean, merge, aggregate ────────────────────────────
    let output = process::process_workbook(&cfg.workbook)?;

    // ─── 3) report ───────────────────────────────────────────────────
    report::print_summary(&output.summary)?;

    if let Some(path) = &cfg.csv_out {
        report::write_summary_csv(path, &output.summary)?;
    }
    if let Some(path) = &cfg.parquet_out {
        report::write_merged_parquet(path, &output.merged.rows)?;
    }

    info!("all done");
    Ok(())
}
