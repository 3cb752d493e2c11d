// src/report/mod.rs
use std::io::{self, Write};

use crate::config::{COL_GDP_PER_CAPITA, COL_REGION};
use crate::schema::RegionSummary;

pub mod csv_out;
pub mod parquet_out;

pub use csv_out::write_summary_csv;
pub use parquet_out::write_merged_parquet;

const MAX_DECIMALS: usize = 6;

/// Decimals needed to show `value` exactly, up to [`MAX_DECIMALS`].
fn decimals_needed(value: f64) -> usize {
    if !value.is_finite() {
        return 0;
    }
    let text = format!("{:.*}", MAX_DECIMALS, value);
    let fraction = text.split('.').nth(1).unwrap_or("");
    fraction.trim_end_matches('0').len()
}

/// All values of a float column share one number of decimals (at least one).
fn format_float_column(values: &[f64]) -> Vec<String> {
    let decimals = values
        .iter()
        .map(|v| decimals_needed(*v))
        .max()
        .unwrap_or(0)
        .max(1);
    values
        .iter()
        .map(|v| {
            if v.is_nan() {
                "NaN".to_string()
            } else if v.is_infinite() {
                let sign = if *v > 0.0 { "" } else { "-" };
                format!("{}inf", sign)
            } else {
                format!("{:.*}", decimals, v)
            }
        })
        .collect()
}

/// Render the summary as an aligned text table, without a row index.
pub fn render_table(summary: &[RegionSummary]) -> String {
    let regions: Vec<String> = summary.iter().map(|s| s.region.clone()).collect();
    let values = format_float_column(
        &summary
            .iter()
            .map(|s| s.gdp_per_capita)
            .collect::<Vec<_>>(),
    );

    let width = |header: &str, cells: &[String]| {
        cells
            .iter()
            .map(|c| c.chars().count())
            .chain(std::iter::once(header.chars().count()))
            .max()
            .unwrap_or(0)
    };
    let region_width = width(COL_REGION, &regions);
    let value_width = width(COL_GDP_PER_CAPITA, &values);

    let mut out = format!(
        "{:>rw$} {:>vw$}",
        COL_REGION,
        COL_GDP_PER_CAPITA,
        rw = region_width,
        vw = value_width
    );
    for (region, value) in regions.iter().zip(&values) {
        out.push('\n');
        out.push_str(&format!(
            "{:>rw$} {:>vw$}",
            region,
            value,
            rw = region_width,
            vw = value_width
        ));
    }
    out
}

/// Print the summary table to stdout.
pub fn print_summary(summary: &[RegionSummary]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", render_table(summary))
}
