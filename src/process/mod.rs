// src/process/mod.rs
use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::schema::{self, RegionSummary, Sheets};
use crate::workbook;

pub mod aggregate;
pub mod clean;
pub mod merge;
pub mod utils;

pub use merge::MergeOutput;

/// Everything one run produces: the per-state table and the per-region report.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub merged: MergeOutput,
    pub summary: Vec<RegionSummary>,
}

/// clean → merge → aggregate over already typed sheets.
#[tracing::instrument(level = "info", skip_all)]
pub fn run(sheets: Sheets) -> Result<PipelineOutput> {
    let state_codes = clean::clean_state_codes(sheets.state_codes);
    let gdp = clean::clean_municipal_gdp(&sheets.municipal_gdp)?;
    let regions = clean::name_regions(sheets.regions);

    let merged = merge::merge_tables(&sheets.population, &state_codes, &gdp, &regions)?;
    let summary = aggregate::summarize(&merged);

    Ok(PipelineOutput { merged, summary })
}

/// Load the workbook at `path` and run the whole pipeline over it.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn process_workbook<P: AsRef<Path>>(path: P) -> Result<PipelineOutput> {
    let book = workbook::load_workbook(path)?;
    let sheets = schema::read_sheets(&book)?;
    info!(
        population = sheets.population.len(),
        state_codes = sheets.state_codes.len(),
        municipal_gdp = sheets.municipal_gdp.len(),
        regions = sheets.regions.len(),
        "sheets typed"
    );
    run(sheets)
}
