// src/workbook/mod.rs
use anyhow::{Context, Result};
use std::{collections::BTreeMap, path::Path};
use tracing::{debug, info, warn};

use crate::error::PipelineError;

pub mod csv_dir;
pub mod xlsx;

/// A sheet as read from the workbook, before any typing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    /// Column names, from the first non-blank row of the sheet.
    pub headers: Vec<String>,
    /// Each data row, exactly one String per header; absent cells are empty.
    pub rows: Vec<Vec<String>>,
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

impl RawTable {
    /// Build a table from a dense cell grid. The first non-blank row becomes the
    /// header. Blank rows between data rows are kept as empty rows so every row
    /// keeps its position; trailing blank rows are dropped. Ragged rows are
    /// padded to the header width.
    pub fn from_grid(grid: Vec<Vec<String>>) -> Self {
        let mut rows = grid.into_iter().skip_while(|row| is_blank(row));

        let headers: Vec<String> = match rows.next() {
            Some(header) => header.into_iter().map(|h| h.trim().to_string()).collect(),
            None => return Self::default(),
        };

        let width = headers.len();
        let mut rows: Vec<Vec<String>> = rows
            .map(|mut row| {
                if row.len() > width {
                    debug!(
                        cells = row.len(),
                        width, "row wider than header, extra cells dropped"
                    );
                }
                row.resize(width, String::new());
                row
            })
            .collect();
        while rows.last().is_some_and(|row| is_blank(row)) {
            rows.pop();
        }

        Self { headers, rows }
    }

    /// Position of `column` in the header row.
    pub fn column_index(&self, sheet: &str, column: &str) -> Result<usize, PipelineError> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| PipelineError::MissingColumn {
                sheet: sheet.to_string(),
                column: column.to_string(),
            })
    }

    /// Like [`column_index`](Self::column_index), for columns a sheet may omit.
    pub fn optional_column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }
}

/// All sheets of one workbook, keyed by sheet name.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: BTreeMap<String, RawTable>,
}

impl Workbook {
    pub fn new(sheets: BTreeMap<String, RawTable>) -> Self {
        Self { sheets }
    }

    pub fn sheet(&self, name: &str) -> Result<&RawTable, PipelineError> {
        self.sheets.get(name).ok_or_else(|| {
            warn!(
                missing = name,
                available = ?self.sheet_names().collect::<Vec<_>>(),
                "sheet not found"
            );
            PipelineError::MissingSheet(name.to_string())
        })
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    /// Fail early if any of `names` is absent.
    pub fn require(&self, names: &[&str]) -> Result<(), PipelineError> {
        for name in names {
            self.sheet(name)?;
        }
        Ok(())
    }
}

/// Load every sheet of the workbook at `path`.
///
/// An `.xlsx` file is read directly; a directory is treated as a set of CSV
/// exports, one `<sheet>.csv` per sheet.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_workbook<P: AsRef<Path>>(path: P) -> Result<Workbook> {
    let path = path.as_ref();
    let sheets = if path.is_dir() {
        csv_dir::load_csv_dir(path)
            .with_context(|| format!("loading CSV sheets from {}", path.display()))?
    } else {
        xlsx::load_xlsx(path).with_context(|| format!("loading workbook {}", path.display()))?
    };

    if sheets.is_empty() {
        warn!("workbook has no sheets");
    }
    for (name, table) in &sheets {
        info!(sheet = %name, rows = table.rows.len(), columns = table.headers.len(), "loaded sheet");
    }
    Ok(Workbook::new(sheets))
}
