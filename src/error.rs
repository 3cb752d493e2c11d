// src/error.rs

use thiserror::Error;

/// Fatal conditions raised by the pipeline itself.
///
/// IO and archive failures travel as `anyhow` errors with context attached;
/// these variants stay downcastable so callers can tell input problems apart.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("sheet `{0}` not found in workbook")]
    MissingSheet(String),

    #[error("sheet `{sheet}` has no column `{column}`")]
    MissingColumn { sheet: String, column: String },

    #[error("invalid workbook: {0}")]
    InvalidWorkbook(String),

    #[error("municipality label at row {row} has no state code in parentheses: {label:?}")]
    MalformedMunicipality { row: usize, label: String },

    #[error("no `{age_bracket}` population row for `{label}`")]
    MissingCountryTotal { label: String, age_bracket: String },
}
