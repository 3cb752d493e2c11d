//! GDP per capita by Brazilian macro-region, from a four-sheet workbook.
//!
//! The run is a straight pipeline: [`workbook`] loads raw sheets, [`schema`]
//! types them, [`process`] cleans, merges and aggregates, [`report`] prints
//! or exports the result.

pub mod config;
pub mod error;
pub mod process;
pub mod report;
pub mod schema;
pub mod workbook;

pub use error::PipelineError;
pub use process::{process_workbook, PipelineOutput};
