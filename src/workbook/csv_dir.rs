// src/workbook/csv_dir.rs
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::{collections::BTreeMap, fs, path::Path};
use tracing::debug;

use super::RawTable;

/// Read every `<sheet>.csv` in `dir` as a sheet named after the file stem.
pub fn load_csv_dir<P: AsRef<Path>>(dir: P) -> Result<BTreeMap<String, RawTable>> {
    let dir = dir.as_ref();
    let mut tables = BTreeMap::new();

    for entry in fs::read_dir(dir).with_context(|| format!("reading directory {:?}", dir))? {
        let path = entry?.path();
        let is_csv = path.is_file()
            && path
                .extension()
                .and_then(|s| s.to_str())
                .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv {
            continue;
        }
        let Some(sheet) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)
            .with_context(|| format!("Failed to open {:?}", path))?;

        let mut grid = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let record = result
                .with_context(|| format!("CSV parse error in {:?} at record {}", path, idx))?;
            grid.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }
        debug!(sheet, rows = grid.len(), "read CSV sheet");
        tables.insert(sheet.to_string(), RawTable::from_grid(grid));
    }

    Ok(tables)
}
