// src/process/clean.rs
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use crate::config::{self, CellPatch, COL_GRANULARITY, COL_STATE_CODE, GDP_SCALE, STATE_KEY_DIVISOR};
use crate::error::PipelineError;
use crate::process::utils::to_numeric;
use crate::schema::{CleanGdpRow, MunicipalGdpRow, RegionRow, StateCodeRow};

/// Greedy: everything between the first `(` and the last `)`.
static STATE_CODE_IN_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((.*)\)").expect("state code pattern is valid"));

/// Overwrite one cell of the state-code sheet. Returns whether the row existed.
pub fn apply_state_code_patch(rows: &mut [StateCodeRow], patch: &CellPatch) -> bool {
    let Some(row) = rows.get_mut(patch.row) else {
        warn!(row = patch.row, "state-code correction skipped: row not present");
        return false;
    };
    let value = Some(patch.value.to_string());
    match patch.column {
        COL_STATE_CODE => row.state_code = value,
        COL_GRANULARITY => row.granularity = value,
        other => {
            warn!(column = other, "state-code correction skipped: unknown column");
            return false;
        }
    }
    debug!(row = patch.row, column = patch.column, value = patch.value, "patched state code");
    true
}

/// Drop repeated rows, keeping the first occurrence of each.
pub fn dedup_state_codes(rows: Vec<StateCodeRow>) -> Vec<StateCodeRow> {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.into_iter()
        .filter(|row| seen.insert(row.clone()))
        .collect()
}

/// State acronym between parentheses in a municipality label.
pub fn extract_state_code(label: &str) -> Option<&str> {
    STATE_CODE_IN_LABEL
        .captures(label)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Leading digits of a municipality identifier that name its state.
pub fn state_key(identifier: f64) -> i64 {
    (identifier / STATE_KEY_DIVISOR as f64).floor() as i64
}

/// Coerce, rescale and key the municipal GDP sheet.
///
/// Rows with a missing label, identifier or unparseable GDP are dropped. A
/// label without a parenthesised state code is fatal, whatever its GDP. Rows
/// whose GDP is not positive are dropped after that check.
#[instrument(level = "info", skip(rows), fields(input = rows.len()))]
pub fn clean_municipal_gdp(rows: &[MunicipalGdpRow]) -> Result<Vec<CleanGdpRow>> {
    let mut out = Vec::with_capacity(rows.len());
    let mut dropped_missing = 0usize;
    let mut dropped_non_positive = 0usize;

    for (idx, row) in rows.iter().enumerate() {
        let gdp = row.gdp.as_deref().and_then(to_numeric).map(|v| v * GDP_SCALE);
        let (Some(label), Some(identifier), Some(gdp)) =
            (row.municipality.as_deref(), row.identifier, gdp)
        else {
            dropped_missing += 1;
            continue;
        };
        let state_code = extract_state_code(label).ok_or_else(|| {
            PipelineError::MalformedMunicipality {
                row: idx,
                label: label.to_string(),
            }
        })?;

        if !(gdp > 0.0) {
            dropped_non_positive += 1;
            continue;
        }

        out.push(CleanGdpRow {
            municipality: label.to_string(),
            state_code: state_code.to_string(),
            identifier,
            state_key: state_key(identifier),
            gdp,
        });
    }

    if dropped_missing > 0 {
        debug!(dropped_missing, "municipal rows without usable GDP dropped");
    }
    if dropped_non_positive > 0 {
        warn!(dropped_non_positive, "municipal rows with non-positive GDP dropped");
    }
    info!(kept = out.len(), "municipal GDP cleaned");
    Ok(out)
}

/// Replace region abbreviations with display names; unknown ones become missing.
pub fn name_regions(rows: Vec<RegionRow>) -> Vec<RegionRow> {
    rows.into_iter()
        .map(|row| {
            let region = row.region.as_deref().and_then(|abbr| {
                let name = config::region_name(abbr);
                if name.is_none() {
                    debug!(abbreviation = abbr, state = ?row.state, "unknown region abbreviation");
                }
                name
            });
            RegionRow {
                state: row.state,
                region: region.map(str::to_string),
            }
        })
        .collect()
}

/// Patch then deduplicate the state-code sheet.
pub fn clean_state_codes(mut rows: Vec<StateCodeRow>) -> Vec<StateCodeRow> {
    apply_state_code_patch(&mut rows, &config::STATE_CODE_PATCH);
    let before = rows.len();
    let rows = dedup_state_codes(rows);
    debug!(before, after = rows.len(), "state codes deduplicated");
    rows
}
