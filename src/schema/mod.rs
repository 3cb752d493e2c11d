// src/schema/mod.rs
//! Typed views of the four input sheets, read by header name.

pub mod types;

pub use types::{
    CleanGdpRow, MergedRow, MunicipalGdpRow, PopulationRow, RegionRow, RegionSummary, Sheets,
    StateCodeRow, StateIdentifier,
};

use crate::config::{
    COL_AGE_BRACKET, COL_GDP, COL_GRANULARITY, COL_IDENTIFIER, COL_MUNICIPALITY, COL_POPULATION,
    COL_REGION, COL_STATE, COL_STATE_CODE, SHEETS, SHEET_MUNICIPAL_GDP, SHEET_POPULATION,
    SHEET_REGIONS, SHEET_STATE_CODES,
};
use crate::error::PipelineError;
use crate::process::utils::{optional_text, to_integer, to_numeric};
use crate::workbook::{RawTable, Workbook};

pub fn population_rows(table: &RawTable) -> Result<Vec<PopulationRow>, PipelineError> {
    let granularity = table.column_index(SHEET_POPULATION, COL_GRANULARITY)?;
    let age_bracket = table.column_index(SHEET_POPULATION, COL_AGE_BRACKET)?;
    let population = table.column_index(SHEET_POPULATION, COL_POPULATION)?;

    Ok(table
        .rows
        .iter()
        .map(|row| PopulationRow {
            granularity: optional_text(&row[granularity]),
            age_bracket: optional_text(&row[age_bracket]),
            population: to_numeric(&row[population]),
        })
        .collect())
}

pub fn state_code_rows(table: &RawTable) -> Result<Vec<StateCodeRow>, PipelineError> {
    let granularity = table.column_index(SHEET_STATE_CODES, COL_GRANULARITY)?;
    let state_code = table.column_index(SHEET_STATE_CODES, COL_STATE_CODE)?;
    let identifier = table.optional_column_index(COL_IDENTIFIER);

    Ok(table
        .rows
        .iter()
        .map(|row| StateCodeRow {
            granularity: optional_text(&row[granularity]),
            state_code: optional_text(&row[state_code]),
            identifier: match identifier {
                None => StateIdentifier::NotCarried,
                Some(i) => to_integer(&row[i]).map_or(StateIdentifier::Blank, StateIdentifier::Known),
            },
        })
        .collect())
}

pub fn municipal_gdp_rows(table: &RawTable) -> Result<Vec<MunicipalGdpRow>, PipelineError> {
    let municipality = table.column_index(SHEET_MUNICIPAL_GDP, COL_MUNICIPALITY)?;
    let identifier = table.column_index(SHEET_MUNICIPAL_GDP, COL_IDENTIFIER)?;
    let gdp = table.column_index(SHEET_MUNICIPAL_GDP, COL_GDP)?;

    Ok(table
        .rows
        .iter()
        .map(|row| MunicipalGdpRow {
            municipality: optional_text(&row[municipality]),
            identifier: to_numeric(&row[identifier]),
            gdp: optional_text(&row[gdp]),
        })
        .collect())
}

pub fn region_rows(table: &RawTable) -> Result<Vec<RegionRow>, PipelineError> {
    let state = table.column_index(SHEET_REGIONS, COL_STATE)?;
    let region = table.column_index(SHEET_REGIONS, COL_REGION)?;

    Ok(table
        .rows
        .iter()
        .map(|row| RegionRow {
            state: optional_text(&row[state]),
            region: optional_text(&row[region]),
        })
        .collect())
}

/// Pull the four input sheets out of `workbook`.
pub fn read_sheets(workbook: &Workbook) -> Result<Sheets, PipelineError> {
    workbook.require(&SHEETS)?;
    Ok(Sheets {
        population: population_rows(workbook.sheet(SHEET_POPULATION)?)?,
        state_codes: state_code_rows(workbook.sheet(SHEET_STATE_CODES)?)?,
        municipal_gdp: municipal_gdp_rows(workbook.sheet(SHEET_MUNICIPAL_GDP)?)?,
        regions: region_rows(workbook.sheet(SHEET_REGIONS)?)?,
    })
}
