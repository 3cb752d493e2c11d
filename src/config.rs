// src/config.rs

use std::path::PathBuf;

// ─── sheet names ─────────────────────────────────────────────────────
pub const SHEET_POPULATION: &str = "Populacao_Estado";
pub const SHEET_STATE_CODES: &str = "De_para_UF";
pub const SHEET_MUNICIPAL_GDP: &str = "PIB_municipio";
pub const SHEET_REGIONS: &str = "UF_Regiao";

/// Every sheet the pipeline reads, in load order.
pub const SHEETS: [&str; 4] = [
    SHEET_POPULATION,
    SHEET_STATE_CODES,
    SHEET_MUNICIPAL_GDP,
    SHEET_REGIONS,
];

// ─── column names ────────────────────────────────────────────────────
pub const COL_GRANULARITY: &str = "Granularidade";
pub const COL_AGE_BRACKET: &str = "fx_idade";
pub const COL_POPULATION: &str = "Populacao";
pub const COL_STATE_CODE: &str = "UF";
pub const COL_IDENTIFIER: &str = "Cod_Identificacao";
pub const COL_MUNICIPALITY: &str = "Municipio";
pub const COL_GDP: &str = "PIB";
pub const COL_STATE: &str = "Estado";
pub const COL_REGION: &str = "Regiao";
pub const COL_GDP_PER_CAPITA: &str = "PIB_per_capita";

// ─── domain constants ────────────────────────────────────────────────
/// Label of the nationwide row in the population sheet.
pub const COUNTRY_LABEL: &str = "Brasil";
/// Age bracket holding the per-granularity total.
pub const AGE_BRACKET_TOTAL: &str = "Total";
/// Label of the synthetic nationwide row appended to the output.
pub const TOTAL_ROW_LABEL: &str = "Total";

/// GDP in the municipal sheet is expressed in thousands.
pub const GDP_SCALE: f64 = 1000.0;
/// Municipality identifiers carry the state identifier in their leading digits.
pub const STATE_KEY_DIVISOR: i64 = 100_000;
/// Output values are rounded to this many decimals.
pub const OUTPUT_DECIMALS: i32 = 2;

/// Region abbreviation → display name.
pub const REGION_NAMES: [(&str, &str); 5] = [
    ("N", "Norte"),
    ("NE", "Nordeste"),
    ("S", "Sul"),
    ("SE", "Sudeste"),
    ("CO", "Centro-Oeste"),
];

/// A single hardcoded cell correction in the state-code sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPatch {
    /// Zero-based data row (header excluded).
    pub row: usize,
    pub column: &'static str,
    pub value: &'static str,
}

/// "Mato Grosso" ships with the wrong UF acronym.
pub const STATE_CODE_PATCH: CellPatch = CellPatch {
    row: 10,
    column: COL_STATE_CODE,
    value: "MT",
};

/// Default workbook name when none is given on the command line.
pub const DEFAULT_WORKBOOK: &str = "Base de dados Case.xlsx";

/// Runtime options for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub workbook: PathBuf,
    pub csv_out: Option<PathBuf>,
    pub parquet_out: Option<PathBuf>,
}

/// Look up the display name of a region abbreviation.
pub fn region_name(abbreviation: &str) -> Option<&'static str> {
    REGION_NAMES
        .iter()
        .find(|(abbr, _)| *abbr == abbreviation)
        .map(|(_, name)| *name)
}
