// src/schema/types.rs

use serde::Serialize;

/// One row of `Populacao_Estado`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PopulationRow {
    /// Country ("Brasil") or state name.
    pub granularity: Option<String>,
    pub age_bracket: Option<String>,
    pub population: Option<f64>,
}

/// One row of `De_para_UF`: state name → UF acronym.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StateCodeRow {
    pub granularity: Option<String>,
    pub state_code: Option<String>,
    pub identifier: StateIdentifier,
}

/// The `Cod_Identificacao` cell of a `De_para_UF` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StateIdentifier {
    /// The sheet has no identifier column.
    #[default]
    NotCarried,
    /// The column exists but this cell is empty or not an integer.
    Blank,
    Known(i64),
}

impl StateIdentifier {
    pub fn value(self) -> Option<i64> {
        match self {
            StateIdentifier::Known(v) => Some(v),
            _ => None,
        }
    }
}

/// One row of `PIB_municipio`, as loaded. GDP is kept as text until cleaning.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MunicipalGdpRow {
    /// e.g. `"Porto Velho (RO)"`
    pub municipality: Option<String>,
    pub identifier: Option<f64>,
    pub gdp: Option<String>,
}

/// One row of `UF_Regiao`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegionRow {
    pub state: Option<String>,
    /// Abbreviation on load (`"NE"`), display name after cleaning (`"Nordeste"`).
    pub region: Option<String>,
}

/// The four input sheets, typed.
#[derive(Debug, Clone, Default)]
pub struct Sheets {
    pub population: Vec<PopulationRow>,
    pub state_codes: Vec<StateCodeRow>,
    pub municipal_gdp: Vec<MunicipalGdpRow>,
    pub regions: Vec<RegionRow>,
}

/// A municipal GDP row that survived cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanGdpRow {
    pub municipality: String,
    pub state_code: String,
    pub identifier: f64,
    /// `identifier` floor-divided down to its state prefix.
    pub state_key: i64,
    /// GDP in currency units (already rescaled).
    pub gdp: f64,
}

/// One row of the merged per-state table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergedRow {
    pub state: Option<String>,
    pub state_code: String,
    pub region: Option<String>,
    pub identifier: Option<i64>,
    pub population: f64,
    pub gdp: Option<f64>,
    pub gdp_per_capita: Option<f64>,
}

/// One line of the final report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSummary {
    #[serde(rename = "Regiao")]
    pub region: String,
    #[serde(rename = "PIB_per_capita")]
    pub gdp_per_capita: f64,
}
