// src/process/merge.rs
use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument, warn};

use crate::config::{AGE_BRACKET_TOTAL, COUNTRY_LABEL};
use crate::error::PipelineError;
use crate::schema::{
    CleanGdpRow, MergedRow, PopulationRow, RegionRow, StateCodeRow, StateIdentifier,
};

/// GDP summed over all municipalities sharing a (UF, state key).
#[derive(Debug, Clone, PartialEq)]
pub struct StateGdp {
    pub state_code: String,
    pub state_key: i64,
    pub gdp: f64,
}

/// The merged per-state table plus the nationwide population it is measured against.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutput {
    pub rows: Vec<MergedRow>,
    pub country_population: f64,
}

/// Population rows at the "Total" age bracket, sorted by granularity.
fn total_rows(population: &[PopulationRow]) -> Vec<&PopulationRow> {
    let mut totals: Vec<&PopulationRow> = population
        .iter()
        .filter(|r| r.age_bracket.as_deref() == Some(AGE_BRACKET_TOTAL))
        .collect();
    // missing labels sort last
    totals.sort_by(|a, b| match (&a.granularity, &b.granularity) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    totals
}

/// Nationwide population baseline: the first "Brasil" total row.
///
/// A missing population figure yields NaN rather than an error, so the
/// Total row degrades the same way per-state figures do.
pub fn country_population(population: &[PopulationRow]) -> Result<f64, PipelineError> {
    let matches: Vec<&PopulationRow> = total_rows(population)
        .into_iter()
        .filter(|r| r.granularity.as_deref() == Some(COUNTRY_LABEL))
        .collect();

    let first = matches
        .first()
        .ok_or_else(|| PipelineError::MissingCountryTotal {
            label: COUNTRY_LABEL.to_string(),
            age_bracket: AGE_BRACKET_TOTAL.to_string(),
        })?;
    if matches.len() > 1 {
        warn!(
            matches = matches.len(),
            "several country total rows, using the first"
        );
    }
    Ok(first.population.unwrap_or(f64::NAN))
}

/// Sum GDP per (UF, state key), ordered by key.
pub fn group_gdp_by_state(rows: &[CleanGdpRow]) -> Vec<StateGdp> {
    let mut groups: BTreeMap<(&str, i64), f64> = BTreeMap::new();
    for row in rows {
        *groups
            .entry((row.state_code.as_str(), row.state_key))
            .or_insert(0.0) += row.gdp;
    }
    groups
        .into_iter()
        .map(|((state_code, state_key), gdp)| StateGdp {
            state_code: state_code.to_string(),
            state_key,
            gdp,
        })
        .collect()
}

/// `gdp / population`, or missing when either side is missing or the quotient
/// is not finite.
pub fn per_capita(gdp: Option<f64>, population: f64) -> Option<f64> {
    gdp.map(|g| g / population).filter(|v| v.is_finite())
}

/// Join population, state codes, grouped GDP and regions into one row per state.
#[instrument(level = "info", skip_all)]
pub fn merge_tables(
    population: &[PopulationRow],
    state_codes: &[StateCodeRow],
    gdp: &[CleanGdpRow],
    regions: &[RegionRow],
) -> Result<MergeOutput> {
    // 1) country baseline first: the country row does not survive the joins
    let country_population = country_population(population)?;
    info!(country_population, "country population baseline");

    let totals: Vec<(&str, f64)> = total_rows(population)
        .into_iter()
        .filter_map(|r| Some((r.granularity.as_deref()?, r.population?)))
        .collect();

    // 2) population ⋈ state codes on granularity; unmatched rows and code rows
    //    with a blank UF or blank identifier are dropped
    let mut codes_by_name: HashMap<&str, Vec<&StateCodeRow>> = HashMap::new();
    for row in state_codes {
        if let Some(name) = row.granularity.as_deref() {
            codes_by_name.entry(name).or_default().push(row);
        }
    }
    let mut coded: Vec<(&str, &str, Option<i64>, f64)> = Vec::new();
    for &(name, pop) in &totals {
        let Some(matches) = codes_by_name.get(name) else {
            debug!(granularity = name, "no state code, row dropped");
            continue;
        };
        for code in matches {
            let Some(uf) = code.state_code.as_deref() else {
                debug!(granularity = name, "blank state code, row dropped");
                continue;
            };
            if code.identifier == StateIdentifier::Blank {
                debug!(granularity = name, "blank state identifier, row dropped");
                continue;
            }
            coded.push((name, uf, code.identifier.value(), pop));
        }
    }

    // 3) ⋈ grouped GDP on UF; a UF without GDP keeps a missing value
    let grouped = group_gdp_by_state(gdp);
    let mut gdp_by_code: HashMap<&str, Vec<f64>> = HashMap::new();
    for g in &grouped {
        gdp_by_code.entry(g.state_code.as_str()).or_default().push(g.gdp);
    }
    let mut with_gdp: Vec<(&str, &str, Option<i64>, f64, Option<f64>)> = Vec::new();
    for (name, uf, identifier, pop) in coded {
        match gdp_by_code.get(uf) {
            Some(sums) => {
                for sum in sums {
                    with_gdp.push((name, uf, identifier, pop, Some(*sum)));
                }
            }
            None => {
                debug!(state_code = uf, "no municipal GDP for state");
                with_gdp.push((name, uf, identifier, pop, None));
            }
        }
    }

    // 4) ⋈ regions on granularity == Estado; unmatched rows keep missing region
    let mut regions_by_state: HashMap<&str, Vec<&RegionRow>> = HashMap::new();
    for row in regions {
        if let Some(state) = row.state.as_deref() {
            regions_by_state.entry(state).or_default().push(row);
        }
    }
    let mut rows = Vec::with_capacity(with_gdp.len());
    for (name, uf, identifier, pop, gdp) in with_gdp {
        let base = MergedRow {
            state: None,
            state_code: uf.to_string(),
            region: None,
            identifier,
            population: pop,
            gdp,
            gdp_per_capita: per_capita(gdp, pop),
        };
        match regions_by_state.get(name) {
            Some(matches) => {
                for region in matches {
                    rows.push(MergedRow {
                        state: region.state.clone(),
                        region: region.region.clone(),
                        ..base.clone()
                    });
                }
            }
            None => {
                debug!(granularity = name, "no region for state");
                rows.push(base);
            }
        }
    }

    info!(rows = rows.len(), "merged table built");
    Ok(MergeOutput {
        rows,
        country_population,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pop(name: &str, bracket: &str, value: f64) -> PopulationRow {
        PopulationRow {
            granularity: Some(name.into()),
            age_bracket: Some(bracket.into()),
            population: Some(value),
        }
    }

    fn code(name: &str, uf: &str) -> StateCodeRow {
        StateCodeRow {
            granularity: Some(name.into()),
            state_code: Some(uf.into()),
            identifier: StateIdentifier::NotCarried,
        }
    }

    fn clean(uf: &str, id: f64, gdp: f64) -> CleanGdpRow {
        CleanGdpRow {
            municipality: format!("m{} ({})", id, uf),
            state_code: uf.into(),
            identifier: id,
            state_key: (id / 100_000.0).floor() as i64,
            gdp,
        }
    }

    fn region(state: &str, name: &str) -> RegionRow {
        RegionRow {
            state: Some(state.into()),
            region: Some(name.into()),
        }
    }

    #[test]
    fn test_country_population_requires_total_row() {
        let rows = vec![pop("Brasil", "0 a 4 anos", 10.0), pop("Acre", "Total", 5.0)];
        assert_eq!(
            country_population(&rows),
            Err(PipelineError::MissingCountryTotal {
                label: "Brasil".into(),
                age_bracket: "Total".into(),
            })
        );
    }

    #[test]
    fn test_country_population_takes_first_match() {
        let rows = vec![
            pop("Brasil", "Total", 150.0),
            pop("Brasil", "Total", 999.0),
            pop("Brasil", "0 a 4 anos", 10.0),
        ];
        assert_eq!(country_population(&rows), Ok(150.0));
    }

    #[test]
    fn test_grouped_sum_matches_clean_sum() {
        let rows = vec![
            clean("RO", 1100015.0, 10.0),
            clean("AC", 1200013.0, 7.5),
            clean("RO", 1100023.0, 2.5),
            clean("RO", 1100049.0, 4.0),
        ];
        let grouped = group_gdp_by_state(&rows);
        assert_eq!(
            grouped,
            vec![
                StateGdp {
                    state_code: "AC".into(),
                    state_key: 12,
                    gdp: 7.5
                },
                StateGdp {
                    state_code: "RO".into(),
                    state_key: 11,
                    gdp: 16.5
                },
            ]
        );
        let total: f64 = rows.iter().map(|r| r.gdp).sum();
        let regrouped: f64 = grouped.iter().map(|g| g.gdp).sum();
        assert_eq!(total, regrouped);
    }

    #[test]
    fn test_per_capita_missing_on_zero_or_missing() {
        assert_eq!(per_capita(Some(200.0), 100.0), Some(2.0));
        assert_eq!(per_capita(None, 100.0), None);
        assert_eq!(per_capita(Some(200.0), 0.0), None);
        assert_eq!(per_capita(Some(0.0), 0.0), None);
    }

    #[test]
    fn test_merge_joins_and_drops_country() -> Result<()> {
        let population = vec![
            pop("Brasil", "Total", 150.0),
            pop("Rondônia", "Total", 100.0),
            pop("Acre", "Total", 50.0),
            pop("Acre", "0 a 4 anos", 5.0),
            pop("Atlantis", "Total", 1.0),
        ];
        let codes = vec![code("Rondônia", "RO"), code("Acre", "AC")];
        let gdp = vec![clean("RO", 1100015.0, 200.0), clean("AC", 1200013.0, 100.0)];
        let regions = vec![region("Rondônia", "Norte")];

        let merged = merge_tables(&population, &codes, &gdp, &regions)?;
        assert_eq!(merged.country_population, 150.0);
        assert_eq!(merged.rows.len(), 2);

        // sorted by granularity: Acre before Rondônia
        let acre = &merged.rows[0];
        assert_eq!(acre.state_code, "AC");
        assert_eq!(acre.state, None);
        assert_eq!(acre.region, None);
        assert_eq!(acre.gdp, Some(100.0));
        assert_eq!(acre.gdp_per_capita, Some(2.0));

        let ro = &merged.rows[1];
        assert_eq!(ro.state.as_deref(), Some("Rondônia"));
        assert_eq!(ro.region.as_deref(), Some("Norte"));
        assert_eq!(ro.population, 100.0);
        assert_eq!(ro.gdp_per_capita, Some(2.0));
        Ok(())
    }

    #[test]
    fn test_state_without_gdp_keeps_missing_value() -> Result<()> {
        let population = vec![pop("Brasil", "Total", 10.0), pop("Acre", "Total", 10.0)];
        let codes = vec![code("Acre", "AC")];
        let regions = vec![region("Acre", "Norte")];

        let merged = merge_tables(&population, &codes, &[], &regions)?;
        assert_eq!(merged.rows.len(), 1);
        assert_eq!(merged.rows[0].gdp, None);
        assert_eq!(merged.rows[0].gdp_per_capita, None);
        Ok(())
    }

    #[test]
    fn test_blank_state_identifier_drops_row() -> Result<()> {
        let population = vec![
            pop("Brasil", "Total", 150.0),
            pop("Acre", "Total", 50.0),
            pop("Amapá", "Total", 100.0),
        ];
        let codes = vec![
            StateCodeRow {
                identifier: StateIdentifier::Blank,
                ..code("Acre", "AC")
            },
            StateCodeRow {
                identifier: StateIdentifier::Known(16),
                ..code("Amapá", "AP")
            },
        ];
        let gdp = vec![clean("AC", 1200013.0, 100.0), clean("AP", 1600303.0, 200.0)];

        let merged = merge_tables(&population, &codes, &gdp, &[])?;
        assert_eq!(merged.rows.len(), 1);
        assert_eq!(merged.rows[0].state_code, "AP");
        assert_eq!(merged.rows[0].identifier, Some(16));
        Ok(())
    }
}
