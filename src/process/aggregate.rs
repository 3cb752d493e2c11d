// src/process/aggregate.rs
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::{OUTPUT_DECIMALS, TOTAL_ROW_LABEL};
use crate::process::merge::MergeOutput;
use crate::process::utils::round_to;
use crate::schema::{MergedRow, RegionSummary};

/// Sum per-capita GDP per region, rounded, in region-name order.
/// Rows without a region are left out; missing per-capita values count as zero.
pub fn per_capita_by_region(rows: &[MergedRow]) -> Vec<RegionSummary> {
    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
    let mut unassigned = 0usize;
    for row in rows {
        let Some(region) = row.region.as_deref() else {
            unassigned += 1;
            continue;
        };
        *sums.entry(region).or_insert(0.0) += row.gdp_per_capita.unwrap_or(0.0);
    }
    if unassigned > 0 {
        debug!(unassigned, "rows without region left out of the summary");
    }

    sums.into_iter()
        .map(|(region, sum)| RegionSummary {
            region: region.to_string(),
            gdp_per_capita: round_to(sum, OUTPUT_DECIMALS),
        })
        .collect()
}

/// Nationwide GDP per capita from the raw (unrounded) merged GDP.
pub fn national_per_capita(rows: &[MergedRow], country_population: f64) -> f64 {
    let total_gdp: f64 = rows.iter().filter_map(|r| r.gdp).sum();
    round_to(total_gdp / country_population, OUTPUT_DECIMALS)
}

/// Region rows followed by the `Total` row.
///
/// `Total` is computed from the raw merged GDP, not from the rounded region
/// rows above it, so it is not their sum.
pub fn summarize(merged: &MergeOutput) -> Vec<RegionSummary> {
    let mut summary = per_capita_by_region(&merged.rows);
    let total = national_per_capita(&merged.rows, merged.country_population);
    summary.push(RegionSummary {
        region: TOTAL_ROW_LABEL.to_string(),
        gdp_per_capita: total,
    });
    info!(regions = summary.len() - 1, total, "summary computed");
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(region: Option<&str>, population: f64, gdp: Option<f64>) -> MergedRow {
        MergedRow {
            state: region.map(|_| "s".to_string()),
            state_code: "XX".into(),
            region: region.map(str::to_string),
            identifier: None,
            population,
            gdp,
            gdp_per_capita: gdp.map(|g| g / population),
        }
    }

    #[test]
    fn test_two_states_one_region() {
        let merged = MergeOutput {
            rows: vec![
                row(Some("Norte"), 100.0, Some(200.0)),
                row(Some("Norte"), 50.0, Some(100.0)),
            ],
            country_population: 150.0,
        };
        let summary = summarize(&merged);
        assert_eq!(
            summary,
            vec![
                RegionSummary {
                    region: "Norte".into(),
                    gdp_per_capita: 4.0
                },
                RegionSummary {
                    region: "Total".into(),
                    gdp_per_capita: 2.0
                },
            ]
        );
    }

    #[test]
    fn test_regions_sorted_and_total_last() {
        let merged = MergeOutput {
            rows: vec![
                row(Some("Sul"), 10.0, Some(10.0)),
                row(Some("Centro-Oeste"), 10.0, Some(20.0)),
                row(Some("Norte"), 10.0, Some(30.0)),
                row(None, 10.0, Some(40.0)),
                row(Some("Nordeste"), 10.0, None),
            ],
            country_population: 50.0,
        };
        let summary = summarize(&merged);
        let names: Vec<&str> = summary.iter().map(|s| s.region.as_str()).collect();
        assert_eq!(names, vec!["Centro-Oeste", "Nordeste", "Norte", "Sul", "Total"]);
        assert_eq!(summary.iter().filter(|s| s.region == "Total").count(), 1);

        // region without GDP sums to zero
        assert_eq!(summary[1].gdp_per_capita, 0.0);
        // the unassigned row still counts toward the national figure
        assert_eq!(summary[4].gdp_per_capita, 2.0);
    }

    #[test]
    fn test_total_is_not_sum_of_rounded_regions() {
        let merged = MergeOutput {
            rows: vec![
                row(Some("Norte"), 3.0, Some(1.0)),
                row(Some("Sul"), 3.0, Some(1.0)),
            ],
            country_population: 3.0,
        };
        let summary = summarize(&merged);
        assert_eq!(summary[0].gdp_per_capita, 0.33);
        assert_eq!(summary[1].gdp_per_capita, 0.33);
        assert_eq!(summary[2].gdp_per_capita, 0.67);
    }
}
