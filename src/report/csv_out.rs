// src/report/csv_out.rs
use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::path::Path;
use tracing::info;

use crate::schema::RegionSummary;

/// Write the summary as `Regiao,PIB_per_capita` CSV.
pub fn write_summary_csv<P: AsRef<Path>>(path: P, summary: &[RegionSummary]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("creating CSV file {:?}", path))?;
    for row in summary {
        writer
            .serialize(row)
            .with_context(|| format!("writing {} to {:?}", row.region, path))?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing {:?}", path))?;
    info!(path = %path.display(), rows = summary.len(), "summary CSV written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_write_summary_csv() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("results.csv");
        let summary = vec![
            RegionSummary {
                region: "Norte".into(),
                gdp_per_capita: 4.0,
            },
            RegionSummary {
                region: "Total".into(),
                gdp_per_capita: 2.5,
            },
        ];

        write_summary_csv(&path, &summary)?;
        let text = fs::read_to_string(&path)?;
        assert_eq!(text, "Regiao,PIB_per_capita\nNorte,4.0\nTotal,2.5\n");
        Ok(())
    }
}
