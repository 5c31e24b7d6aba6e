// src/output/mod.rs

use anyhow::{Context, Result};
use csv::Writer;
use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::coverage::{Coverage, CoverageRecord};

const HEADER: &[&str] = &[
    "jurisdiction",
    "year",
    "ipcc_code",
    "product",
    "tax_dummy",
    "ets_dummy",
    "tax_rate",
    "ets_price",
    "currency_code",
    "source",
    "comment",
];

/// Standardize a jurisdiction name for use in filenames: periods and commas
/// are stripped, spaces become underscores.
pub fn standardize_jurisdiction_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '.' | ','))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect()
}

/// Writes one CSV per jurisdiction under a `national`/`subnational` split.
pub struct OutputWriter {
    out_dir: PathBuf,
    prefix: String,
    subnational: HashSet<String>,
}

impl OutputWriter {
    pub fn new<I, S>(out_dir: &Path, prefix: &str, subnational: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for sub in ["national", "subnational"] {
            fs::create_dir_all(out_dir.join(sub))
                .with_context(|| format!("creating output directory {}", out_dir.display()))?;
        }
        Ok(Self {
            out_dir: out_dir.to_path_buf(),
            prefix: prefix.to_string(),
            subnational: subnational.into_iter().map(Into::into).collect(),
        })
    }

    /// Write every jurisdiction's records, returning the written paths.
    /// Records must already be in canonical order (the aggregator's output is).
    pub fn write_all(&self, records: &[CoverageRecord]) -> Result<Vec<PathBuf>> {
        let mut by_jurisdiction: BTreeMap<&str, Vec<&CoverageRecord>> = BTreeMap::new();
        for record in records {
            by_jurisdiction
                .entry(record.jurisdiction.as_str())
                .or_default()
                .push(record);
        }

        let mut paths = Vec::with_capacity(by_jurisdiction.len());
        for (jurisdiction, rows) in by_jurisdiction {
            let path = self.jurisdiction_path(jurisdiction);
            self.write_one(&path, &rows)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(jurisdiction, rows = rows.len(), path = %path.display(), "wrote output");
            paths.push(path);
        }
        Ok(paths)
    }

    fn jurisdiction_path(&self, jurisdiction: &str) -> PathBuf {
        let split = if self.subnational.contains(jurisdiction) {
            "subnational"
        } else {
            "national"
        };
        let name = standardize_jurisdiction_name(jurisdiction);
        self.out_dir
            .join(split)
            .join(format!("{}_{}.csv", self.prefix, name))
    }

    fn write_one(&self, path: &Path, rows: &[&CoverageRecord]) -> Result<()> {
        let mut writer = Writer::from_path(path).context("creating output file")?;
        writer.write_record(HEADER)?;
        for row in rows {
            let year = row.year.to_string();
            let tax_rate = rate_field(row.tax_rate);
            let ets_price = rate_field(row.ets_price);
            writer.write_record([
                row.jurisdiction.as_str(),
                year.as_str(),
                row.ipcc_code.as_str(),
                row.product.as_str(),
                dummy_field(row.tax_agg),
                dummy_field(row.ets_agg),
                tax_rate.as_str(),
                ets_price.as_str(),
                row.currency_code.as_str(),
                row.source.as_str(),
                row.comment.as_str(),
            ])?;
        }
        writer.flush().context("flushing output file")?;
        Ok(())
    }
}

/// NA serialises as an empty field, never as a false zero.
fn dummy_field(value: Option<Coverage>) -> &'static str {
    match value {
        Some(Coverage::Covered) => "1",
        Some(Coverage::Uncovered) => "0",
        None => "",
    }
}

fn rate_field(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn standardizes_jurisdiction_names() {
        assert_eq!(
            standardize_jurisdiction_name("St. Kitts, and Nevis"),
            "St_Kitts_and_Nevis"
        );
        assert_eq!(standardize_jurisdiction_name("Sweden"), "Sweden");
        assert_eq!(
            standardize_jurisdiction_name("British Columbia"),
            "British_Columbia"
        );
    }

    #[test]
    fn splits_national_and_subnational_outputs() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let writer = OutputWriter::new(dir.path(), "wcpd", ["British Columbia"])?;

        let records = vec![
            CoverageRecord {
                jurisdiction: "Sweden".into(),
                year: 2020,
                ipcc_code: "1A1A1".into(),
                tax_agg: Some(Coverage::Covered),
                tax_rate: Some(110.0),
                currency_code: "SEK".into(),
                ..Default::default()
            },
            CoverageRecord {
                jurisdiction: "British Columbia".into(),
                year: 2020,
                ipcc_code: "1A2".into(),
                ets_agg: Some(Coverage::Uncovered),
                ..Default::default()
            },
        ];
        let paths = writer.write_all(&records)?;
        assert_eq!(paths.len(), 2);

        let national = dir.path().join("national/wcpd_Sweden.csv");
        let subnational = dir.path().join("subnational/wcpd_British_Columbia.csv");
        assert!(national.exists());
        assert!(subnational.exists());

        let text = fs::read_to_string(&national)?;
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(HEADER.join(",").as_str()));
        assert_eq!(
            lines.next(),
            Some("Sweden,2020,1A1A1,,1,,110,,SEK,,")
        );
        Ok(())
    }
}
