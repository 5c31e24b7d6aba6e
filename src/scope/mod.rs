// src/scope/mod.rs

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::{collections::HashMap, fs::File, io::Read, path::Path};
use tracing::info;

use crate::coverage::{Coverage, CoverageRecord, CoverageTable};

/// The two instrument families a scheme can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Tax,
    Ets,
}

/// One row of the scheme scope table: which jurisdictions and sectors a
/// scheme covers over an effective year range. This replaces the original
/// hand-maintained per-scheme literals with structured data.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemeScope {
    pub scheme_id: String,
    pub instrument: Instrument,
    pub year_from: i32,
    pub year_to: i32,
    /// `;`-separated jurisdiction names.
    pub jurisdictions: String,
    /// `;`-separated IPCC codes.
    pub ipcc_codes: String,
}

impl SchemeScope {
    pub fn jurisdictions(&self) -> impl Iterator<Item = &str> {
        self.jurisdictions
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn ipcc_codes(&self) -> impl Iterator<Item = &str> {
        self.ipcc_codes
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

pub fn load_scopes(path: &Path) -> Result<Vec<SchemeScope>> {
    let file =
        File::open(path).with_context(|| format!("opening scope table {}", path.display()))?;
    parse_scopes(file).with_context(|| format!("parsing scope table {}", path.display()))
}

pub fn parse_scopes<R: Read>(reader: R) -> Result<Vec<SchemeScope>> {
    let mut rdr = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut scopes = Vec::new();
    for (idx, result) in rdr.deserialize::<SchemeScope>().enumerate() {
        let scope = result.with_context(|| format!("scope row {}", idx + 2))?;
        if scope.year_from > scope.year_to {
            bail!(
                "scheme {}: year range {}..{} is inverted",
                scope.scheme_id,
                scope.year_from,
                scope.year_to
            );
        }
        scopes.push(scope);
    }
    Ok(scopes)
}

/// Cross-product the scope rows into category-level coverage records with the
/// scheme's instrument marked covered.
pub fn expand_scopes(scopes: &[SchemeScope]) -> CoverageTable {
    let mut table = Vec::new();
    for scope in scopes {
        for year in scope.year_from..=scope.year_to {
            for jurisdiction in scope.jurisdictions() {
                for code in scope.ipcc_codes() {
                    let mut record = CoverageRecord {
                        jurisdiction: jurisdiction.to_string(),
                        year,
                        ipcc_code: code.to_string(),
                        source: scope.scheme_id.clone(),
                        ..Default::default()
                    };
                    match scope.instrument {
                        Instrument::Tax => record.tax = Some(Coverage::Covered),
                        Instrument::Ets => record.ets = Some(Coverage::Covered),
                    }
                    table.push(record);
                }
            }
        }
    }
    table
}

/// Merge scope-derived records into the priced table. Directly recorded data
/// wins: an existing row only gains a dummy where it had none, and rows the
/// table lacks entirely are appended.
pub fn merge_scoped(table: &mut CoverageTable, scoped: CoverageTable) {
    let mut index: HashMap<(String, i32, String, String), usize> = table
        .iter()
        .enumerate()
        .map(|(i, r)| (r.sort_key(), i))
        .collect();

    let mut appended = 0usize;
    for record in scoped {
        match index.get(&record.sort_key()) {
            Some(&i) => {
                let existing = &mut table[i];
                if existing.tax.is_none() {
                    existing.tax = record.tax;
                }
                if existing.ets.is_none() {
                    existing.ets = record.ets;
                }
            }
            None => {
                index.insert(record.sort_key(), table.len());
                table.push(record);
                appended += 1;
            }
        }
    }
    info!(appended, "merged scheme scope records");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
scheme_id,instrument,year_from,year_to,jurisdictions,ipcc_codes
test_tax,tax,2019,2020,Testland,1A1A1;1A1A2
test_ets,ets,2020,2020,Testland;Otherland,1A2
";

    #[test]
    fn parses_and_expands_the_cross_product() -> Result<()> {
        let scopes = parse_scopes(Cursor::new(SAMPLE))?;
        assert_eq!(scopes.len(), 2);

        let table = expand_scopes(&scopes);
        // 2 years x 1 jurisdiction x 2 codes + 1 year x 2 jurisdictions x 1 code
        assert_eq!(table.len(), 6);
        assert!(table
            .iter()
            .filter(|r| r.source == "test_tax")
            .all(|r| r.tax == Some(Coverage::Covered) && r.ets.is_none()));
        assert!(table
            .iter()
            .filter(|r| r.source == "test_ets")
            .all(|r| r.ets == Some(Coverage::Covered) && r.tax.is_none()));
        Ok(())
    }

    #[test]
    fn rejects_inverted_year_range() {
        let csv = "scheme_id,instrument,year_from,year_to,jurisdictions,ipcc_codes\n\
                   bad,tax,2021,2019,Testland,1A\n";
        assert!(parse_scopes(Cursor::new(csv)).is_err());
    }

    #[test]
    fn merge_never_overwrites_recorded_data() -> Result<()> {
        let scopes = parse_scopes(Cursor::new(SAMPLE))?;
        let mut table = vec![CoverageRecord {
            jurisdiction: "Testland".into(),
            year: 2020,
            ipcc_code: "1A1A1".into(),
            tax: Some(Coverage::Uncovered),
            ..Default::default()
        }];
        merge_scoped(&mut table, expand_scopes(&scopes));

        let direct = table
            .iter()
            .find(|r| r.year == 2020 && r.ipcc_code == "1A1A1")
            .unwrap();
        assert_eq!(direct.tax, Some(Coverage::Uncovered), "explicit 0 kept");
        // The 2019 scope row had no direct counterpart and was appended.
        assert!(table
            .iter()
            .any(|r| r.year == 2019 && r.ipcc_code == "1A1A1" && r.tax == Some(Coverage::Covered)));
        Ok(())
    }
}
