use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::Read,
    path::Path,
};

use crate::taxonomy::code::SectorLevels;

/// Reference table mapping every IPCC code to its parent category, as loaded
/// from the static taxonomy CSV. The child lookup this builds is what the
/// roll-up uses to select exactly one level of disaggregation at a time.
#[derive(Debug, Default)]
pub struct SectorTaxonomy {
    parent_of: HashMap<String, String>,
    /// Children kept sorted so roll-up order is deterministic.
    children_of: BTreeMap<String, Vec<String>>,
}

impl SectorTaxonomy {
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("opening taxonomy reference {}", path.display()))?;
        Self::from_reader(file)
            .with_context(|| format!("parsing taxonomy reference {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers().context("reading taxonomy headers")?.clone();
        let code_col = find_column(&headers, &["ipcc_code", "ipcc_cat_code"])
            .ok_or_else(|| anyhow!("taxonomy reference is missing an ipcc_code column"))?;
        let parent_col = find_column(&headers, &["parent_category", "parent"])
            .ok_or_else(|| anyhow!("taxonomy reference is missing a parent_category column"))?;

        let mut taxonomy = Self::default();
        for (idx, result) in rdr.records().enumerate() {
            let record = result.with_context(|| format!("taxonomy record {}", idx + 1))?;
            let code = record
                .get(code_col)
                .ok_or_else(|| anyhow!("taxonomy record {} has no code field", idx + 1))?
                .to_string();
            if code.is_empty() {
                continue;
            }
            // Validate up front so bad taxonomy rows fail the load, not the roll-up.
            SectorLevels::decompose(&code)
                .with_context(|| format!("taxonomy record {}", idx + 1))?;

            let parent = record.get(parent_col).unwrap_or("").to_string();
            if !parent.is_empty() {
                taxonomy
                    .children_of
                    .entry(parent.clone())
                    .or_default()
                    .push(code.clone());
                taxonomy.parent_of.insert(code, parent);
            } else {
                taxonomy.parent_of.insert(code, String::new());
            }
        }
        for children in taxonomy.children_of.values_mut() {
            children.sort();
            children.dedup();
        }
        Ok(taxonomy)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.parent_of.contains_key(code)
    }

    pub fn parent_of(&self, code: &str) -> Option<&str> {
        self.parent_of
            .get(code)
            .map(String::as_str)
            .filter(|p| !p.is_empty())
    }

    /// The codes exactly one level of disaggregation below `code`.
    pub fn children_of(&self, code: &str) -> &[String] {
        self.children_of.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All codes in the taxonomy, unordered.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.parent_of.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.parent_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent_of.is_empty()
    }
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
}
