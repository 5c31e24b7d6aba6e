// src/aggregate/mod.rs

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use crate::coverage::{unanimous, CoverageRecord, CoverageTable};
use crate::taxonomy::{SectorLevels, SectorTaxonomy, MAX_DEPTH};

/// Bottom-up roll-up of coverage dummies.
///
/// For every jurisdiction/year in the table this produces a roll-up-adjusted
/// dummy per instrument at every sector-code level the taxonomy can reach
/// from the observed records: first products roll into their IPCC category,
/// then categories roll level 6 -> 1 through the taxonomy's child lookup.
/// Directly recorded values are never overwritten; computed aggregates only
/// fill gaps.
pub struct CoverageAggregator<'a> {
    taxonomy: &'a SectorTaxonomy,
    /// Taxonomy codes grouped by hierarchy depth, sorted within each depth.
    codes_by_depth: Vec<Vec<String>>,
}

impl<'a> CoverageAggregator<'a> {
    pub fn new(taxonomy: &'a SectorTaxonomy) -> Result<Self> {
        let mut codes_by_depth = vec![Vec::new(); MAX_DEPTH + 1];
        for code in taxonomy.codes() {
            let depth = SectorLevels::decompose(code)
                .with_context(|| format!("taxonomy code {code:?}"))?
                .depth();
            codes_by_depth[depth].push(code.to_string());
        }
        for codes in &mut codes_by_depth {
            codes.sort();
        }
        Ok(Self {
            taxonomy,
            codes_by_depth,
        })
    }

    /// Run both roll-up phases over the whole table and return it in
    /// canonical (jurisdiction, year, code, product) order.
    pub fn run(&self, mut table: CoverageTable) -> Result<CoverageTable> {
        // Validate every code up front so a malformed one aborts the run
        // naming the offending record.
        let mut seen: HashSet<&str> = HashSet::new();
        for record in &table {
            if seen.insert(record.ipcc_code.as_str()) {
                SectorLevels::decompose(&record.ipcc_code).with_context(|| {
                    format!(
                        "jurisdiction {}, year {}: sector code {:?}",
                        record.jurisdiction, record.year, record.ipcc_code
                    )
                })?;
            }
        }
        drop(seen);

        let mut groups: BTreeMap<(String, i32), Vec<usize>> = BTreeMap::new();
        for (i, record) in table.iter().enumerate() {
            groups
                .entry((record.jurisdiction.clone(), record.year))
                .or_default()
                .push(i);
        }

        for ((jurisdiction, year), idxs) in groups {
            self.run_group(&mut table, &jurisdiction, year, &idxs);
        }

        table.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(table)
    }

    fn run_group(
        &self,
        table: &mut CoverageTable,
        jurisdiction: &str,
        year: i32,
        idxs: &[usize],
    ) {
        // Split the group's rows into category rows and product rows per code.
        let mut by_code: BTreeMap<String, CodeRows> = BTreeMap::new();
        for &i in idxs {
            let entry = by_code.entry(table[i].ipcc_code.clone()).or_default();
            if table[i].is_category_level() {
                if entry.category.is_some() {
                    warn!(
                        jurisdiction,
                        year,
                        code = %table[i].ipcc_code,
                        "duplicate category-level row; keeping the first"
                    );
                } else {
                    entry.category = Some(i);
                }
            } else {
                entry.products.push(i);
            }
        }

        // Phase 1: product rows roll into their own category. Explicit
        // category values win; unanimity across products fills the rest.
        for (code, rows) in by_code.iter_mut() {
            for &i in &rows.products {
                table[i].tax_agg = table[i].tax;
                table[i].ets_agg = table[i].ets;
            }
            let product_tax: Vec<_> = rows.products.iter().map(|&i| table[i].tax).collect();
            let product_ets: Vec<_> = rows.products.iter().map(|&i| table[i].ets).collect();
            let rolled_tax = (!product_tax.is_empty()).then(|| unanimous(&product_tax)).flatten();
            let rolled_ets = (!product_ets.is_empty()).then(|| unanimous(&product_ets)).flatten();

            match rows.category {
                Some(ci) => {
                    table[ci].tax_agg = table[ci].tax.or(rolled_tax);
                    table[ci].ets_agg = table[ci].ets.or(rolled_ets);
                }
                None if !rows.products.is_empty() => {
                    table.push(CoverageRecord {
                        jurisdiction: jurisdiction.to_string(),
                        year,
                        ipcc_code: code.clone(),
                        tax_agg: rolled_tax,
                        ets_agg: rolled_ets,
                        ..Default::default()
                    });
                    rows.category = Some(table.len() - 1);
                }
                None => {}
            }
        }

        // Category-level rows present for this jurisdiction/year, by code.
        let mut present: BTreeMap<String, usize> = BTreeMap::new();
        for (code, rows) in &by_code {
            if let Some(ci) = rows.category {
                present.insert(code.clone(), ci);
            }
            if !self.taxonomy.contains(code) {
                warn!(
                    jurisdiction,
                    year,
                    code = %code,
                    "sector code not in taxonomy reference; it will not roll up"
                );
            }
        }

        // Phase 2: walk parent depths from most to least disaggregated.
        // Children are taken from the taxonomy lookup, so each step only ever
        // sees rows exactly one level of disaggregation down.
        for depth in (1..MAX_DEPTH).rev() {
            for parent in &self.codes_by_depth[depth] {
                let child_idxs: Vec<usize> = self
                    .taxonomy
                    .children_of(parent)
                    .iter()
                    .filter_map(|c| present.get(c).copied())
                    .collect();
                // Zero children present: the parent keeps whatever it already
                // has. An empty AND never marks a sector covered.
                if child_idxs.is_empty() {
                    continue;
                }
                let tax_vals: Vec<_> = child_idxs.iter().map(|&i| table[i].tax_agg).collect();
                let ets_vals: Vec<_> = child_idxs.iter().map(|&i| table[i].ets_agg).collect();

                match present.get(parent) {
                    Some(&pi) => {
                        if table[pi].tax_agg.is_none() {
                            table[pi].tax_agg = unanimous(&tax_vals);
                        }
                        if table[pi].ets_agg.is_none() {
                            table[pi].ets_agg = unanimous(&ets_vals);
                        }
                    }
                    None => {
                        debug!(jurisdiction, year, code = %parent, "synthesizing aggregate row");
                        table.push(CoverageRecord {
                            jurisdiction: jurisdiction.to_string(),
                            year,
                            ipcc_code: parent.clone(),
                            tax_agg: unanimous(&tax_vals),
                            ets_agg: unanimous(&ets_vals),
                            ..Default::default()
                        });
                        present.insert(parent.clone(), table.len() - 1);
                    }
                }
            }
        }
    }
}

#[derive(Default)]
struct CodeRows {
    category: Option<usize>,
    products: Vec<usize>,
}
