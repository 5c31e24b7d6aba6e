// src/ingest/mod.rs

use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::{fs, io::Cursor, path::Path};
use tracing::{debug, info, warn};

use crate::coverage::{Coverage, CoverageRecord, CoverageTable};

/// Header aliases for the two column-naming conventions found in the source
/// files. Matching is case-insensitive, so `Tax_dummy`/`tax_dummy` collapse
/// into one entry.
const JURISDICTION_COLS: &[&str] = &["jurisdiction"];
const YEAR_COLS: &[&str] = &["year"];
const CODE_COLS: &[&str] = &["ipcc_code", "ipcc_cat_code"];
const PRODUCT_COLS: &[&str] = &["product"];
const TAX_COLS: &[&str] = &["tax_dummy", "tax"];
const ETS_COLS: &[&str] = &["ets_dummy", "ets"];
const TAX_RATE_COLS: &[&str] = &["tax_rate", "rate"];
const ETS_PRICE_COLS: &[&str] = &["ets_price", "price"];
const CURRENCY_COLS: &[&str] = &["currency_code", "currency"];
const SOURCE_COLS: &[&str] = &["source"];
const COMMENT_COLS: &[&str] = &["comment"];

/// Load one jurisdiction/scheme CSV into coverage records.
///
/// Required columns: jurisdiction, year, ipcc code and both dummies (under
/// either naming convention). A missing required column fails the file with a
/// message naming it; a malformed row fails with the file and row number.
pub fn read_coverage_csv(path: &Path) -> Result<CoverageTable> {
    let text = read_text_with_fallback(path)?;
    parse_coverage_csv(&text).with_context(|| format!("reading {}", path.display()))
}

/// Like `read_coverage_csv`, but an absent file is a warning and yields no
/// records rather than failing the run.
pub fn read_optional_coverage_csv(path: &Path) -> Result<CoverageTable> {
    if !path.exists() {
        warn!(path = %path.display(), "optional input file absent; skipping");
        return Ok(Vec::new());
    }
    read_coverage_csv(path)
}

/// Load and concatenate every `*.csv` under `dir`, in sorted path order.
pub fn read_coverage_dir(dir: &Path) -> Result<CoverageTable> {
    let pattern = format!("{}/**/*.csv", dir.display());
    let mut paths: Vec<_> = glob::glob(&pattern)
        .with_context(|| format!("globbing {pattern}"))?
        .collect::<Result<_, _>>()
        .context("scanning input directory")?;
    paths.sort();
    if paths.is_empty() {
        bail!("no input CSV files found under {}", dir.display());
    }

    let mut table = Vec::new();
    for path in paths {
        let records = read_coverage_csv(&path)?;
        info!(path = %path.display(), records = records.len(), "ingested");
        table.extend(records);
    }
    Ok(table)
}

pub fn parse_coverage_csv(text: &str) -> Result<CoverageTable> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(Cursor::new(text));

    let headers = rdr.headers().context("reading headers")?.clone();
    let cols = ColumnMap::resolve(&headers)?;

    let mut table = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let row = idx + 2; // 1-based, after the header line
        let record = result.with_context(|| format!("row {row}"))?;
        table.push(
            cols.parse_row(&record)
                .with_context(|| format!("row {row}"))?,
        );
    }
    Ok(table)
}

struct ColumnMap {
    jurisdiction: usize,
    year: usize,
    code: usize,
    product: Option<usize>,
    tax: usize,
    ets: usize,
    tax_rate: Option<usize>,
    ets_price: Option<usize>,
    currency: Option<usize>,
    source: Option<usize>,
    comment: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        let required = |names: &[&str]| {
            find_column(headers, names)
                .ok_or_else(|| anyhow!("missing required column (one of {:?})", names))
        };
        Ok(Self {
            jurisdiction: required(JURISDICTION_COLS)?,
            year: required(YEAR_COLS)?,
            code: required(CODE_COLS)?,
            product: find_column(headers, PRODUCT_COLS),
            tax: required(TAX_COLS)?,
            ets: required(ETS_COLS)?,
            tax_rate: find_column(headers, TAX_RATE_COLS),
            ets_price: find_column(headers, ETS_PRICE_COLS),
            currency: find_column(headers, CURRENCY_COLS),
            source: find_column(headers, SOURCE_COLS),
            comment: find_column(headers, COMMENT_COLS),
        })
    }

    fn parse_row(&self, record: &StringRecord) -> Result<CoverageRecord> {
        let field = |col: usize| record.get(col).unwrap_or("").to_string();
        let optional = |col: Option<usize>| col.map(|c| field(c)).unwrap_or_default();

        let jurisdiction = field(self.jurisdiction);
        if jurisdiction.is_empty() {
            bail!("empty jurisdiction");
        }
        let year: i32 = field(self.year)
            .parse()
            .with_context(|| format!("invalid year {:?}", field(self.year)))?;
        let ipcc_code = field(self.code);
        if ipcc_code.is_empty() {
            bail!("jurisdiction {jurisdiction}, year {year}: empty ipcc code");
        }

        let tax = Coverage::parse_field(&field(self.tax))
            .with_context(|| format!("{jurisdiction} {year} {ipcc_code}: tax dummy"))?;
        let ets = Coverage::parse_field(&field(self.ets))
            .with_context(|| format!("{jurisdiction} {year} {ipcc_code}: ets dummy"))?;

        Ok(CoverageRecord {
            jurisdiction,
            year,
            ipcc_code,
            product: optional(self.product),
            tax,
            ets,
            tax_rate: parse_rate(&optional(self.tax_rate))?,
            ets_price: parse_rate(&optional(self.ets_price))?,
            currency_code: optional(self.currency),
            source: optional(self.source),
            comment: optional(self.comment),
            tax_agg: None,
            ets_agg: None,
        })
    }
}

fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
}

fn parse_rate(raw: &str) -> Result<Option<f64>> {
    match raw.trim() {
        "" => Ok(None),
        s if s.eq_ignore_ascii_case("na") => Ok(None),
        s => s
            .parse::<f64>()
            .map(Some)
            .with_context(|| format!("invalid rate {s:?}")),
    }
}

/// Read a file as UTF-8, falling back to latin-1 for legacy source files.
fn read_text_with_fallback(path: &Path) -> Result<String> {
    let bytes =
        fs::read(path).with_context(|| format!("opening input file {}", path.display()))?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(err) => {
            debug!(path = %path.display(), "not valid UTF-8; decoding as latin-1");
            // latin-1 maps each byte to the code point of the same value.
            Ok(err.into_bytes().iter().map(|&b| b as char).collect())
        }
    }
}
