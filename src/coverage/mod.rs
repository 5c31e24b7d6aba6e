// src/coverage/mod.rs

use anyhow::{bail, Result};

/// A recorded 0/1 coverage dummy. A missing dummy is represented as
/// `Option::None` and is never conflated with `Uncovered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coverage {
    Uncovered,
    Covered,
}

impl Coverage {
    pub fn as_u8(self) -> u8 {
        match self {
            Coverage::Uncovered => 0,
            Coverage::Covered => 1,
        }
    }

    /// Parse a dummy field. Empty and "NA" mean not recorded.
    pub fn parse_field(raw: &str) -> Result<Option<Coverage>> {
        match raw.trim() {
            "" => Ok(None),
            "0" => Ok(Some(Coverage::Uncovered)),
            "1" => Ok(Some(Coverage::Covered)),
            s if s.eq_ignore_ascii_case("na") => Ok(None),
            other => bail!("invalid coverage dummy {:?}: expected 0, 1, NA or empty", other),
        }
    }
}

/// Three-valued AND across a set of dummies: any explicit 0 wins, otherwise
/// any missing value keeps the result unknown, otherwise unanimous 1.
///
/// Callers must handle the empty set themselves; zero children never imply
/// coverage.
pub fn unanimous<'a, I>(values: I) -> Option<Coverage>
where
    I: IntoIterator<Item = &'a Option<Coverage>>,
{
    let mut out = Some(Coverage::Covered);
    for value in values {
        match value {
            Some(Coverage::Uncovered) => return Some(Coverage::Uncovered),
            None => out = None,
            Some(Coverage::Covered) => {}
        }
    }
    out
}

/// One jurisdiction/year/sector/product observation, as ingested from the
/// compiled source files plus the roll-up-adjusted dummies the aggregator
/// fills in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageRecord {
    pub jurisdiction: String,
    pub year: i32,
    pub ipcc_code: String,
    /// Empty for IPCC-category-level rows; a fuel/product name otherwise.
    pub product: String,
    /// Dummies exactly as recorded in the source data.
    pub tax: Option<Coverage>,
    pub ets: Option<Coverage>,
    pub tax_rate: Option<f64>,
    pub ets_price: Option<f64>,
    pub currency_code: String,
    pub source: String,
    pub comment: String,
    /// Roll-up-adjusted dummies, filled by the aggregator.
    pub tax_agg: Option<Coverage>,
    pub ets_agg: Option<Coverage>,
}

impl CoverageRecord {
    pub fn is_category_level(&self) -> bool {
        self.product.is_empty()
    }

    /// Sort key giving the canonical output order.
    pub fn sort_key(&self) -> (String, i32, String, String) {
        (
            self.jurisdiction.clone(),
            self.year,
            self.ipcc_code.clone(),
            self.product.clone(),
        )
    }
}

/// The working table passed between pipeline stages.
pub type CoverageTable = Vec<CoverageRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dummy_fields() {
        assert_eq!(Coverage::parse_field("1").unwrap(), Some(Coverage::Covered));
        assert_eq!(
            Coverage::parse_field("0").unwrap(),
            Some(Coverage::Uncovered)
        );
        assert_eq!(Coverage::parse_field("").unwrap(), None);
        assert_eq!(Coverage::parse_field("NA").unwrap(), None);
        assert_eq!(Coverage::parse_field(" na ").unwrap(), None);
        assert!(Coverage::parse_field("yes").is_err());
        assert!(Coverage::parse_field("2").is_err());
    }

    #[test]
    fn unanimity_requires_every_child() {
        use Coverage::*;
        assert_eq!(
            unanimous([Some(Covered), Some(Covered)].iter()),
            Some(Covered)
        );
        assert_eq!(
            unanimous([Some(Covered), Some(Uncovered)].iter()),
            Some(Uncovered)
        );
        // An explicit 0 beats an unknown; an unknown blocks a 1.
        assert_eq!(unanimous([None, Some(Uncovered)].iter()), Some(Uncovered));
        assert_eq!(unanimous([Some(Covered), None].iter()), None);
    }
}
