use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Maximum depth of the IPCC sector-code hierarchy.
pub const MAX_DEPTH: usize = 6;

/// Padding sentinel used while splitting; guaranteed absent from real codes
/// by `CODE_RE`.
const PAD: char = '_';

static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Za-z]{1,6}$").expect("invalid sector code regex"));

/// Catch-all codes standing for an unspecified, all-encompassing sector.
/// They live entirely at level 1 and never go through the character split,
/// regardless of their length.
static NON_DECOMPOSABLE: Lazy<HashSet<&'static str>> = Lazy::new(|| HashSet::from(["20"]));

/// Codes whose decomposition does not follow the one-character-per-level rule.
/// "2B10" is the token sequence "2" / "B" / "10", not "2" / "B" / "1" / "0".
static EXCEPTIONS: Lazy<HashMap<&'static str, [&'static str; MAX_DEPTH]>> =
    Lazy::new(|| HashMap::from([("2B10", ["2", "B", "10", "", "", ""])]));

/// Positional decomposition of a single IPCC sector code into its six
/// hierarchy levels. Unused trailing levels are empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorLevels {
    levels: [String; MAX_DEPTH],
    /// Whole code sits at level 1 and has no parent (catch-all codes).
    atomic: bool,
}

impl SectorLevels {
    /// Decompose `code` into its hierarchy levels.
    ///
    /// Resolution order: the non-decomposable catch-all list, then the
    /// exception table, then the regular one-character-per-level split of a
    /// right-padded code. Anything that matches none of these is a data
    /// error, never silently truncated.
    pub fn decompose(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.is_empty() {
            bail!("empty sector code");
        }

        if NON_DECOMPOSABLE.contains(code) {
            let mut levels: [String; MAX_DEPTH] = Default::default();
            levels[0] = code.to_string();
            return Ok(Self {
                levels,
                atomic: true,
            });
        }

        if let Some(parts) = EXCEPTIONS.get(code) {
            let levels = parts.map(str::to_string);
            return Ok(Self {
                levels,
                atomic: false,
            });
        }

        if !CODE_RE.is_match(code) {
            bail!(
                "malformed sector code {:?}: expected 1-{} alphanumeric characters",
                code,
                MAX_DEPTH
            );
        }

        let mut chars = code.chars();
        let levels: [String; MAX_DEPTH] = std::array::from_fn(|_| {
            match chars.next().unwrap_or(PAD) {
                PAD => String::new(),
                c => c.to_string(),
            }
        });
        Ok(Self {
            levels,
            atomic: false,
        })
    }

    /// The level-`k` fragment (1-based, `k` in 1..=6); empty past the depth.
    pub fn level(&self, k: usize) -> &str {
        &self.levels[k - 1]
    }

    /// Number of populated levels.
    pub fn depth(&self) -> usize {
        self.levels.iter().filter(|l| !l.is_empty()).count()
    }

    /// The original flat code, reassembled from the level fragments.
    pub fn code(&self) -> String {
        self.levels.concat()
    }

    /// The code one aggregation level up, or `None` for top-level and
    /// catch-all codes.
    pub fn parent_code(&self) -> Option<String> {
        if self.atomic {
            return None;
        }
        let depth = self.depth();
        if depth <= 1 {
            return None;
        }
        Some(self.levels[..depth - 1].concat())
    }

    pub fn is_atomic(&self) -> bool {
        self.atomic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_by_character_position() -> Result<()> {
        let levels = SectorLevels::decompose("1A1A1")?;
        assert_eq!(levels.level(1), "1");
        assert_eq!(levels.level(2), "A");
        assert_eq!(levels.level(3), "1");
        assert_eq!(levels.level(4), "A");
        assert_eq!(levels.level(5), "1");
        assert_eq!(levels.level(6), "");
        assert_eq!(levels.depth(), 5);
        Ok(())
    }

    #[test]
    fn round_trips_regular_codes() -> Result<()> {
        for code in ["1", "1A", "1A1", "1A1A", "1A1A1", "1A1A1A", "4C2"] {
            let levels = SectorLevels::decompose(code)?;
            assert_eq!(levels.code(), code, "round trip failed for {code}");
        }
        Ok(())
    }

    #[test]
    fn catch_all_sits_at_level_one() -> Result<()> {
        let levels = SectorLevels::decompose("20")?;
        assert_eq!(levels.level(1), "20");
        for k in 2..=MAX_DEPTH {
            assert_eq!(levels.level(k), "", "level {k} of a catch-all");
        }
        assert_eq!(levels.depth(), 1);
        assert_eq!(levels.parent_code(), None);
        assert!(levels.is_atomic());
        Ok(())
    }

    #[test]
    fn exception_codes_use_the_table() -> Result<()> {
        let levels = SectorLevels::decompose("2B10")?;
        assert_eq!(levels.level(1), "2");
        assert_eq!(levels.level(2), "B");
        assert_eq!(levels.level(3), "10");
        assert_eq!(levels.level(4), "");
        assert_eq!(levels.depth(), 3);
        assert_eq!(levels.code(), "2B10");
        assert_eq!(levels.parent_code().as_deref(), Some("2B"));
        Ok(())
    }

    #[test]
    fn parent_chain_walks_up_one_character() -> Result<()> {
        let levels = SectorLevels::decompose("1A1A")?;
        assert_eq!(levels.parent_code().as_deref(), Some("1A1"));
        let top = SectorLevels::decompose("1")?;
        assert_eq!(top.parent_code(), None);
        Ok(())
    }

    #[test]
    fn rejects_overlong_and_malformed_codes() {
        assert!(SectorLevels::decompose("1A1A1A1").is_err());
        assert!(SectorLevels::decompose("1A-1").is_err());
        assert!(SectorLevels::decompose("").is_err());
        assert!(SectorLevels::decompose("1A_A").is_err());
    }
}
