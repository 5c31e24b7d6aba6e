// src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs::File, path::Path, path::PathBuf};

fn default_prefix() -> String {
    "wcpd".to_string()
}

/// Run configuration, loaded from a YAML file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory scanned recursively for per-jurisdiction/scheme CSVs.
    pub input_dir: PathBuf,
    /// Static CSV mapping each IPCC code to its parent category.
    pub taxonomy_csv: PathBuf,
    /// Optional scheme scope table.
    #[serde(default)]
    pub scope_csv: Option<PathBuf>,
    pub output_dir: PathBuf,
    #[serde(default = "default_prefix")]
    pub output_prefix: String,
    /// Jurisdictions routed to the `subnational` output split.
    #[serde(default)]
    pub subnational: Vec<String>,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("opening config {}", path.display()))?;
        serde_yaml::from_reader(file)
            .with_context(|| format!("parsing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let yaml = "\
input_dir: data/sources
taxonomy_csv: data/ipcc_taxonomy.csv
output_dir: out
";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.output_prefix, "wcpd");
        assert!(config.scope_csv.is_none());
        assert!(config.subnational.is_empty());
    }

    #[test]
    fn rejects_unknown_fields() {
        let yaml = "\
input_dir: data
taxonomy_csv: tax.csv
output_dir: out
parallelism: 4
";
        assert!(serde_yaml::from_str::<PipelineConfig>(yaml).is_err());
    }
}
