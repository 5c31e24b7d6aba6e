use anyhow::{Context, Result};
use std::{env, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use wcpd::{
    aggregate::CoverageAggregator,
    config::PipelineConfig,
    ingest, output, scope,
    taxonomy::SectorTaxonomy,
};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("wcpd.yaml"));
    let config = PipelineConfig::load(&config_path)?;
    info!(config = %config_path.display(), "loaded config");

    // ─── 3) load taxonomy reference ──────────────────────────────────
    let taxonomy = SectorTaxonomy::from_csv_path(&config.taxonomy_csv)?;
    info!(codes = taxonomy.len(), "loaded taxonomy reference");

    // ─── 4) ingest source files ──────────────────────────────────────
    let mut table = ingest::read_coverage_dir(&config.input_dir)?;
    info!(records = table.len(), "ingested source records");

    // ─── 5) merge scheme scope table ─────────────────────────────────
    if let Some(scope_csv) = &config.scope_csv {
        let scopes = scope::load_scopes(scope_csv)?;
        info!(schemes = scopes.len(), "loaded scheme scopes");
        scope::merge_scoped(&mut table, scope::expand_scopes(&scopes));
    }

    // ─── 6) roll up coverage ─────────────────────────────────────────
    let aggregator = CoverageAggregator::new(&taxonomy)?;
    let table = aggregator.run(table).context("rolling up coverage")?;
    info!(records = table.len(), "rolled up coverage");

    // ─── 7) write per-jurisdiction outputs ───────────────────────────
    let writer = output::OutputWriter::new(
        &config.output_dir,
        &config.output_prefix,
        config.subnational.iter().cloned(),
    )?;
    let paths = writer.write_all(&table)?;
    info!(files = paths.len(), "all done");

    Ok(())
}
