//! Compiler for the World Carbon Pricing Database: ingests per-jurisdiction
//! carbon-tax and ETS coverage CSVs, rolls coverage dummies up the IPCC
//! sector-code hierarchy, and writes one compiled CSV per jurisdiction.

pub mod aggregate;
pub mod config;
pub mod coverage;
pub mod ingest;
pub mod output;
pub mod scope;
pub mod taxonomy;
