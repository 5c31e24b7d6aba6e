// src/taxonomy/mod.rs

pub mod code;
pub mod reference;

pub use code::{SectorLevels, MAX_DEPTH};
pub use reference::SectorTaxonomy;
