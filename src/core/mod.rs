//! Core types and schemas for rpc-tnp.
//!
//! This module contains the flat artifact schema (v1), the roll naming scheme,
//! and the provenance recorded in every artifact.

pub mod env;
pub mod roll_name;
pub mod schema;

// Re-export key types for convenience
pub use env::{EnvironmentInfo, InputFile, Provenance};
pub use roll_name::RollId;
pub use schema::{FlatArtifact, HISTOGRAM_NAMES, HitTree, HistogramSet, MUON_KEYS, MuonTree, SCHEMA_VERSION};
