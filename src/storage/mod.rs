//! Storage layer: artifact persistence, geometry input and CSV export.

pub mod artifact;
pub mod csv;
pub mod geometry;

// Re-export key types
pub use artifact::ArtifactStore;
pub use csv::{CSV_HEADERS, EfficiencyExporter};
pub use geometry::{GeometryRow, load_geometry, roll_names};
