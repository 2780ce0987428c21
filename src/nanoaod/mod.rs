//! Tag-and-probe NanoAOD input and the flattening pipeline.

pub mod flatten;
pub mod reader;

pub use flatten::{FlattenOptions, Flattened, book_histograms, flatten, flatten_tree};
pub use reader::{EventSelection, NanoTree, read_hits, read_muons, select_events};
