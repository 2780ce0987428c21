use std::path::PathBuf;

use tracing::info;

use crate::config::{FlattenConfig, FlattenOverrides, load_flatten_config};
use crate::nanoaod::{FlattenOptions, flatten};
use crate::storage::ArtifactStore;
use crate::TnpResult;

#[allow(clippy::too_many_arguments)]
pub fn run(
    input: PathBuf,
    cert: PathBuf,
    geometry: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    prefix: Option<String>,
    tree: Option<String>,
    roll_mask_path: Option<PathBuf>,
    run_mask_path: Option<PathBuf>,
) -> TnpResult<()> {
    let base = match config {
        Some(p) => load_flatten_config(&p)?,
        None => FlattenConfig::default(),
    };
    let config = base.apply(FlattenOverrides { tree, prefix, roll_mask_path, run_mask_path });
    info!(
        input = %input.display(),
        tree = %config.tree,
        prefix = %config.prefix,
        "flattening"
    );

    let opts = FlattenOptions { input, cert, geometry, config };
    let artifact = flatten(&opts)?;
    ArtifactStore::new(&output).write(&artifact)
}
