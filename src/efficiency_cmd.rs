use std::path::PathBuf;

use clap::ValueEnum;
use tracing::info;

use crate::report::{efficiency_by_roll, efficiency_by_run};
use crate::storage::{ArtifactStore, EfficiencyExporter};
use crate::TnpResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupBy {
    Roll,
    Run,
}

pub fn run(input: PathBuf, by: GroupBy, output: Option<PathBuf>) -> TnpResult<()> {
    let artifact = ArtifactStore::new(&input).read()?;
    let rows = match by {
        GroupBy::Roll => efficiency_by_roll(&artifact)?,
        GroupBy::Run => efficiency_by_run(&artifact)?,
    };
    info!(rows = rows.len(), ?by, "computed efficiencies");

    let exporter = EfficiencyExporter::new();
    match output {
        Some(path) => exporter.export(&rows, &path),
        None => exporter.export_to_stdout(&rows),
    }
}
