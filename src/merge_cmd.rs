use std::path::PathBuf;

use tracing::{debug, info};

use crate::core::env::{InputFile, Provenance};
use crate::core::schema::{FlatArtifact, HistogramSet, SCHEMA_VERSION};
use crate::hist::{CategoryHist, merge_histograms};
use crate::storage::ArtifactStore;
use crate::{TnpError, TnpResult};

/// Concatenate tables in input order and merge every histogram by category label.
pub fn merge_artifacts(artifacts: &[FlatArtifact]) -> TnpResult<FlatArtifact> {
    let (first, rest) = artifacts
        .split_first()
        .ok_or_else(|| TnpError::Message("no artifacts to merge".into()))?;

    let mut hit_tree = first.hit_tree.clone();
    let mut muon_tree = first.muon_tree.clone();
    for (n, a) in rest.iter().enumerate() {
        hit_tree
            .append(&a.hit_tree)
            .map_err(|e| TnpError::Message(format!("input {}: {e}", n + 1)))?;
        muon_tree
            .append(&a.muon_tree)
            .map_err(|e| TnpError::Message(format!("input {}: {e}", n + 1)))?;
    }

    let histograms = HistogramSet {
        total_by_roll: merge_named(artifacts, "total_by_roll", |h| &h.total_by_roll)?,
        passed_by_roll: merge_named(artifacts, "passed_by_roll", |h| &h.passed_by_roll)?,
        total_by_run: merge_named(artifacts, "total_by_run", |h| &h.total_by_run)?,
        passed_by_run: merge_named(artifacts, "passed_by_run", |h| &h.passed_by_run)?,
        total_by_roll_run: merge_named(artifacts, "total_by_roll_run", |h| &h.total_by_roll_run)?,
        passed_by_roll_run: merge_named(artifacts, "passed_by_roll_run", |h| &h.passed_by_roll_run)?,
    };

    let mut provenance = Provenance::new("merge");
    provenance.sources = artifacts.iter().map(|a| a.provenance.clone()).collect();

    Ok(FlatArtifact {
        schema_version: SCHEMA_VERSION,
        provenance,
        hit_tree,
        muon_tree,
        histograms,
    })
}

fn merge_named(
    artifacts: &[FlatArtifact],
    name: &str,
    pick: fn(&HistogramSet) -> &CategoryHist,
) -> TnpResult<CategoryHist> {
    let hists: Vec<CategoryHist> = artifacts.iter().map(|a| pick(&a.histograms).clone()).collect();
    merge_histograms(&hists).map_err(|e| TnpError::Message(format!("histogram {name}: {e}")))
}

pub fn run(inputs: Vec<PathBuf>, output: PathBuf) -> TnpResult<()> {
    if inputs.is_empty() {
        return Err(TnpError::Message("merge needs at least one input".into()));
    }

    let mut artifacts = Vec::with_capacity(inputs.len());
    let mut files = Vec::with_capacity(inputs.len());
    for path in &inputs {
        let store = ArtifactStore::new(path);
        let (artifact, bytes) = store.read_with_bytes()?;
        debug!(
            path = %path.display(),
            hits = artifact.hit_tree.len(),
            muons = artifact.muon_tree.len(),
            "read artifact"
        );
        files.push(InputFile::from_bytes("artifact", path, &bytes));
        artifacts.push(artifact);
    }

    let mut merged = merge_artifacts(&artifacts)?;
    merged.provenance.inputs = files;
    info!(
        inputs = inputs.len(),
        hits = merged.hit_tree.len(),
        muons = merged.muon_tree.len(),
        "merged artifacts"
    );
    ArtifactStore::new(&output).write(&merged)
}
