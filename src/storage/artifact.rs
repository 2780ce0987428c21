//! JSON persistence for flat artifacts.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::core::schema::{FlatArtifact, SCHEMA_VERSION};
use crate::{TnpError, TnpResult};

/// Reader/writer for one artifact path.
///
/// Writes go to a temporary file in the destination directory which is then
/// renamed over the target, so a failed run never leaves a truncated artifact.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
}

impl ArtifactStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        ArtifactStore { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `artifact`, replacing any existing file.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The artifact's schema_version doesn't match SCHEMA_VERSION
    /// - File operations fail
    /// - JSON serialization fails
    pub fn write(&self, artifact: &FlatArtifact) -> TnpResult<()> {
        if artifact.schema_version != SCHEMA_VERSION {
            return Err(TnpError::Message(format!(
                "schema version mismatch: artifact has v{}, expected v{}",
                artifact.schema_version, SCHEMA_VERSION
            )));
        }

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .map_err(|e| TnpError::io(format!("failed to create directory {}", dir.display()), e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| TnpError::io("failed to create temporary file", e))?;
        {
            let mut w = std::io::BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut w, artifact)
                .map_err(|e| TnpError::json("failed to serialize artifact", e))?;
            w.write_all(b"\n").map_err(|e| TnpError::io("failed to write artifact", e))?;
            w.flush().map_err(|e| TnpError::io("failed to write artifact", e))?;
        }
        tmp.persist(&self.path)
            .map_err(|e| TnpError::io(format!("failed to write {}", self.path.display()), e.error))?;

        info!(
            path = %self.path.display(),
            hits = artifact.hit_tree.len(),
            muons = artifact.muon_tree.len(),
            "wrote artifact"
        );
        Ok(())
    }

    /// Read and validate an artifact.
    ///
    /// # Errors
    /// Returns an error if the file is missing or unreadable, is not a v1
    /// artifact, or its tables and histograms are inconsistent.
    pub fn read(&self) -> TnpResult<FlatArtifact> {
        self.read_with_bytes().map(|(artifact, _)| artifact)
    }

    /// Like [`ArtifactStore::read`], also returning the bytes that were parsed.
    pub fn read_with_bytes(&self) -> TnpResult<(FlatArtifact, Vec<u8>)> {
        let bytes = crate::read_input(&self.path, "artifact")?;
        let artifact: FlatArtifact = serde_json::from_slice(&bytes)
            .map_err(|e| TnpError::json(format!("failed to parse artifact {}", self.path.display()), e))?;
        artifact
            .validate()
            .map_err(|e| TnpError::Message(format!("{}: {e}", self.path.display())))?;
        Ok((artifact, bytes))
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::env::Provenance;
    use crate::core::schema::{HistogramSet, HitTree, MuonTree};
    use crate::hist::{CategoryAxis, CategoryHist};

    fn empty_artifact() -> FlatArtifact {
        let h1 = CategoryHist::new(vec![CategoryAxis::strings(["A"])]);
        let h2 = CategoryHist::new(vec![CategoryAxis::ints(Vec::new())]);
        let h3 = CategoryHist::new(vec![CategoryAxis::strings(["A"]), CategoryAxis::ints(Vec::new())]);
        FlatArtifact {
            schema_version: SCHEMA_VERSION,
            provenance: Provenance::new("flatten"),
            hit_tree: HitTree::default(),
            muon_tree: MuonTree::default(),
            histograms: HistogramSet {
                total_by_roll: h1.clone(),
                passed_by_roll: h1,
                total_by_run: h2.clone(),
                passed_by_run: h2,
                total_by_roll_run: h3.clone(),
                passed_by_roll_run: h3,
            },
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("nested").join("out.json"));
        let artifact = empty_artifact();
        store.write(&artifact).unwrap();
        assert!(store.exists());
        assert_eq!(store.read().unwrap(), artifact);
    }

    #[test]
    fn test_schema_version_validation() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("out.json"));
        let mut artifact = empty_artifact();
        artifact.schema_version = 999;
        let err = store.write(&artifact).unwrap_err();
        assert!(err.to_string().contains("schema version mismatch"));
        assert!(!store.exists());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ArtifactStore::new(dir.path().join("nope.json")).read().is_err());
    }
}
