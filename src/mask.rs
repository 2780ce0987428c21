//! Detector-element ("roll") and run exclusion masks.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{TnpError, TnpResult};

/// Rolls excluded from every flattening unless the configuration overrides the list.
pub const DEFAULT_KNOWN_BAD_ROLLS: &[&str] = &[
    "RE+4_R1_CH15_A",
    "RE+4_R1_CH16_A",
    "RE+3_R1_CH15_A",
    "RE+3_R1_CH16_A",
];

pub fn default_known_bad_rolls() -> Vec<String> {
    DEFAULT_KNOWN_BAD_ROLLS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionConfig {
    #[serde(default = "default_known_bad_rolls")]
    pub known_bad_rolls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll_mask_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_mask_path: Option<PathBuf>,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        ExclusionConfig {
            known_bad_rolls: default_known_bad_rolls(),
            roll_mask_path: None,
            run_mask_path: None,
        }
    }
}

pub fn load_roll_set(path: &Path) -> TnpResult<BTreeSet<String>> {
    let bytes = crate::read_input(path, "roll mask file")?;
    parse_roll_set(path, &bytes)
}

pub fn parse_roll_set(path: &Path, bytes: &[u8]) -> TnpResult<BTreeSet<String>> {
    let rolls: Vec<String> = serde_json::from_slice(bytes)
        .map_err(|e| TnpError::json(format!("roll mask file {} is not a JSON array of strings", path.display()), e))?;
    Ok(rolls.into_iter().collect())
}

pub fn load_run_set(path: &Path) -> TnpResult<BTreeSet<u32>> {
    let bytes = crate::read_input(path, "run mask file")?;
    parse_run_set(path, &bytes)
}

pub fn parse_run_set(path: &Path, bytes: &[u8]) -> TnpResult<BTreeSet<u32>> {
    let runs: Vec<u32> = serde_json::from_slice(bytes)
        .map_err(|e| TnpError::json(format!("run mask file {} is not a JSON array of run numbers", path.display()), e))?;
    Ok(runs.into_iter().collect())
}

/// `true` for every roll not listed in `masked`.
pub fn roll_keep_mask<S: AsRef<str>>(names: &[S], masked: &BTreeSet<String>) -> Vec<bool> {
    names.iter().map(|n| !masked.contains(n.as_ref())).collect()
}

/// `true` for every run not listed in `masked`.
pub fn run_keep_mask(runs: &[u32], masked: &BTreeSet<u32>) -> Vec<bool> {
    runs.iter().map(|r| !masked.contains(r)).collect()
}

/// Union of all exclusion sources.
#[derive(Debug, Clone, Default)]
pub struct ExclusionMask {
    pub known_bad_rolls: BTreeSet<String>,
    pub masked_rolls: Option<BTreeSet<String>>,
    pub masked_runs: Option<BTreeSet<u32>>,
}

impl ExclusionMask {
    pub fn from_config(cfg: &ExclusionConfig) -> TnpResult<Self> {
        let masked_rolls = cfg.roll_mask_path.as_deref().map(load_roll_set).transpose()?;
        let masked_runs = cfg.run_mask_path.as_deref().map(load_run_set).transpose()?;
        Ok(Self::with_masks(cfg, masked_rolls, masked_runs))
    }

    /// Combine the configured known-bad rolls with already loaded mask sets.
    pub fn with_masks(
        cfg: &ExclusionConfig,
        masked_rolls: Option<BTreeSet<String>>,
        masked_runs: Option<BTreeSet<u32>>,
    ) -> Self {
        debug!(
            known_bad = cfg.known_bad_rolls.len(),
            masked_rolls = masked_rolls.as_ref().map(|s| s.len()).unwrap_or(0),
            masked_runs = masked_runs.as_ref().map(|s| s.len()).unwrap_or(0),
            "built exclusion mask"
        );
        ExclusionMask {
            known_bad_rolls: cfg.known_bad_rolls.iter().cloned().collect(),
            masked_rolls,
            masked_runs,
        }
    }

    /// `true` where any source excludes the row.
    pub fn excluded<S: AsRef<str>>(&self, names: &[S], runs: &[u32]) -> TnpResult<Vec<bool>> {
        if names.len() != runs.len() {
            return Err(TnpError::Message(format!(
                "roll name and run arrays differ in length: {} vs {}",
                names.len(),
                runs.len()
            )));
        }
        let mut excluded: Vec<bool> = names
            .iter()
            .map(|n| self.known_bad_rolls.contains(n.as_ref()))
            .collect();
        if let Some(set) = &self.masked_runs {
            for (ex, keep) in excluded.iter_mut().zip(run_keep_mask(runs, set)) {
                *ex |= !keep;
            }
        }
        if let Some(set) = &self.masked_rolls {
            for (ex, keep) in excluded.iter_mut().zip(roll_keep_mask(names, set)) {
                *ex |= !keep;
            }
        }
        Ok(excluded)
    }

    pub fn keep<S: AsRef<str>>(&self, names: &[S], runs: &[u32]) -> TnpResult<Vec<bool>> {
        Ok(self.excluded(names, runs)?.into_iter().map(|e| !e).collect())
    }
}
