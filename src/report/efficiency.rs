//! Per-roll and per-run efficiency from the total/passed histogram pairs.

use serde::{Deserialize, Serialize};

use crate::core::schema::FlatArtifact;
use crate::hist::CategoryHist;
use crate::{TnpError, TnpResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyRow {
    pub label: String,
    pub total: f64,
    pub passed: f64,
    /// `None` when no fiducial hits were recorded.
    pub efficiency: Option<f64>,
    /// Binomial uncertainty `sqrt(e (1 - e) / total)`.
    pub error: Option<f64>,
}

impl EfficiencyRow {
    pub fn new(label: String, total: f64, passed: f64) -> Self {
        let (efficiency, error) = if total > 0.0 {
            let e = passed / total;
            (Some(e), Some((e * (1.0 - e) / total).max(0.0).sqrt()))
        } else {
            (None, None)
        };
        EfficiencyRow { label, total, passed, efficiency, error }
    }
}

/// Pair up the bins of two 1D histograms with identical axes.
pub fn efficiency_rows(total: &CategoryHist, passed: &CategoryHist) -> TnpResult<Vec<EfficiencyRow>> {
    if total.ndim() != 1 || total.axes != passed.axes {
        return Err(TnpError::Message(
            "total and passed histograms must be 1D with identical axes".into(),
        ));
    }
    Ok(total.axes[0]
        .labels()
        .into_iter()
        .zip(total.values().iter().zip(passed.values()))
        .map(|(label, (t, p))| EfficiencyRow::new(label.to_string(), *t, *p))
        .collect())
}

pub fn efficiency_by_roll(artifact: &FlatArtifact) -> TnpResult<Vec<EfficiencyRow>> {
    let h = &artifact.histograms;
    efficiency_rows(&h.total_by_roll, &h.passed_by_roll)
}

pub fn efficiency_by_run(artifact: &FlatArtifact) -> TnpResult<Vec<EfficiencyRow>> {
    let h = &artifact.histograms;
    efficiency_rows(&h.total_by_run, &h.passed_by_run)
}
