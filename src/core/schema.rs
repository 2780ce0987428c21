//! Flat artifact schema v1 - the output of `flatten` and `merge`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::env::Provenance;
use super::roll_name::RollId;
use crate::hist::CategoryHist;
use crate::{TnpError, TnpResult};

/// Schema version for forward compatibility
pub const SCHEMA_VERSION: u32 = 1;

/// Kinematic muon branches kept in the muon table, when present in the input.
pub const MUON_KEYS: &[&str] = &[
    "tag_pt",
    "tag_eta",
    "tag_phi",
    "probe_pt",
    "probe_eta",
    "probe_phi",
    "probe_time",
    "probe_dxdz",
    "probe_dydz",
    "dimuon_pt",
    "dimuon_mass",
];

/// Object names in the order they are written.
pub const HISTOGRAM_NAMES: [&str; 6] = [
    "total_by_roll",
    "passed_by_roll",
    "total_by_run",
    "passed_by_run",
    "total_by_roll_run",
    "passed_by_roll_run",
];

/// One row per hit; all columns have equal length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitTree {
    pub run: Vec<u32>,
    #[serde(rename = "luminosityBlock")]
    pub luminosity_block: Vec<u32>,
    pub event: Vec<u64>,
    pub region: Vec<i32>,
    pub ring: Vec<i32>,
    pub station: Vec<i32>,
    pub sector: Vec<i32>,
    pub layer: Vec<i32>,
    pub subsector: Vec<i32>,
    pub roll: Vec<i32>,
    pub is_fiducial: Vec<bool>,
    pub is_matched: Vec<bool>,
    /// Remaining per-hit numeric branches.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Vec<f64>>,
}

impl HitTree {
    pub fn len(&self) -> usize {
        self.run.len()
    }

    pub fn is_empty(&self) -> bool {
        self.run.is_empty()
    }

    pub fn roll_id(&self, i: usize) -> RollId {
        RollId {
            region: self.region[i],
            ring: self.ring[i],
            station: self.station[i],
            sector: self.sector[i],
            layer: self.layer[i],
            subsector: self.subsector[i],
            roll: self.roll[i],
        }
    }

    pub fn roll_names(&self) -> Vec<String> {
        (0..self.len()).map(|i| self.roll_id(i).name()).collect()
    }

    fn column_lengths(&self) -> Vec<(&str, usize)> {
        let mut lens = vec![
            ("run", self.run.len()),
            ("luminosityBlock", self.luminosity_block.len()),
            ("event", self.event.len()),
            ("region", self.region.len()),
            ("ring", self.ring.len()),
            ("station", self.station.len()),
            ("sector", self.sector.len()),
            ("layer", self.layer.len()),
            ("subsector", self.subsector.len()),
            ("roll", self.roll.len()),
            ("is_fiducial", self.is_fiducial.len()),
            ("is_matched", self.is_matched.len()),
        ];
        lens.extend(self.extra.iter().map(|(k, v)| (k.as_str(), v.len())));
        lens
    }

    pub fn validate(&self) -> TnpResult<()> {
        check_lengths("hit_tree", self.len(), &self.column_lengths())
    }

    /// Rows where `keep` is true, order preserved.
    pub fn filter(&self, keep: &[bool]) -> HitTree {
        HitTree {
            run: select(&self.run, keep),
            luminosity_block: select(&self.luminosity_block, keep),
            event: select(&self.event, keep),
            region: select(&self.region, keep),
            ring: select(&self.ring, keep),
            station: select(&self.station, keep),
            sector: select(&self.sector, keep),
            layer: select(&self.layer, keep),
            subsector: select(&self.subsector, keep),
            roll: select(&self.roll, keep),
            is_fiducial: select(&self.is_fiducial, keep),
            is_matched: select(&self.is_matched, keep),
            extra: self.extra.iter().map(|(k, v)| (k.clone(), select(v, keep))).collect(),
        }
    }

    /// Append `other`'s rows. Both tables must carry the same extra columns.
    pub fn append(&mut self, other: &HitTree) -> TnpResult<()> {
        same_columns("hit_tree", self.extra.keys(), other.extra.keys())?;
        self.run.extend_from_slice(&other.run);
        self.luminosity_block.extend_from_slice(&other.luminosity_block);
        self.event.extend_from_slice(&other.event);
        self.region.extend_from_slice(&other.region);
        self.ring.extend_from_slice(&other.ring);
        self.station.extend_from_slice(&other.station);
        self.sector.extend_from_slice(&other.sector);
        self.layer.extend_from_slice(&other.layer);
        self.subsector.extend_from_slice(&other.subsector);
        self.roll.extend_from_slice(&other.roll);
        self.is_fiducial.extend_from_slice(&other.is_fiducial);
        self.is_matched.extend_from_slice(&other.is_matched);
        for (k, v) in self.extra.iter_mut() {
            v.extend_from_slice(&other.extra[k]);
        }
        Ok(())
    }
}

/// One row per surviving event: the first tag-probe pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MuonTree {
    pub run: Vec<u32>,
    #[serde(rename = "luminosityBlock")]
    pub luminosity_block: Vec<u32>,
    pub event: Vec<u64>,
    #[serde(flatten)]
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl MuonTree {
    pub fn len(&self) -> usize {
        self.run.len()
    }

    pub fn is_empty(&self) -> bool {
        self.run.is_empty()
    }

    pub fn validate(&self) -> TnpResult<()> {
        let mut lens = vec![
            ("run", self.run.len()),
            ("luminosityBlock", self.luminosity_block.len()),
            ("event", self.event.len()),
        ];
        lens.extend(self.columns.iter().map(|(k, v)| (k.as_str(), v.len())));
        check_lengths("muon_tree", self.len(), &lens)
    }

    pub fn append(&mut self, other: &MuonTree) -> TnpResult<()> {
        same_columns("muon_tree", self.columns.keys(), other.columns.keys())?;
        self.run.extend_from_slice(&other.run);
        self.luminosity_block.extend_from_slice(&other.luminosity_block);
        self.event.extend_from_slice(&other.event);
        for (k, v) in self.columns.iter_mut() {
            v.extend_from_slice(&other.columns[k]);
        }
        Ok(())
    }
}

/// The six efficiency histograms: fiducial hits ("total") and fiducial matched hits ("passed").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSet {
    pub total_by_roll: CategoryHist,
    pub passed_by_roll: CategoryHist,
    pub total_by_run: CategoryHist,
    pub passed_by_run: CategoryHist,
    pub total_by_roll_run: CategoryHist,
    pub passed_by_roll_run: CategoryHist,
}

impl HistogramSet {
    /// `(name, histogram)` in [`HISTOGRAM_NAMES`] order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &CategoryHist)> {
        HISTOGRAM_NAMES.into_iter().zip([
            &self.total_by_roll,
            &self.passed_by_roll,
            &self.total_by_run,
            &self.passed_by_run,
            &self.total_by_roll_run,
            &self.passed_by_roll_run,
        ])
    }

    pub fn validate(&self) -> TnpResult<()> {
        for (name, h) in self.iter() {
            h.validate().map_err(|e| TnpError::Message(format!("histogram {name}: {e}")))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatArtifact {
    /// Schema version for forward compatibility
    pub schema_version: u32,
    pub provenance: Provenance,
    pub hit_tree: HitTree,
    pub muon_tree: MuonTree,
    pub histograms: HistogramSet,
}

impl FlatArtifact {
    pub fn validate(&self) -> TnpResult<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(TnpError::Message(format!(
                "schema version mismatch: artifact has v{}, expected v{}",
                self.schema_version, SCHEMA_VERSION
            )));
        }
        self.hit_tree.validate()?;
        self.muon_tree.validate()?;
        self.histograms.validate()
    }
}

fn select<T: Clone>(values: &[T], keep: &[bool]) -> Vec<T> {
    values.iter().zip(keep).filter(|(_, k)| **k).map(|(v, _)| v.clone()).collect()
}

fn check_lengths(table: &str, expected: usize, lens: &[(&str, usize)]) -> TnpResult<()> {
    for (name, len) in lens {
        if *len != expected {
            return Err(TnpError::Message(format!(
                "{table}: column {name} has {len} rows, expected {expected}"
            )));
        }
    }
    Ok(())
}

fn same_columns<'a>(
    table: &str,
    ours: impl Iterator<Item = &'a String>,
    theirs: impl Iterator<Item = &'a String>,
) -> TnpResult<()> {
    let ours: Vec<&String> = ours.collect();
    let theirs: Vec<&String> = theirs.collect();
    if ours != theirs {
        return Err(TnpError::Message(format!(
            "{table}: column sets differ ({ours:?} vs {theirs:?})"
        )));
    }
    Ok(())
}
