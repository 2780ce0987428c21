//! NanoAOD → flat artifact pipeline.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::reader::{NanoTree, read_hits, read_muons, select_events};
use crate::config::FlattenConfig;
use crate::core::env::{InputFile, Provenance};
use crate::core::schema::{FlatArtifact, HistogramSet, HitTree, MuonTree, SCHEMA_VERSION};
use crate::hist::{Category, CategoryAxis, CategoryHist};
use crate::lumi::LumiMask;
use crate::mask::{ExclusionMask, parse_roll_set, parse_run_set};
use crate::storage::geometry::{read_geometry, roll_names};
use crate::{TnpError, TnpResult};

#[derive(Debug, Clone)]
pub struct FlattenOptions {
    pub input: PathBuf,
    pub cert: PathBuf,
    pub geometry: PathBuf,
    pub config: FlattenConfig,
}

/// Output of [`flatten_tree`] before provenance is attached.
#[derive(Debug, Clone)]
pub struct Flattened {
    pub hits: HitTree,
    pub muons: MuonTree,
    pub histograms: HistogramSet,
}

/// Read, filter and book one input file.
///
/// Certification, geometry and exclusion files are all loaded before the
/// input is opened, so configuration problems surface first.
pub fn flatten(opts: &FlattenOptions) -> TnpResult<FlatArtifact> {
    let mut provenance = Provenance::new("flatten");
    let exclusion_cfg = &opts.config.exclusion;

    let lumi = load_input(&mut provenance, "certification", &opts.cert, LumiMask::from_json_slice)?;
    let geometry = load_input(&mut provenance, "geometry", &opts.geometry, |bytes| {
        read_geometry(bytes).map_err(|e| TnpError::Config(format!("geometry file {}: {e}", opts.geometry.display())))
    })?;
    let rolls = roll_names(&geometry);

    let masked_rolls = match &exclusion_cfg.roll_mask_path {
        Some(path) => Some(load_input(&mut provenance, "roll_mask", path, |b| parse_roll_set(path, b))?),
        None => None,
    };
    let masked_runs = match &exclusion_cfg.run_mask_path {
        Some(path) => Some(load_input(&mut provenance, "run_mask", path, |b| parse_run_set(path, b))?),
        None => None,
    };
    let exclusion = ExclusionMask::with_masks(exclusion_cfg, masked_rolls, masked_runs);

    let tree = load_input(&mut provenance, "input", &opts.input, |bytes| {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| TnpError::Message(format!("{}: input is not UTF-8: {e}", opts.input.display())))?;
        NanoTree::from_json_str(text, &opts.config.tree)
            .map_err(|e| TnpError::Message(format!("{}: {e}", opts.input.display())))
    })?;

    let flat = flatten_tree(&tree, &opts.config.prefix, &lumi, &exclusion, &rolls)?;

    Ok(FlatArtifact {
        schema_version: SCHEMA_VERSION,
        provenance,
        hit_tree: flat.hits,
        muon_tree: flat.muons,
        histograms: flat.histograms,
    })
}

/// Read `path` once, parse it and record the hash of exactly those bytes.
fn load_input<T>(
    provenance: &mut Provenance,
    role: &str,
    path: &Path,
    parse: impl FnOnce(&[u8]) -> TnpResult<T>,
) -> TnpResult<T> {
    let bytes = crate::read_input(path, role)?;
    let value = parse(&bytes)?;
    provenance.inputs.push(InputFile::from_bytes(role, path, &bytes));
    debug!(role, path = %path.display(), bytes = bytes.len(), "loaded input");
    Ok(value)
}

pub fn flatten_tree(
    tree: &NanoTree,
    prefix: &str,
    lumi: &LumiMask,
    exclusion: &ExclusionMask,
    geometry_rolls: &[String],
) -> TnpResult<Flattened> {
    let sel = select_events(tree, prefix, lumi)?;
    info!(
        events = tree.num_events(),
        with_hits = sel.candidates,
        certified = sel.len(),
        "applied lumi mask"
    );

    let hits = read_hits(tree, prefix, &sel)?;
    let names = hits.roll_names();
    let keep = exclusion.keep(&names, &hits.run)?;
    let before = hits.len();
    let hits = hits.filter(&keep);
    let names: Vec<String> = names.into_iter().zip(&keep).filter(|(_, k)| **k).map(|(n, _)| n).collect();
    info!(hits = hits.len(), excluded = before - hits.len(), "flattened hits");

    let muons = read_muons(tree, prefix, &sel)?;
    info!(muons = muons.len(), "flattened muons");

    let histograms = book_histograms(&hits, &names, geometry_rolls);
    Ok(Flattened { hits, muons, histograms })
}

/// Fill total (fiducial) and passed (fiducial and matched) histograms.
///
/// The roll axis lists every geometry roll; the run axis lists the sorted runs
/// present in `hits`.
pub fn book_histograms(hits: &HitTree, names: &[String], geometry_rolls: &[String]) -> HistogramSet {
    let roll_axis = CategoryAxis::strings(geometry_rolls.iter().cloned());
    let runs: BTreeSet<u32> = hits.run.iter().copied().collect();
    let run_axis = CategoryAxis::ints(runs.into_iter().map(i64::from));

    let mut total_by_roll = CategoryHist::new(vec![roll_axis.clone()]);
    let mut passed_by_roll = total_by_roll.clone();
    let mut total_by_run = CategoryHist::new(vec![run_axis.clone()]);
    let mut passed_by_run = total_by_run.clone();
    let mut total_by_roll_run = CategoryHist::new(vec![roll_axis, run_axis]);
    let mut passed_by_roll_run = total_by_roll_run.clone();

    let mut total_rows: Vec<[Category; 2]> = Vec::new();
    let mut passed_rows: Vec<[Category; 2]> = Vec::new();
    for i in 0..hits.len() {
        if !hits.is_fiducial[i] {
            continue;
        }
        let row = [Category::Str(names[i].clone()), Category::from(hits.run[i])];
        if hits.is_matched[i] {
            passed_rows.push(row.clone());
        }
        total_rows.push(row);
    }

    total_by_roll.fill_many(total_rows.iter().map(|r| &r[..1]));
    passed_by_roll.fill_many(passed_rows.iter().map(|r| &r[..1]));
    total_by_run.fill_many(total_rows.iter().map(|r| &r[1..]));
    passed_by_run.fill_many(passed_rows.iter().map(|r| &r[1..]));
    total_by_roll_run.fill_many(total_rows.iter().map(|r| &r[..]));
    passed_by_roll_run.fill_many(passed_rows.iter().map(|r| &r[..]));

    if total_by_roll.dropped() > 0.0 {
        warn!(
            hits = total_by_roll.dropped(),
            "fiducial hits on rolls missing from the geometry table were not booked"
        );
    }

    HistogramSet {
        total_by_roll,
        passed_by_roll,
        total_by_run,
        passed_by_run,
        total_by_roll_run,
        passed_by_roll_run,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::roll_name::RollId;

    fn hits(rows: &[(u32, RollId, bool, bool)]) -> HitTree {
        let mut t = HitTree::default();
        for (i, (run, id, fid, matched)) in rows.iter().enumerate() {
            t.run.push(*run);
            t.luminosity_block.push(1);
            t.event.push(i as u64);
            t.region.push(id.region);
            t.ring.push(id.ring);
            t.station.push(id.station);
            t.sector.push(id.sector);
            t.layer.push(id.layer);
            t.subsector.push(id.subsector);
            t.roll.push(id.roll);
            t.is_fiducial.push(*fid);
            t.is_matched.push(*matched);
        }
        t
    }

    const BARREL: RollId = RollId { region: 0, ring: 1, station: 1, sector: 1, layer: 1, subsector: 1, roll: 1 };
    const ENDCAP: RollId = RollId { region: 1, ring: 2, station: 1, sector: 1, layer: 1, subsector: 1, roll: 1 };

    #[test]
    fn test_book_total_and_passed() {
        let t = hits(&[
            (2, BARREL, true, true),
            (1, BARREL, true, false),
            (1, ENDCAP, false, true),
            (1, ENDCAP, true, true),
        ]);
        let names = t.roll_names();
        let geometry = vec![
            "W+1_RB1in_S01_Backward".to_string(),
            "RE+1_R2_CH01_A".to_string(),
            "W0_RB1in_S01_Backward".to_string(),
        ];
        let h = book_histograms(&t, &names, &geometry);

        let barrel = Category::from("W+1_RB1in_S01_Backward");
        let endcap = Category::from("RE+1_R2_CH01_A");
        assert_eq!(h.total_by_roll.value(&[barrel.clone()]), Some(2.0));
        assert_eq!(h.passed_by_roll.value(&[barrel.clone()]), Some(1.0));
        assert_eq!(h.total_by_roll.value(&[endcap.clone()]), Some(1.0));
        assert_eq!(h.total_by_roll.value(&["W0_RB1in_S01_Backward".into()]), Some(0.0));

        assert_eq!(h.total_by_run.axes[0], CategoryAxis::Int(vec![1, 2]));
        assert_eq!(h.total_by_run.value(&[Category::Int(1)]), Some(2.0));
        assert_eq!(h.passed_by_run.value(&[Category::Int(2)]), Some(1.0));
        assert_eq!(h.passed_by_roll_run.value(&[endcap, Category::Int(1)]), Some(1.0));
        assert_eq!(h.total_by_roll_run.value(&[barrel, Category::Int(2)]), Some(1.0));

        for (_, hist) in h.iter() {
            assert_eq!(hist.dropped(), 0.0);
        }
        for (t, p) in h.total_by_roll_run.values().iter().zip(h.passed_by_roll_run.values()) {
            assert!(p <= t);
        }
    }

    #[test]
    fn test_book_empty_hits() {
        let h = book_histograms(&HitTree::default(), &[], &["A".to_string()]);
        assert_eq!(h.total_by_roll.values(), &[0.0]);
        assert!(h.total_by_run.axes[0].is_empty());
        assert!(h.total_by_roll_run.values().is_empty());
    }
}
