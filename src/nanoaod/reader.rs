//! Columnar NanoAOD input.
//!
//! The input is a JSON object mapping tree names to trees; a tree maps branch
//! names to one entry per event. Scalar branches (`run`, `luminosityBlock`,
//! `event`, `n<prefix>`) hold a number per event, jagged branches
//! (`<prefix>_<field>`) hold an array per event whose length is the event's
//! `n<prefix>` count.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::core::schema::{HitTree, MUON_KEYS, MuonTree};
use crate::lumi::LumiMask;
use crate::{TnpError, TnpResult};

/// Integer per-hit branches identifying the roll.
pub const ROLL_FIELDS: [&str; 7] = ["region", "ring", "station", "sector", "layer", "subsector", "roll"];
/// Boolean per-hit flags.
pub const FLAG_FIELDS: [&str; 2] = ["is_fiducial", "is_matched"];
/// Hit table columns filled from the event, not from per-hit branches.
const EVENT_COLUMNS: [&str; 3] = ["run", "luminosityBlock", "event"];

#[derive(Debug, Clone, Default)]
pub struct NanoTree {
    branches: BTreeMap<String, Vec<Value>>,
}

impl NanoTree {
    pub fn open(path: &Path, tree: &str) -> TnpResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TnpError::io(format!("failed to read input file {}", path.display()), e))?;
        let nano = Self::from_json_str(&text, tree)
            .map_err(|e| TnpError::Message(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), tree, events = nano.num_events(), "opened input tree");
        Ok(nano)
    }

    pub fn from_json_str(text: &str, tree: &str) -> TnpResult<Self> {
        let mut file: BTreeMap<String, Value> =
            serde_json::from_str(text).map_err(|e| TnpError::json("malformed input file", e))?;
        let raw = file
            .remove(tree)
            .ok_or_else(|| TnpError::Message(format!("tree {tree:?} not found")))?;
        let branches: BTreeMap<String, Vec<Value>> = serde_json::from_value(raw)
            .map_err(|e| TnpError::json(format!("tree {tree:?} is not a map of branch arrays"), e))?;
        Self::from_branches(branches)
    }

    pub fn from_branches(branches: BTreeMap<String, Vec<Value>>) -> TnpResult<Self> {
        let nano = NanoTree { branches };
        let events = nano.num_events();
        for (name, values) in &nano.branches {
            if values.len() != events {
                return Err(TnpError::Message(format!(
                    "branch {name} has {} entries, expected {events}",
                    values.len()
                )));
            }
        }
        Ok(nano)
    }

    /// Number of events, taken from the `run` branch.
    pub fn num_events(&self) -> usize {
        self.branches.get("run").map(|v| v.len()).unwrap_or(0)
    }

    pub fn has_branch(&self, name: &str) -> bool {
        self.branches.contains_key(name)
    }

    /// Field names of `<prefix>_<field>` branches.
    pub fn fields_with_prefix(&self, prefix: &str) -> Vec<String> {
        let head = format!("{prefix}_");
        self.branches
            .keys()
            .filter_map(|k| k.strip_prefix(&head).map(str::to_string))
            .collect()
    }

    fn branch(&self, name: &str) -> TnpResult<&[Value]> {
        self.branches
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| TnpError::Message(format!("missing branch {name}")))
    }

    fn is_jagged(&self, name: &str) -> bool {
        self.branches.get(name).is_some_and(|v| v.iter().all(Value::is_array))
    }

    fn scalar<T>(&self, name: &str, conv: impl Fn(&Value) -> Option<T>) -> TnpResult<Vec<T>> {
        self.branch(name)?
            .iter()
            .enumerate()
            .map(|(i, v)| conv(v).ok_or_else(|| bad_value(name, i, v)))
            .collect()
    }

    /// Concatenate the selected events' entries of a jagged branch.
    fn gather<T>(
        &self,
        name: &str,
        sel: &EventSelection,
        conv: impl Fn(&Value) -> Option<T>,
    ) -> TnpResult<Vec<T>> {
        let values = self.branch(name)?;
        let mut out = Vec::with_capacity(sel.total_hits());
        for (&i, &count) in sel.index.iter().zip(&sel.count) {
            let items = jagged_entry(name, i, &values[i], count)?;
            for item in items {
                out.push(conv(item).ok_or_else(|| bad_value(name, i, item))?);
            }
        }
        Ok(out)
    }

    /// First entry of a jagged branch per selected event.
    fn first<T>(&self, name: &str, sel: &EventSelection, conv: impl Fn(&Value) -> Option<T>) -> TnpResult<Vec<T>> {
        let values = self.branch(name)?;
        let mut out = Vec::with_capacity(sel.len());
        for (&i, &count) in sel.index.iter().zip(&sel.count) {
            let items = jagged_entry(name, i, &values[i], count)?;
            out.push(conv(&items[0]).ok_or_else(|| bad_value(name, i, &items[0]))?);
        }
        Ok(out)
    }
}

fn jagged_entry<'a>(name: &str, event: usize, value: &'a Value, count: usize) -> TnpResult<&'a [Value]> {
    let items = value
        .as_array()
        .ok_or_else(|| TnpError::Message(format!("branch {name} event {event}: expected an array")))?;
    if items.len() != count {
        return Err(TnpError::Message(format!(
            "branch {name} event {event}: {} entries but count branch says {count}",
            items.len()
        )));
    }
    Ok(items)
}

fn bad_value(name: &str, event: usize, v: &Value) -> TnpError {
    TnpError::Message(format!("branch {name} event {event}: unexpected value {v}"))
}

fn as_u32(v: &Value) -> Option<u32> {
    v.as_u64().and_then(|x| u32::try_from(x).ok())
}

fn as_i32(v: &Value) -> Option<i32> {
    v.as_i64().and_then(|x| i32::try_from(x).ok())
}

/// Numeric value of an extra column entry; booleans map to 0 and 1.
fn as_column_value(v: &Value) -> Option<f64> {
    match v {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => v.as_f64(),
    }
}

fn as_flag(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_u64().filter(|x| *x <= 1).map(|x| x == 1),
        _ => None,
    }
}

/// Events with at least one measurement that pass the lumi mask.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventSelection {
    pub index: Vec<usize>,
    pub run: Vec<u32>,
    pub luminosity_block: Vec<u32>,
    pub event: Vec<u64>,
    pub count: Vec<usize>,
    /// Events with a positive count, before the lumi mask.
    pub candidates: usize,
}

impl EventSelection {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn total_hits(&self) -> usize {
        self.count.iter().sum()
    }

    /// Repeat each per-event value `count` times.
    pub fn broadcast<T: Copy>(&self, per_event: &[T]) -> Vec<T> {
        let mut out = Vec::with_capacity(self.total_hits());
        for (v, &n) in per_event.iter().zip(&self.count) {
            out.extend(std::iter::repeat_n(*v, n));
        }
        out
    }
}

pub fn select_events(tree: &NanoTree, prefix: &str, lumi: &LumiMask) -> TnpResult<EventSelection> {
    let count_branch = format!("n{prefix}");
    let counts = tree.scalar(&count_branch, |v| v.as_u64().map(|x| x as usize))?;
    let runs = tree.scalar("run", as_u32)?;
    let lumis = tree.scalar("luminosityBlock", as_u32)?;
    let events = tree.scalar("event", Value::as_u64)?;

    let certified = lumi.mask(&runs, &lumis)?;
    let mut sel = EventSelection::default();
    for i in 0..counts.len() {
        if counts[i] == 0 {
            continue;
        }
        sel.candidates += 1;
        if !certified[i] {
            continue;
        }
        sel.index.push(i);
        sel.run.push(runs[i]);
        sel.luminosity_block.push(lumis[i]);
        sel.event.push(events[i]);
        sel.count.push(counts[i]);
    }
    debug!(
        events = counts.len(),
        candidates = sel.candidates,
        certified = sel.len(),
        "selected events"
    );
    Ok(sel)
}

/// Flatten per-hit branches of the selected events into one row per hit.
pub fn read_hits(tree: &NanoTree, prefix: &str, sel: &EventSelection) -> TnpResult<HitTree> {
    let field = |f: &str| format!("{prefix}_{f}");
    let ints = |f: &str| tree.gather(&field(f), sel, as_i32);
    let flags = |f: &str| tree.gather(&field(f), sel, as_flag);

    let mut extra = BTreeMap::new();
    for f in tree.fields_with_prefix(prefix) {
        if ROLL_FIELDS.contains(&f.as_str()) || FLAG_FIELDS.contains(&f.as_str()) {
            continue;
        }
        let name = field(&f);
        if !tree.is_jagged(&name) {
            debug!(branch = %name, "skipping non-jagged branch");
            continue;
        }
        let values = tree.gather(&name, sel, as_column_value)?;
        // keep the full branch name where the field would shadow an event column
        let column = if EVENT_COLUMNS.contains(&f.as_str()) { name } else { f };
        extra.insert(column, values);
    }

    let hits = HitTree {
        run: sel.broadcast(&sel.run),
        luminosity_block: sel.broadcast(&sel.luminosity_block),
        event: sel.broadcast(&sel.event),
        region: ints("region")?,
        ring: ints("ring")?,
        station: ints("station")?,
        sector: ints("sector")?,
        layer: ints("layer")?,
        subsector: ints("subsector")?,
        roll: ints("roll")?,
        is_fiducial: flags("is_fiducial")?,
        is_matched: flags("is_matched")?,
        extra,
    };
    hits.validate()?;
    Ok(hits)
}

/// One muon row per selected event, from the first tag-probe pair.
pub fn read_muons(tree: &NanoTree, prefix: &str, sel: &EventSelection) -> TnpResult<MuonTree> {
    let mut columns = BTreeMap::new();
    for key in MUON_KEYS {
        let name = format!("{prefix}_{key}");
        if !tree.has_branch(&name) {
            continue;
        }
        columns.insert(key.to_string(), tree.first(&name, sel, as_column_value)?);
    }
    let muons = MuonTree {
        run: sel.run.clone(),
        luminosity_block: sel.luminosity_block.clone(),
        event: sel.event.clone(),
        columns,
    };
    muons.validate()?;
    Ok(muons)
}
