//! Geometry table written by the RPC geometry dumper.
//!
//! Header: `roll_name,det_id,area,is_front,x1,y1,z1,...,x4,y4,z4`. Only
//! `roll_name` is required; it enumerates the roll axis of the histograms.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::{TnpError, TnpResult};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeometryRow {
    pub roll_name: String,
    #[serde(default)]
    pub det_id: Option<u32>,
    #[serde(default)]
    pub area: Option<f64>,
    #[serde(default)]
    pub is_front: Option<u8>,
}

pub fn load_geometry(path: &Path) -> TnpResult<Vec<GeometryRow>> {
    let file = std::fs::File::open(path)
        .map_err(|e| TnpError::io(format!("failed to open geometry file {}", path.display()), e))?;
    let rows = read_geometry(file)
        .map_err(|e| TnpError::Config(format!("geometry file {}: {e}", path.display())))?;
    debug!(path = %path.display(), rolls = rows.len(), "loaded geometry");
    Ok(rows)
}

pub fn read_geometry<R: Read>(reader: R) -> TnpResult<Vec<GeometryRow>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers().map_err(|e| TnpError::csv("failed to read CSV header", e))?;
    if !headers.iter().any(|h| h == "roll_name") {
        return Err(TnpError::Message("missing roll_name column".into()));
    }
    let mut rows = Vec::new();
    for (line, row) in rdr.deserialize::<GeometryRow>().enumerate() {
        let row = row.map_err(|e| TnpError::csv(format!("bad geometry row {}", line + 2), e))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Roll names in file order, first occurrence wins.
pub fn roll_names(rows: &[GeometryRow]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|r| seen.insert(r.roll_name.as_str()))
        .map(|r| r.roll_name.clone())
        .collect()
}
