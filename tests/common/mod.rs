#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::{Value, json};

pub const GEOMETRY_CSV: &str = "roll_name,det_id,area,is_front,x1,y1,z1,x2,y2,z2,x3,y3,z3,x4,y4,z4\n\
W+1_RB1in_S01_Backward,1,1.0,1,0,0,0,0,0,0,0,0,0,0,0,0\n\
W+1_RB1in_S01_Middle,2,1.0,1,0,0,0,0,0,0,0,0,0,0,0,0\n\
RE+1_R2_CH01_A,3,1.0,0,0,0,0,0,0,0,0,0,0,0,0,0\n\
RE+4_R1_CH15_A,4,1.0,1,0,0,0,0,0,0,0,0,0,0,0,0\n";

/// One hit: (region, ring, station, sector, layer, subsector, roll, fiducial, matched).
pub type Hit = (i64, i64, i64, i64, i64, i64, i64, bool, bool);

pub const BARREL_B: Hit = (0, 1, 1, 1, 1, 1, 1, true, true);
pub const BARREL_M: Hit = (0, 1, 1, 1, 1, 1, 2, true, false);
pub const ENDCAP: Hit = (1, 2, 1, 1, 1, 1, 1, true, true);
pub const KNOWN_BAD: Hit = (1, 1, 4, 5, 1, 3, 1, true, true);
pub const NOT_FIDUCIAL: Hit = (0, 1, 1, 1, 1, 1, 1, false, true);

/// Build an input tree from `(run, lumi, event, hits)` rows.
pub fn nanoaod(events: &[(u32, u32, u64, Vec<Hit>)]) -> Value {
    let mut branches = serde_json::Map::new();
    let col = |f: &dyn Fn(&(u32, u32, u64, Vec<Hit>)) -> Value| Value::Array(events.iter().map(f).collect());
    branches.insert("run".into(), col(&|e| json!(e.0)));
    branches.insert("luminosityBlock".into(), col(&|e| json!(e.1)));
    branches.insert("event".into(), col(&|e| json!(e.2)));
    branches.insert("nrpcTnP".into(), col(&|e| json!(e.3.len())));
    branches.insert("rpcTnP_region".into(), col(&|e| json!(e.3.iter().map(|h| h.0).collect::<Vec<_>>())));
    branches.insert("rpcTnP_ring".into(), col(&|e| json!(e.3.iter().map(|h| h.1).collect::<Vec<_>>())));
    branches.insert("rpcTnP_station".into(), col(&|e| json!(e.3.iter().map(|h| h.2).collect::<Vec<_>>())));
    branches.insert("rpcTnP_sector".into(), col(&|e| json!(e.3.iter().map(|h| h.3).collect::<Vec<_>>())));
    branches.insert("rpcTnP_layer".into(), col(&|e| json!(e.3.iter().map(|h| h.4).collect::<Vec<_>>())));
    branches.insert("rpcTnP_subsector".into(), col(&|e| json!(e.3.iter().map(|h| h.5).collect::<Vec<_>>())));
    branches.insert("rpcTnP_roll".into(), col(&|e| json!(e.3.iter().map(|h| h.6).collect::<Vec<_>>())));
    branches.insert("rpcTnP_is_fiducial".into(), col(&|e| json!(e.3.iter().map(|h| h.7).collect::<Vec<_>>())));
    branches.insert("rpcTnP_is_matched".into(), col(&|e| json!(e.3.iter().map(|h| h.8).collect::<Vec<_>>())));
    branches.insert(
        "rpcTnP_probe_pt".into(),
        col(&|e| json!((0..e.3.len()).map(|i| e.2 as f64 + i as f64 / 10.0).collect::<Vec<_>>())),
    );
    json!({ "Events": Value::Object(branches) })
}

pub struct Inputs {
    pub dir: tempfile::TempDir,
    pub input: PathBuf,
    pub cert: PathBuf,
    pub geometry: PathBuf,
}

pub fn write_inputs(events: &[(u32, u32, u64, Vec<Hit>)], cert: &str) -> Inputs {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("nano.json");
    let cert_path = dir.path().join("golden.json");
    let geometry = dir.path().join("geometry.csv");
    std::fs::write(&input, nanoaod(events).to_string()).unwrap();
    std::fs::write(&cert_path, cert).unwrap();
    std::fs::write(&geometry, GEOMETRY_CSV).unwrap();
    Inputs { dir, input, cert: cert_path, geometry }
}

pub fn path_in(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}
