//! RPC detector-element ("roll") naming.
//!
//! Barrel rolls look like `W+1_RB1in_S01_Backward`, endcap rolls like
//! `RE-2_R3_CH07_B`.

use serde::{Deserialize, Serialize};

/// Structural identifier of one roll, as stored per hit in the NanoAOD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RollId {
    pub region: i32,
    pub ring: i32,
    pub station: i32,
    pub sector: i32,
    pub layer: i32,
    pub subsector: i32,
    pub roll: i32,
}

impl RollId {
    pub fn is_barrel(&self) -> bool {
        self.region == 0
    }

    /// Chamber number within an endcap disk ring.
    pub fn segment(&self) -> i32 {
        let nsub = if self.ring == 1 && self.station > 1 { 3 } else { 6 };
        self.subsector + nsub * (self.sector - 1)
    }

    pub fn name(&self) -> String {
        if self.is_barrel() {
            self.barrel_name()
        } else {
            self.endcap_name()
        }
    }

    fn barrel_name(&self) -> String {
        let wheel = if self.ring > 0 { format!("W+{}", self.ring) } else { format!("W{}", self.ring) };
        let roll = match self.roll {
            1 => "Backward".to_string(),
            2 => "Middle".to_string(),
            3 => "Forward".to_string(),
            other => other.to_string(),
        };
        format!(
            "{wheel}_RB{}{}_S{:02}_{roll}",
            self.station,
            self.barrel_layer_suffix(),
            self.sector
        )
    }

    fn barrel_layer_suffix(&self) -> &'static str {
        match self.station {
            1 | 2 => {
                if self.layer == 1 {
                    "in"
                } else {
                    "out"
                }
            }
            3 => {
                if self.subsector == 1 {
                    "-"
                } else {
                    "+"
                }
            }
            4 => match self.sector {
                4 => match self.subsector {
                    1 => "--",
                    2 => "-",
                    3 => "+",
                    _ => "++",
                },
                9 | 11 => "",
                _ => {
                    if self.subsector == 1 {
                        "-"
                    } else {
                        "+"
                    }
                }
            },
            _ => "",
        }
    }

    fn endcap_name(&self) -> String {
        let side = if self.region < 0 { '-' } else { '+' };
        let roll = u8::try_from(self.roll)
            .ok()
            .filter(|r| (1..=26).contains(r))
            .map(|r| char::from(b'A' + r - 1).to_string())
            .unwrap_or_else(|| self.roll.to_string());
        format!(
            "RE{side}{}_R{}_CH{:02}_{roll}",
            self.station,
            self.ring,
            self.segment()
        )
    }
}
