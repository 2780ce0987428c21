//! Certified luminosity-block mask ("golden JSON").
//!
//! The certification file maps a run number to a list of closed lumiblock
//! intervals `[first, last]`. Each run's intervals are normalized and stored as
//! a flat, sorted list of boundary markers `first - 1, last, first - 1, last, ...`
//! so that a lumiblock is certified iff the number of markers strictly below it
//! is odd.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::{TnpError, TnpResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LumiMask {
    markers: BTreeMap<u32, Vec<i64>>,
}

impl LumiMask {
    /// Build from closed `[first, last]` intervals per run.
    pub fn from_ranges<I, R>(cert: I) -> TnpResult<Self>
    where
        I: IntoIterator<Item = (u32, R)>,
        R: AsRef<[[u32; 2]]>,
    {
        let mut markers = BTreeMap::new();
        for (run, ranges) in cert {
            let ranges = ranges.as_ref();
            for [first, last] in ranges {
                if first > last {
                    return Err(TnpError::Config(format!(
                        "run {run}: lumi range [{first}, {last}] has first > last"
                    )));
                }
            }
            if markers.insert(run, to_markers(ranges)).is_some() {
                return Err(TnpError::Config(format!("run {run} is listed more than once")));
            }
        }
        Ok(LumiMask { markers })
    }

    pub fn from_json_str(text: &str) -> TnpResult<Self> {
        Self::from_json_slice(text.as_bytes())
    }

    pub fn from_json_slice(bytes: &[u8]) -> TnpResult<Self> {
        let raw: BTreeMap<String, Vec<[u32; 2]>> =
            serde_json::from_slice(bytes).map_err(|e| TnpError::json("malformed certification json", e))?;
        let mut cert = Vec::with_capacity(raw.len());
        for (key, ranges) in raw {
            let run: u32 = key
                .trim()
                .parse()
                .map_err(|_| TnpError::Config(format!("certification run key is not an integer: {key:?}")))?;
            cert.push((run, ranges));
        }
        Self::from_ranges(cert)
    }

    pub fn from_json_file(path: &Path) -> TnpResult<Self> {
        let bytes = crate::read_input(path, "certification file")?;
        let mask = Self::from_json_slice(&bytes)?;
        debug!(path = %path.display(), runs = mask.len(), "loaded certification");
        Ok(mask)
    }

    pub fn is_good(&self, run: u32, lumi: u32) -> bool {
        match self.markers.get(&run) {
            Some(markers) => lookup(markers, lumi),
            None => false,
        }
    }

    /// Element-wise certification of `(runs[i], lumis[i])`.
    pub fn mask(&self, runs: &[u32], lumis: &[u32]) -> TnpResult<Vec<bool>> {
        if runs.len() != lumis.len() {
            return Err(TnpError::Message(format!(
                "run and lumiblock arrays differ in length: {} vs {}",
                runs.len(),
                lumis.len()
            )));
        }
        let mut out = Vec::with_capacity(runs.len());
        let mut cached: Option<(u32, Option<&Vec<i64>>)> = None;
        for (&run, &lumi) in runs.iter().zip(lumis) {
            let markers = match cached {
                Some((r, m)) if r == run => m,
                _ => {
                    let m = self.markers.get(&run);
                    cached = Some((run, m));
                    m
                }
            };
            out.push(markers.is_some_and(|m| lookup(m, lumi)));
        }
        Ok(out)
    }

    /// Broadcast a single run over many lumiblocks.
    pub fn mask_run(&self, run: u32, lumis: &[u32]) -> Vec<bool> {
        match self.markers.get(&run) {
            Some(markers) => lumis.iter().map(|&l| lookup(markers, l)).collect(),
            None => vec![false; lumis.len()],
        }
    }

    pub fn runs(&self) -> impl Iterator<Item = u32> + '_ {
        self.markers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

fn to_markers(ranges: &[[u32; 2]]) -> Vec<i64> {
    let mut sorted: Vec<(i64, i64)> = ranges.iter().map(|[f, l]| (*f as i64, *l as i64)).collect();
    sorted.sort_unstable();

    // coalesce overlapping and touching intervals
    let mut merged: Vec<(i64, i64)> = Vec::with_capacity(sorted.len());
    for (first, last) in sorted {
        match merged.last_mut() {
            Some((_, prev_last)) if first <= *prev_last + 1 => {
                *prev_last = (*prev_last).max(last);
            }
            _ => merged.push((first, last)),
        }
    }

    merged.into_iter().flat_map(|(first, last)| [first - 1, last]).collect()
}

fn lookup(markers: &[i64], lumi: u32) -> bool {
    let lumi = lumi as i64;
    let idx = markers.partition_point(|&m| m < lumi);
    idx & 1 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn golden() -> LumiMask {
        LumiMask::from_json_str(r#"{"100": [[10, 20]], "101": [[1, 5], [8, 8]], "102": []}"#).unwrap()
    }

    #[test]
    fn test_inclusive_boundaries() {
        let mask = golden();
        assert!(mask.is_good(100, 10));
        assert!(!mask.is_good(100, 9));
        assert!(mask.is_good(100, 20));
        assert!(!mask.is_good(100, 21));
        assert!(mask.is_good(100, 15));
    }

    #[test]
    fn test_absent_run_is_never_good() {
        let mask = golden();
        for lumi in [0, 1, 10, 20, u32::MAX] {
            assert!(!mask.is_good(200, lumi));
        }
        assert_eq!(mask.mask_run(200, &[1, 2, 3]), vec![false; 3]);
    }

    #[test]
    fn test_empty_range_list() {
        let mask = golden();
        assert!(!mask.is_good(102, 1));
    }

    #[test]
    fn test_single_lumi_range_and_gap() {
        let mask = golden();
        assert_eq!(
            mask.mask_run(101, &[0, 1, 5, 6, 7, 8, 9]),
            vec![false, true, true, false, false, true, false]
        );
    }

    #[test]
    fn test_zero_first_lumi_does_not_wrap() {
        let mask = LumiMask::from_ranges([(1u32, vec![[0u32, 3]])]).unwrap();
        assert!(mask.is_good(1, 0));
        assert!(mask.is_good(1, 3));
        assert!(!mask.is_good(1, 4));
    }

    #[test]
    fn test_overlapping_ranges_are_coalesced() {
        let mask = LumiMask::from_ranges([(1u32, vec![[5u32, 10], [1, 6], [11, 12], [20, 20]])]).unwrap();
        let expected: Vec<bool> = (0..25).map(|l| (1..=12).contains(&l) || l == 20).collect();
        assert_eq!(mask.mask_run(1, &(0..25).collect::<Vec<u32>>()), expected);
    }

    #[test]
    fn test_vectorized_mask_mixed_runs() {
        let mask = golden();
        let runs = [100, 100, 200, 101, 100];
        let lumis = [10, 21, 10, 8, 20];
        assert_eq!(mask.mask(&runs, &lumis).unwrap(), vec![true, false, false, true, true]);
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let mask = golden();
        assert!(mask.mask(&[100, 100], &[1]).is_err());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = LumiMask::from_json_str(r#"{"1": [[5, 4]]}"#).unwrap_err();
        assert!(err.to_string().contains("first > last"));
    }

    #[test]
    fn test_duplicate_run_key_rejected() {
        let err = LumiMask::from_json_str(r#"{"100": [[1, 5]], " 100": [[8, 9]]}"#).unwrap_err();
        assert!(err.to_string().contains("run 100 is listed more than once"));
        assert!(LumiMask::from_json_str(r#"{"100": [[1, 5]], "0100": [[8, 9]]}"#).is_err());
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(LumiMask::from_json_str("{\"1\": [[1]]}").is_err());
        assert!(LumiMask::from_json_str("{\"abc\": [[1, 2]]}").is_err());
        assert!(LumiMask::from_json_str("not json").is_err());
    }
}
