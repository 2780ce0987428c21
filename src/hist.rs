//! Categorical histograms (string or integer category axes) and category-union merging.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{TnpError, TnpResult};

/// A single bin label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Str(String),
    Int(i64),
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Str(s) => f.write_str(s),
            Category::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Category::Str(s.to_string())
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Category::Str(s)
    }
}

impl From<u32> for Category {
    fn from(v: u32) -> Self {
        Category::Int(v as i64)
    }
}

impl From<i64> for Category {
    fn from(v: i64) -> Self {
        Category::Int(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisKind {
    Str,
    Int,
}

/// Fixed, ordered set of categories. Labels are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "categories", rename_all = "lowercase")]
pub enum CategoryAxis {
    Str(Vec<String>),
    Int(Vec<i64>),
}

impl CategoryAxis {
    /// String axis; duplicate labels keep their first position.
    pub fn strings<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = std::collections::HashSet::new();
        let cats = labels.into_iter().map(Into::into).filter(|s: &String| seen.insert(s.clone())).collect();
        CategoryAxis::Str(cats)
    }

    pub fn ints<I: IntoIterator<Item = i64>>(labels: I) -> Self {
        let mut seen = std::collections::HashSet::new();
        CategoryAxis::Int(labels.into_iter().filter(|v| seen.insert(*v)).collect())
    }

    pub fn empty(kind: AxisKind) -> Self {
        match kind {
            AxisKind::Str => CategoryAxis::Str(Vec::new()),
            AxisKind::Int => CategoryAxis::Int(Vec::new()),
        }
    }

    pub fn kind(&self) -> AxisKind {
        match self {
            CategoryAxis::Str(_) => AxisKind::Str,
            CategoryAxis::Int(_) => AxisKind::Int,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CategoryAxis::Str(v) => v.len(),
            CategoryAxis::Int(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn label(&self, idx: usize) -> Option<Category> {
        match self {
            CategoryAxis::Str(v) => v.get(idx).map(|s| Category::Str(s.clone())),
            CategoryAxis::Int(v) => v.get(idx).map(|i| Category::Int(*i)),
        }
    }

    pub fn labels(&self) -> Vec<Category> {
        (0..self.len()).filter_map(|i| self.label(i)).collect()
    }

    /// Linear scan; use [`AxisIndex`] for repeated lookups.
    pub fn index_of(&self, cat: &Category) -> Option<usize> {
        match (self, cat) {
            (CategoryAxis::Str(v), Category::Str(s)) => v.iter().position(|x| x == s),
            (CategoryAxis::Int(v), Category::Int(i)) => v.iter().position(|x| x == i),
            _ => None,
        }
    }

    fn push(&mut self, cat: Category) -> TnpResult<()> {
        match (self, cat) {
            (CategoryAxis::Str(v), Category::Str(s)) => v.push(s),
            (CategoryAxis::Int(v), Category::Int(i)) => v.push(i),
            (axis, cat) => {
                return Err(TnpError::Message(format!(
                    "category {cat} does not match {:?} axis",
                    axis.kind()
                )));
            }
        }
        Ok(())
    }
}

/// Hash lookup from label to bin index for one axis.
#[derive(Debug, Clone)]
pub struct AxisIndex {
    positions: HashMap<Category, usize>,
}

impl AxisIndex {
    pub fn new(axis: &CategoryAxis) -> Self {
        let positions = axis.labels().into_iter().enumerate().map(|(i, c)| (c, i)).collect();
        AxisIndex { positions }
    }

    pub fn get(&self, cat: &Category) -> Option<usize> {
        self.positions.get(cat).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryHist {
    pub axes: Vec<CategoryAxis>,
    /// Row-major bin contents.
    pub values: Vec<f64>,
    /// Sum of weights filled with a label outside the axes.
    #[serde(default)]
    pub dropped: f64,
}

impl CategoryHist {
    pub fn new(axes: Vec<CategoryAxis>) -> Self {
        let size = axes.iter().map(|a| a.len()).product::<usize>();
        CategoryHist { axes, values: vec![0.0; size], dropped: 0.0 }
    }

    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn dropped(&self) -> f64 {
        self.dropped
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.axes.len()];
        for i in (0..self.axes.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.axes[i + 1].len();
        }
        strides
    }

    /// Flat offset of a multi-dimensional bin index.
    pub fn offset(&self, idx: &[usize]) -> Option<usize> {
        if idx.len() != self.axes.len() || idx.iter().zip(&self.axes).any(|(i, a)| *i >= a.len()) {
            return None;
        }
        Some(idx.iter().zip(self.strides()).map(|(i, s)| i * s).sum())
    }

    fn locate(&self, cats: &[Category]) -> Option<usize> {
        if cats.len() != self.axes.len() {
            return None;
        }
        let idx: Option<Vec<usize>> = cats.iter().zip(&self.axes).map(|(c, a)| a.index_of(c)).collect();
        idx.and_then(|idx| self.offset(&idx))
    }

    pub fn fill_weighted(&mut self, cats: &[Category], weight: f64) {
        match self.locate(cats) {
            Some(off) => self.values[off] += weight,
            None => self.dropped += weight,
        }
    }

    pub fn fill1(&mut self, x: &Category) {
        self.fill_weighted(std::slice::from_ref(x), 1.0);
    }

    pub fn fill2(&mut self, x: &Category, y: &Category) {
        self.fill_weighted(&[x.clone(), y.clone()], 1.0);
    }

    /// Fill many entries at once using hashed axis lookups.
    pub fn fill_many<'a, I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = &'a [Category]>,
    {
        let indices: Vec<AxisIndex> = self.axes.iter().map(AxisIndex::new).collect();
        let strides = self.strides();
        for row in rows {
            let off = if row.len() == indices.len() {
                row.iter()
                    .zip(&indices)
                    .zip(&strides)
                    .map(|((c, ix), s)| ix.get(c).map(|i| i * s))
                    .sum::<Option<usize>>()
            } else {
                None
            };
            match off {
                Some(off) => self.values[off] += 1.0,
                None => self.dropped += 1.0,
            }
        }
    }

    pub fn value(&self, cats: &[Category]) -> Option<f64> {
        self.locate(cats).map(|off| self.values[off])
    }

    /// Shape and axis-kind check for histograms read from disk.
    pub fn validate(&self) -> TnpResult<()> {
        let size = self.axes.iter().map(|a| a.len()).product::<usize>();
        if size != self.values.len() {
            return Err(TnpError::Message(format!(
                "histogram has {} values but its axes span {} bins",
                self.values.len(),
                size
            )));
        }
        Ok(())
    }
}

/// Combine histograms whose categories may differ in presence and order.
///
/// The merged axis holds every category seen on that axis, in first-seen order
/// across the inputs. Bin contents are accumulated by label.
pub fn merge_histograms(hists: &[CategoryHist]) -> TnpResult<CategoryHist> {
    let first = hists
        .first()
        .ok_or_else(|| TnpError::Message("cannot merge an empty list of histograms".into()))?;
    let ndim = first.ndim();
    if ndim != 1 && ndim != 2 {
        return Err(TnpError::Message(format!(
            "only 1D and 2D histograms are supported, got {ndim} axes"
        )));
    }

    let mut union: Vec<CategoryAxis> = first.axes.iter().map(|a| CategoryAxis::empty(a.kind())).collect();
    let mut union_index: Vec<HashMap<Category, usize>> = vec![HashMap::new(); ndim];
    for (n, h) in hists.iter().enumerate() {
        h.validate()?;
        if h.ndim() != ndim {
            return Err(TnpError::Message(format!(
                "histogram {n} has {} axes, expected {ndim}",
                h.ndim()
            )));
        }
        for (axis_no, axis) in h.axes.iter().enumerate() {
            if axis.kind() != union[axis_no].kind() {
                return Err(TnpError::Message(format!(
                    "histogram {n} axis {axis_no} is {:?}, expected {:?}",
                    axis.kind(),
                    union[axis_no].kind()
                )));
            }
            for cat in axis.labels() {
                if !union_index[axis_no].contains_key(&cat) {
                    union_index[axis_no].insert(cat.clone(), union[axis_no].len());
                    union[axis_no].push(cat)?;
                }
            }
        }
    }

    let mut merged = CategoryHist::new(union);
    for h in hists {
        merged.dropped += h.dropped;
        match ndim {
            1 => {
                for (i, cat) in h.axes[0].labels().iter().enumerate() {
                    let target = union_index[0][cat];
                    merged.values[target] += h.values[i];
                }
            }
            _ => {
                let xs = h.axes[0].labels();
                let ys = h.axes[1].labels();
                let ny = ys.len();
                let ny_union = merged.axes[1].len();
                for (xi, x) in xs.iter().enumerate() {
                    for (yi, y) in ys.iter().enumerate() {
                        let v = h.values[xi * ny + yi];
                        if v > 0.0 {
                            let target = union_index[0][x] * ny_union + union_index[1][y];
                            merged.values[target] += v;
                        }
                    }
                }
            }
        }
    }

    debug!(
        inputs = hists.len(),
        bins = merged.values.len(),
        "merged histograms"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Category {
        Category::from(v)
    }

    #[test]
    fn test_fill_and_drop() {
        let mut h = CategoryHist::new(vec![CategoryAxis::strings(["A", "B"])]);
        h.fill1(&s("A"));
        h.fill1(&s("A"));
        h.fill1(&s("Z"));
        assert_eq!(h.value(&[s("A")]), Some(2.0));
        assert_eq!(h.value(&[s("B")]), Some(0.0));
        assert_eq!(h.dropped(), 1.0);
    }

    #[test]
    fn test_fill_2d_row_major() {
        let mut h = CategoryHist::new(vec![CategoryAxis::strings(["A", "B"]), CategoryAxis::ints([1, 2, 3])]);
        h.fill2(&s("B"), &Category::Int(3));
        assert_eq!(h.values()[5], 1.0);
        let rows = vec![vec![s("A"), Category::Int(2)], vec![s("A"), Category::Int(9)]];
        h.fill_many(rows.iter().map(|r| r.as_slice()));
        assert_eq!(h.value(&[s("A"), Category::Int(2)]), Some(1.0));
        assert_eq!(h.dropped(), 1.0);
    }

    #[test]
    fn test_merge_union_by_label() {
        let mut a = CategoryHist::new(vec![CategoryAxis::strings(["A", "B"])]);
        a.fill_weighted(&[s("A")], 5.0);
        let mut b = CategoryHist::new(vec![CategoryAxis::strings(["B", "C"])]);
        b.fill_weighted(&[s("B")], 3.0);
        b.fill_weighted(&[s("C")], 2.0);

        let m = merge_histograms(&[a, b]).unwrap();
        assert_eq!(m.axes[0], CategoryAxis::Str(vec!["A".into(), "B".into(), "C".into()]));
        assert_eq!(m.value(&[s("A")]), Some(5.0));
        assert_eq!(m.value(&[s("B")]), Some(3.0));
        assert_eq!(m.value(&[s("C")]), Some(2.0));
    }

    #[test]
    fn test_merge_2d_with_different_orders() {
        let mut a = CategoryHist::new(vec![CategoryAxis::strings(["X", "Y"]), CategoryAxis::ints([10, 20])]);
        a.fill_weighted(&[s("Y"), Category::Int(20)], 4.0);
        let mut b = CategoryHist::new(vec![CategoryAxis::strings(["Y"]), CategoryAxis::ints([30, 20])]);
        b.fill_weighted(&[s("Y"), Category::Int(20)], 1.0);
        b.fill_weighted(&[s("Y"), Category::Int(30)], 2.0);

        let m = merge_histograms(&[a, b]).unwrap();
        assert_eq!(m.axes[1], CategoryAxis::Int(vec![10, 20, 30]));
        assert_eq!(m.value(&[s("Y"), Category::Int(20)]), Some(5.0));
        assert_eq!(m.value(&[s("Y"), Category::Int(30)]), Some(2.0));
        assert_eq!(m.value(&[s("X"), Category::Int(10)]), Some(0.0));
        assert_eq!(m.sum(), 7.0);
    }

    #[test]
    fn test_merge_rejects_3d_and_mismatched_kinds() {
        let h3 = CategoryHist::new(vec![
            CategoryAxis::ints([1]),
            CategoryAxis::ints([1]),
            CategoryAxis::ints([1]),
        ]);
        assert!(merge_histograms(&[h3]).is_err());

        let a = CategoryHist::new(vec![CategoryAxis::strings(["A"])]);
        let b = CategoryHist::new(vec![CategoryAxis::ints([1])]);
        assert!(merge_histograms(&[a, b]).is_err());
        assert!(merge_histograms(&[]).is_err());
    }

    #[test]
    fn test_unknown_axis_kind_fails_to_parse() {
        let text = r#"{"axes": [{"kind": "regular", "categories": [1.0]}], "values": [0.0]}"#;
        assert!(serde_json::from_str::<CategoryHist>(text).is_err());
    }

    #[test]
    fn test_serde_shape() {
        let h = CategoryHist::new(vec![CategoryAxis::ints([355100])]);
        let v = serde_json::to_value(&h).unwrap();
        assert_eq!(v["axes"][0]["kind"], "int");
        assert_eq!(v["axes"][0]["categories"][0], 355100);
    }
}
