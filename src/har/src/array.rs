//! The in-memory header array model (§3) and the indexed dictionary (§4.C).
//!
//! Mirrors the "tagged variant" design note in the specification: rather than
//! a class hierarchy keyed on element type, `HeaderArray` is a single enum
//! with a common metadata prefix, matched at the API boundary.

use std::collections::HashMap;

use crate::error::{HarError, Result};
use crate::label::{KeySequence, Label};
use crate::sets::SetDef;

/// Value absent from a sparse mapping reads back as this.
pub trait ZeroValue {
    fn zero_value() -> Self;
}

impl ZeroValue for f32 {
    fn zero_value() -> f32 {
        0.0
    }
}

impl ZeroValue for i32 {
    fn zero_value() -> i32 {
        0
    }
}

impl ZeroValue for String {
    fn zero_value() -> String {
        String::new()
    }
}

/// The on-disk type code, as described in §4.B / §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    /// `"1C  "` — strings.
    Strings,
    /// `"RE  "` — labelled reals.
    Reals,
    /// `"2R  "` — unlabelled 2-D reals.
    Reals2D,
    /// `"2I  "` — 2-D integers.
    Ints2D,
    /// `"RL  "` — unlabelled reals, read-only alias of [`ArrayKind::Reals`].
    RealsLegacy,
}

impl ArrayKind {
    pub fn code(self) -> &'static str {
        match self {
            ArrayKind::Strings => "1C",
            ArrayKind::Reals => "RE",
            ArrayKind::Reals2D => "2R",
            ArrayKind::Ints2D => "2I",
            ArrayKind::RealsLegacy => "RL",
        }
    }

    pub fn from_code(code: &str) -> Option<ArrayKind> {
        match code.trim_end() {
            "1C" => Some(ArrayKind::Strings),
            "RE" => Some(ArrayKind::Reals),
            "2R" => Some(ArrayKind::Reals2D),
            "2I" => Some(ArrayKind::Ints2D),
            "RL" => Some(ArrayKind::RealsLegacy),
            _ => None,
        }
    }
}

/// The indexed (KeySequence → T) dictionary of §4.C, over the Cartesian
/// product of a header's sets.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDict<T> {
    sets: Vec<SetDef>,
    dims: Vec<usize>,
    entries: Vec<(KeySequence, T)>,
    index: HashMap<KeySequence, usize>,
    sparse: bool,
}

impl<T: Clone + ZeroValue> IndexedDict<T> {
    /// Builds a dictionary from a materialised entry list. `sparse` records
    /// whether the originating on-disk payload used the sparse encoding,
    /// which must survive a HAR round-trip (§4.C).
    pub fn new(sets: Vec<SetDef>, dims: Vec<usize>, entries: Vec<(KeySequence, T)>, sparse: bool) -> IndexedDict<T> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, (key, _)) in entries.iter().enumerate() {
            index.insert(key.clone(), i);
        }
        IndexedDict {
            sets,
            dims,
            entries,
            index,
            sparse,
        }
    }

    /// A fully materialised (dense) dictionary built by zipping the Cartesian
    /// product of `sets` against `values` in row-major order.
    pub fn from_dense(sets: Vec<SetDef>, dims: Vec<usize>, values: Vec<T>) -> IndexedDict<T> {
        let keys = cartesian_keys(&sets, &dims);
        debug_assert_eq!(keys.len(), values.len());
        let entries: Vec<_> = keys.into_iter().zip(values).collect();
        IndexedDict::new(sets, dims, entries, false)
    }

    pub fn sets(&self) -> &[SetDef] {
        &self.sets
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn is_sparse(&self) -> bool {
        self.sparse
    }

    pub fn materialised_entries(&self) -> &[(KeySequence, T)] {
        &self.entries
    }

    /// Materialised entry count.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Logical cardinality: the product of set sizes, or the materialised
    /// count if that is larger (degenerate/empty-set case).
    pub fn total(&self) -> usize {
        if self.dims.is_empty() {
            return self.count();
        }
        self.dims.iter().product::<usize>().max(self.count())
    }

    pub fn get(&self, key: &KeySequence) -> Option<&T> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// §4.C `get_by_prefix`.
    pub fn get_by_prefix(&self, prefix: &[Label]) -> Result<IndexedDict<T>> {
        let rank = self.sets.len().max(self.dims.len());
        if prefix.len() > rank {
            return Err(HarError::KeyNotFound {
                prefix: prefix.iter().map(|l| l.to_string()).collect(),
            });
        }

        let axes = self.axis_labels();
        for (i, label) in prefix.iter().enumerate() {
            if !axes[i].iter().any(|candidate| candidate == label) {
                return Err(HarError::KeyNotFound {
                    prefix: prefix.iter().map(|l| l.to_string()).collect(),
                });
            }
        }

        let matches: Vec<_> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .cloned()
            .collect();

        if !matches.is_empty() {
            let remaining_sets = self.sets.get(prefix.len()..).unwrap_or(&[]).to_vec();
            let remaining_dims = self.dims.get(prefix.len()..).unwrap_or(&[]).to_vec();
            return Ok(IndexedDict::new(remaining_sets, remaining_dims, matches, self.sparse));
        }

        if prefix.len() == rank {
            // Complete key, absent from the materialised mapping: zero fill (§4.C).
            let zero_entry = (KeySequence::new(prefix.to_vec()), T::zero_value());
            return Ok(IndexedDict::new(vec![], vec![], vec![zero_entry], self.sparse));
        }

        // Prefix is axis-admissible but every completion is absent: same zero-fill rule,
        // scoped to the remaining axes.
        let remaining_sets = self.sets.get(prefix.len()..).unwrap_or(&[]).to_vec();
        let remaining_dims = self.dims.get(prefix.len()..).unwrap_or(&[]).to_vec();
        Ok(IndexedDict::new(remaining_sets, remaining_dims, vec![], self.sparse))
    }

    /// §4.C `logical_enumerate`: one pair per Cartesian-product element,
    /// missing entries filled with the type's zero value.
    pub fn logical_enumerate(&self) -> Vec<(KeySequence, T)> {
        if self.sets.is_empty() && self.dims.is_empty() {
            return self.entries.clone();
        }
        cartesian_keys(&self.sets, &self.dims)
            .into_iter()
            .map(|key| {
                let value = self.get(&key).cloned().unwrap_or_else(T::zero_value);
                (key, value)
            })
            .collect()
    }

    fn axis_labels(&self) -> Vec<Vec<Label>> {
        if !self.sets.is_empty() {
            return self.sets.iter().map(|s| s.elements.clone()).collect();
        }
        self.dims
            .iter()
            .map(|&n| (1..=n).map(|i| Label::from(i.to_string().as_str())).collect())
            .collect()
    }
}

/// Builds the Cartesian product of `sets` (or, if empty, synthetic
/// `1..=dim` axes derived from `dims`) in row-major order.
fn cartesian_keys(sets: &[SetDef], dims: &[usize]) -> Vec<KeySequence> {
    let axes: Vec<Vec<Label>> = if !sets.is_empty() {
        sets.iter().map(|s| s.elements.clone()).collect()
    } else {
        dims.iter()
            .map(|&n| (1..=n).map(|i| Label::from(i.to_string().as_str())).collect())
            .collect()
    };

    if axes.is_empty() {
        return vec![];
    }

    let mut keys = vec![vec![]];
    for axis in &axes {
        let mut next = Vec::with_capacity(keys.len() * axis.len());
        for existing in &keys {
            for label in axis {
                let mut extended = existing.clone();
                extended.push(label.clone());
                next.push(extended);
            }
        }
        keys = next;
    }

    keys.into_iter().map(KeySequence::new).collect()
}

/// Common fields shared by every header array, regardless of `Type` (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderMeta {
    pub header: String,
    pub coefficient: String,
    pub description: String,
    pub dimensions: Vec<i32>,
}

impl HeaderMeta {
    pub fn validate(&self) -> Result<()> {
        if self.header.len() != 4 || !self.header.is_ascii() {
            return Err(HarError::MalformedRecord {
                header: self.header.clone(),
                reason: format!("header code must be exactly 4 ASCII characters, got {:?}", self.header),
            });
        }
        if self.coefficient.len() > 12 {
            return Err(HarError::MalformedRecord {
                header: self.header.clone(),
                reason: "coefficient exceeds 12 characters".to_string(),
            });
        }
        if self.description.len() > 70 {
            return Err(HarError::MalformedRecord {
                header: self.header.clone(),
                reason: "description exceeds 70 characters".to_string(),
            });
        }
        Ok(())
    }
}

/// A single header array, tagged by its on-disk `Type` (§3, §9 design note).
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderArray {
    C1(HeaderMeta, IndexedDict<String>),
    Re(HeaderMeta, IndexedDict<f32>),
    R2(HeaderMeta, IndexedDict<f32>),
    I2(HeaderMeta, IndexedDict<i32>),
}

impl HeaderArray {
    pub fn meta(&self) -> &HeaderMeta {
        match self {
            HeaderArray::C1(meta, _) => meta,
            HeaderArray::Re(meta, _) => meta,
            HeaderArray::R2(meta, _) => meta,
            HeaderArray::I2(meta, _) => meta,
        }
    }

    pub fn header_code(&self) -> &str {
        &self.meta().header
    }

    pub fn kind(&self) -> ArrayKind {
        match self {
            HeaderArray::C1(..) => ArrayKind::Strings,
            HeaderArray::Re(..) => ArrayKind::Reals,
            HeaderArray::R2(..) => ArrayKind::Reals2D,
            HeaderArray::I2(..) => ArrayKind::Ints2D,
        }
    }

    /// §4.C `with_header`: returns a copy carrying a new 4-char header code.
    pub fn with_header(&self, new_code: impl Into<String>) -> Result<HeaderArray> {
        let new_code = new_code.into();
        let mut clone = self.clone();
        match &mut clone {
            HeaderArray::C1(meta, _) => meta.header = new_code,
            HeaderArray::Re(meta, _) => meta.header = new_code,
            HeaderArray::R2(meta, _) => meta.header = new_code,
            HeaderArray::I2(meta, _) => meta.header = new_code,
        }
        clone.meta().validate()?;
        Ok(clone)
    }
}
