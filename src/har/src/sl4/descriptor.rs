//! SL4 schema Pass 1: per-variable descriptors and the global set table
//! (§4.E).

use rayon::prelude::*;

use crate::array::HeaderArray;
use crate::error::{HarError, Result};
use crate::file::HeaderArrayFile;
use crate::label::Label;
use crate::sets::SetDef;

/// Variables run in parallel through Pass 1 once the file carries at least
/// this many; smaller files decode sequentially (§5).
const PARALLEL_THRESHOLD: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Change,
    PercentChange,
}

impl ChangeType {
    fn from_char(c: char) -> Result<ChangeType> {
        match c {
            'c' => Ok(ChangeType::Change),
            'p' => Ok(ChangeType::PercentChange),
            other => Err(HarError::SchemaError {
                reason: format!("VCT0: unrecognised change-type char {other:?}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    Condensed,
    Backsolved,
    Ommitted,
    Substituted,
}

impl VariableType {
    fn from_char(c: char) -> Result<VariableType> {
        match c {
            'c' => Ok(VariableType::Condensed),
            'b' => Ok(VariableType::Backsolved),
            'o' => Ok(VariableType::Ommitted),
            's' => Ok(VariableType::Substituted),
            other => Err(HarError::SchemaError {
                reason: format!("VCS0: unrecognised variable-type char {other:?}"),
            }),
        }
    }

    pub fn is_endogenous(self) -> bool {
        matches!(self, VariableType::Condensed | VariableType::Backsolved)
    }
}

/// One model variable's static description (§3 "Solution-variable
/// descriptor").
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDescriptor {
    pub name: String,
    pub description: String,
    pub variable_index: usize,
    pub number_of_sets: usize,
    pub unit: String,
    pub change_type: ChangeType,
    pub variable_type: VariableType,
    pub sets: Vec<SetDef>,
}

impl VariableDescriptor {
    pub fn is_endogenous(&self) -> bool {
        self.variable_type.is_endogenous()
    }
}

fn require_header<'a>(file: &'a HeaderArrayFile, code: &str) -> Result<&'a HeaderArray> {
    file.get(code).ok_or_else(|| HarError::SchemaError {
        reason: format!("missing mandatory SL4 header {code:?}"),
    })
}

fn i2_values(file: &HeaderArrayFile, code: &str) -> Result<Vec<i32>> {
    match require_header(file, code)? {
        HeaderArray::I2(_, dict) => Ok(dict.logical_enumerate().into_iter().map(|(_, v)| v).collect()),
        other => Err(HarError::SchemaError {
            reason: format!("{code}: expected 2I array, found {:?}", other.kind()),
        }),
    }
}

fn r2_values(file: &HeaderArrayFile, code: &str) -> Result<Vec<f32>> {
    match require_header(file, code)? {
        HeaderArray::R2(_, dict) => Ok(dict.logical_enumerate().into_iter().map(|(_, v)| v).collect()),
        other => Err(HarError::SchemaError {
            reason: format!("{code}: expected 2R array, found {:?}", other.kind()),
        }),
    }
}

fn c1_values(file: &HeaderArrayFile, code: &str) -> Result<Vec<String>> {
    match require_header(file, code)? {
        HeaderArray::C1(_, dict) => Ok(dict.logical_enumerate().into_iter().map(|(_, v)| v).collect()),
        other => Err(HarError::SchemaError {
            reason: format!("{code}: expected 1C array, found {:?}", other.kind()),
        }),
    }
}

fn single_char(values: &[String], index: usize, code: &str) -> Result<char> {
    values
        .get(index)
        .and_then(|s| s.trim().chars().next())
        .ok_or_else(|| HarError::SchemaError {
            reason: format!("{code}[{index}]: expected a single character"),
        })
}

/// Reads `STNM`/`STLB`/`STTP`/`SSZ `/`STEL` and slices `STEL` into each set's
/// element list according to `SSZ`.
fn read_global_set_table(file: &HeaderArrayFile) -> Result<Vec<SetDef>> {
    let names = c1_values(file, "STNM")?;
    let _labels = c1_values(file, "STLB")?;
    let _types = c1_values(file, "STTP")?;
    let sizes = i2_values(file, "SSZ ")?;
    let elements = c1_values(file, "STEL")?;

    if names.len() != sizes.len() {
        return Err(HarError::IntegrityError {
            header: "SSZ ".to_string(),
            index: sizes.len(),
            reason: "set count mismatch between STNM and SSZ".to_string(),
        });
    }

    let mut sets = Vec::with_capacity(names.len());
    let mut cursor = 0usize;
    for (i, (name, &size)) in names.iter().zip(sizes.iter()).enumerate() {
        let size = usize::try_from(size).map_err(|_| HarError::IntegrityError {
            header: "SSZ ".to_string(),
            index: i,
            reason: format!("negative set size {size}"),
        })?;
        let slice = elements.get(cursor..cursor + size).ok_or_else(|| HarError::IntegrityError {
            header: "STEL".to_string(),
            index: cursor,
            reason: "element table shorter than declared set sizes".to_string(),
        })?;
        let labels: Result<Vec<Label>> = slice.iter().map(|s| Label::new(s.clone())).collect();
        sets.push(SetDef::new(name.clone(), labels?));
        cursor += size;
    }
    Ok(sets)
}

/// Builds every variable descriptor in `file` (§4.E Pass 1).
pub fn build_descriptors(file: &HeaderArrayFile) -> Result<Vec<VariableDescriptor>> {
    let vcni = i2_values(file, "VCNI")?;
    let vcnm = c1_values(file, "VCNM")?;
    let vcl0 = c1_values(file, "VCL0")?;
    let vcle = c1_values(file, "VCLE")?;
    let vct0 = c1_values(file, "VCT0")?;
    let vcs0 = c1_values(file, "VCS0")?;
    let vcsp = i2_values(file, "VCSP")?;
    let vcsn = i2_values(file, "VCSN")?;
    let global_sets = read_global_set_table(file)?;

    let count = vcni.len();
    let build_one = |v: usize| -> Result<VariableDescriptor> {
        let number_of_sets = usize::try_from(vcni[v]).map_err(|_| HarError::IntegrityError {
            header: "VCNI".to_string(),
            index: v,
            reason: format!("negative set count {}", vcni[v]),
        })?;
        let pointer = usize::try_from(vcsp[v]).map_err(|_| HarError::IntegrityError {
            header: "VCSP".to_string(),
            index: v,
            reason: format!("negative pointer {}", vcsp[v]),
        })?;

        let mut sets = Vec::with_capacity(number_of_sets);
        for j in 0..number_of_sets {
            let entry_index = pointer.checked_sub(1).and_then(|base| base.checked_add(j)).ok_or_else(|| {
                HarError::IntegrityError {
                    header: "VCSP".to_string(),
                    index: v,
                    reason: "pointer underflow".to_string(),
                }
            })?;
            let global_index = *vcsn.get(entry_index).ok_or_else(|| HarError::IntegrityError {
                header: "VCSN".to_string(),
                index: entry_index,
                reason: "pointer out of range".to_string(),
            })?;
            let global_index = usize::try_from(global_index - 1).map_err(|_| HarError::IntegrityError {
                header: "VCSN".to_string(),
                index: entry_index,
                reason: format!("set index {global_index} out of range"),
            })?;
            let set = global_sets.get(global_index).ok_or_else(|| HarError::IntegrityError {
                header: "VCSN".to_string(),
                index: entry_index,
                reason: format!("set index {global_index} out of range"),
            })?;
            sets.push(set.clone());
        }

        Ok(VariableDescriptor {
            name: vcnm.get(v).cloned().unwrap_or_default(),
            description: vcl0.get(v).cloned().unwrap_or_default(),
            variable_index: v + 1,
            number_of_sets,
            unit: vcle.get(v).cloned().unwrap_or_default(),
            change_type: ChangeType::from_char(single_char(&vct0, v, "VCT0")?)?,
            variable_type: VariableType::from_char(single_char(&vcs0, v, "VCS0")?)?,
            sets,
        })
    };

    if count >= PARALLEL_THRESHOLD {
        (0..count).into_par_iter().map(build_one).collect()
    } else {
        (0..count).map(build_one).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{ArrayKind, HeaderMeta};
    use crate::label::Label;

    fn label(s: &str) -> Label {
        Label::new(s).unwrap()
    }

    fn c1(code: &str, values: Vec<&str>) -> HeaderArray {
        let meta = HeaderMeta {
            header: code.to_string(),
            coefficient: code.to_string(),
            description: String::new(),
            dimensions: vec![values.len() as i32],
        };
        let dict = crate::array::IndexedDict::from_dense(
            vec![],
            vec![values.len()],
            values.into_iter().map(|s| s.to_string()).collect(),
        );
        assert_eq!(ArrayKind::Strings, HeaderArray::C1(meta.clone(), dict.clone()).kind());
        HeaderArray::C1(meta, dict)
    }

    fn i2(code: &str, values: Vec<i32>) -> HeaderArray {
        let meta = HeaderMeta {
            header: code.to_string(),
            coefficient: code.to_string(),
            description: String::new(),
            dimensions: vec![values.len() as i32],
        };
        let dict = crate::array::IndexedDict::from_dense(vec![], vec![values.len()], values);
        HeaderArray::I2(meta, dict)
    }

    #[test]
    fn builds_a_single_variable_descriptor() {
        let headers = vec![
            i2("VCNI", vec![1]),
            c1("VCNM", vec!["QO"]),
            c1("VCL0", vec!["output quantity"]),
            c1("VCLE", vec!["pct"]),
            c1("VCT0", vec!["p"]),
            c1("VCS0", vec!["c"]),
            i2("VCSP", vec![1]),
            i2("VCSN", vec![1]),
            c1("STNM", vec!["COM"]),
            c1("STLB", vec!["commodities"]),
            c1("STTP", vec!["n"]),
            i2("SSZ ", vec![2]),
            c1("STEL", vec!["agr", "mfg"]),
        ];
        let file = HeaderArrayFile::new(headers);
        let descriptors = build_descriptors(&file).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "QO");
        assert_eq!(descriptors[0].change_type, ChangeType::PercentChange);
        assert_eq!(descriptors[0].variable_type, VariableType::Condensed);
        assert!(descriptors[0].is_endogenous());
        assert_eq!(descriptors[0].sets[0].elements, vec![label("agr"), label("mfg")]);
    }

    #[test]
    fn missing_header_is_a_schema_error() {
        let file = HeaderArrayFile::new(vec![]);
        assert!(matches!(build_descriptors(&file), Err(HarError::SchemaError { .. })));
    }
}
