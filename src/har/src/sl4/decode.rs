//! SL4 schema Pass 2: dense endogenous array reconstruction (§4.E).

use tracing::instrument;

use crate::array::{HeaderArray, HeaderMeta, IndexedDict};
use crate::error::{HarError, Result};
use crate::file::HeaderArrayFile;
use crate::label::Label;
use crate::sets::SetDef;

use super::descriptor::{build_descriptors, VariableDescriptor};

fn i2(file: &HeaderArrayFile, code: &str) -> Result<Vec<i32>> {
    match file.get(code) {
        Some(HeaderArray::I2(_, dict)) => Ok(dict.logical_enumerate().into_iter().map(|(_, v)| v).collect()),
        Some(other) => Err(HarError::SchemaError {
            reason: format!("{code}: expected 2I array, found {:?}", other.kind()),
        }),
        None => Err(HarError::SchemaError {
            reason: format!("missing mandatory SL4 header {code:?}"),
        }),
    }
}

fn r2(file: &HeaderArrayFile, code: &str) -> Result<Vec<f32>> {
    match file.get(code) {
        Some(HeaderArray::R2(_, dict)) => Ok(dict.logical_enumerate().into_iter().map(|(_, v)| v).collect()),
        Some(other) => Err(HarError::SchemaError {
            reason: format!("{code}: expected 2R array, found {:?}", other.kind()),
        }),
        None => Err(HarError::SchemaError {
            reason: format!("missing mandatory SL4 header {code:?}"),
        }),
    }
}

fn at(values: &[i32], header: &str, index: usize) -> Result<usize> {
    let value = *values.get(index).ok_or_else(|| HarError::IntegrityError {
        header: header.to_string(),
        index,
        reason: "index out of range".to_string(),
    })?;
    usize::try_from(value).map_err(|_| HarError::IntegrityError {
        header: header.to_string(),
        index,
        reason: format!("negative value {value}"),
    })
}

/// Pads a variable's sets (and the parallel dimension list) to the legacy
/// 7-slot GEMPACK axis cap, so `Dimensions[i] == |Sets[i]|` continues to
/// hold over the padded entries (§4.E step 5, §3 invariant 2).
fn pad_to_seven(sets: Vec<SetDef>) -> (Vec<SetDef>, Vec<i32>) {
    let mut sets = sets;
    let mut dims: Vec<i32> = sets.iter().map(|s| s.len() as i32).collect();
    while sets.len() < 7 {
        sets.push(SetDef::new(String::new(), vec![Label::new("1").expect("ascii")]));
        dims.push(1);
    }
    sets.truncate(7);
    dims.truncate(7);
    (sets, dims)
}

/// Reconstructs the dense `RE` array for every endogenous variable (§4.E
/// Pass 2). Variables with `VariableType` Ommitted/Substituted are skipped.
#[instrument(skip(file))]
pub fn decode_solution(file: &HeaderArrayFile) -> Result<Vec<HeaderArray>> {
    let descriptors = build_descriptors(file)?;
    reconstruct(file, &descriptors)
}

fn reconstruct(file: &HeaderArrayFile, descriptors: &[VariableDescriptor]) -> Result<Vec<HeaderArray>> {
    let vncp = i2(file, "VNCP")?;
    let pcum = i2(file, "PCUM")?;
    let cmnd = i2(file, "CMND")?;
    let cums = r2(file, "CUMS")?;
    let orex = i2(file, "OREX")?;
    let orel = i2(file, "OREL")?;
    let shck = i2(file, "SHCK")?;
    let pshk = i2(file, "PSHK")?;
    let shcl = i2(file, "SHCL")?;
    let shoc = r2(file, "SHOC")?;

    let endogenous: Vec<&VariableDescriptor> = descriptors.iter().filter(|d| d.is_endogenous()).collect();

    let mut results = Vec::with_capacity(endogenous.len());
    for (e, descriptor) in endogenous.iter().enumerate() {
        let n: usize = descriptor.sets.iter().map(SetDef::len).product();
        let mut values = vec![0f32; n];

        let ncp = at(&vncp, "VNCP", e)?;
        let pointer = at(&pcum, "PCUM", e)?;
        if pointer != 0 {
            let count = at(&cmnd, "CMND", e)?;
            let start = pointer - 1;
            let source = cums.get(start..start + count).ok_or_else(|| HarError::IntegrityError {
                header: "CUMS".to_string(),
                index: start,
                reason: "condensed value range out of bounds".to_string(),
            })?;
            values[..count].copy_from_slice(source);
        }

        let ex_count = at(&orex, "OREX", e)?;
        if ex_count == ncp {
            values.iter_mut().for_each(|v| *v = 0.0);
        } else {
            let mut base = 0usize;
            for i in 0..e {
                let i_ex = at(&orex, "OREX", i)?;
                let i_ncp = at(&vncp, "VNCP", i)?;
                if i_ex != i_ncp {
                    base += i_ex;
                }
            }
            for k in 0..ex_count {
                let p = at(&orel, "OREL", base + k)?.checked_sub(1).ok_or_else(|| HarError::IntegrityError {
                    header: "OREL".to_string(),
                    index: base + k,
                    reason: "exogenous position must be 1-based".to_string(),
                })?;
                if p >= n {
                    return Err(HarError::IntegrityError {
                        header: "OREL".to_string(),
                        index: base + k,
                        reason: format!("position {p} out of range for array of length {n}"),
                    });
                }
                values.copy_within(p..n - 1, p + 1);
                values[p] = 0.0;
            }
        }

        let shock_count = at(&shck, "SHCK", e)?;
        if shock_count > 0 {
            // Literal source rule: the summation bound is `e-1`, not `e`, unlike the
            // exogenous-expansion base above. Unverified against ground-truth SL4
            // output; see DESIGN.md.
            let bound = e.saturating_sub(1);
            let mut sbase = 0usize;
            for i in 0..bound {
                let i_shck = at(&shck, "SHCK", i)?;
                let i_ncp = at(&vncp, "VNCP", i)?;
                if i_shck != i_ncp {
                    sbase += i_shck;
                }
            }

            let shock_pointer = at(&pshk, "PSHK", e)?;
            for k in 0..shock_count {
                let p = if shock_count == ncp {
                    k
                } else {
                    at(&shcl, "SHCL", sbase + k)?.checked_sub(1).ok_or_else(|| HarError::IntegrityError {
                        header: "SHCL".to_string(),
                        index: sbase + k,
                        reason: "shock position must be 1-based".to_string(),
                    })?
                };
                if p >= n {
                    return Err(HarError::IntegrityError {
                        header: "SHCL".to_string(),
                        index: sbase + k,
                        reason: format!("position {p} out of range for array of length {n}"),
                    });
                }
                let shock_index = shock_pointer - 1 + k;
                let value = *shoc.get(shock_index).ok_or_else(|| HarError::IntegrityError {
                    header: "SHOC".to_string(),
                    index: shock_index,
                    reason: "shock value index out of range".to_string(),
                })?;
                values[p] = value;
            }
        }

        let (padded_sets, padded_dims) = pad_to_seven(descriptor.sets.clone());
        let meta = HeaderMeta {
            header: descriptor.name.clone(),
            coefficient: descriptor.name.clone(),
            description: descriptor.description.clone(),
            dimensions: padded_dims,
        };
        let dict_dims: Vec<usize> = meta.dimensions.iter().map(|&d| d as usize).collect();
        let dict = IndexedDict::from_dense(padded_sets, dict_dims, values);
        results.push(HeaderArray::Re(meta, dict));
    }

    Ok(results)
}
