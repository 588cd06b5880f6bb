//! Whole-file HAR reading and writing: threads the typed codecs in
//! [`crate::codec`] together against the in-memory [`HeaderArray`] model.

use std::io::{Read, Write};

use tracing::{debug, instrument};

use crate::array::{ArrayKind, HeaderArray, HeaderMeta, IndexedDict};
use crate::codec::metadata_record::{read_metadata_record, write_metadata_record, RawHeader, Storage};
use crate::codec::numeric::{read_dense, read_sparse, write_dense, write_sparse};
use crate::codec::sets_codec::{read_set, write_set, SetDictionary};
use crate::codec::strings::{read_strings, write_strings};
use crate::error::{HarError, Result};
use crate::label::{KeySequence, Label};
use crate::sets::SetDef;

/// Element width used for `1C` string payloads. The metadata record carries
/// no explicit field-width slot (§4.B), so every `1C` array in a file is
/// encoded at this one width — wide enough to hold the longest string field
/// the schema defines (an SL4 `VCL0` variable description, ≤70 chars);
/// shorter values (set names, single-char `VCT0`/`VCS0` codes) just pad out
/// further.
pub const DEFAULT_STRING_WIDTH: usize = 70;

/// Default materialised-density threshold below which an `RE` array is
/// written as `SPSE` rather than `FULL` (§4.D, §9 open question 3: both
/// encodings are valid for identical logical content, so a fixed constant
/// is needed for deterministic output across runs). Callers building an
/// `IndexedDict` from raw entries can consult this — or their own
/// threshold — before choosing the `sparse` flag passed to
/// [`IndexedDict::new`]; the writer itself always honours whatever flag it
/// finds, it does not recompute density at write time.
pub const DEFAULT_SPARSE_DENSITY_THRESHOLD: f64 = 0.60;

/// Whether `count` materialised entries out of `total` logical entries
/// falls below [`DEFAULT_SPARSE_DENSITY_THRESHOLD`].
pub fn is_below_sparse_threshold(count: usize, total: usize) -> bool {
    if total == 0 {
        return false;
    }
    (count as f64 / total as f64) < DEFAULT_SPARSE_DENSITY_THRESHOLD
}

/// A complete, order-preserving collection of header arrays, as read from
/// or written to one `.har` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderArrayFile {
    pub headers: Vec<HeaderArray>,
}

impl HeaderArrayFile {
    pub fn new(headers: Vec<HeaderArray>) -> HeaderArrayFile {
        HeaderArrayFile { headers }
    }

    pub fn read<R: Read>(reader: R) -> Result<HeaderArrayFile> {
        let headers = HarReader::new(reader).collect::<Result<Vec<_>>>()?;
        Ok(HeaderArrayFile { headers })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_har(writer, &self.headers)
    }

    pub fn get(&self, header_code: &str) -> Option<&HeaderArray> {
        self.headers.iter().find(|h| h.header_code() == header_code)
    }
}

/// A streaming reader: decodes one [`HeaderArray`] at a time without
/// buffering the whole file.
pub struct HarReader<R: Read> {
    reader: R,
    set_dict: SetDictionary,
}

impl<R: Read> HarReader<R> {
    pub fn new(reader: R) -> HarReader<R> {
        HarReader {
            reader,
            set_dict: SetDictionary::new(),
        }
    }

    #[instrument(skip(self), fields(tag = %raw.tag))]
    fn decode_body(&mut self, raw: RawHeader) -> Result<HeaderArray> {
        raw_header_into_array(raw, &mut self.reader, &mut self.set_dict)
    }
}

impl<R: Read> Iterator for HarReader<R> {
    type Item = Result<HeaderArray>;

    fn next(&mut self) -> Option<Result<HeaderArray>> {
        match read_metadata_record(&mut self.reader) {
            Ok(None) => None,
            Ok(Some(raw)) => Some(self.decode_body(raw)),
            Err(err) => Some(Err(err)),
        }
    }
}

fn dims_to_usize(header: &str, dims: &[i32]) -> Result<Vec<usize>> {
    dims.iter()
        .map(|&d| {
            usize::try_from(d).map_err(|_| HarError::MalformedRecord {
                header: header.to_string(),
                reason: format!("negative dimension {d}"),
            })
        })
        .collect()
}

/// Maps a 1-based flat row-major index back to a [`KeySequence`], using
/// `sets`' labels where present, else synthetic `1..=dim` labels. Bounds are
/// validated against `dims` rather than trusted: a sparse record's index is
/// attacker/corruption-controlled input, and an out-of-range index must
/// surface `MalformedRecord` (§7) rather than panic on an out-of-bounds
/// slice index.
fn key_at(header: &str, sets: &[SetDef], dims: &[usize], flat_index_1based: usize) -> Result<KeySequence> {
    let total: usize = if dims.is_empty() { 0 } else { dims.iter().product() };
    if flat_index_1based == 0 || flat_index_1based > total {
        return Err(HarError::MalformedRecord {
            header: header.to_string(),
            reason: format!("sparse index {flat_index_1based} out of range for array of {total} elements"),
        });
    }

    let strides = crate::codec::numeric::row_major_strides(dims);
    let mut remaining = flat_index_1based - 1;
    let mut labels = Vec::with_capacity(dims.len());
    for (axis, &stride) in strides.iter().enumerate() {
        let idx = remaining / stride;
        remaining %= stride;
        let label = if let Some(set) = sets.get(axis) {
            set.elements.get(idx).cloned().ok_or_else(|| HarError::MalformedRecord {
                header: header.to_string(),
                reason: format!("sparse index {flat_index_1based} decodes to out-of-range element {idx} on axis {axis}"),
            })?
        } else {
            Label::from((idx + 1).to_string().as_str())
        };
        labels.push(label);
    }
    Ok(KeySequence::new(labels))
}

fn raw_header_into_array(raw: RawHeader, reader: &mut impl Read, dict: &mut SetDictionary) -> Result<HeaderArray> {
    let dims = dims_to_usize(&raw.tag, &raw.dims)?;
    let meta = HeaderMeta {
        header: raw.tag.clone(),
        coefficient: raw.tag.clone(),
        description: raw.description.clone(),
        dimensions: raw.dims.clone(),
    };
    meta.validate()?;

    match raw.kind {
        ArrayKind::Strings => {
            // Empty-product convention would read `1` for a rank-0 marker header;
            // the zero-dimension corner case (§4.B) carries zero elements instead.
            let total: usize = if dims.is_empty() { 0 } else { dims.iter().product() };
            let values = read_strings(reader, total, DEFAULT_STRING_WIDTH)?;
            Ok(HeaderArray::C1(meta, IndexedDict::from_dense(vec![], dims, values)))
        }
        ArrayKind::Reals => {
            let mut sets = Vec::with_capacity(dims.len());
            for _ in 0..dims.len() {
                sets.push(read_set(reader, dict)?);
            }
            let storage = raw.storage.unwrap_or(Storage::Full);
            let values = match storage {
                Storage::Full => {
                    let values: Vec<f32> = read_dense(reader, &dims)?;
                    IndexedDict::from_dense(sets, dims, values)
                }
                Storage::Sparse => {
                    let entries = read_sparse(reader)?;
                    let pairs = entries
                        .into_iter()
                        .map(|(flat_index, value)| key_at(&raw.tag, &sets, &dims, flat_index).map(|key| (key, value)))
                        .collect::<Result<Vec<_>>>()?;
                    IndexedDict::new(sets, dims, pairs, true)
                }
            };
            debug!(header = %raw.tag, entries = values.count(), "decoded RE array");
            Ok(HeaderArray::Re(meta, values))
        }
        // §4.B: `RL` is "the reals type with no set labels" — unlike `RE`, no
        // set records precede its values, and no storage subcode is ever
        // written for it (`metadata_record` only reads one for `ArrayKind::Reals`),
        // so it is always dense.
        ArrayKind::RealsLegacy => {
            let values: Vec<f32> = read_dense(reader, &dims)?;
            let dict = IndexedDict::from_dense(vec![], dims, values);
            debug!(header = %raw.tag, entries = dict.count(), "decoded RL array");
            Ok(HeaderArray::Re(meta, dict))
        }
        ArrayKind::Reals2D => {
            let values: Vec<f32> = read_dense(reader, &dims)?;
            Ok(HeaderArray::R2(meta, IndexedDict::from_dense(vec![], dims, values)))
        }
        ArrayKind::Ints2D => {
            let values: Vec<i32> = read_dense(reader, &dims)?;
            Ok(HeaderArray::I2(meta, IndexedDict::from_dense(vec![], dims, values)))
        }
    }
}

/// Writes every header in `headers`, in order, to `writer`.
#[instrument(skip(writer, headers), fields(count = headers.len()))]
pub fn write_har<W: Write>(writer: &mut W, headers: &[HeaderArray]) -> Result<()> {
    let mut dict = SetDictionary::new();
    for header in headers {
        header.meta().validate()?;
        write_one(writer, header, &mut dict)?;
    }
    Ok(())
}

fn write_one<W: Write>(writer: &mut W, header: &HeaderArray, dict: &mut SetDictionary) -> Result<()> {
    match header {
        HeaderArray::C1(meta, values) => {
            write_metadata_record(
                writer,
                &RawHeader {
                    tag: meta.header.clone(),
                    kind: ArrayKind::Strings,
                    storage: None,
                    description: meta.description.clone(),
                    dims: meta.dimensions.clone(),
                },
            )?;
            let flat: Vec<String> = values.logical_enumerate().into_iter().map(|(_, v)| v).collect();
            write_strings(writer, &flat, DEFAULT_STRING_WIDTH)
        }
        HeaderArray::Re(meta, values) => {
            // A dict with no sets at all (built from a rank-`n` `RL` read, or
            // constructed directly that way) has nothing to write as `RE`'s
            // per-axis set records, and `RE` always expects exactly
            // `dims.len()` of them on read. Writing it back as `RL` keeps
            // the wire format self-consistent instead of producing a
            // metadata record whose dims promise sets the payload doesn't
            // carry (§4.B).
            if values.sets().is_empty() && !values.dims().is_empty() {
                write_metadata_record(
                    writer,
                    &RawHeader {
                        tag: meta.header.clone(),
                        kind: ArrayKind::RealsLegacy,
                        storage: None,
                        description: meta.description.clone(),
                        dims: meta.dimensions.clone(),
                    },
                )?;
                let flat: Vec<f32> = values.logical_enumerate().into_iter().map(|(_, v)| v).collect();
                return write_dense(writer, values.dims(), &flat);
            }

            let storage = if values.is_sparse() { Storage::Sparse } else { Storage::Full };
            write_metadata_record(
                writer,
                &RawHeader {
                    tag: meta.header.clone(),
                    kind: ArrayKind::Reals,
                    storage: Some(storage),
                    description: meta.description.clone(),
                    dims: meta.dimensions.clone(),
                },
            )?;
            for set in values.sets() {
                write_set(writer, set, dict)?;
            }
            match storage {
                Storage::Full => {
                    let flat: Vec<f32> = values.logical_enumerate().into_iter().map(|(_, v)| v).collect();
                    write_dense(writer, values.dims(), &flat)
                }
                Storage::Sparse => {
                    let strides = crate::codec::numeric::row_major_strides(values.dims());
                    let sets = values.sets();
                    let mut entries: Vec<(usize, f32)> = values
                        .materialised_entries()
                        .iter()
                        .map(|(key, value)| {
                            let mut flat = 0usize;
                            for (axis, label) in key.labels().iter().enumerate() {
                                let idx = if let Some(set) = sets.get(axis) {
                                    set.elements.iter().position(|e| e == label).ok_or_else(|| HarError::MalformedRecord {
                                        header: meta.header.clone(),
                                        reason: format!("key label {label:?} is not a member of axis {axis}'s set"),
                                    })?
                                } else {
                                    label.as_str().parse::<usize>().ok().and_then(|n| n.checked_sub(1)).ok_or_else(|| {
                                        HarError::MalformedRecord {
                                            header: meta.header.clone(),
                                            reason: format!("synthetic axis {axis} label {label:?} is not a positive integer"),
                                        }
                                    })?
                                };
                                flat += idx * strides[axis];
                            }
                            Ok((flat + 1, *value))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    entries.sort_by_key(|(idx, _)| *idx);
                    write_sparse(writer, &entries)
                }
            }
        }
        HeaderArray::R2(meta, values) => {
            write_metadata_record(
                writer,
                &RawHeader {
                    tag: meta.header.clone(),
                    kind: ArrayKind::Reals2D,
                    storage: None,
                    description: meta.description.clone(),
                    dims: meta.dimensions.clone(),
                },
            )?;
            let flat: Vec<f32> = values.logical_enumerate().into_iter().map(|(_, v)| v).collect();
            write_dense(writer, values.dims(), &flat)
        }
        HeaderArray::I2(meta, values) => {
            write_metadata_record(
                writer,
                &RawHeader {
                    tag: meta.header.clone(),
                    kind: ArrayKind::Ints2D,
                    storage: None,
                    description: meta.description.clone(),
                    dims: meta.dimensions.clone(),
                },
            )?;
            let flat: Vec<i32> = values.logical_enumerate().into_iter().map(|(_, v)| v).collect();
            write_dense(writer, values.dims(), &flat)
        }
    }
}
