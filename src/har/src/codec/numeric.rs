//! Dense and sparse numeric payload codecs (§4.B numeric partitioning rule).
//!
//! The Fortran origin of the format restricts any single numeric record to
//! at most [`MAX_PARTITION_ELEMENTS`] values; writers split larger payloads
//! into contiguous hyper-rectangular partitions and readers reassemble them
//! regardless of how a particular writer chose to split (§4.D, §8 partition
//! law).

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{HarError, Result};
use crate::framer;

/// The Fortran single-record element cap (§4.B).
pub const MAX_PARTITION_ELEMENTS: usize = 1_999_991;

/// Maximum axis slots encoded per partition record (§4.B: "7 possible axis
/// slots").
const AXIS_SLOTS: usize = 7;

/// A 32-bit numeric element the dense/sparse codecs can move to and from
/// little-endian bytes. Implemented for the two numeric payload types the
/// format carries (`RE`/`2R` reals, `2I` integers).
pub trait NumericElement: Copy + Default {
    fn read_le<R: Read>(reader: &mut R) -> Result<Self>;
    fn write_le<W: Write>(&self, writer: &mut W) -> Result<()>;
}

impl NumericElement for f32 {
    fn read_le<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_f32::<LittleEndian>()?)
    }
    fn write_le<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_f32::<LittleEndian>(*self)?;
        Ok(())
    }
}

impl NumericElement for i32 {
    fn read_le<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_i32::<LittleEndian>()?)
    }
    fn write_le<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_i32::<LittleEndian>(*self)?;
        Ok(())
    }
}

/// One partition's inclusive axis ranges (1-based, padded to 7 slots) and
/// its countdown vector index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub lower: [i32; AXIS_SLOTS],
    pub upper: [i32; AXIS_SLOTS],
    pub k: i32,
}

/// Logical element count of `dims`. A rank-0 (empty) axis list is the §4.B
/// zero-dimension marker case and carries zero elements, not the `1`
/// `Iterator::product` would give as the empty product's identity.
fn total_elements(dims: &[usize]) -> usize {
    if dims.is_empty() {
        0
    } else {
        dims.iter().product()
    }
}

pub fn row_major_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }
    strides
}

/// Picks the partition unit size: the largest contiguous, row-major-aligned
/// block (a suffix product of `dims`) that does not exceed the element
/// limit. Falls back to `1` if even the single fastest-varying axis
/// overflows the limit (§4.D writer rule).
fn partition_unit_size(dims: &[usize]) -> usize {
    let mut size = 1usize;
    for &d in dims.iter().rev() {
        let candidate = size * d;
        if candidate > MAX_PARTITION_ELEMENTS {
            break;
        }
        size = candidate;
    }
    size
}

/// Builds the writer's partition plan for `dims` (§4.D). Each partition
/// covers one fixed combination of the leading axes with the trailing axes
/// (whose suffix product is the partition unit) spanned in full.
pub fn compute_partition_plan(dims: &[usize]) -> Vec<Partition> {
    let total: usize = total_elements(dims);
    if total == 0 {
        return vec![];
    }

    let unit = partition_unit_size(dims);
    let trailing_axes = {
        let mut count = 0;
        let mut product = 1usize;
        for &d in dims.iter().rev() {
            if product * d > unit && product >= unit {
                break;
            }
            if product == unit {
                break;
            }
            product *= d;
            count += 1;
            if product == unit {
                break;
            }
        }
        count
    };
    let leading_axes = dims.len() - trailing_axes;
    let leading_dims = &dims[..leading_axes];
    let num_partitions = total / unit;

    let mut plan = Vec::with_capacity(num_partitions);
    let leading_strides = row_major_strides(leading_dims);
    for block in 0..num_partitions {
        let mut lower = [1i32; AXIS_SLOTS];
        let mut upper = [1i32; AXIS_SLOTS];
        let mut rem = block;
        for (axis, &stride) in leading_strides.iter().enumerate() {
            let idx = rem / stride;
            rem %= stride;
            lower[axis] = (idx + 1) as i32;
            upper[axis] = (idx + 1) as i32;
        }
        for axis in leading_axes..dims.len() {
            lower[axis] = 1;
            upper[axis] = dims[axis] as i32;
        }
        plan.push(Partition {
            lower,
            upper,
            k: (num_partitions - block) as i32,
        });
    }
    plan
}

/// Writes `values` (already in full row-major order over `dims`) as a
/// sequence of partition records.
pub fn write_dense<T: NumericElement, W: Write>(writer: &mut W, dims: &[usize], values: &[T]) -> Result<()> {
    let total: usize = total_elements(dims);
    if total == 0 {
        return Ok(());
    }
    let strides = row_major_strides(dims);
    let plan = compute_partition_plan(dims);

    for partition in &plan {
        let mut payload = Vec::new();
        for axis in 0..AXIS_SLOTS {
            payload.write_i32::<LittleEndian>(partition.lower[axis])?;
            payload.write_i32::<LittleEndian>(partition.upper[axis])?;
        }
        payload.write_i32::<LittleEndian>(partition.k)?;

        let counts: Vec<usize> = (0..dims.len())
            .map(|axis| (partition.upper[axis] - partition.lower[axis] + 1) as usize)
            .collect();
        let block_total: usize = counts.iter().product();
        let local_strides = row_major_strides(&counts);

        for local_idx in 0..block_total {
            let mut rem = local_idx;
            let mut flat = 0usize;
            for axis in 0..dims.len() {
                let offset = rem / local_strides[axis];
                rem %= local_strides[axis];
                let global_idx = (partition.lower[axis] - 1) as usize + offset;
                flat += global_idx * strides[axis];
            }
            values[flat].write_le(&mut payload)?;
        }

        framer::write_record(writer, &payload)?;
    }
    Ok(())
}

/// Reassembles a dense numeric array of `dims` by reading partition records
/// until every element has been filled. Tolerates any valid partitioning,
/// not only the one `write_dense` would have produced (§4.D).
pub fn read_dense<T: NumericElement, R: Read>(reader: &mut R, dims: &[usize]) -> Result<Vec<T>> {
    let total: usize = total_elements(dims);
    let mut values = vec![T::default(); total];
    if total == 0 {
        return Ok(values);
    }
    let strides = row_major_strides(dims);
    let mut filled = 0usize;

    while filled < total {
        let payload = framer::read_record(reader)?.ok_or(HarError::UnexpectedEof {
            context: "numeric partition record",
            needed: 1,
        })?;
        let mut cursor = Cursor::new(payload);

        let mut lower = [0i32; AXIS_SLOTS];
        let mut upper = [0i32; AXIS_SLOTS];
        for axis in 0..AXIS_SLOTS {
            lower[axis] = cursor.read_i32::<LittleEndian>()?;
            upper[axis] = cursor.read_i32::<LittleEndian>()?;
        }
        let _k = cursor.read_i32::<LittleEndian>()?;

        // Validate each axis range against `dims` before deriving counts: an
        // out-of-order or out-of-bounds range would otherwise underflow the
        // `usize` subtraction below or index `values` out of bounds (§7
        // "sparse index out of range" applies equally to partition ranges).
        let mut counts = Vec::with_capacity(dims.len());
        for axis in 0..dims.len() {
            let (lo, hi) = (lower[axis], upper[axis]);
            if lo < 1 || hi < lo || hi as usize > dims[axis] {
                return Err(HarError::MalformedRecord {
                    header: String::new(),
                    reason: format!(
                        "partition axis {axis} range [{lo}, {hi}] out of bounds for dimension size {}",
                        dims[axis]
                    ),
                });
            }
            counts.push((hi - lo + 1) as usize);
        }
        let block_total: usize = counts.iter().product();
        let local_strides = row_major_strides(&counts);

        for local_idx in 0..block_total {
            let mut rem = local_idx;
            let mut flat = 0usize;
            for axis in 0..dims.len() {
                let offset = rem / local_strides[axis];
                rem %= local_strides[axis];
                let global_idx = (lower[axis] - 1) as usize + offset;
                flat += global_idx * strides[axis];
            }
            let slot = values.get_mut(flat).ok_or_else(|| HarError::MalformedRecord {
                header: String::new(),
                reason: format!("partition record addresses out-of-range flat index {flat} (array has {total} elements)"),
            })?;
            *slot = T::read_le(&mut cursor)?;
        }
        filled += block_total;
    }
    Ok(values)
}

/// Writes a sparse `(1-based flat index, value)` list: a leading count
/// record, then chunk records of at most [`MAX_PARTITION_ELEMENTS`] pairs.
pub fn write_sparse<W: Write>(writer: &mut W, entries: &[(usize, f32)]) -> Result<()> {
    let mut header = Vec::new();
    header.write_i32::<LittleEndian>(entries.len() as i32)?;
    framer::write_record(writer, &header)?;

    for chunk in entries.chunks(MAX_PARTITION_ELEMENTS) {
        let mut payload = Vec::new();
        payload.write_i32::<LittleEndian>(chunk.len() as i32)?;
        for (index, value) in chunk {
            payload.write_i32::<LittleEndian>(*index as i32)?;
            payload.write_f32::<LittleEndian>(*value)?;
        }
        framer::write_record(writer, &payload)?;
    }
    Ok(())
}

pub fn read_sparse<R: Read>(reader: &mut R) -> Result<Vec<(usize, f32)>> {
    let header_payload = framer::read_record(reader)?.ok_or(HarError::UnexpectedEof {
        context: "sparse entry count record",
        needed: 4,
    })?;
    let total = Cursor::new(header_payload).read_i32::<LittleEndian>()? as usize;

    let mut entries = Vec::with_capacity(total);
    while entries.len() < total {
        let payload = framer::read_record(reader)?.ok_or(HarError::UnexpectedEof {
            context: "sparse entry chunk record",
            needed: 1,
        })?;
        let mut cursor = Cursor::new(payload);
        let n = cursor.read_i32::<LittleEndian>()? as usize;
        for _ in 0..n {
            let index = cursor.read_i32::<LittleEndian>()? as usize;
            let value = cursor.read_f32::<LittleEndian>()?;
            entries.push((index, value));
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_round_trip_small() {
        let dims = vec![2, 3];
        let values: Vec<f32> = (0..6).map(|i| i as f32).collect();
        let mut buf = Vec::new();
        write_dense(&mut buf, &dims, &values).unwrap();

        let mut cursor = Cursor::new(buf);
        let read_back: Vec<f32> = read_dense(&mut cursor, &dims).unwrap();
        assert_eq!(read_back, values);
    }

    #[test]
    fn dense_round_trip_forces_multiple_partitions() {
        // 3 * 1_000_000 exceeds the per-record limit, forcing at least 2 partitions.
        let dims = vec![3usize, 1_000_000];
        let values: Vec<f32> = (0..dims.iter().product()).map(|i| (i % 97) as f32).collect();

        let plan = compute_partition_plan(&dims);
        assert!(plan.len() >= 3, "expected one partition per leading index, got {}", plan.len());
        assert_eq!(plan.last().unwrap().k, 1);

        let mut buf = Vec::new();
        write_dense(&mut buf, &dims, &values).unwrap();
        let mut cursor = Cursor::new(buf);
        let read_back: Vec<f32> = read_dense(&mut cursor, &dims).unwrap();
        assert_eq!(read_back, values);
    }

    #[test]
    fn partition_plan_covers_product_exactly_once() {
        let dims = vec![4usize, 5, 6];
        let plan = compute_partition_plan(&dims);
        let strides = row_major_strides(&dims);
        let total: usize = dims.iter().product();
        let mut covered = vec![false; total];

        for partition in &plan {
            let counts: Vec<usize> = (0..dims.len())
                .map(|axis| (partition.upper[axis] - partition.lower[axis] + 1) as usize)
                .collect();
            let block_total: usize = counts.iter().product();
            let local_strides = row_major_strides(&counts);
            for local_idx in 0..block_total {
                let mut rem = local_idx;
                let mut flat = 0usize;
                for axis in 0..dims.len() {
                    let offset = rem / local_strides[axis];
                    rem %= local_strides[axis];
                    let global_idx = (partition.lower[axis] - 1) as usize + offset;
                    flat += global_idx * strides[axis];
                }
                assert!(!covered[flat], "index {flat} covered twice");
                covered[flat] = true;
            }
        }
        assert!(covered.into_iter().all(|c| c), "not every index covered");
    }

    #[test]
    fn sparse_round_trip() {
        let entries = vec![(1usize, 1.5f32), (4usize, -2.25f32)];
        let mut buf = Vec::new();
        write_sparse(&mut buf, &entries).unwrap();
        let mut cursor = Cursor::new(buf);
        let read_back = read_sparse(&mut cursor).unwrap();
        assert_eq!(read_back, entries);
    }

    fn write_raw_partition(buf: &mut Vec<u8>, lower: [i32; AXIS_SLOTS], upper: [i32; AXIS_SLOTS], k: i32, values: &[f32]) {
        let mut payload = Vec::new();
        for axis in 0..AXIS_SLOTS {
            payload.write_i32::<LittleEndian>(lower[axis]).unwrap();
            payload.write_i32::<LittleEndian>(upper[axis]).unwrap();
        }
        payload.write_i32::<LittleEndian>(k).unwrap();
        for value in values {
            payload.write_f32::<LittleEndian>(*value).unwrap();
        }
        framer::write_record(buf, &payload).unwrap();
    }

    #[test]
    fn read_dense_rejects_partition_range_exceeding_dimension() {
        let dims = vec![2usize];
        let mut buf = Vec::new();
        // upper=5 exceeds the declared dimension size of 2.
        write_raw_partition(&mut buf, [1, 1, 1, 1, 1, 1, 1], [5, 1, 1, 1, 1, 1, 1], 1, &[1.0, 2.0]);
        let mut cursor = Cursor::new(buf);
        let result: Result<Vec<f32>> = read_dense(&mut cursor, &dims);
        assert!(matches!(result, Err(HarError::MalformedRecord { .. })));
    }

    #[test]
    fn read_dense_rejects_inverted_partition_range() {
        let dims = vec![3usize];
        let mut buf = Vec::new();
        // upper < lower would otherwise underflow the count computation.
        write_raw_partition(&mut buf, [2, 1, 1, 1, 1, 1, 1], [1, 1, 1, 1, 1, 1, 1], 1, &[]);
        let mut cursor = Cursor::new(buf);
        let result: Result<Vec<f32>> = read_dense(&mut cursor, &dims);
        assert!(matches!(result, Err(HarError::MalformedRecord { .. })));
    }
}
