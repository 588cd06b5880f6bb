//! The per-header metadata record: tag, type code, (for `RE`) storage
//! subcode, description, rank and dimensions (§4.B).

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::array::ArrayKind;
use crate::error::{HarError, Result};
use crate::framer;

const TAG_WIDTH: usize = 4;
const TYPE_WIDTH: usize = 4;
const STORAGE_WIDTH: usize = 4;
const DESCRIPTION_WIDTH: usize = 70;

/// `RE` arrays alone carry a storage subcode distinguishing a fully
/// materialised payload from a sparse index/value list (§4.B, §9 open
/// question 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Full,
    Sparse,
}

impl Storage {
    fn code(self) -> &'static str {
        match self {
            Storage::Full => "FULL",
            Storage::Sparse => "SPSE",
        }
    }

    fn from_code(code: &str) -> Result<Storage> {
        match code.trim_end() {
            "FULL" => Ok(Storage::Full),
            "SPSE" => Ok(Storage::Sparse),
            other => Err(HarError::MalformedRecord {
                header: String::new(),
                reason: format!("unrecognised RE storage subcode {other:?}"),
            }),
        }
    }
}

/// The decoded contents of one header's metadata record.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHeader {
    pub tag: String,
    pub kind: ArrayKind,
    pub storage: Option<Storage>,
    pub description: String,
    pub dims: Vec<i32>,
}

/// Reads the next header's metadata record, or `None` at clean end of file.
pub fn read_metadata_record<R: Read>(reader: &mut R) -> Result<Option<RawHeader>> {
    let payload = match framer::read_record(reader)? {
        Some(payload) => payload,
        None => return Ok(None),
    };
    let mut cursor = Cursor::new(payload);

    let mut tag_bytes = [0u8; TAG_WIDTH];
    cursor.read_exact(&mut tag_bytes)?;
    let tag = framer::read_fixed_ascii(&tag_bytes);

    let mut type_bytes = [0u8; TYPE_WIDTH];
    cursor.read_exact(&mut type_bytes)?;
    let type_code = framer::read_fixed_ascii(&type_bytes);
    let kind = ArrayKind::from_code(&type_code).ok_or_else(|| HarError::UnknownType {
        header: tag.clone(),
        code: type_bytes,
    })?;

    let storage = if matches!(kind, ArrayKind::Reals) {
        let mut storage_bytes = [0u8; STORAGE_WIDTH];
        cursor.read_exact(&mut storage_bytes)?;
        Some(Storage::from_code(&framer::read_fixed_ascii(&storage_bytes))?)
    } else {
        None
    };

    let mut description_bytes = vec![0u8; DESCRIPTION_WIDTH];
    cursor.read_exact(&mut description_bytes)?;
    let description = framer::read_fixed_ascii(&description_bytes);

    let rank = cursor.read_i32::<LittleEndian>()? as usize;
    let mut dims = Vec::with_capacity(rank);
    for _ in 0..rank {
        dims.push(cursor.read_i32::<LittleEndian>()?);
    }

    Ok(Some(RawHeader {
        tag,
        kind,
        storage,
        description,
        dims,
    }))
}

pub fn write_metadata_record<W: Write>(writer: &mut W, header: &RawHeader) -> Result<()> {
    let mut payload = Vec::new();
    payload.extend(framer::pad_ascii(&header.tag, TAG_WIDTH));
    payload.extend(framer::pad_ascii(header.kind.code(), TYPE_WIDTH));

    if matches!(header.kind, ArrayKind::Reals) {
        let storage = header.storage.unwrap_or(Storage::Full);
        payload.extend(framer::pad_ascii(storage.code(), STORAGE_WIDTH));
    }

    payload.extend(framer::pad_ascii(&header.description, DESCRIPTION_WIDTH));
    payload.write_i32::<LittleEndian>(header.dims.len() as i32)?;
    for &dim in &header.dims {
        payload.write_i32::<LittleEndian>(dim)?;
    }

    framer::write_record(writer, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_a_real_header() {
        let header = RawHeader {
            tag: "COEF".to_string(),
            kind: ArrayKind::Reals,
            storage: Some(Storage::Sparse),
            description: "cost shares".to_string(),
            dims: vec![2, 2],
        };
        let mut buf = Vec::new();
        write_metadata_record(&mut buf, &header).unwrap();

        let mut cursor = Cursor::new(buf);
        let read_back = read_metadata_record(&mut cursor).unwrap().unwrap();
        assert_eq!(read_back, header);
    }

    #[test]
    fn round_trips_a_string_header_without_storage_field() {
        let header = RawHeader {
            tag: "SETN".to_string(),
            kind: ArrayKind::Strings,
            storage: None,
            description: "set names".to_string(),
            dims: vec![3],
        };
        let mut buf = Vec::new();
        write_metadata_record(&mut buf, &header).unwrap();

        let mut cursor = Cursor::new(buf);
        let read_back = read_metadata_record(&mut cursor).unwrap().unwrap();
        assert_eq!(read_back, header);
    }

    #[test]
    fn returns_none_at_clean_eof() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(read_metadata_record(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn rejects_unknown_type_code() {
        let mut payload = Vec::new();
        payload.extend(framer::pad_ascii("XXXX", TAG_WIDTH));
        payload.extend(framer::pad_ascii("ZZ", TYPE_WIDTH));
        payload.extend(framer::pad_ascii("", DESCRIPTION_WIDTH));
        payload.write_i32::<LittleEndian>(0).unwrap();

        let mut buf = Vec::new();
        framer::write_record(&mut buf, &payload).unwrap();
        let mut cursor = Cursor::new(buf);
        assert!(matches!(
            read_metadata_record(&mut cursor),
            Err(HarError::UnknownType { .. })
        ));
    }
}
