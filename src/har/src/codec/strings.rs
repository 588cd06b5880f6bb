//! Fixed-width ASCII string payload codec, used by `1C` header arrays and by
//! any other field that is conventionally a short fixed-width string (set
//! element labels reuse the same routine via [`crate::framer`] directly).

use std::io::{Read, Write};

use crate::error::{HarError, Result};
use crate::framer;

use super::numeric::MAX_PARTITION_ELEMENTS;

/// Writes `values` as fixed-`width` ASCII fields, chunked across records at
/// the same per-record element cap the numeric codec uses.
pub fn write_strings<W: Write>(writer: &mut W, values: &[String], width: usize) -> Result<()> {
    for chunk in values.chunks(MAX_PARTITION_ELEMENTS) {
        let mut payload = Vec::with_capacity(chunk.len() * width);
        for value in chunk {
            payload.extend(framer::pad_ascii(value, width));
        }
        framer::write_record(writer, &payload)?;
    }
    Ok(())
}

/// Reads exactly `count` fixed-`width` ASCII strings, spanning as many
/// records as the writer split them across.
pub fn read_strings<R: Read>(reader: &mut R, count: usize, width: usize) -> Result<Vec<String>> {
    let mut values = Vec::with_capacity(count);
    while values.len() < count {
        let payload = framer::read_record(reader)?.ok_or(HarError::UnexpectedEof {
            context: "string record",
            needed: width,
        })?;
        if width == 0 || payload.len() % width != 0 {
            return Err(HarError::MalformedRecord {
                header: String::new(),
                reason: format!("string record length {} is not a multiple of field width {}", payload.len(), width),
            });
        }
        for chunk in payload.chunks(width) {
            values.push(framer::read_fixed_ascii(chunk));
        }
    }
    values.truncate(count);
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_strings() {
        let values = vec!["agriculture".to_string(), "mfg".to_string(), "svcs".to_string()];
        let mut buf = Vec::new();
        write_strings(&mut buf, &values, 12).unwrap();

        let mut cursor = Cursor::new(buf);
        let read_back = read_strings(&mut cursor, values.len(), 12).unwrap();
        assert_eq!(read_back, vec!["agriculture", "mfg", "svcs"]);
    }

    #[test]
    fn truncates_overlong_values() {
        let values = vec!["this-label-is-too-long-for-the-field".to_string()];
        let mut buf = Vec::new();
        write_strings(&mut buf, &values, 12).unwrap();

        let mut cursor = Cursor::new(buf);
        let read_back = read_strings(&mut cursor, 1, 12).unwrap();
        assert_eq!(read_back[0], "this-label-i");
    }
}
