//! # §4.A Record framer
//!
//! The HAR/SL4 container is a sequence of length-prefixed records:
//!
//! ```text
//! <len:u32 little-endian>  <payload: len bytes>  <len:u32 little-endian>
//! ```
//!
//! This module performs no payload interpretation; it only knows how to
//! peel one record's bytes off a stream, or wrap a payload back into one.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{HarError, Result};

/// Reads one framed record and returns its payload, or `None` at a clean EOF
/// (no bytes available before the length prefix).
pub fn read_record(reader: &mut impl Read) -> Result<Option<Vec<u8>>> {
    let prefix = match reader.read_u32::<LittleEndian>() {
        Ok(value) => value,
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let mut payload = vec![0u8; prefix as usize];
    reader.read_exact(&mut payload).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            HarError::UnexpectedEof {
                context: "record payload",
                needed: prefix as usize,
            }
        } else {
            err.into()
        }
    })?;

    let trailer = reader.read_u32::<LittleEndian>().map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            HarError::UnexpectedEof {
                context: "record trailer",
                needed: 4,
            }
        } else {
            err.into()
        }
    })?;

    if trailer != prefix {
        return Err(HarError::LengthMismatch {
            prefix,
            trailer,
        });
    }

    Ok(Some(payload))
}

/// Writes one framed record. Emits prefix, payload, and trailer as a single
/// logical write; on a buffered writer these land in one flush unit.
pub fn write_record(writer: &mut impl Write, payload: &[u8]) -> Result<()> {
    let len = payload.len() as u32;
    writer.write_u32::<LittleEndian>(len)?;
    writer.write_all(payload)?;
    writer.write_u32::<LittleEndian>(len)?;
    Ok(())
}

/// Space-pads `value` (truncating if necessary) to a fixed-width ASCII field.
pub fn pad_ascii(value: &str, width: usize) -> Vec<u8> {
    let mut bytes = value.as_bytes().to_vec();
    bytes.truncate(width);
    bytes.resize(width, b' ');
    bytes
}

/// Reads a fixed-width ASCII field and trims trailing spaces (§4.A).
pub fn read_fixed_ascii(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_a_record() {
        let mut buf = Vec::new();
        write_record(&mut buf, b"hello").unwrap();

        let mut cursor = Cursor::new(buf);
        let payload = read_record(&mut cursor).unwrap().unwrap();
        assert_eq!(payload, b"hello");
        assert!(read_record(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn detects_length_mismatch() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&5u32.to_le_bytes());
        buf.extend_from_slice(b"hello");
        buf.extend_from_slice(&4u32.to_le_bytes());

        let mut cursor = Cursor::new(buf);
        let err = read_record(&mut cursor).unwrap_err();
        assert!(matches!(err, HarError::LengthMismatch { prefix: 5, trailer: 4 }));
    }

    #[test]
    fn pads_and_trims_ascii() {
        let padded = pad_ascii("ABC", 6);
        assert_eq!(&padded, b"ABC   ");
        assert_eq!(read_fixed_ascii(&padded), "ABC");
    }
}
