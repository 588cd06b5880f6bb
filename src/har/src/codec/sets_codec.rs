//! Named-set codec: the 12-char name / new-vs-reference flag / label list
//! layout, deduplicated by name across a file (§4.B).

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{HarError, Result};
use crate::framer;
use crate::label::Label;
use crate::sets::SetDef;

use super::strings;

const SET_NAME_WIDTH: usize = 12;
const LABEL_WIDTH: usize = 12;

const FLAG_DEFINITION: u8 = 0;
const FLAG_REFERENCE: u8 = 1;

/// Tracks which set names have already been written (or read) in the
/// current file, so repeated sets are emitted as references (§4.B).
#[derive(Debug, Default)]
pub struct SetDictionary {
    known: HashMap<String, SetDef>,
}

impl SetDictionary {
    pub fn new() -> SetDictionary {
        SetDictionary::default()
    }

    fn key(name: &str) -> String {
        name.trim().to_ascii_uppercase()
    }

    pub fn get(&self, name: &str) -> Option<&SetDef> {
        self.known.get(&Self::key(name))
    }

    pub fn insert(&mut self, set: SetDef) {
        self.known.insert(Self::key(&set.name), set);
    }
}

/// Writes one set, either as a fresh definition or, if `dict` already holds
/// a set of this name, as a bare reference.
pub fn write_set<W: Write>(writer: &mut W, set: &SetDef, dict: &mut SetDictionary) -> Result<()> {
    if dict.get(&set.name).is_some() {
        let mut payload = framer::pad_ascii(&set.name, SET_NAME_WIDTH);
        payload.push(FLAG_REFERENCE);
        framer::write_record(writer, &payload)?;
        return Ok(());
    }

    let mut payload = framer::pad_ascii(&set.name, SET_NAME_WIDTH);
    payload.push(FLAG_DEFINITION);
    payload.write_i32::<LittleEndian>(set.len() as i32)?;
    framer::write_record(writer, &payload)?;

    let labels: Vec<String> = set.elements.iter().map(|l| l.to_string()).collect();
    strings::write_strings(writer, &labels, LABEL_WIDTH)?;

    dict.insert(set.clone());
    Ok(())
}

/// Reads one set, resolving bare references against `dict`.
pub fn read_set<R: Read>(reader: &mut R, dict: &mut SetDictionary) -> Result<SetDef> {
    let header_payload = framer::read_record(reader)?.ok_or(HarError::UnexpectedEof {
        context: "set header record",
        needed: SET_NAME_WIDTH + 1,
    })?;
    if header_payload.len() < SET_NAME_WIDTH + 1 {
        return Err(HarError::MalformedRecord {
            header: String::new(),
            reason: "set header record shorter than name + flag".to_string(),
        });
    }
    let name = framer::read_fixed_ascii(&header_payload[..SET_NAME_WIDTH]);
    let flag = header_payload[SET_NAME_WIDTH];

    match flag {
        FLAG_REFERENCE => dict.get(&name).cloned().ok_or_else(|| HarError::MalformedRecord {
            header: String::new(),
            reason: format!("reference to unknown set {name:?}"),
        }),
        FLAG_DEFINITION => {
            let mut cursor = Cursor::new(&header_payload[SET_NAME_WIDTH + 1..]);
            let count = cursor.read_i32::<LittleEndian>()? as usize;
            let labels = strings::read_strings(reader, count, LABEL_WIDTH)?;
            let elements: Result<Vec<Label>> = labels.iter().map(|s| Label::new(s.clone())).collect();
            let set = SetDef::new(name, elements?);
            dict.insert(set.clone());
            Ok(set)
        }
        other => Err(HarError::MalformedRecord {
            header: String::new(),
            reason: format!("unrecognised set record flag {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(s: &str) -> Label {
        Label::new(s).unwrap()
    }

    #[test]
    fn round_trips_a_fresh_set() {
        let set = SetDef::new("COM", vec![label("AGR"), label("MFG")]);
        let mut buf = Vec::new();
        let mut write_dict = SetDictionary::new();
        write_set(&mut buf, &set, &mut write_dict).unwrap();

        let mut cursor = Cursor::new(buf);
        let mut read_dict = SetDictionary::new();
        let read_back = read_set(&mut cursor, &mut read_dict).unwrap();
        assert_eq!(read_back, set);
    }

    #[test]
    fn second_occurrence_is_a_reference() {
        let set = SetDef::new("REG", vec![label("USA"), label("ROW")]);
        let mut buf = Vec::new();
        let mut write_dict = SetDictionary::new();
        write_set(&mut buf, &set, &mut write_dict).unwrap();
        write_set(&mut buf, &set, &mut write_dict).unwrap();

        let mut cursor = Cursor::new(buf);
        let mut read_dict = SetDictionary::new();
        let first = read_set(&mut cursor, &mut read_dict).unwrap();
        let second = read_set(&mut cursor, &mut read_dict).unwrap();
        assert_eq!(first, set);
        assert_eq!(second, set);
    }
}
