//! JSON/HARX bridge (§4.F): a ZIP (deflate) archive with one JSON member
//! per header array.

use std::collections::HashMap;
use std::io::{Read, Seek, Write};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::instrument;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::array::{ArrayKind, HeaderArray, HeaderMeta, IndexedDict};
use crate::error::{HarError, Result};
use crate::label::{KeySequence, Label};
use crate::sets::SetDef;

/// The wire shape of one HARX JSON member.
#[derive(Debug, Serialize, Deserialize)]
struct HeaderDocument {
    #[serde(rename = "Header")]
    header: String,
    #[serde(rename = "Coefficient")]
    coefficient: String,
    #[serde(rename = "Description")]
    description: String,
    #[serde(rename = "Type")]
    type_code: String,
    #[serde(rename = "Dimensions")]
    dimensions: Vec<i32>,
    #[serde(rename = "Sets")]
    sets: Vec<HashMap<String, Vec<String>>>,
    #[serde(rename = "Entries")]
    entries: Map<String, Value>,
}

fn parse_key(text: &str) -> Result<KeySequence> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(KeySequence::new(vec![]));
    }
    if !trimmed.starts_with('[') || !trimmed.ends_with(']') {
        return Err(HarError::MalformedRecord {
            header: "<harx>".to_string(),
            reason: format!("entry key {text:?} is not of the form \"[lbl1][lbl2]...\""),
        });
    }
    let inner = &trimmed[1..trimmed.len() - 1];
    let labels: Result<Vec<Label>> = inner.split("][").map(Label::new).collect();
    Ok(KeySequence::new(labels?))
}

fn sets_to_json(sets: &[SetDef]) -> Vec<HashMap<String, Vec<String>>> {
    sets.iter()
        .map(|set| {
            let mut map = HashMap::with_capacity(1);
            map.insert(set.name.clone(), set.elements.iter().map(|l| l.to_string()).collect());
            map
        })
        .collect()
}

fn json_to_sets(json: &[HashMap<String, Vec<String>>]) -> Result<Vec<SetDef>> {
    json.iter()
        .map(|map| {
            let (name, elements) = map.iter().next().ok_or_else(|| HarError::MalformedRecord {
                header: "<harx>".to_string(),
                reason: "a Sets entry must have exactly one name".to_string(),
            })?;
            let labels: Result<Vec<Label>> = elements.iter().map(|s| Label::new(s.clone())).collect();
            Ok(SetDef::new(name.clone(), labels?))
        })
        .collect()
}

fn header_to_document(header: &HeaderArray) -> HeaderDocument {
    let meta = header.meta();
    let (sets, entries) = match header {
        HeaderArray::C1(_, dict) => {
            let entries = dict
                .materialised_entries()
                .iter()
                .map(|(key, value)| (key.to_string(), Value::String(value.clone())))
                .collect();
            (sets_to_json(dict.sets()), entries)
        }
        HeaderArray::Re(_, dict) => {
            let entries = dict
                .materialised_entries()
                .iter()
                .map(|(key, value)| (key.to_string(), json_number(*value as f64)))
                .collect();
            (sets_to_json(dict.sets()), entries)
        }
        HeaderArray::R2(_, dict) => {
            let entries = dict
                .materialised_entries()
                .iter()
                .map(|(key, value)| (key.to_string(), json_number(*value as f64)))
                .collect();
            (sets_to_json(dict.sets()), entries)
        }
        HeaderArray::I2(_, dict) => {
            let entries = dict
                .materialised_entries()
                .iter()
                .map(|(key, value)| (key.to_string(), Value::from(*value)))
                .collect();
            (sets_to_json(dict.sets()), entries)
        }
    };

    HeaderDocument {
        header: meta.header.clone(),
        coefficient: meta.coefficient.clone(),
        description: meta.description.clone(),
        type_code: header.kind().code().to_string(),
        dimensions: meta.dimensions.clone(),
        sets,
        entries,
    }
}

fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

fn document_to_header(doc: HeaderDocument) -> Result<HeaderArray> {
    let kind = ArrayKind::from_code(&doc.type_code).ok_or_else(|| HarError::UnknownType {
        header: doc.header.clone(),
        code: {
            let mut code = [0u8; 4];
            let bytes = doc.type_code.as_bytes();
            let len = bytes.len().min(4);
            code[..len].copy_from_slice(&bytes[..len]);
            code
        },
    })?;
    let sets = json_to_sets(&doc.sets)?;
    let dims: Vec<usize> = doc.dimensions.iter().map(|&d| d.max(0) as usize).collect();
    let meta = HeaderMeta {
        header: doc.header,
        coefficient: doc.coefficient,
        description: doc.description,
        dimensions: doc.dimensions,
    };
    meta.validate()?;

    let parsed_entries: Result<Vec<(KeySequence, &Value)>> = doc
        .entries
        .iter()
        .map(|(key, value)| parse_key(key).map(|k| (k, value)))
        .collect();
    let parsed_entries = parsed_entries?;
    let total: usize = dims.iter().product();
    let sparse = !dims.is_empty() && parsed_entries.len() < total;

    match kind {
        ArrayKind::Strings => {
            let entries = parsed_entries
                .into_iter()
                .map(|(k, v)| {
                    let s = v.as_str().ok_or_else(|| HarError::MalformedRecord {
                        header: meta.header.clone(),
                        reason: "1C entry value must be a JSON string".to_string(),
                    })?;
                    Ok((k, s.to_string()))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(HeaderArray::C1(meta, IndexedDict::new(sets, dims, entries, sparse)))
        }
        ArrayKind::Reals | ArrayKind::RealsLegacy => {
            let entries = parsed_entries
                .into_iter()
                .map(|(k, v)| {
                    let f = v.as_f64().ok_or_else(|| HarError::MalformedRecord {
                        header: meta.header.clone(),
                        reason: "RE entry value must be numeric".to_string(),
                    })?;
                    Ok((k, f as f32))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(HeaderArray::Re(meta, IndexedDict::new(sets, dims, entries, sparse)))
        }
        ArrayKind::Reals2D => {
            let entries = parsed_entries
                .into_iter()
                .map(|(k, v)| {
                    let f = v.as_f64().ok_or_else(|| HarError::MalformedRecord {
                        header: meta.header.clone(),
                        reason: "2R entry value must be numeric".to_string(),
                    })?;
                    Ok((k, f as f32))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(HeaderArray::R2(meta, IndexedDict::new(sets, dims, entries, sparse)))
        }
        ArrayKind::Ints2D => {
            let entries = parsed_entries
                .into_iter()
                .map(|(k, v)| {
                    let i = v.as_i64().ok_or_else(|| HarError::MalformedRecord {
                        header: meta.header.clone(),
                        reason: "2I entry value must be an integer".to_string(),
                    })?;
                    Ok((k, i as i32))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(HeaderArray::I2(meta, IndexedDict::new(sets, dims, entries, sparse)))
        }
    }
}

/// Writes `headers` as a HARX archive: one deflated JSON member per header,
/// named by its 4-char code.
#[instrument(skip(writer, headers), fields(count = headers.len()))]
pub fn write_harx<W: Write + Seek>(writer: W, headers: &[HeaderArray]) -> Result<()> {
    let mut zip = ZipWriter::new(writer);
    let options: FileOptions = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for header in headers {
        let document = header_to_document(header);
        zip.start_file(header.header_code(), options)?;
        let body = serde_json::to_vec(&document)?;
        zip.write_all(&body)?;
    }

    zip.finish()?;
    Ok(())
}

/// Reads a HARX archive back into header arrays, in ZIP directory order.
#[instrument(skip(reader))]
pub fn read_harx<R: Read + Seek>(reader: R) -> Result<Vec<HeaderArray>> {
    let mut archive = ZipArchive::new(reader)?;
    let mut headers = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let document: HeaderDocument = serde_json::from_reader(entry)?;
        headers.push(document_to_header(document)?);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn label(s: &str) -> Label {
        Label::new(s).unwrap()
    }

    #[test]
    fn round_trips_a_labelled_real_header_through_harx() {
        let meta = HeaderMeta {
            header: "COEF".to_string(),
            coefficient: "COEF".to_string(),
            description: "cost shares".to_string(),
            dimensions: vec![2, 2],
        };
        let sets = vec![
            SetDef::new("COM", vec![label("AGR"), label("MFG")]),
            SetDef::new("REG", vec![label("USA"), label("ROW")]),
        ];
        let dict = IndexedDict::from_dense(sets, vec![2, 2], vec![1.0f32, 2.0, 3.0, 4.0]);
        let headers = vec![HeaderArray::Re(meta, dict)];

        let mut buf = Cursor::new(Vec::new());
        write_harx(&mut buf, &headers).unwrap();
        buf.set_position(0);

        let read_back = read_harx(buf).unwrap();
        assert_eq!(read_back, headers);
    }

    #[test]
    fn json_entry_key_parses_into_a_key_sequence() {
        let key = parse_key("[AGR][USA]").unwrap();
        assert_eq!(key, KeySequence::new(vec![label("AGR"), label("USA")]));
    }
}
