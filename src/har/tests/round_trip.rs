//! Whole-file round-trip integration tests (§8 testable properties).

use std::io::Cursor;

use har::array::{HeaderArray, HeaderMeta, IndexedDict};
use har::label::{KeySequence, Label};
use har::sets::SetDef;
use har::{harx, sl4, HeaderArrayFile};

fn label(s: &str) -> Label {
    Label::new(s).unwrap()
}

fn sample_file() -> HeaderArrayFile {
    let com = SetDef::new("COM", vec![label("AGR"), label("MFG")]);
    let reg = SetDef::new("REG", vec![label("USA"), label("ROW")]);

    let coef_meta = HeaderMeta {
        header: "COEF".to_string(),
        coefficient: "COEF".to_string(),
        description: "cost shares".to_string(),
        dimensions: vec![2, 2],
    };
    let coef_dict = IndexedDict::from_dense(vec![com.clone(), reg.clone()], vec![2, 2], vec![1.0f32, 2.0, 3.0, 4.0]);

    let names_meta = HeaderMeta {
        header: "SETN".to_string(),
        coefficient: "SETN".to_string(),
        description: "set member names".to_string(),
        dimensions: vec![2],
    };
    let names_dict = IndexedDict::from_dense(vec![], vec![2], vec!["agriculture".to_string(), "manufacturing".to_string()]);

    let sparse_meta = HeaderMeta {
        header: "SPRS".to_string(),
        coefficient: "SPRS".to_string(),
        description: "sparse tax rates".to_string(),
        dimensions: vec![2, 2],
    };
    let sparse_entries = vec![(KeySequence::new(vec![label("MFG"), label("ROW")]), 0.15f32)];
    let sparse_dict = IndexedDict::new(vec![com, reg], vec![2, 2], sparse_entries, true);

    HeaderArrayFile::new(vec![
        HeaderArray::Re(coef_meta, coef_dict),
        HeaderArray::C1(names_meta, names_dict),
        HeaderArray::Re(sparse_meta, sparse_dict),
    ])
}

#[test]
fn har_to_har_round_trip_preserves_headers_and_content() {
    let file = sample_file();
    let mut bytes = Vec::new();
    file.write(&mut bytes).unwrap();

    let read_back = HeaderArrayFile::read(Cursor::new(bytes)).unwrap();
    assert_eq!(read_back, file);
}

#[test]
fn har_to_harx_to_har_round_trip_preserves_logical_content() {
    let file = sample_file();

    let mut zip_bytes = Cursor::new(Vec::new());
    harx::write_harx(&mut zip_bytes, &file.headers).unwrap();
    zip_bytes.set_position(0);

    let read_back = harx::read_harx(zip_bytes).unwrap();
    assert_eq!(read_back.len(), file.headers.len());
    for (original, roundtripped) in file.headers.iter().zip(read_back.iter()) {
        assert_eq!(original.header_code(), roundtripped.header_code());
        assert_eq!(original.meta().description, roundtripped.meta().description);
    }
}

#[test]
fn sl4_read_reassemble_har_write_har_read_is_byte_exact() {
    let com = SetDef::new("COM", vec![label("AGR"), label("MFG"), label("SVC")]);

    let mut headers = vec![
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
        i2("SSZ ", vec![3]),
        c1("STEL", vec!["AGR", "MFG", "SVC"]),
        i2("VNCP", vec![3]),
        i2("PCUM", vec![1]),
        i2("CMND", vec![2]),
        r2("CUMS", vec![10.0, 20.0]),
        i2("OREX", vec![1]),
        i2("OREL", vec![2]),
        i2("SHCK", vec![0]),
        i2("PSHK", vec![1]),
        i2("SHCL", vec![]),
        r2("SHOC", vec![]),
    ];
    let _ = &com;

    let sl4_file = HeaderArrayFile::new(std::mem::take(&mut headers));
    let reconstructed = sl4::decode_solution(&sl4_file).unwrap();
    assert_eq!(reconstructed.len(), 1);

    let mut bytes = Vec::new();
    HeaderArrayFile::new(reconstructed.clone()).write(&mut bytes).unwrap();
    let read_back = HeaderArrayFile::read(Cursor::new(bytes)).unwrap();

    assert_eq!(read_back.headers, reconstructed);
    match &read_back.headers[0] {
        HeaderArray::Re(meta, dict) => {
            assert_eq!(meta.header, "QO");
            let values: Vec<f32> = dict.materialised_entries().iter().map(|(_, v)| *v).collect();
            assert_eq!(values, vec![10.0, 0.0, 20.0]);
        }
        other => panic!("expected Re, got {other:?}"),
    }
}

fn c1(code: &str, values: Vec<&str>) -> HeaderArray {
    let meta = HeaderMeta {
        header: code.to_string(),
        coefficient: code.to_string(),
        description: String::new(),
        dimensions: vec![values.len() as i32],
    };
    let dict = IndexedDict::from_dense(vec![], vec![values.len()], values.into_iter().map(String::from).collect());
    HeaderArray::C1(meta, dict)
}

fn i2(code: &str, values: Vec<i32>) -> HeaderArray {
    let meta = HeaderMeta {
        header: code.to_string(),
        coefficient: code.to_string(),
        description: String::new(),
        dimensions: vec![values.len() as i32],
    };
    HeaderArray::I2(meta, IndexedDict::from_dense(vec![], vec![values.len()], values))
}

fn r2(code: &str, values: Vec<f32>) -> HeaderArray {
    let meta = HeaderMeta {
        header: code.to_string(),
        coefficient: code.to_string(),
        description: String::new(),
        dimensions: vec![values.len() as i32],
    };
    HeaderArray::R2(meta, IndexedDict::from_dense(vec![], vec![values.len()], values))
}
