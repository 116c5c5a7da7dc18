use tabular_ingest::IngestionErrorKind;
use tabular_ingest::ingestion::{
    IngestionOptions, TextEncoding, UploadedFile, detect_encoding, ingest, ingest_with_report,
};
use tabular_ingest::types::Value;

fn utf16le(text: &str, bom: bool) -> Vec<u8> {
    let mut out = if bom { vec![0xFF, 0xFE] } else { Vec::new() };
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

fn utf16be(text: &str) -> Vec<u8> {
    let mut out = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

/// A PNG signature plus a complete IHDR chunk.
fn png_bytes() -> Vec<u8> {
    let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    png.extend_from_slice(&[0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R']);
    png.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01]);
    png.extend_from_slice(&[0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4, 0x89]);
    png
}

#[test]
fn ascii_and_empty_input_is_certain_utf8() {
    let guess = detect_encoding(b"a,b\n1,2\n");
    assert_eq!(guess.encoding, TextEncoding::Utf8);
    assert_eq!(guess.confidence, 1.0);

    assert_eq!(detect_encoding(b"").encoding, TextEncoding::Utf8);
}

#[test]
fn utf8_with_accents_is_detected() {
    let guess = detect_encoding("name,city\nJosé,Zürich\n".as_bytes());
    assert_eq!(guess.encoding, TextEncoding::Utf8);
    assert!(guess.confidence > 0.9, "{guess:?}");
}

#[test]
fn utf8_bom_is_detected_and_stripped() {
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(b"id,name\n1,Ada\n");
    assert_eq!(detect_encoding(&bytes).encoding, TextEncoding::Utf8Bom);

    let mut file = UploadedFile::from_bytes("bom.csv", bytes);
    let table = ingest(&mut file, &IngestionOptions::default()).unwrap();
    assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["id", "name"]);
}

#[test]
fn utf16_with_bom_round_trips_through_ingest() {
    for bytes in [utf16le("a,b\n1,ä\n", true), utf16be("a,b\n1,ä\n")] {
        let mut file = UploadedFile::from_bytes("wide.csv", bytes);
        let report = ingest_with_report(&mut file, &IngestionOptions::default()).unwrap();
        assert_eq!(report.encoding.unwrap().confidence, 1.0);
        assert_eq!(report.table.column("a").unwrap().values, vec![Value::Int64(1)]);
        assert_eq!(
            report.table.column("b").unwrap().values,
            vec![Value::Utf8("ä".to_string())]
        );
    }
}

#[test]
fn utf16le_without_bom_is_recognized_by_nul_pattern() {
    let bytes = utf16le("id,name\n1,Ada\n2,Grace\n", false);
    let guess = detect_encoding(&bytes);
    assert_eq!(guess.encoding, TextEncoding::Utf16Le);

    let mut file = UploadedFile::from_bytes("nobom.csv", bytes);
    let table = ingest(&mut file, &IngestionOptions::default()).unwrap();
    assert_eq!(table.shape(), (2, 2));
}

#[test]
fn latin1_bytes_are_detected_as_windows_1252() {
    let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode("name,city\nJosé,Zürich\nRenée,Besançon\n");
    let guess = detect_encoding(&bytes);
    assert_eq!(guess.encoding, TextEncoding::Windows1252);
    assert!(guess.confidence <= 0.9);

    let mut file = UploadedFile::from_bytes("latin.csv", bytes.into_owned());
    let table = ingest(&mut file, &IngestionOptions::default()).unwrap();
    assert_eq!(
        table.column("city").unwrap().values,
        vec![
            Value::Utf8("Zürich".to_string()),
            Value::Utf8("Besançon".to_string())
        ]
    );
}

#[test]
fn cyrillic_bytes_are_detected_as_windows_1251() {
    let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode("имя,город\nИван,Москва\nОльга,Казань\n");
    let guess = detect_encoding(&bytes);
    assert_eq!(guess.encoding, TextEncoding::Windows1251);

    let mut file = UploadedFile::from_bytes("ru.csv", bytes.into_owned());
    let table = ingest(&mut file, &IngestionOptions::default()).unwrap();
    assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["имя", "город"]);
}

#[test]
fn forced_encoding_skips_detection() {
    let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode("v\ncafé\n");
    let opts = IngestionOptions {
        encoding: Some(TextEncoding::Utf8),
        ..Default::default()
    };
    let mut file = UploadedFile::from_bytes("forced.csv", bytes.into_owned());
    let err = ingest(&mut file, &opts).unwrap_err();
    assert_eq!(err.kind(), IngestionErrorKind::MalformedInput);
    assert!(err.to_string().contains("not valid UTF-8"), "{err}");
}

#[test]
fn short_detection_sample_can_misdetect() {
    let mut text = String::from("v\n");
    for _ in 0..100 {
        text.push_str("plain\n");
    }
    text.push_str("café\n");
    let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(&text);
    let bytes = bytes.into_owned();

    let sampled = IngestionOptions {
        max_detection_bytes: Some(64),
        ..Default::default()
    };
    let mut file = UploadedFile::from_bytes("late.csv", bytes.clone());
    let err = ingest(&mut file, &sampled).unwrap_err();
    assert_eq!(err.kind(), IngestionErrorKind::MalformedInput);

    let mut file = UploadedFile::from_bytes("late.csv", bytes);
    let table = ingest(&mut file, &IngestionOptions::default()).unwrap();
    assert_eq!(table.row_count(), 101);
}

#[test]
fn png_renamed_to_csv_is_malformed() {
    let mut file = UploadedFile::from_bytes("photo.csv", png_bytes());
    let err = ingest(&mut file, &IngestionOptions::default()).unwrap_err();
    assert_eq!(err.kind(), IngestionErrorKind::MalformedInput);
}

#[test]
fn labels_resolve_to_candidates() {
    assert_eq!(TextEncoding::from_label("latin1"), Some(TextEncoding::Windows1252));
    assert_eq!(TextEncoding::from_label("ISO-8859-1"), Some(TextEncoding::Windows1252));
    assert_eq!(TextEncoding::from_label("utf-8-sig"), Some(TextEncoding::Utf8Bom));
    assert_eq!(TextEncoding::from_label("cp1251"), Some(TextEncoding::Windows1251));
    assert_eq!(TextEncoding::from_label("utf-16le"), Some(TextEncoding::Utf16Le));
    assert_eq!(TextEncoding::from_label("shift_jis"), None);
}

#[test]
fn single_accented_letter_in_utf8_is_not_mistaken_for_windows_1252() {
    for text in ["name\nÜlker\n", "w\nêtre\n", "k\nß\n", "v\nÎle\n"] {
        let guess = detect_encoding(text.as_bytes());
        assert_eq!(guess.encoding, TextEncoding::Utf8, "{text:?}");
        assert!(guess.confidence > 0.9, "{text:?}: {guess:?}");
    }

    let mut file = UploadedFile::from_bytes("brand.csv", "name\nÜlker\n");
    let table = ingest(&mut file, &IngestionOptions::default()).unwrap();
    assert_eq!(
        table.column("name").unwrap().values,
        vec![Value::Utf8("Ülker".to_string())]
    );
}

#[test]
fn ascii_with_stray_nul_is_malformed_not_utf16() {
    for bytes in [&b"ab\x00c"[..], &b"a\n\x00\n"[..], &b"id\n1\x00\n2\n"[..]] {
        let mut file = UploadedFile::from_bytes("x.csv", bytes.to_vec());
        let err = ingest(&mut file, &IngestionOptions::default()).unwrap_err();
        assert_eq!(err.kind(), IngestionErrorKind::MalformedInput, "{bytes:?}");
    }
}

#[test]
fn odd_detection_sample_still_finds_utf16() {
    let bytes = utf16le("id,name\n1,Ada\n2,Grace\n3,Linus\n", false);
    for limit in [20, 21, 23] {
        let opts = IngestionOptions {
            max_detection_bytes: Some(limit),
            ..Default::default()
        };
        let mut file = UploadedFile::from_bytes("nobom.csv", bytes.clone());
        let report = ingest_with_report(&mut file, &opts).unwrap();
        assert_eq!(report.encoding.unwrap().encoding, TextEncoding::Utf16Le, "limit={limit}");
        assert_eq!(report.table.shape(), (3, 2), "limit={limit}");
    }
}
