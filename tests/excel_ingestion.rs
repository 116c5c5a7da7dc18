#![cfg(feature = "excel_test_writer")]

use rust_xlsxwriter::Workbook;

use tabular_ingest::IngestionErrorKind;
use tabular_ingest::ingestion::excel::ingest_excel_from_bytes;
use tabular_ingest::ingestion::{
    DEFAULT_MISSING_MARKERS, ExcelSheetSelection, IngestionOptions, UploadedFile, ingest, ingest_with_defaults,
};
use tabular_ingest::types::{DataType, Value};

fn default_markers() -> Vec<String> {
    DEFAULT_MISSING_MARKERS.iter().map(|s| s.to_string()).collect()
}

fn people_xlsx() -> Vec<u8> {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name("People").unwrap();

    // header
    ws.write_string(0, 0, "id").unwrap();
    ws.write_string(0, 1, "name").unwrap();
    ws.write_string(0, 2, "score").unwrap();
    ws.write_string(0, 3, "active").unwrap();

    ws.write_number(1, 0, 1).unwrap();
    ws.write_string(1, 1, "Ada").unwrap();
    ws.write_number(1, 2, 98.5).unwrap();
    ws.write_boolean(1, 3, true).unwrap();

    // score left blank
    ws.write_number(2, 0, 2).unwrap();
    ws.write_string(2, 1, "Grace").unwrap();
    ws.write_boolean(2, 3, false).unwrap();

    ws.write_number(3, 0, 3).unwrap();
    ws.write_string(3, 1, "NA").unwrap();
    ws.write_number(3, 2, 70).unwrap();
    ws.write_boolean(3, 3, true).unwrap();

    wb.save_to_buffer().unwrap()
}

fn two_sheet_xlsx() -> Vec<u8> {
    let mut wb = Workbook::new();

    let first = wb.add_worksheet();
    first.set_name("Summary").unwrap();
    first.write_string(0, 0, "total").unwrap();
    first.write_number(1, 0, 42).unwrap();

    let second = wb.add_worksheet();
    second.set_name("Detail").unwrap();
    second.write_string(0, 0, "item").unwrap();
    second.write_string(0, 1, "qty").unwrap();
    second.write_string(1, 0, "bolt").unwrap();
    second.write_number(1, 1, 10).unwrap();
    second.write_string(2, 0, "nut").unwrap();
    second.write_number(2, 1, 12).unwrap();

    wb.save_to_buffer().unwrap()
}

#[test]
fn first_sheet_is_ingested_with_inferred_types() {
    let mut file = UploadedFile::from_bytes("people.xlsx", people_xlsx());
    let table = ingest_with_defaults(&mut file).unwrap();

    assert_eq!(table.shape(), (3, 4));
    assert_eq!(
        table.column_names().collect::<Vec<_>>(),
        vec!["id", "name", "score", "active"]
    );

    let id = table.column("id").unwrap();
    assert_eq!(id.data_type, DataType::Int64);
    assert_eq!(id.values, vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)]);

    let score = table.column("score").unwrap();
    assert_eq!(score.data_type, DataType::Float64);
    assert_eq!(
        score.values,
        vec![Value::Float64(98.5), Value::Null, Value::Float64(70.0)]
    );

    let active = table.column("active").unwrap();
    assert_eq!(active.data_type, DataType::Bool);
    assert_eq!(
        active.values,
        vec![Value::Bool(true), Value::Bool(false), Value::Bool(true)]
    );

    // "NA" is a missing marker in workbooks too.
    let name = table.column("name").unwrap();
    assert_eq!(name.data_type, DataType::Utf8);
    assert_eq!(
        name.values,
        vec![
            Value::Utf8("Ada".to_string()),
            Value::Utf8("Grace".to_string()),
            Value::Null
        ]
    );
}

#[test]
fn only_the_first_sheet_is_read_by_default() {
    let mut file = UploadedFile::from_bytes("report.xlsx", two_sheet_xlsx());
    let table = ingest_with_defaults(&mut file).unwrap();
    assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["total"]);
    assert_eq!(table.column("total").unwrap().values, vec![Value::Int64(42)]);
}

#[test]
fn named_sheet_can_be_selected() {
    let opts = IngestionOptions {
        excel_sheet_selection: ExcelSheetSelection::Sheet("Detail".to_string()),
        ..Default::default()
    };
    let mut file = UploadedFile::from_bytes("report.xlsx", two_sheet_xlsx());
    let table = ingest(&mut file, &opts).unwrap();

    assert_eq!(table.shape(), (2, 2));
    assert_eq!(table.column("qty").unwrap().data_type, DataType::Int64);
}

#[test]
fn missing_sheet_is_malformed() {
    let err = ingest_excel_from_bytes(
        two_sheet_xlsx(),
        &ExcelSheetSelection::Sheet("Nope".to_string()),
        &default_markers(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), IngestionErrorKind::MalformedInput);
    assert!(err.to_string().contains("sheet 'Nope' not found"), "{err}");
}

#[test]
fn mixed_column_falls_back_to_text_and_headers_are_made_unique() {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.write_string(0, 0, "v").unwrap();
    ws.write_string(0, 1, "v").unwrap();
    ws.write_number(1, 0, 1).unwrap();
    ws.write_string(1, 1, "a").unwrap();
    ws.write_string(2, 0, "two").unwrap();
    ws.write_string(2, 1, "b").unwrap();
    let bytes = wb.save_to_buffer().unwrap();

    let mut file = UploadedFile::from_bytes("mixed.xlsx", bytes);
    let table = ingest_with_defaults(&mut file).unwrap();

    assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["v", "v.1"]);
    let v = table.column("v").unwrap();
    assert_eq!(v.data_type, DataType::Utf8);
    assert_eq!(
        v.values,
        vec![Value::Utf8("1".to_string()), Value::Utf8("two".to_string())]
    );
}

#[test]
fn workbook_kind_is_sniffed_from_content() {
    // An .xlsx payload uploaded under an .xls name still opens.
    let mut file = UploadedFile::from_bytes("legacy.XLS", people_xlsx());
    let table = ingest_with_defaults(&mut file).unwrap();
    assert_eq!(table.row_count(), 3);
    assert_eq!(file.get_ref().position(), 0);
}

#[test]
fn header_only_sheet_has_no_rows() {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.write_string(0, 0, "a").unwrap();
    ws.write_string(0, 1, "b").unwrap();
    let bytes = wb.save_to_buffer().unwrap();

    let mut file = UploadedFile::from_bytes("empty.xlsx", bytes);
    let table = ingest_with_defaults(&mut file).unwrap();
    assert_eq!(table.shape(), (0, 2));
}
