use std::sync::Arc;

use chrono::NaiveDateTime;
use condb::construct::{Directory, TypeTable, TypeTableColumn};
use condb::datatype::CellType;
use condb::error::CondbError;

fn thresholds_table() -> TypeTable {
    let root = Arc::new(Directory::new(
        0,
        0,
        String::new(),
        NaiveDateTime::default(),
        NaiveDateTime::default(),
        String::new(),
    ));
    let daq = Arc::new(Directory::new(
        1,
        0,
        "daq".to_string(),
        NaiveDateTime::default(),
        NaiveDateTime::default(),
        String::new(),
    ));
    Directory::add_subdirectory(&root, Arc::clone(&daq)).unwrap();
    TypeTable::new(
        5,
        daq,
        "thresholds".to_string(),
        vec![
            TypeTableColumn::new(1, "channel".to_string(), 0, CellType::Int),
            TypeTableColumn::new(2, "value".to_string(), 1, CellType::Double),
            TypeTableColumn::new(3, "enabled".to_string(), 2, CellType::Bool),
        ],
        16,
    )
}

#[test]
fn columns_resolve_by_name() {
    let table = thresholds_table();
    let value = table.column("value").unwrap();
    assert_eq!(value.index(), 1);
    assert_eq!(value.cell_type(), CellType::Double);
    assert_eq!(value.id(), 2);
}

#[test]
fn every_lookup_matches_its_declared_ordinal() {
    let table = thresholds_table();
    for column in table.columns() {
        assert_eq!(table.column(column.name()).unwrap().index(), column.index());
    }
    assert_eq!(table.column_count(), 3);
    assert_eq!(table.rows_count(), 16);
}

#[test]
fn unknown_columns_are_reported() {
    let table = thresholds_table();
    assert!(matches!(
        table.column("missing"),
        Err(CondbError::UnknownColumn(ref name)) if name == "missing"
    ));
}

#[test]
fn full_path_includes_the_directory_chain() {
    let table = thresholds_table();
    assert_eq!(table.full_path(), "/daq/thresholds");
    assert_eq!(table.directory().name(), "daq");
}

#[test]
fn columns_serialize_with_their_cell_type_names() {
    let table = thresholds_table();
    let serialized = serde_json::to_value(table.column("channel").unwrap()).unwrap();
    assert_eq!(
        serialized,
        serde_json::json!({
            "id": 1,
            "name": "channel",
            "index": 0,
            "cell_type": "int",
        })
    );
}
