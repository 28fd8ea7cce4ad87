
use thiserror::Error;

use crate::datatype::ValueType;

#[derive(Error, Debug)]
pub enum CondbError {
    #[error("Invalid value type string: '{0}'")]
    InvalidValueType(String),
    #[error("Invalid cell type string: '{0}'")]
    InvalidCellType(String),
    #[error("Value type of the condition is not {expected} (stored type is {actual})")]
    TypeMismatch { expected: &'static str, actual: ValueType },
    #[error("Value {value} does not fit into {target}")]
    ValueOutOfRange { value: i64, target: &'static str },
    #[error("Malformed JSON value: '{0}'")]
    MalformedJson(String),
    #[error("Invalid time string: '{0}'")]
    InvalidTime(String),
    #[error("Unknown column: '{0}'")]
    UnknownColumn(String),
    #[error("Column index {index} is out of range (the table has {count} columns)")]
    ColumnIndexOutOfRange { index: usize, count: usize },
    #[error("Node '{0}' already has a parent")]
    AlreadyParented(String),
    #[error("Node '{child}' refers to unknown parent id {parent_id}")]
    UnknownParent { child: String, parent_id: u64 },
    #[error("Malformed blob: expected {expected} cells, found {actual}")]
    MalformedBlob { expected: usize, actual: usize },
    #[error("Cell at row {row}, column {column} cannot be parsed from '{token}'")]
    CellParse { row: usize, column: usize, token: String },
    #[error("Invalid slot number: '{0}'")]
    InvalidSlotNumber(String),
}

pub type Result<T> = std::result::Result<T, CondbError>;
