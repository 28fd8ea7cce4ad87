// used for timestamps and time valued conditions
use chrono::NaiveDateTime;

// used when parsing JSON valued conditions
use std::str::FromStr;
// used to print out readable forms of a data type
use std::fmt;
// used to overload common operations for datatypes
use std::ops;

use serde::{Deserialize, Serialize};

use crate::error::{CondbError, Result};

// ------------- ValueType -------------

/// The closed set of kinds a condition value can have.
///
/// Two string forms exist. The wire form is what the originating database
/// schema stores and carries two historical quirks: `Long` is written as
/// `"int"` and `Double` as `"float"`. The display form uses the natural
/// lower case names. [`ValueType::from_wire`] is the only way a kind is
/// ever constructed from wire text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Bool,
    Json,
    String,
    Double,
    Long,
    Time,
    Blob,
}

impl ValueType {
    /// Decodes the schema's wire string, failing for anything outside the
    /// closed vocabulary.
    pub fn from_wire(text: &str) -> Result<ValueType> {
        match text {
            "bool" => Ok(ValueType::Bool),
            "json" => Ok(ValueType::Json),
            "string" => Ok(ValueType::String),
            "float" => Ok(ValueType::Double),
            "int" => Ok(ValueType::Long),
            "time" => Ok(ValueType::Time),
            "blob" => Ok(ValueType::Blob),
            other => Err(CondbError::InvalidValueType(other.to_owned())),
        }
    }

    /// The schema's wire string, the left inverse of [`ValueType::from_wire`].
    pub fn to_wire(&self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Json => "json",
            ValueType::String => "string",
            ValueType::Double => "float",
            ValueType::Long => "int",
            ValueType::Time => "time",
            ValueType::Blob => "blob",
        }
    }

    /// The display name, also used by [`fmt::Display`] and serde.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Json => "json",
            ValueType::String => "string",
            ValueType::Double => "double",
            ValueType::Long => "long",
            ValueType::Time => "time",
            ValueType::Blob => "blob",
        }
    }
}
impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
impl FromStr for ValueType {
    type Err = CondbError;
    fn from_str(text: &str) -> Result<ValueType> {
        match text {
            "bool" => Ok(ValueType::Bool),
            "json" => Ok(ValueType::Json),
            "string" => Ok(ValueType::String),
            "double" => Ok(ValueType::Double),
            "long" => Ok(ValueType::Long),
            "time" => Ok(ValueType::Time),
            "blob" => Ok(ValueType::Blob),
            other => Err(CondbError::InvalidValueType(other.to_owned())),
        }
    }
}

// ------------- CellType -------------

/// The closed set of kinds a type table column can have.
///
/// Distinct from [`ValueType`]: a condition carries a single scalar,
/// while table columns type the individual cells of an assignment blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Bool,
    Int,
    UInt,
    Long,
    ULong,
    Double,
    String,
}

impl CellType {
    /// Decodes the schema's column type string.
    pub fn from_wire(text: &str) -> Result<CellType> {
        match text {
            "bool" => Ok(CellType::Bool),
            "int" => Ok(CellType::Int),
            "uint" => Ok(CellType::UInt),
            "long" => Ok(CellType::Long),
            "ulong" => Ok(CellType::ULong),
            "double" => Ok(CellType::Double),
            "string" => Ok(CellType::String),
            other => Err(CondbError::InvalidCellType(other.to_owned())),
        }
    }

    /// The canonical lower case name; wire and display forms coincide.
    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Bool => "bool",
            CellType::Int => "int",
            CellType::UInt => "uint",
            CellType::Long => "long",
            CellType::ULong => "ulong",
            CellType::Double => "double",
            CellType::String => "string",
        }
    }
}
impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
impl FromStr for CellType {
    type Err = CondbError;
    fn from_str(text: &str) -> Result<CellType> {
        CellType::from_wire(text)
    }
}

// ------------- Value -------------

/// A condition payload: one variant per [`ValueType`], each carrying only
/// its own representation.
///
/// The fetch layer hands over all raw slots of a database row and exactly
/// one of them is meaningful, selected by the type tag.
/// [`Value::from_slots`] is the single place where that classification
/// happens; past it, a wrongly typed payload cannot be constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    /// Raw JSON text; parsing into a [`Json`] document is deferred until
    /// a caller asks for it.
    Json(String),
    String(String),
    Double(f64),
    Long(i64),
    Time(NaiveDateTime),
    Blob(String),
}

impl Value {
    /// Classifies the raw slots of a fetched row. Callers supply
    /// zero/empty values for the slots the type tag does not select.
    pub fn from_slots(
        value_type: ValueType,
        long_slot: i64,
        bool_slot: bool,
        double_slot: f64,
        text_slot: String,
        time_slot: NaiveDateTime,
    ) -> Value {
        match value_type {
            ValueType::Bool => Value::Bool(bool_slot),
            ValueType::Json => Value::Json(text_slot),
            ValueType::String => Value::String(text_slot),
            ValueType::Double => Value::Double(double_slot),
            ValueType::Long => Value::Long(long_slot),
            ValueType::Time => Value::Time(time_slot),
            ValueType::Blob => Value::Blob(text_slot),
        }
    }

    /// The kind of the carried payload.
    pub fn kind(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Json(_) => ValueType::Json,
            Value::String(_) => ValueType::String,
            Value::Double(_) => ValueType::Double,
            Value::Long(_) => ValueType::Long,
            Value::Time(_) => ValueType::Time,
            Value::Blob(_) => ValueType::Blob,
        }
    }
}
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Bool(value) => write!(f, "{}", value),
            Value::Json(text) | Value::String(text) | Value::Blob(text) => write!(f, "{}", text),
            Value::Double(value) => write!(f, "{}", value),
            Value::Long(value) => write!(f, "{}", value),
            Value::Time(value) => write!(f, "{}", value),
        }
    }
}

// ------------- Json -------------

#[derive(Eq, PartialEq, PartialOrd, Ord, Clone)]
pub struct Json(jsondata::Json);

impl Json {
    pub fn from_str(text: &str) -> Option<Json> {
        match jsondata::Json::from_str(text) {
            Ok(json) => Some(Json(json)),
            _ => None,
        }
    }
}
impl fmt::Display for Json {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl fmt::Debug for Json {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Json({})", self.0)
    }
}
impl ops::Deref for Json {
    type Target = jsondata::Json;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ------------- Token parsers -------------

/// Parses one blob token as a boolean. The data producers are not
/// consistent here: some write `true`/`false`, others `1`/`0`.
pub fn parse_bool_token(token: &str) -> Option<bool> {
    if token.eq_ignore_ascii_case("true") || token == "1" {
        Some(true)
    } else if token.eq_ignore_ascii_case("false") || token == "0" {
        Some(false)
    } else {
        None
    }
}
