use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, Weak};

// keepers and lookups hash by name or by database id
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::{BuildHasherDefault, Hash, Hasher};
use seahash::SeaHasher;

// custom made ordering for condition types
use std::cmp::Ordering;

// used to print out readable forms of a construct
use std::fmt;

use chrono::NaiveDateTime;
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::debug;

// our own stuff that we need
use crate::datatype::{CellType, Json, Value, ValueType, parse_bool_token};
use crate::error::{CondbError, Result};

// ------------- Identities -------------

/// Database side identifier of a fetched row.
pub type DbId = u64;

pub type IdHasher = BuildHasherDefault<SeaHasher>;
pub type NameHasher = BuildHasherDefault<SeaHasher>;

/// Id of the synthetic root directory; rows carrying it as their parent
/// id attach directly under the root.
pub const ROOT_DIRECTORY_ID: DbId = 0;

/// Separates cells inside an assignment blob. There is no escaping: a
/// cell containing the separator corrupts the cell count on the producer
/// side and surfaces here as a malformed blob.
pub const DATA_SEPARATOR: char = '|';

/// Separates names inside a full path.
pub const PATH_SEPARATOR: char = '/';

/// Joins two path fragments without doubling the separator.
pub fn combine_path(left: &str, right: &str) -> String {
    let left = left.trim_end_matches(PATH_SEPARATOR);
    let right = right.trim_start_matches(PATH_SEPARATOR);
    if right.is_empty() {
        return left.to_owned();
    }
    format!("{}{}{}", left, PATH_SEPARATOR, right)
}

// ------------- ConditionType -------------

/// The named, typed schema entry a condition value conforms to.
#[derive(Debug, Eq, Serialize)]
pub struct ConditionType {
    id: DbId,
    name: String,
    value_type: ValueType,
}

impl ConditionType {
    pub fn new(id: DbId, name: String, value_type: ValueType) -> Self {
        Self {
            id,
            name,
            value_type,
        }
    }
    // Fields are encapsulated and only exposed through getters, which
    // yields true immutability for objects after creation.
    pub fn id(&self) -> DbId {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
}
impl Ord for ConditionType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}
impl PartialOrd for ConditionType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for ConditionType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Hash for ConditionType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.value_type)
    }
}

// ------------- ConditionTypeKeeper -------------

/// Owns the loaded condition type catalog and hands out canonical
/// references. Name uniqueness is guaranteed by the catalog loader; the
/// keeper merely deduplicates repeated loads.
#[derive(Debug)]
pub struct ConditionTypeKeeper {
    kept: HashMap<String, Arc<ConditionType>, NameHasher>,
    lookup: HashMap<DbId, Arc<ConditionType>, IdHasher>, // double indexing, but condition types are few so it's not a big deal
}
impl ConditionTypeKeeper {
    pub fn new() -> Self {
        Self {
            kept: HashMap::default(),
            lookup: HashMap::default(),
        }
    }
    pub fn keep(&mut self, condition_type: ConditionType) -> (Arc<ConditionType>, bool) {
        let id = condition_type.id();
        let keepsake = condition_type.name().to_owned();
        let mut previously_kept = true;
        match self.kept.entry(keepsake.clone()) {
            Entry::Vacant(e) => {
                e.insert(Arc::new(condition_type));
                previously_kept = false;
            }
            Entry::Occupied(_e) => (),
        };
        let kept_type = self.kept.get(&keepsake).unwrap();
        if !previously_kept {
            self.lookup.insert(id, Arc::clone(kept_type));
        }
        (Arc::clone(kept_type), previously_kept)
    }
    pub fn get(&self, name: &str) -> Option<Arc<ConditionType>> {
        self.kept.get(name).map(Arc::clone)
    }
    pub fn lookup(&self, id: DbId) -> Option<Arc<ConditionType>> {
        self.lookup.get(&id).map(Arc::clone)
    }
    /// All kept types, sorted by name for stable listings.
    pub fn types(&self) -> Vec<Arc<ConditionType>> {
        let mut all: Vec<Arc<ConditionType>> = self.kept.values().map(Arc::clone).collect();
        all.sort();
        all
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

// ------------- Condition -------------

/// One fetched value bound to a run number and a condition type.
///
/// The payload lives in a [`Value`] sum type, so only the accessor
/// checks at this boundary can fail; a wrongly typed payload cannot be
/// stored at all.
#[derive(Debug, Clone)]
pub struct Condition {
    id: DbId,
    run_number: u64,
    condition_type: Arc<ConditionType>,
    value: Value,
}

impl Condition {
    /// Wraps an already classified value, failing if its kind does not
    /// agree with the type tag.
    pub fn new(
        condition_type: Arc<ConditionType>,
        id: DbId,
        run_number: u64,
        value: Value,
    ) -> Result<Self> {
        if value.kind() != condition_type.value_type() {
            return Err(CondbError::TypeMismatch {
                expected: condition_type.value_type().as_str(),
                actual: value.kind(),
            });
        }
        Ok(Self {
            id,
            run_number,
            condition_type,
            value,
        })
    }

    /// Classifies the raw slots of a fetched row. Exactly one slot is
    /// meaningful, selected by the type tag; callers pass zero/empty
    /// values for the rest.
    #[allow(clippy::too_many_arguments)]
    pub fn from_slots(
        condition_type: Arc<ConditionType>,
        id: DbId,
        run_number: u64,
        long_slot: i64,
        bool_slot: bool,
        double_slot: f64,
        text_slot: String,
        time_slot: NaiveDateTime,
    ) -> Self {
        let value = Value::from_slots(
            condition_type.value_type(),
            long_slot,
            bool_slot,
            double_slot,
            text_slot,
            time_slot,
        );
        Self {
            id,
            run_number,
            condition_type,
            value,
        }
    }

    pub fn id(&self) -> DbId {
        self.id
    }
    pub fn run_number(&self) -> u64 {
        self.run_number
    }
    pub fn condition_type(&self) -> Arc<ConditionType> {
        Arc::clone(&self.condition_type)
    }
    pub fn name(&self) -> &str {
        self.condition_type.name()
    }
    pub fn value_type(&self) -> ValueType {
        self.condition_type.value_type()
    }
    pub fn value(&self) -> &Value {
        &self.value
    }

    fn mismatch(&self, expected: &'static str) -> CondbError {
        CondbError::TypeMismatch {
            expected,
            actual: self.value_type(),
        }
    }

    /// Returns the value as a long. Fails unless the stored kind is `Long`.
    pub fn to_long(&self) -> Result<i64> {
        match self.value {
            Value::Long(value) => Ok(value),
            _ => Err(self.mismatch("long")),
        }
    }

    /// Narrowing convenience over [`Condition::to_long`]; values outside
    /// the `i32` range are rejected rather than truncated.
    pub fn to_int(&self) -> Result<i32> {
        let value = self.to_long()?;
        i32::try_from(value).map_err(|_| CondbError::ValueOutOfRange {
            value,
            target: "i32",
        })
    }

    /// Returns the value as a boolean. A `Long` value widens, nonzero
    /// meaning true. No other kind converts.
    pub fn to_boolean(&self) -> Result<bool> {
        match self.value {
            Value::Bool(value) => Ok(value),
            Value::Long(value) => Ok(value != 0),
            _ => Err(self.mismatch("bool or long")),
        }
    }

    /// Returns the value as a double. A `Long` value widens. No other
    /// kind converts.
    pub fn to_double(&self) -> Result<f64> {
        match self.value {
            Value::Double(value) => Ok(value),
            Value::Long(value) => Ok(value as f64),
            _ => Err(self.mismatch("double or long")),
        }
    }

    /// Returns the raw text of a `Json`, `String` or `Blob` value.
    pub fn to_text(&self) -> Result<&str> {
        match &self.value {
            Value::Json(text) | Value::String(text) | Value::Blob(text) => Ok(text),
            _ => Err(self.mismatch("string, json or blob")),
        }
    }

    /// Returns the value as a point in time. Fails unless the stored
    /// kind is `Time`.
    pub fn to_time(&self) -> Result<NaiveDateTime> {
        match self.value {
            Value::Time(value) => Ok(value),
            _ => Err(self.mismatch("time")),
        }
    }

    /// Parses a `Json` value into a document.
    pub fn to_json(&self) -> Result<Json> {
        match &self.value {
            Value::Json(text) => {
                Json::from_str(text).ok_or_else(|| CondbError::MalformedJson(text.clone()))
            }
            _ => Err(self.mismatch("json")),
        }
    }
}
impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} = {} [run {}]",
            self.condition_type, self.value, self.run_number
        )
    }
}

// ------------- Directory -------------

/// A namespace node organizing type tables hierarchically.
///
/// The parent link is a non owning back reference while a directory
/// exclusively owns its children, so a dropped subtree cannot be kept
/// alive from above. Tree mutation is single writer: wiring happens once
/// while a catalog is assembled, reads come after.
#[derive(Debug)]
pub struct Directory {
    id: DbId,
    parent_id: DbId,
    name: String,
    created: NaiveDateTime,
    modified: NaiveDateTime,
    comment: String,
    parent: Mutex<Weak<Directory>>,
    subdirectories: Mutex<Vec<Arc<Directory>>>,
    full_path: Mutex<Option<String>>,
}

impl Directory {
    pub fn new(
        id: DbId,
        parent_id: DbId,
        name: String,
        created: NaiveDateTime,
        modified: NaiveDateTime,
        comment: String,
    ) -> Self {
        Self {
            id,
            parent_id,
            name,
            created,
            modified,
            comment,
            parent: Mutex::new(Weak::new()),
            subdirectories: Mutex::new(Vec::new()),
            full_path: Mutex::new(None),
        }
    }

    pub fn id(&self) -> DbId {
        self.id
    }
    pub fn parent_id(&self) -> DbId {
        self.parent_id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn created(&self) -> NaiveDateTime {
        self.created
    }
    pub fn modified(&self) -> NaiveDateTime {
        self.modified
    }
    pub fn comment(&self) -> &str {
        &self.comment
    }
    pub fn parent(&self) -> Option<Arc<Directory>> {
        self.parent.lock().unwrap().upgrade()
    }
    pub fn subdirectories(&self) -> Vec<Arc<Directory>> {
        self.subdirectories.lock().unwrap().iter().map(Arc::clone).collect()
    }

    /// Attaches a child under a parent, setting the child's back
    /// reference and appending it to the parent's owned child list. A
    /// child that is attached anywhere already is rejected; attach once
    /// is what keeps the tree acyclic without runtime cycle detection.
    pub fn add_subdirectory(parent: &Arc<Directory>, subdirectory: Arc<Directory>) -> Result<()> {
        if Arc::ptr_eq(parent, &subdirectory) {
            return Err(CondbError::AlreadyParented(subdirectory.name.clone()));
        }
        {
            let mut link = subdirectory.parent.lock().unwrap();
            if link.upgrade().is_some() {
                return Err(CondbError::AlreadyParented(subdirectory.name.clone()));
            }
            *link = Arc::downgrade(parent);
        }
        subdirectory.invalidate_paths();
        parent.subdirectories.lock().unwrap().push(subdirectory);
        Ok(())
    }

    /// Full path from the root down to this node. The root's empty name
    /// contributes nothing, so a chain root/a/b prints as "/a/b".
    /// Computed on first use and cached; attaching the node (or an
    /// ancestor of it) drops the cached value.
    pub fn full_path(&self) -> String {
        if let Some(path) = self.full_path.lock().unwrap().as_ref() {
            return path.clone();
        }
        let path = match self.parent() {
            Some(parent) => combine_path(&parent.full_path(), &self.name),
            None => self.name.clone(),
        };
        *self.full_path.lock().unwrap() = Some(path.clone());
        path
    }

    fn invalidate_paths(&self) {
        *self.full_path.lock().unwrap() = None;
        for subdirectory in self.subdirectories.lock().unwrap().iter() {
            subdirectory.invalidate_paths();
        }
    }

    /// Recursively clears the whole subtree, children before self, so
    /// that no node keeps a link into a disposed branch. Correct under
    /// manual ownership: once the child lists are empty nothing owns the
    /// disposed nodes and the weak back references cannot revive them.
    pub fn dispose_subdirectories(&self) {
        let subdirectories: Vec<Arc<Directory>> = {
            self.subdirectories.lock().unwrap().iter().map(Arc::clone).collect()
        };
        for subdirectory in &subdirectories {
            subdirectory.dispose_subdirectories();
            *subdirectory.parent.lock().unwrap() = Weak::new();
            *subdirectory.full_path.lock().unwrap() = None;
        }
        self.subdirectories.lock().unwrap().clear();
    }
}
impl fmt::Display for Directory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.full_path())
    }
}

// ------------- Variation -------------

/// A named branch in the configuration override tree.
#[derive(Debug)]
pub struct Variation {
    id: DbId,
    parent_id: DbId,
    name: String,
    parent: Mutex<Weak<Variation>>,
    children: Mutex<Vec<Arc<Variation>>>,
}

impl Variation {
    pub fn new(id: DbId, parent_id: DbId, name: String) -> Self {
        Self {
            id,
            parent_id,
            name,
            parent: Mutex::new(Weak::new()),
            children: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> DbId {
        self.id
    }
    pub fn parent_id(&self) -> DbId {
        self.parent_id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn parent(&self) -> Option<Arc<Variation>> {
        self.parent.lock().unwrap().upgrade()
    }
    pub fn children(&self) -> Vec<Arc<Variation>> {
        self.children.lock().unwrap().iter().map(Arc::clone).collect()
    }

    /// The only way a parent/child edge is created: sets the child's
    /// back reference and appends it to the parent's children. A second
    /// call on the same node is rejected, keeping the branch tree
    /// acyclic under the same attach once discipline as directories.
    pub fn set_parent(child: &Arc<Variation>, parent: &Arc<Variation>) -> Result<()> {
        if Arc::ptr_eq(child, parent) {
            return Err(CondbError::AlreadyParented(child.name.clone()));
        }
        {
            let mut link = child.parent.lock().unwrap();
            if link.upgrade().is_some() {
                return Err(CondbError::AlreadyParented(child.name.clone()));
            }
            *link = Arc::downgrade(parent);
        }
        parent.children.lock().unwrap().push(Arc::clone(child));
        Ok(())
    }
}
impl fmt::Display for Variation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ------------- TypeTable -------------

/// One column of a type table. The ordinal index defines the cell order
/// inside the flattened blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeTableColumn {
    id: DbId,
    name: String,
    index: usize,
    cell_type: CellType,
}

impl TypeTableColumn {
    pub fn new(id: DbId, name: String, index: usize, cell_type: CellType) -> Self {
        Self {
            id,
            name,
            index,
            cell_type,
        }
    }
    pub fn id(&self) -> DbId {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn index(&self) -> usize {
        self.index
    }
    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }
}

/// Column schema plus declared row count for an assignment's blob.
#[derive(Debug)]
pub struct TypeTable {
    id: DbId,
    directory: Arc<Directory>,
    name: String,
    columns: Vec<TypeTableColumn>,
    rows_count: usize,
    columns_by_name: OnceCell<HashMap<String, usize, NameHasher>>,
}

impl TypeTable {
    pub fn new(
        id: DbId,
        directory: Arc<Directory>,
        name: String,
        columns: Vec<TypeTableColumn>,
        rows_count: usize,
    ) -> Self {
        Self {
            id,
            directory,
            name,
            columns,
            rows_count,
            columns_by_name: OnceCell::new(),
        }
    }

    pub fn id(&self) -> DbId {
        self.id
    }
    pub fn directory(&self) -> Arc<Directory> {
        Arc::clone(&self.directory)
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn columns(&self) -> &[TypeTableColumn] {
        &self.columns
    }
    pub fn rows_count(&self) -> usize {
        self.rows_count
    }
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
    pub fn full_path(&self) -> String {
        combine_path(&self.directory.full_path(), &self.name)
    }

    // The name index is built on first use. Columns never change after
    // construction, so the index is never invalidated.
    fn columns_by_name(&self) -> &HashMap<String, usize, NameHasher> {
        self.columns_by_name.get_or_init(|| {
            let mut by_name: HashMap<String, usize, NameHasher> = HashMap::default();
            for (position, column) in self.columns.iter().enumerate() {
                by_name.insert(column.name().to_owned(), position);
            }
            by_name
        })
    }

    /// Looks a column up by name.
    pub fn column(&self, name: &str) -> Result<&TypeTableColumn> {
        match self.columns_by_name().get(name) {
            Some(&position) => Ok(&self.columns[position]),
            None => Err(CondbError::UnknownColumn(name.to_owned())),
        }
    }
}
impl fmt::Display for TypeTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.full_path())
    }
}

// ------------- Assignment -------------

/// One versioned dataset: a delimited blob coupled with the schema
/// describing its cells.
///
/// Tokens are row major, `flat_index = row * column_count + column`, and
/// their count must equal `rows_count * column_count`. Nothing is
/// validated at construction; each derived view checks what it needs
/// when it is first requested and is cached for the assignment's
/// lifetime. The inputs never change, so concurrent first reads can only
/// race to install the same value and every cell publishes exactly once.
#[derive(Debug)]
pub struct Assignment {
    id: DbId,
    blob: String,
    type_table: Arc<TypeTable>,
    created: NaiveDateTime,
    variation: Arc<Variation>,
    run: u64,
    decode_passes: AtomicUsize,
    flat_strings: OnceCell<Vec<String>>,
    flat_ints: OnceCell<Vec<i32>>,
    flat_longs: OnceCell<Vec<i64>>,
    flat_doubles: OnceCell<Vec<f64>>,
    flat_bools: OnceCell<Vec<bool>>,
    table_strings: OnceCell<Vec<Vec<String>>>,
    table_ints: OnceCell<Vec<Vec<i32>>>,
    table_longs: OnceCell<Vec<Vec<i64>>>,
    table_doubles: OnceCell<Vec<Vec<f64>>>,
    table_bools: OnceCell<Vec<Vec<bool>>>,
    first_row: OnceCell<HashMap<String, String, NameHasher>>,
    column_strings_memo: Mutex<HashMap<usize, Arc<Vec<String>>, IdHasher>>,
    column_ints_memo: Mutex<HashMap<usize, Arc<Vec<i32>>, IdHasher>>,
    column_longs_memo: Mutex<HashMap<usize, Arc<Vec<i64>>, IdHasher>>,
    column_doubles_memo: Mutex<HashMap<usize, Arc<Vec<f64>>, IdHasher>>,
    column_bools_memo: Mutex<HashMap<usize, Arc<Vec<bool>>, IdHasher>>,
}

impl Assignment {
    pub fn new(
        id: DbId,
        blob: String,
        type_table: Arc<TypeTable>,
        created: NaiveDateTime,
        variation: Arc<Variation>,
        run: u64,
    ) -> Self {
        Self {
            id,
            blob,
            type_table,
            created,
            variation,
            run,
            decode_passes: AtomicUsize::new(0),
            flat_strings: OnceCell::new(),
            flat_ints: OnceCell::new(),
            flat_longs: OnceCell::new(),
            flat_doubles: OnceCell::new(),
            flat_bools: OnceCell::new(),
            table_strings: OnceCell::new(),
            table_ints: OnceCell::new(),
            table_longs: OnceCell::new(),
            table_doubles: OnceCell::new(),
            table_bools: OnceCell::new(),
            first_row: OnceCell::new(),
            column_strings_memo: Mutex::new(HashMap::default()),
            column_ints_memo: Mutex::new(HashMap::default()),
            column_longs_memo: Mutex::new(HashMap::default()),
            column_doubles_memo: Mutex::new(HashMap::default()),
            column_bools_memo: Mutex::new(HashMap::default()),
        }
    }

    pub fn id(&self) -> DbId {
        self.id
    }
    pub fn blob(&self) -> &str {
        &self.blob
    }
    pub fn type_table(&self) -> Arc<TypeTable> {
        Arc::clone(&self.type_table)
    }
    pub fn created(&self) -> NaiveDateTime {
        self.created
    }
    pub fn variation(&self) -> Arc<Variation> {
        Arc::clone(&self.variation)
    }
    pub fn run(&self) -> u64 {
        self.run
    }
    pub fn row_count(&self) -> usize {
        self.type_table.rows_count()
    }
    pub fn column_count(&self) -> usize {
        self.type_table.column_count()
    }

    /// How many times the raw blob has actually been split. Stays at one
    /// however many views are pulled afterwards.
    pub fn decode_passes(&self) -> usize {
        self.decode_passes.load(AtomicOrdering::Relaxed)
    }

    /// The blob as one flat row major vector of string cells. The cell
    /// count is validated here, and everything else derives from this
    /// view, so any count mismatch surfaces on the first derived read.
    pub fn flat_strings(&self) -> Result<&[String]> {
        self.flat_strings
            .get_or_try_init(|| {
                self.decode_passes.fetch_add(1, AtomicOrdering::Relaxed);
                let cells: Vec<String> = self
                    .blob
                    .split(DATA_SEPARATOR)
                    .map(str::to_owned)
                    .collect();
                let expected = self.row_count() * self.column_count();
                if cells.len() != expected {
                    return Err(CondbError::MalformedBlob {
                        expected,
                        actual: cells.len(),
                    });
                }
                debug!(assignment = self.id, cells = cells.len(), "decoded assignment blob");
                Ok(cells)
            })
            .map(|cells| cells.as_slice())
    }

    fn parse_flat<T>(&self, parse: impl Fn(&str) -> Option<T>) -> Result<Vec<T>> {
        let cells = self.flat_strings()?;
        let columns = self.column_count();
        let mut parsed = Vec::with_capacity(cells.len());
        for (position, token) in cells.iter().enumerate() {
            match parse(token) {
                Some(value) => parsed.push(value),
                None => {
                    return Err(CondbError::CellParse {
                        row: position / columns,
                        column: position % columns,
                        token: token.clone(),
                    });
                }
            }
        }
        Ok(parsed)
    }

    /// The blob as one flat vector of ints. The whole call fails on the
    /// first cell that does not parse; no partial result is handed out.
    pub fn flat_ints(&self) -> Result<&[i32]> {
        self.flat_ints
            .get_or_try_init(|| self.parse_flat(|token| token.parse::<i32>().ok()))
            .map(|cells| cells.as_slice())
    }

    /// The blob as one flat vector of longs.
    pub fn flat_longs(&self) -> Result<&[i64]> {
        self.flat_longs
            .get_or_try_init(|| self.parse_flat(|token| token.parse::<i64>().ok()))
            .map(|cells| cells.as_slice())
    }

    /// The blob as one flat vector of doubles.
    pub fn flat_doubles(&self) -> Result<&[f64]> {
        self.flat_doubles
            .get_or_try_init(|| self.parse_flat(|token| token.parse::<f64>().ok()))
            .map(|cells| cells.as_slice())
    }

    /// The blob as one flat vector of booleans.
    pub fn flat_bools(&self) -> Result<&[bool]> {
        self.flat_bools
            .get_or_try_init(|| self.parse_flat(parse_bool_token))
            .map(|cells| cells.as_slice())
    }

    fn reshape<T: Clone>(cells: &[T], columns: usize) -> Vec<Vec<T>> {
        if columns == 0 {
            return Vec::new();
        }
        cells.chunks(columns).map(|row| row.to_vec()).collect()
    }

    /// The blob reshaped into rows of string cells.
    pub fn table_strings(&self) -> Result<&Vec<Vec<String>>> {
        self.table_strings
            .get_or_try_init(|| Ok(Self::reshape(self.flat_strings()?, self.column_count())))
    }

    /// The blob reshaped into rows of ints.
    pub fn table_ints(&self) -> Result<&Vec<Vec<i32>>> {
        self.table_ints
            .get_or_try_init(|| Ok(Self::reshape(self.flat_ints()?, self.column_count())))
    }

    /// The blob reshaped into rows of longs.
    pub fn table_longs(&self) -> Result<&Vec<Vec<i64>>> {
        self.table_longs
            .get_or_try_init(|| Ok(Self::reshape(self.flat_longs()?, self.column_count())))
    }

    /// The blob reshaped into rows of doubles.
    pub fn table_doubles(&self) -> Result<&Vec<Vec<f64>>> {
        self.table_doubles
            .get_or_try_init(|| Ok(Self::reshape(self.flat_doubles()?, self.column_count())))
    }

    /// The blob reshaped into rows of booleans.
    pub fn table_bools(&self) -> Result<&Vec<Vec<bool>>> {
        self.table_bools
            .get_or_try_init(|| Ok(Self::reshape(self.flat_bools()?, self.column_count())))
    }

    /// Column name to the matching cell of row 0. Only the first row is
    /// mapped; multi row tables use the table or column views instead.
    pub fn first_row_map(&self) -> Result<&HashMap<String, String, NameHasher>> {
        self.first_row.get_or_try_init(|| {
            let cells = self.flat_strings()?;
            let mut mapped: HashMap<String, String, NameHasher> = HashMap::default();
            for column in self.type_table.columns() {
                let cell = cells.get(column.index()).ok_or(CondbError::ColumnIndexOutOfRange {
                    index: column.index(),
                    count: self.column_count(),
                })?;
                mapped.insert(column.name().to_owned(), cell.clone());
            }
            Ok(mapped)
        })
    }

    fn extract_column<T>(&self, index: usize, parse: impl Fn(&str) -> Option<T>) -> Result<Vec<T>> {
        let columns = self.column_count();
        if index >= columns {
            return Err(CondbError::ColumnIndexOutOfRange {
                index,
                count: columns,
            });
        }
        let cells = self.flat_strings()?;
        let mut extracted = Vec::with_capacity(self.row_count());
        for row in 0..self.row_count() {
            let token = &cells[row * columns + index];
            match parse(token) {
                Some(value) => extracted.push(value),
                None => {
                    return Err(CondbError::CellParse {
                        row,
                        column: index,
                        token: token.clone(),
                    });
                }
            }
        }
        Ok(extracted)
    }

    fn cached_column<T>(
        &self,
        memo: &Mutex<HashMap<usize, Arc<Vec<T>>, IdHasher>>,
        index: usize,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<Arc<Vec<T>>> {
        if let Some(cached) = memo.lock().unwrap().get(&index) {
            return Ok(Arc::clone(cached));
        }
        // computed outside the lock; whoever installs first wins and
        // every caller sees the installed vector
        let extracted = Arc::new(self.extract_column(index, parse)?);
        let mut memo = memo.lock().unwrap();
        let published = memo.entry(index).or_insert(extracted);
        Ok(Arc::clone(published))
    }

    /// All cells of one column, resolved by name through the table schema.
    pub fn column_strings(&self, name: &str) -> Result<Arc<Vec<String>>> {
        let column = self.type_table.column(name)?;
        self.column_strings_at(column.index())
    }

    /// All cells of one column, by ordinal.
    pub fn column_strings_at(&self, index: usize) -> Result<Arc<Vec<String>>> {
        self.cached_column(&self.column_strings_memo, index, |token| {
            Some(token.to_owned())
        })
    }

    /// All cells of one column as ints, resolved by name. Only the
    /// requested column is parsed, so sibling columns of another kind do
    /// not get in the way.
    pub fn column_ints(&self, name: &str) -> Result<Arc<Vec<i32>>> {
        let column = self.type_table.column(name)?;
        self.column_ints_at(column.index())
    }

    /// All cells of one column as ints, by ordinal.
    pub fn column_ints_at(&self, index: usize) -> Result<Arc<Vec<i32>>> {
        self.cached_column(&self.column_ints_memo, index, |token| {
            token.parse::<i32>().ok()
        })
    }

    /// All cells of one column as longs, resolved by name.
    pub fn column_longs(&self, name: &str) -> Result<Arc<Vec<i64>>> {
        let column = self.type_table.column(name)?;
        self.column_longs_at(column.index())
    }

    /// All cells of one column as longs, by ordinal.
    pub fn column_longs_at(&self, index: usize) -> Result<Arc<Vec<i64>>> {
        self.cached_column(&self.column_longs_memo, index, |token| {
            token.parse::<i64>().ok()
        })
    }

    /// All cells of one column as doubles, resolved by name.
    pub fn column_doubles(&self, name: &str) -> Result<Arc<Vec<f64>>> {
        let column = self.type_table.column(name)?;
        self.column_doubles_at(column.index())
    }

    /// All cells of one column as doubles, by ordinal.
    pub fn column_doubles_at(&self, index: usize) -> Result<Arc<Vec<f64>>> {
        self.cached_column(&self.column_doubles_memo, index, |token| {
            token.parse::<f64>().ok()
        })
    }

    /// All cells of one column as booleans, resolved by name.
    pub fn column_bools(&self, name: &str) -> Result<Arc<Vec<bool>>> {
        let column = self.type_table.column(name)?;
        self.column_bools_at(column.index())
    }

    /// All cells of one column as booleans, by ordinal.
    pub fn column_bools_at(&self, index: usize) -> Result<Arc<Vec<bool>>> {
        self.cached_column(&self.column_bools_memo, index, parse_bool_token)
    }
}

// ------------- Catalog -------------

/// One fully fetched client model: the condition type catalog plus the
/// directory and variation trees.
///
/// Assembly follows the way the fetch layer delivers rows: every node is
/// kept first, then one linking pass wires children to parents through
/// their parent ids. The pass runs once; reads are free afterwards.
pub struct Catalog {
    condition_types: Mutex<ConditionTypeKeeper>,
    root: Arc<Directory>,
    directories: Mutex<HashMap<DbId, Arc<Directory>, IdHasher>>,
    variations: Mutex<HashMap<DbId, Arc<Variation>, IdHasher>>,
    variations_by_name: Mutex<HashMap<String, Arc<Variation>, NameHasher>>,
    directories_by_path: OnceCell<HashMap<String, Arc<Directory>, NameHasher>>,
}

impl Catalog {
    pub fn new() -> Self {
        let root = Arc::new(Directory::new(
            ROOT_DIRECTORY_ID,
            ROOT_DIRECTORY_ID,
            String::new(),
            NaiveDateTime::default(),
            NaiveDateTime::default(),
            String::new(),
        ));
        Self {
            condition_types: Mutex::new(ConditionTypeKeeper::new()),
            root,
            directories: Mutex::new(HashMap::default()),
            variations: Mutex::new(HashMap::default()),
            variations_by_name: Mutex::new(HashMap::default()),
            directories_by_path: OnceCell::new(),
        }
    }

    /// The synthetic root directory every top level directory hangs off.
    pub fn root(&self) -> Arc<Directory> {
        Arc::clone(&self.root)
    }

    pub fn keep_condition_type(&self, condition_type: ConditionType) -> (Arc<ConditionType>, bool) {
        self.condition_types.lock().unwrap().keep(condition_type)
    }
    pub fn condition_type(&self, name: &str) -> Option<Arc<ConditionType>> {
        self.condition_types.lock().unwrap().get(name)
    }
    pub fn condition_type_by_id(&self, id: DbId) -> Option<Arc<ConditionType>> {
        self.condition_types.lock().unwrap().lookup(id)
    }
    pub fn condition_types(&self) -> Vec<Arc<ConditionType>> {
        self.condition_types.lock().unwrap().types()
    }

    pub fn keep_directory(&self, directory: Directory) -> (Arc<Directory>, bool) {
        let mut directories = self.directories.lock().unwrap();
        match directories.entry(directory.id()) {
            Entry::Vacant(e) => (Arc::clone(e.insert(Arc::new(directory))), false),
            Entry::Occupied(e) => (Arc::clone(e.get()), true),
        }
    }
    pub fn directory(&self, id: DbId) -> Option<Arc<Directory>> {
        self.directories.lock().unwrap().get(&id).map(Arc::clone)
    }

    pub fn keep_variation(&self, variation: Variation) -> (Arc<Variation>, bool) {
        let mut variations = self.variations.lock().unwrap();
        match variations.entry(variation.id()) {
            Entry::Vacant(e) => {
                let kept = Arc::clone(e.insert(Arc::new(variation)));
                self.variations_by_name
                    .lock()
                    .unwrap()
                    .insert(kept.name().to_owned(), Arc::clone(&kept));
                (kept, false)
            }
            Entry::Occupied(e) => (Arc::clone(e.get()), true),
        }
    }
    pub fn variation(&self, id: DbId) -> Option<Arc<Variation>> {
        self.variations.lock().unwrap().get(&id).map(Arc::clone)
    }
    pub fn variation_by_name(&self, name: &str) -> Option<Arc<Variation>> {
        self.variations_by_name.lock().unwrap().get(name).map(Arc::clone)
    }

    /// Wires every kept directory to its parent, in id order for a
    /// stable child ordering. Runs once, after all rows are kept; a node
    /// pointing at a missing parent fails the pass.
    pub fn link_directories(&self) -> Result<()> {
        let mut kept: Vec<Arc<Directory>> = {
            self.directories.lock().unwrap().values().map(Arc::clone).collect()
        };
        kept.sort_by_key(|directory| directory.id());
        for directory in &kept {
            let parent = if directory.parent_id() == ROOT_DIRECTORY_ID {
                Arc::clone(&self.root)
            } else {
                self.directory(directory.parent_id()).ok_or_else(|| {
                    CondbError::UnknownParent {
                        child: directory.name().to_owned(),
                        parent_id: directory.parent_id(),
                    }
                })?
            };
            Directory::add_subdirectory(&parent, Arc::clone(directory))?;
        }
        debug!(count = kept.len(), "linked directory tree");
        Ok(())
    }

    /// Wires every kept variation to its parent. Variations with parent
    /// id 0 are branch roots and stay unparented.
    pub fn link_variations(&self) -> Result<()> {
        let mut kept: Vec<Arc<Variation>> = {
            self.variations.lock().unwrap().values().map(Arc::clone).collect()
        };
        kept.sort_by_key(|variation| variation.id());
        for variation in &kept {
            if variation.parent_id() == 0 {
                continue;
            }
            let parent = self.variation(variation.parent_id()).ok_or_else(|| {
                CondbError::UnknownParent {
                    child: variation.name().to_owned(),
                    parent_id: variation.parent_id(),
                }
            })?;
            Variation::set_parent(variation, &parent)?;
        }
        debug!(count = kept.len(), "linked variation tree");
        Ok(())
    }

    /// Full path lookup over the assembled tree. The index is built on
    /// first use, so it is only meaningful once linking is done.
    pub fn directory_by_path(&self, path: &str) -> Option<Arc<Directory>> {
        self.directories_by_path
            .get_or_init(|| {
                let directories = self.directories.lock().unwrap();
                let mut by_path: HashMap<String, Arc<Directory>, NameHasher> = HashMap::default();
                for directory in directories.values() {
                    by_path.insert(directory.full_path(), Arc::clone(directory));
                }
                by_path
            })
            .get(path)
            .map(Arc::clone)
    }
}
