//! Condb – a read-only client data model for a conditions/calibration database.
//!
//! The model mirrors what the database hands a client after a fetch:
//! * A [`construct::ConditionType`] names one condition and fixes its value kind.
//! * A [`construct::Condition`] binds one typed value to a run number, with
//!   conversion accessors that refuse incompatible kinds instead of defaulting.
//! * [`construct::Directory`] nodes form the namespace tree type tables live in.
//! * A [`construct::Variation`] names a branch in the configuration override tree.
//! * A [`construct::TypeTable`] describes the columns and row count of a dataset.
//! * An [`construct::Assignment`] couples a delimited blob with its table schema
//!   and decodes it into typed flat, row wise and per column views on demand.
//!
//! These constructs are shared through `Arc` and deduplicated by "keeper"
//! structures (see the `construct` module), with an assembled
//! [`construct::Catalog`] wiring keepers and trees together the way the fetch
//! layer delivers rows: keep every node first, link parents once afterwards.
//!
//! ## Modules
//! * [`construct`] – model constructs, keepers, trees and the [`construct::Catalog`].
//! * [`datatype`] – the closed value vocabulary ([`datatype::ValueType`],
//!   [`datatype::CellType`]) and the [`datatype::Value`] sum type.
//! * [`request`] – parsing of `path:run:variation:time` request strings.
//! * [`configfile`] – parsing of sectioned config file content fetched as
//!   condition values.
//! * [`error`] – the crate wide error enum and `Result` alias.
//!
//! ## Ownership
//! Parent links in the directory and variation trees are non owning back
//! references while children are owned collections, so the trees stay free of
//! reference cycles and a disposed subtree cannot be revived from above.
//!
//! ## Laziness
//! Every derived structure – full paths, the column name index, each typed
//! view of an assignment blob – is computed on first use and installed in a
//! compute once cell. The underlying inputs never mutate after construction,
//! which is what makes the publish once discipline sufficient even for
//! concurrent first reads.
//!
//! ## Boundaries
//! The crate performs no I/O. Connectivity, SQL and retry policy live in the
//! fetch layer that produces the plain field tuples this model is built from,
//! and every decode failure surfaces as a recoverable [`error::CondbError`]
//! to the immediate caller.
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use chrono::NaiveDateTime;
//! use condb::construct::{Assignment, Catalog, Directory, TypeTable, TypeTableColumn, Variation};
//! use condb::datatype::CellType;
//!
//! let catalog = Catalog::new();
//! let (daq, _) = catalog.keep_directory(Directory::new(
//!     1, 0, "daq".to_string(),
//!     NaiveDateTime::default(), NaiveDateTime::default(), String::new(),
//! ));
//! catalog.link_directories().unwrap();
//!
//! let table = Arc::new(TypeTable::new(
//!     5, daq, "thresholds".to_string(),
//!     vec![
//!         TypeTableColumn::new(1, "channel".to_string(), 0, CellType::Int),
//!         TypeTableColumn::new(2, "value".to_string(), 1, CellType::Double),
//!     ],
//!     2,
//! ));
//! assert_eq!(table.full_path(), "/daq/thresholds");
//!
//! let variation = Arc::new(Variation::new(1, 0, "default".to_string()));
//! let assignment = Assignment::new(
//!     77, "0|1.5|1|2.5".to_string(), Arc::clone(&table),
//!     NaiveDateTime::default(), variation, 1000,
//! );
//! assert_eq!(assignment.table_strings().unwrap().len(), 2);
//! assert_eq!(*assignment.column_doubles("value").unwrap(), vec![1.5, 2.5]);
//! ```

pub mod configfile;
pub mod construct;
pub mod datatype;
pub mod error;
pub mod request;
