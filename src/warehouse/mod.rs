//! Warehouse support via DuckDB
//!
//! The embedded analytical database the pipeline loads into and dashboards
//! read from.

mod engine;

pub use engine::{
    validate_identifier, validate_table_name, LoadLedgerEntry, Warehouse, LOADS_TABLE,
};
