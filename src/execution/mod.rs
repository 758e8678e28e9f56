//! SQL execution against the DuckDB store

pub mod duckdb_engine;
pub mod result;

pub use duckdb_engine::Database;
pub use result::{ExecutionOutcome, ResultTable};
