//! # DDL Compiler
//!
//! Turns an (enriched) schema into warehouse DDL. Two independent modes:
//!
//! - `create`: a full `CREATE OR REPLACE TABLE` with nested `STRUCT<...>`
//!   and `ARRAY<...>` column types and per-column description options
//! - `alter`: `ALTER TABLE` statements that only push descriptions onto an
//!   existing table (top-level scalar columns only)
//!
//! Both modes drop empty RECORDs first via [`filter::filter_empty_structs`].

pub mod compile;
pub mod escape;
pub mod filter;

pub use compile::{compile, compile_with_mode_str, DdlMode};
