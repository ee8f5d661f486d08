// src/process/mod.rs
//! Reshaping pipeline: raw spreadsheet/CSV tables in, Year-keyed tables out.

pub mod adapters;
pub mod aggregate;
pub mod derive;
pub mod export;
pub mod mappings;
pub mod normalized;
pub mod raw_table;
pub mod readers;
pub mod utils;

pub use normalized::{GroupedTable, JoinKind, Key, KeyShape, NormalizedTable};
pub use raw_table::{RawTable, Value};
