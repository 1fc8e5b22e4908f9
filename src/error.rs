//! per-record validation errors
//!
//! a bad record is skipped, counted and logged; it never aborts a refresh.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReadingError {
    #[error("record is not a sensor object: {0}")]
    Undecodable(String),

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{0}' is not a finite number")]
    NonFinite(&'static str),

    #[error("field '{field}' out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}
