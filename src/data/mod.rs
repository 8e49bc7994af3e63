//! Data domain: raw records and tabular datasets.

pub mod domain;
pub mod repo_fs;

pub use domain::{Dataset, RawRecord, RawValue};
