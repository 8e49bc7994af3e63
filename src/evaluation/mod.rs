//! Holdout evaluation of freshly trained models.

pub mod domain;
pub mod service;

pub use domain::{Confusion, EvalReport};
