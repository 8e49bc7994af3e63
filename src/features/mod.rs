//! Feature schema and encoding shared by training and serving.

pub mod encoder;
pub mod schema;

pub use encoder::{encode, EncodedVector};
pub use schema::{BoolSpellings, ColumnDecl, ColumnKind, ColumnSpec, Declarations, Schema};
