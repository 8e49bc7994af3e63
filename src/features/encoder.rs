//! Record encoder: raw field values to a fixed-length numeric vector.
//!
//! Position `i` of the output always corresponds to `schema.columns()[i]`.
//! Keys not declared by the schema are ignored; a declared key that is absent
//! is an error, never a default.

use crate::common::error::{EncodingError, SchemaError};
use crate::data::domain::{RawRecord, RawValue};

use super::schema::{ColumnKind, ColumnSpec, Schema};

/// Numeric model input for one record.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedVector(Vec<f64>);

impl EncodedVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Encode `record` under `schema`.
pub fn encode(record: &RawRecord, schema: &Schema) -> Result<EncodedVector, EncodingError> {
    schema
        .columns()
        .iter()
        .map(|spec| {
            let value = record
                .get(&spec.name)
                .ok_or_else(|| EncodingError::MissingField(spec.name.clone()))?;
            encode_value(spec, value, schema)
        })
        .collect::<Result<Vec<_>, _>>()
        .map(EncodedVector)
}

fn encode_value(spec: &ColumnSpec, value: &RawValue, schema: &Schema) -> Result<f64, EncodingError> {
    let invalid = |reason: &'static str| EncodingError::InvalidValue {
        column: spec.name.clone(),
        value: value.to_string(),
        reason,
    };

    match &spec.kind {
        ColumnKind::Numeric { min, max } => {
            let n = match value {
                RawValue::Bool(_) => None,
                other => other.as_number(),
            }
            .filter(|n| n.is_finite())
            .ok_or_else(|| invalid("not a finite number"))?;
            if min.is_some_and(|lo| n < lo) {
                return Err(invalid("below the declared minimum"));
            }
            if max.is_some_and(|hi| n > hi) {
                return Err(invalid("above the declared maximum"));
            }
            Ok(n)
        }
        ColumnKind::Boolean(spellings) => spellings
            .parse(value)
            .map(|b| if b { 1.0 } else { 0.0 })
            .ok_or_else(|| invalid("not an accepted boolean spelling")),
        ColumnKind::Categorical => match schema.code_for(&spec.name, &value.canonical()) {
            Ok(code) => Ok(code as f64),
            Err(SchemaError::UnknownCategory { column, value }) => {
                Err(EncodingError::UnknownCategory { column, value })
            }
            Err(_) => Err(invalid("column has no vocabulary")),
        },
    }
}
