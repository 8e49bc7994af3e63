//! Fixtures shared by unit tests.

use std::collections::BTreeMap;

use crate::features::schema::{BoolSpellings, ColumnKind, ColumnSpec, Schema};
use crate::training::domain::{Artifact, Model, TrainConfig};
use crate::training::logistic::LogisticModel;

/// `[gender: Categorical, jaundice: Boolean, age: Numeric >= 0]`.
pub fn screening_schema(gender_vocab: &[&str]) -> Schema {
    let columns = vec![
        ColumnSpec {
            name: "gender".into(),
            kind: ColumnKind::Categorical,
        },
        ColumnSpec {
            name: "jaundice".into(),
            kind: ColumnKind::Boolean(BoolSpellings::default()),
        },
        ColumnSpec {
            name: "age".into(),
            kind: ColumnKind::Numeric {
                min: Some(0.0),
                max: None,
            },
        },
    ];
    let mut vocabs = BTreeMap::new();
    vocabs.insert(
        "gender".to_string(),
        gender_vocab.iter().map(|s| s.to_string()).collect(),
    );
    Schema::new(columns, vocabs).unwrap()
}

/// Hand-built artifact. Even versions reverse the gender vocabulary and all
/// versions carry different weights, so mixing two of them is observable.
pub fn sample_artifact(version: u64) -> Artifact {
    let vocab: &[&str] = if version % 2 == 0 { &["f", "m"] } else { &["m", "f"] };
    let v = version as f64;
    Artifact {
        version,
        created_ms: 0,
        schema: screening_schema(vocab).with_version(version),
        model: Model::Logistic(LogisticModel {
            means: vec![0.0; 3],
            scales: vec![1.0; 3],
            weights: vec![0.8 * v, 1.5, -0.02 * v],
            bias: -0.1,
        }),
        threshold: 0.5,
        config: TrainConfig::default(),
        evaluation: None,
    }
}
