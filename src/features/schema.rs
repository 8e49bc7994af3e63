//! Feature schema: the single authority on column set, column order and
//! categorical vocabularies.
//!
//! A schema is derived once from the training data and then only ever read.
//! Vocabulary order is fixed at derivation: an explicitly declared vocabulary
//! keeps its declared order, otherwise distinct observed values are sorted
//! lexicographically (byte order). Re-deriving from the same dataset and
//! declarations therefore always yields the same schema.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::common::error::SchemaError;
use crate::data::domain::{Dataset, RawValue};

/// Closed set of literal spellings accepted for a boolean column.
///
/// Matching trims the raw value and ignores ASCII case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoolSpellings {
    pub truthy: Vec<String>,
    pub falsy: Vec<String>,
}

impl Default for BoolSpellings {
    fn default() -> Self {
        Self {
            truthy: ["yes", "y", "1", "true"].map(String::from).to_vec(),
            falsy: ["no", "n", "0", "false"].map(String::from).to_vec(),
        }
    }
}

impl BoolSpellings {
    pub fn new<S: AsRef<str>>(truthy: &[S], falsy: &[S]) -> Self {
        Self {
            truthy: truthy.iter().map(|s| s.as_ref().to_string()).collect(),
            falsy: falsy.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// Map a raw value onto `true`/`false`, or `None` when it is not an accepted spelling.
    pub fn parse(&self, value: &RawValue) -> Option<bool> {
        let text = value.canonical();
        if self.truthy.iter().any(|t| t.eq_ignore_ascii_case(&text)) {
            Some(true)
        } else if self.falsy.iter().any(|f| f.eq_ignore_ascii_case(&text)) {
            Some(false)
        } else {
            None
        }
    }
}

/// Declared kind of a column as stored in the schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnKind {
    /// Inclusive plausible range; unbounded sides are `None`.
    Numeric {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Boolean(BoolSpellings),
    /// Vocabulary lives in [`Schema::vocabulary`].
    Categorical,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// Training-time declaration for a column. Columns without one are numeric.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ColumnDecl {
    Numeric {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Boolean {
        #[serde(default = "default_truthy")]
        truthy: Vec<String>,
        #[serde(default = "default_falsy")]
        falsy: Vec<String>,
    },
    Categorical {
        #[serde(default)]
        vocabulary: Option<Vec<String>>,
    },
}

fn default_truthy() -> Vec<String> {
    BoolSpellings::default().truthy
}

fn default_falsy() -> Vec<String> {
    BoolSpellings::default().falsy
}

impl ColumnDecl {
    pub fn numeric_range(min: Option<f64>, max: Option<f64>) -> Self {
        ColumnDecl::Numeric { min, max }
    }

    /// Boolean column with the default yes/no spellings.
    pub fn boolean() -> Self {
        let BoolSpellings { truthy, falsy } = BoolSpellings::default();
        ColumnDecl::Boolean { truthy, falsy }
    }

    /// Categorical column whose vocabulary is taken from the data.
    pub fn categorical() -> Self {
        ColumnDecl::Categorical { vocabulary: None }
    }

    /// Categorical column with a fixed vocabulary order.
    pub fn categorical_with<S: AsRef<str>>(vocabulary: &[S]) -> Self {
        ColumnDecl::Categorical {
            vocabulary: Some(vocabulary.iter().map(|s| s.as_ref().to_string()).collect()),
        }
    }
}

/// Column declarations keyed by column name.
pub type Declarations = BTreeMap<String, ColumnDecl>;

/// Immutable description of the model's input columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    version: u64,
    columns: Vec<ColumnSpec>,
    vocabularies: BTreeMap<String, Vec<String>>,
}

impl Schema {
    /// Build a schema from explicit parts. The version starts at 1.
    pub fn new(
        columns: Vec<ColumnSpec>,
        vocabularies: BTreeMap<String, Vec<String>>,
    ) -> Result<Self, SchemaError> {
        let schema = Self {
            version: 1,
            columns,
            vocabularies,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Derive a schema from `dataset`, whose header order becomes the column order.
    pub fn derive(dataset: &Dataset, declarations: &Declarations) -> Result<Self, SchemaError> {
        if let Some(name) = declarations.keys().find(|name| !dataset.has_column(name)) {
            return Err(SchemaError::MissingColumn(name.clone()));
        }

        let mut columns = Vec::with_capacity(dataset.columns().len());
        let mut vocabularies = BTreeMap::new();

        for name in dataset.columns() {
            let decl = declarations
                .get(name)
                .cloned()
                .unwrap_or(ColumnDecl::Numeric { min: None, max: None });

            let kind = match decl {
                ColumnDecl::Numeric { min, max } => {
                    for (_, value) in dataset.column_values(name) {
                        if !value.as_number().is_some_and(f64::is_finite) {
                            return Err(SchemaError::AmbiguousType {
                                column: name.clone(),
                                value: value.to_string(),
                            });
                        }
                    }
                    ColumnKind::Numeric { min, max }
                }
                ColumnDecl::Boolean { truthy, falsy } => {
                    ColumnKind::Boolean(BoolSpellings { truthy, falsy })
                }
                ColumnDecl::Categorical { vocabulary } => {
                    let observed: BTreeSet<String> = dataset
                        .column_values(name)
                        .map(|(_, v)| v.canonical())
                        .collect();
                    let vocab = match vocabulary {
                        Some(declared) => {
                            let mut vocab: Vec<String> = Vec::with_capacity(declared.len());
                            for category in declared {
                                if !vocab.contains(&category) {
                                    vocab.push(category);
                                }
                            }
                            if let Some(unknown) = observed.iter().find(|v| !vocab.contains(v)) {
                                return Err(SchemaError::UnknownCategory {
                                    column: name.clone(),
                                    value: unknown.clone(),
                                });
                            }
                            vocab
                        }
                        None => observed.into_iter().collect(),
                    };
                    vocabularies.insert(name.clone(), vocab);
                    ColumnKind::Categorical
                }
            };

            columns.push(ColumnSpec {
                name: name.clone(),
                kind,
            });
        }

        Self::new(columns, vocabularies)
    }

    /// Check the structural invariants. Called on construction and after loading.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for (idx, spec) in self.columns.iter().enumerate() {
            if self.columns[..idx].iter().any(|c| c.name == spec.name) {
                return Err(SchemaError::DuplicateColumn(spec.name.clone()));
            }
            if spec.kind == ColumnKind::Categorical {
                let distinct = self.vocabularies.get(&spec.name).map_or(0, Vec::len);
                if distinct < 2 {
                    return Err(SchemaError::EmptyVocabulary {
                        column: spec.name.clone(),
                        distinct,
                    });
                }
            }
        }
        if let Some(orphan) = self.vocabularies.keys().find(|name| {
            !self
                .columns
                .iter()
                .any(|c| &c.name == *name && c.kind == ColumnKind::Categorical)
        }) {
            return Err(SchemaError::MissingColumn(orphan.clone()));
        }
        Ok(())
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Same schema under a different version number.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Column names in model input order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn vocabulary(&self, column: &str) -> Option<&[String]> {
        self.vocabularies.get(column).map(Vec::as_slice)
    }

    /// Stable integer code of `category` within `column`'s vocabulary.
    ///
    /// Fails with `MissingColumn` when `column` is not categorical.
    pub fn code_for(&self, column: &str, category: &str) -> Result<usize, SchemaError> {
        let vocab = self
            .vocabularies
            .get(column)
            .ok_or_else(|| SchemaError::MissingColumn(column.to_string()))?;
        vocab
            .iter()
            .position(|c| c == category)
            .ok_or_else(|| SchemaError::UnknownCategory {
                column: column.to_string(),
                value: category.to_string(),
            })
    }

    /// CRC32 over the canonical JSON of columns and vocabularies, ignoring the version.
    pub fn fingerprint(&self) -> u32 {
        #[derive(Serialize)]
        struct Shape<'a> {
            columns: &'a [ColumnSpec],
            vocabularies: &'a BTreeMap<String, Vec<String>>,
        }
        let shape = Shape {
            columns: &self.columns,
            vocabularies: &self.vocabularies,
        };
        // Serialising plain structs and string maps cannot fail.
        let bytes = serde_json::to_vec(&shape).unwrap_or_default();
        crc32fast::hash(&bytes)
    }
}
