//! Read-time normalization of retired field values.
//!
//! A [`MigrationTable`] is keyed by structured type identifier. Each
//! [`FieldMigration`] names one enumerated field by path and maps retired
//! labels to their current replacement. Only string leaves at that exact
//! path are rewritten, so free text elsewhere in a record is left alone.
//!
//! Paths are dot-separated field names; a `[]` suffix visits every element
//! of a list:
//!
//! ```
//! use graphstate_core::migration::{FieldMigration, MigrationTable};
//! use serde_json::json;
//!
//! let table = MigrationTable::builder()
//!     .rule(
//!         "tutor.Session",
//!         FieldMigration::at("history[].category")
//!             .retire("concept", "explanation")
//!             .retire("theory", "explanation"),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let migrated = table.migrate(
//!     "tutor.Session",
//!     json!({"history": [{"category": "theory", "text": "theory of joins"}]}),
//! );
//! assert_eq!(migrated.rewrites, 1);
//! assert_eq!(migrated.data["history"][0]["category"], "explanation");
//! assert_eq!(migrated.data["history"][0]["text"], "theory of joins");
//! ```

use std::collections::{BTreeMap, HashMap};

use crate::error::MigrationError;
use crate::value::JsonValue;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Field(String),
    Each,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMigration {
    path: String,
    retired: BTreeMap<String, String>,
}

impl FieldMigration {
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            retired: BTreeMap::new(),
        }
    }

    pub fn retire(mut self, label: impl Into<String>, current: impl Into<String>) -> Self {
        self.retired.insert(label.into(), current.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Debug, Clone)]
struct CompiledMigration {
    steps: Vec<Step>,
    retired: BTreeMap<String, String>,
}

impl CompiledMigration {
    fn compile(type_id: &str, migration: FieldMigration) -> Result<Self, MigrationError> {
        let steps = parse_path(type_id, &migration.path)?;

        for current in migration.retired.values() {
            if migration.retired.contains_key(current) {
                return Err(MigrationError::ChainedRewrite {
                    type_id: type_id.to_string(),
                    path: migration.path.clone(),
                    label: current.clone(),
                });
            }
        }

        Ok(Self {
            steps,
            retired: migration.retired,
        })
    }

    fn apply(&self, data: &mut JsonValue) -> usize {
        rewrite(&self.steps, &self.retired, data)
    }
}

fn parse_path(type_id: &str, path: &str) -> Result<Vec<Step>, MigrationError> {
    if path.trim().is_empty() {
        return Err(MigrationError::EmptyPath {
            type_id: type_id.to_string(),
        });
    }

    let mut steps = Vec::new();
    for segment in path.split('.') {
        let (name, each) = match segment.strip_suffix("[]") {
            Some(name) => (name, true),
            None => (segment, false),
        };
        if name.is_empty() {
            return Err(MigrationError::EmptySegment {
                path: path.to_string(),
            });
        }
        steps.push(Step::Field(name.to_string()));
        if each {
            steps.push(Step::Each);
        }
    }
    Ok(steps)
}

fn rewrite(steps: &[Step], retired: &BTreeMap<String, String>, node: &mut JsonValue) -> usize {
    match steps.split_first() {
        None => match node {
            JsonValue::String(label) => match retired.get(label.as_str()) {
                Some(current) => {
                    *label = current.clone();
                    1
                }
                None => 0,
            },
            _ => 0,
        },
        Some((Step::Field(name), rest)) => {
            match node.as_object_mut().and_then(|map| map.get_mut(name)) {
                Some(child) => rewrite(rest, retired, child),
                None => 0,
            }
        }
        Some((Step::Each, rest)) => match node {
            JsonValue::Array(items) => items
                .iter_mut()
                .map(|item| rewrite(rest, retired, item))
                .sum(),
            _ => 0,
        },
    }
}

/// Result of migrating one record's field data.
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    pub data: JsonValue,
    pub rewrites: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MigrationTable {
    rules: HashMap<String, Vec<CompiledMigration>>,
}

impl MigrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> MigrationTableBuilder {
        MigrationTableBuilder::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn covers(&self, type_id: &str) -> bool {
        self.rules.contains_key(type_id)
    }

    /// Applies every rule registered for `type_id`. Pure and idempotent.
    pub fn migrate(&self, type_id: &str, data: JsonValue) -> Migrated {
        let mut data = data;
        let rewrites = match self.rules.get(type_id) {
            Some(rules) => rules.iter().map(|rule| rule.apply(&mut data)).sum(),
            None => 0,
        };

        if rewrites > 0 {
            tracing::debug!(type_id = %type_id, rewrites, "normalized retired field values");
        }

        Migrated { data, rewrites }
    }
}

#[derive(Debug, Default)]
pub struct MigrationTableBuilder {
    pending: Vec<(String, FieldMigration)>,
}

impl MigrationTableBuilder {
    pub fn rule(mut self, type_id: impl Into<String>, migration: FieldMigration) -> Self {
        self.pending.push((type_id.into(), migration));
        self
    }

    pub fn build(self) -> Result<MigrationTable, MigrationError> {
        let mut rules: HashMap<String, Vec<CompiledMigration>> = HashMap::new();
        for (type_id, migration) in self.pending {
            let compiled = CompiledMigration::compile(&type_id, migration)?;
            rules.entry(type_id).or_default().push(compiled);
        }
        Ok(MigrationTable { rules })
    }
}
