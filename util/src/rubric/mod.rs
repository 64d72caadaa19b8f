//! Rubric data model.
//!
//! A [`Rubric`] is an ordered list of [`Rule`]s. It is loaded once, validated
//! by the marker, and then shared read-only across every submission graded
//! against it.

pub mod rule;

pub use rule::*;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::document::{self, DocumentError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl Rubric {
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            name: name.into(),
            description: None,
            rules,
            metadata: BTreeMap::new(),
        }
    }

    /// Sum of the declared maximum of every top-level rule.
    pub fn declared_max_points(&self) -> f64 {
        self.rules.iter().map(Rule::declared_max_points).sum()
    }
}

/// Loads a rubric from a `.yaml`/`.yml` or JSON file.
pub fn load_rubric(path: impl AsRef<Path>) -> Result<Rubric, DocumentError> {
    let path = path.as_ref();
    let rubric: Rubric = document::read_document(path)?;
    tracing::debug!(path = %path.display(), rules = rubric.rules.len(), "Loaded rubric");
    Ok(rubric)
}

pub fn save_rubric(rubric: &Rubric, path: impl AsRef<Path>) -> Result<(), DocumentError> {
    document::write_document(rubric, path.as_ref())
}
