//! Ordered record of every rename performed during a run

use crate::graph::{FieldId, TypeGraph, TypeId};
use crate::source::TypeSource;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// What a translation renamed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationKind {
    Type,
    Field,
}

impl std::fmt::Display for TranslationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslationKind::Type => write!(f, "type"),
            TranslationKind::Field => write!(f, "field"),
        }
    }
}

/// Node in the obfuscated graph a translation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranslationTarget {
    Type(TypeId),
    Field(FieldId),
}

/// A single `original -> renamed` record
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub original: String,
    pub renamed: String,
    pub kind: TranslationKind,
    pub target: TranslationTarget,
}

impl Translation {
    /// Whether the entry actually changes a name
    pub fn is_change(&self) -> bool {
        self.original != self.renamed
    }
}

/// The translations ledger
#[derive(Debug, Clone, Default)]
pub struct Translations {
    entries: Vec<Translation>,
    translated_fields: HashSet<FieldId>,
}

impl Translations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, translation: Translation) {
        if let TranslationTarget::Field(field) = translation.target {
            self.translated_fields.insert(field);
        }
        self.entries.push(translation);
    }

    pub fn is_field_translated(&self, field: FieldId) -> bool {
        self.translated_fields.contains(&field)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Translation> {
        self.entries.iter()
    }

    /// Entries that change a name, in ledger order
    pub fn changed(&self) -> impl Iterator<Item = &Translation> {
        self.entries.iter().filter(|t| t.is_change())
    }

    pub fn count(&self, kind: TranslationKind) -> usize {
        self.entries.iter().filter(|t| t.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every recorded name back into the raw source `graph` was built from.
    /// Returns the number of names written.
    pub fn apply_to<S: TypeSource + ?Sized>(&self, graph: &TypeGraph, source: &mut S) -> usize {
        let mut written = 0;

        for translation in &self.entries {
            let ok = match translation.target {
                TranslationTarget::Type(id) => {
                    source.set_type_name(graph.ty(id).handle, &translation.renamed)
                }
                TranslationTarget::Field(id) => {
                    let field = graph.field(id);
                    let owner = graph.ty(field.declaring_type);
                    source.set_field_name(owner.handle, field.index, &translation.renamed)
                }
            };

            if ok {
                written += 1;
            } else {
                warn!(
                    "Could not write {} {} back to the source",
                    translation.kind, translation.renamed
                );
            }
        }

        written
    }
}

impl<'a> IntoIterator for &'a Translations {
    type Item = &'a Translation;
    type IntoIter = std::slice::Iter<'a, Translation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
