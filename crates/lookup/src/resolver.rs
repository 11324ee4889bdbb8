//! Matching of clean types onto obfuscated candidates
//!
//! [`LookupModel`] walks the clean roots in a stable order, asks the signature index for
//! candidates of the same shape and keeps the best one. Each obfuscated type is matched at
//! most once. Once every clean root has been visited the fields of all matched pairs are
//! aligned, followed by clean roots that kept an identical name in the obfuscated build.

use crate::graph::{TypeGraph, TypeId};
use crate::ledger::{Translation, TranslationKind, TranslationTarget, Translations};
use crate::scoring;
use crate::signature::{Signature, SignatureIndex};
use crate::translator::Translator;
use chrono::Utc;
use indexmap::IndexMap;
use remapper_core::config::DEFAULT_OBFUSCATION_MARKER;
use remapper_core::events::{self, EventBus, LookupEvent};
use remapper_core::{Error, NamingPattern, Result, RunReport, RunStatistics};
use std::collections::HashSet;
use tracing::{debug, info};

/// Knobs for one matching run
#[derive(Debug, Clone)]
pub struct LookupOptions {
    pub pattern: NamingPattern,
    /// Penalize and refuse field pairs whose byte offsets differ
    pub check_offsets: bool,
    /// Namespace that must not appear in the clean graph
    pub marker: String,
}

impl LookupOptions {
    pub fn new(pattern: NamingPattern, check_offsets: bool) -> Self {
        Self {
            pattern,
            check_offsets,
            marker: DEFAULT_OBFUSCATION_MARKER.to_string(),
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }
}

/// Outcome of [`LookupModel::translate_types`]
#[derive(Debug)]
pub struct LookupResult {
    /// The obfuscated graph with recovered names applied
    pub graph: TypeGraph,
    pub translations: Translations,
    /// Clean type to obfuscated type, in match order
    pub matches: IndexMap<TypeId, TypeId>,
    pub report: RunReport,
}

pub struct LookupModel<'a> {
    obfuscated: TypeGraph,
    clean: &'a TypeGraph,
    options: LookupOptions,
    index: SignatureIndex,
    /// Names of every clean module type, nested ones included
    clean_type_names: HashSet<String>,
    matches: IndexMap<TypeId, TypeId>,
    consumed: HashSet<TypeId>,
    translations: Translations,
    events: Option<&'a EventBus>,
}

impl<'a> LookupModel<'a> {
    /// Prepare a run. Fails when the clean graph itself carries the obfuscator marker.
    pub fn new(obfuscated: TypeGraph, clean: &'a TypeGraph, options: LookupOptions) -> Result<Self> {
        if clean.has_namespace_containing(&options.marker) {
            return Err(Error::ObfuscatedReference(options.marker));
        }

        let index = SignatureIndex::build(&obfuscated, &options.pattern);
        let clean_type_names = module_type_names(clean);

        Ok(Self {
            obfuscated,
            clean,
            options,
            index,
            clean_type_names,
            matches: IndexMap::new(),
            consumed: HashSet::new(),
            translations: Translations::new(),
            events: None,
        })
    }

    pub fn with_events(mut self, events: Option<&'a EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn obfuscated(&self) -> &TypeGraph {
        &self.obfuscated
    }

    /// Find and record the obfuscated counterpart of `clean_type`
    pub fn matching_type(&mut self, clean_type: TypeId) -> Option<TypeId> {
        let clean = self.clean;
        let signature = Signature::of(clean, clean_type);
        let candidates = self.index.lookup(&signature).to_vec();

        if let [only] = candidates.as_slice() {
            if !self.consumed.contains(only) && !self.is_other_clean_name(*only, clean_type) {
                self.record(clean_type, *only, None);
                return Some(*only);
            }
        }

        let clean_name = &clean.ty(clean_type).name;
        let mut best: Option<(TypeId, f32)> = None;

        for candidate in candidates {
            if self.consumed.contains(&candidate) || self.is_other_clean_name(candidate, clean_type) {
                continue;
            }
            if &self.obfuscated.ty(candidate).name == clean_name {
                best = Some((candidate, scoring::EXACT_FIELD_NAME_SCORE));
                break;
            }

            let Some(score) = scoring::score(
                &self.obfuscated,
                candidate,
                clean,
                clean_type,
                &self.options.pattern,
                self.options.check_offsets,
            ) else {
                continue;
            };
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((candidate, score));
            }
        }

        let (candidate, score) = best?;
        self.record(clean_type, candidate, Some(score));
        Some(candidate)
    }

    /// Run the whole match and translate pass
    pub fn translate_types(mut self) -> LookupResult {
        let clean = self.clean;
        let roots = sorted_roots(clean);
        info!(
            "Matching {} clean types against {} candidates",
            roots.len(),
            self.index.len()
        );

        for &clean_type in &roots {
            let Some(matched) = self.matching_type(clean_type) else {
                continue;
            };

            let translator =
                Translator::new(clean, &self.options.pattern, self.options.check_offsets);
            if !self.obfuscated.ty(matched).children.is_empty()
                && !clean.ty(clean_type).children.is_empty()
            {
                translator.translate_children(
                    &mut self.obfuscated,
                    matched,
                    clean_type,
                    &mut self.translations,
                );
            }
            translator.rename_type(
                &mut self.obfuscated,
                matched,
                &clean.ty(clean_type).name,
                &mut self.translations,
            );
        }

        self.translate_fields(&roots);

        let statistics = RunStatistics {
            clean_types: roots.len(),
            candidate_types: self.index.len(),
            types_matched: self.matches.len(),
            types_renamed: self
                .translations
                .changed()
                .filter(|t| t.kind == TranslationKind::Type)
                .count(),
            fields_renamed: self.translations.count(TranslationKind::Field),
        };
        info!(
            "Matched {} of {} types, {} translations",
            statistics.types_matched,
            statistics.clean_types,
            self.translations.len()
        );

        LookupResult {
            graph: self.obfuscated,
            translations: self.translations,
            matches: self.matches,
            report: RunReport {
                timestamp: Utc::now(),
                check_offsets: self.options.check_offsets,
                statistics,
            },
        }
    }

    fn translate_fields(&mut self, roots: &[TypeId]) {
        let clean = self.clean;
        let translator = Translator::new(clean, &self.options.pattern, self.options.check_offsets);

        for (&clean_type, &obfuscated_type) in &self.matches {
            let count = translator.translate_fields(
                &mut self.obfuscated,
                obfuscated_type,
                clean_type,
                &mut self.translations,
            );
            let type_name = &clean.ty(clean_type).name;
            events::emit(self.events, || LookupEvent::FieldsTranslated {
                type_name: type_name.clone(),
                count,
            });
        }

        for &clean_type in roots {
            if self.matches.contains_key(&clean_type) {
                continue;
            }
            let name = &clean.ty(clean_type).name;
            let Some(same_named) = self
                .obfuscated
                .roots()
                .iter()
                .copied()
                .find(|id| !self.consumed.contains(id) && &self.obfuscated.ty(*id).name == name)
            else {
                continue;
            };

            debug!("{} kept its name, aligning fields only", name);
            self.translations.push(Translation {
                original: name.clone(),
                renamed: name.clone(),
                kind: TranslationKind::Type,
                target: TranslationTarget::Type(same_named),
            });
            let count = translator.translate_fields(
                &mut self.obfuscated,
                same_named,
                clean_type,
                &mut self.translations,
            );
            events::emit(self.events, || LookupEvent::FieldsTranslated {
                type_name: name.clone(),
                count,
            });
        }
    }

    /// Whether `candidate` already carries the name of a clean type other than `clean_type`
    fn is_other_clean_name(&self, candidate: TypeId, clean_type: TypeId) -> bool {
        let name = &self.obfuscated.ty(candidate).name;
        name != &self.clean.ty(clean_type).name && self.clean_type_names.contains(name)
    }

    fn record(&mut self, clean_type: TypeId, obfuscated_type: TypeId, score: Option<f32>) {
        self.matches.insert(clean_type, obfuscated_type);
        self.consumed.insert(obfuscated_type);

        let clean = &self.clean.ty(clean_type).name;
        let obfuscated = &self.obfuscated.ty(obfuscated_type).name;
        debug!("{} matched {} (score {:?})", obfuscated, clean, score);
        events::emit(self.events, || LookupEvent::TypeMatched {
            clean: clean.clone(),
            obfuscated: obfuscated.clone(),
            score,
        });
    }
}

fn module_type_names(clean: &TypeGraph) -> HashSet<String> {
    let mut visited = HashSet::new();
    let mut pending: Vec<TypeId> = clean.roots().to_vec();
    while let Some(id) = pending.pop() {
        if visited.insert(id) {
            pending.extend(clean.ty(id).children.iter().copied());
        }
    }
    visited.into_iter().map(|id| clean.ty(id).name.clone()).collect()
}

/// Top-level clean types worth matching, ordered by name, namespace, then id
fn sorted_roots(clean: &TypeGraph) -> Vec<TypeId> {
    let mut roots: Vec<TypeId> = clean
        .roots()
        .iter()
        .copied()
        .filter(|id| {
            let node = clean.ty(*id);
            !node.is_nested() && !node.is_enum
        })
        .collect();
    roots.sort_by(|a, b| {
        let (x, y) = (clean.ty(*a), clean.ty(*b));
        (&x.name, &x.namespace, a).cmp(&(&y.name, &y.namespace, b))
    });
    roots
}
