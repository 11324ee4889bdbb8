//! Output generators for translation results

use crate::graph::{FieldNode, TypeGraph, TypeId};
use crate::ledger::{TranslationKind, TranslationTarget, Translations};
use rayon::prelude::*;
use regex::Regex;
use remapper_core::events::{self, EventBus, LookupEvent};
use remapper_core::{Error, ExportConfig, ExportKind, NamingPattern, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Names the C# compiler synthesizes for closures, iterators and backing fields
const COMPILER_GENERATED_PATTERN: &str = r"\+<.*(?:>).*__[1-9]{0,4}|[A-z]*=.{1,4}|<.*>";

/// Namespaces whose field types are kept verbatim in locator sequences
const LOCATOR_NAMESPACES: &[&str] = &["System", "UnityEngine"];

const WILDCARD: &str = "*";

/// Write the ledger in the configured format. Returns the files written.
pub fn export(
    config: &ExportConfig,
    pattern: &NamingPattern,
    graph: &TypeGraph,
    translations: &Translations,
    events: Option<&EventBus>,
) -> Result<Vec<PathBuf>> {
    if config.kind == ExportKind::None {
        return Ok(Vec::new());
    }
    if translations.changed().next().is_none() {
        info!("No name changed, nothing to export");
        return Ok(Vec::new());
    }

    let directory = config
        .directory
        .as_deref()
        .ok_or_else(|| Error::config("export directory is required"))?;
    events::emit(events, || LookupEvent::Status("Generating output..".to_string()));

    let written = match config.kind {
        ExportKind::None => Vec::new(),
        ExportKind::PlainText => vec![PlainTextGenerator::write_to_dir(translations, directory)?],
        ExportKind::Json => {
            let path = directory.join(TranslationsJson::FILE_NAME);
            TranslationsJson::from_translations(graph, translations).write_to_file(&path)?;
            vec![path]
        }
        ExportKind::Classes => ClassStubGenerator::new(pattern, &config.plugin_name)?
            .write_to_dir(graph, translations, directory, events)?,
    };

    info!("Exported {} file(s) to {}", written.len(), directory.display());
    Ok(written)
}

/// `original/renamed` lines, one per changed name
pub struct PlainTextGenerator;

impl PlainTextGenerator {
    pub const FILE_NAME: &'static str = "output.txt";

    pub fn generate(translations: &Translations) -> String {
        let mut output = String::new();
        for translation in translations.changed() {
            output.push_str(&format!("{}/{}\n", translation.original, translation.renamed));
        }
        output
    }

    pub fn write_to_dir(translations: &Translations, directory: &Path) -> Result<PathBuf> {
        let path = directory.join(Self::FILE_NAME);
        std::fs::write(&path, Self::generate(translations))?;
        Ok(path)
    }
}

/// JSON ledger output
#[derive(Debug, Serialize)]
pub struct TranslationsJson {
    pub translations: Vec<TranslationEntry>,
}

#[derive(Debug, Serialize)]
pub struct TranslationEntry {
    pub original: String,
    pub renamed: String,
    pub kind: TranslationKind,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaring_type: Option<String>,
}

impl TranslationsJson {
    pub const FILE_NAME: &'static str = "translations.json";

    pub fn from_translations(graph: &TypeGraph, translations: &Translations) -> Self {
        let translations = translations
            .changed()
            .map(|t| {
                let (namespace, declaring_type) = match t.target {
                    TranslationTarget::Type(id) => {
                        let node = graph.ty(id);
                        (
                            node.namespace.clone(),
                            node.declaring_type.map(|p| graph.ty(p).name.clone()),
                        )
                    }
                    TranslationTarget::Field(id) => {
                        let owner = graph.ty(graph.field(id).declaring_type);
                        (owner.namespace.clone(), Some(owner.name.clone()))
                    }
                };
                TranslationEntry {
                    original: t.original.clone(),
                    renamed: t.renamed.clone(),
                    kind: t.kind,
                    namespace,
                    declaring_type,
                }
            })
            .collect();

        Self { translations }
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| Error::parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// How a generated stub re-finds its type at runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Exact instance field type sequence
    Direct(Vec<String>),
    /// Instance field types with non framework types replaced by `*`
    Sequence(Vec<String>),
    /// Same as `Sequence`, over static fields
    StaticSequence(Vec<String>),
    None,
}

impl Locator {
    fn render(&self) -> String {
        let (helper, sequence) = match self {
            Locator::Direct(s) => ("FindTypeWithFieldTypes", s),
            Locator::Sequence(s) => ("FindTypeWithSequence", s),
            Locator::StaticSequence(s) => ("FindTypeWithStaticSequence", s),
            Locator::None => return "            return null;".to_string(),
        };
        let items = sequence
            .iter()
            .map(|s| format!("\"{}\"", s))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "            return new TypeTranslator(Helpers.{}(new List<string>() {{ {} }}));",
            helper, items
        )
    }
}

/// Field type sequences of every obfuscated root, counted per locator tier
struct SequenceCounts {
    direct: HashMap<Vec<String>, usize>,
    wildcard: HashMap<Vec<String>, usize>,
    wildcard_static: HashMap<Vec<String>, usize>,
}

impl SequenceCounts {
    fn collect(graph: &TypeGraph) -> Self {
        let mut counts = Self {
            direct: HashMap::new(),
            wildcard: HashMap::new(),
            wildcard_static: HashMap::new(),
        };
        for &id in graph.roots() {
            *counts.direct.entry(direct_sequence(graph, id)).or_default() += 1;
            *counts.wildcard.entry(wildcard_sequence(graph, id, false)).or_default() += 1;
            *counts
                .wildcard_static
                .entry(wildcard_sequence(graph, id, true))
                .or_default() += 1;
        }
        counts
    }

    fn locator(&self, graph: &TypeGraph, id: TypeId) -> Locator {
        let unique = |map: &HashMap<Vec<String>, usize>, seq: &Vec<String>| {
            !seq.is_empty() && map.get(seq).copied() == Some(1)
        };

        let direct = direct_sequence(graph, id);
        if unique(&self.direct, &direct) {
            return Locator::Direct(direct);
        }
        let wildcard = wildcard_sequence(graph, id, false);
        if unique(&self.wildcard, &wildcard) {
            return Locator::Sequence(wildcard);
        }
        let wildcard_static = wildcard_sequence(graph, id, true);
        if unique(&self.wildcard_static, &wildcard_static) {
            return Locator::StaticSequence(wildcard_static);
        }
        Locator::None
    }
}

fn direct_sequence(graph: &TypeGraph, id: TypeId) -> Vec<String> {
    graph
        .fields_of(id)
        .filter(|f| f.is_instance())
        .map(|f| graph.field_type_name(f.id).unwrap_or(WILDCARD).to_string())
        .collect()
}

fn wildcard_sequence(graph: &TypeGraph, id: TypeId, statics: bool) -> Vec<String> {
    graph
        .fields_of(id)
        .filter(|f| if statics { f.is_static_storage() } else { f.is_instance() })
        .map(|f| match f.field_type.map(|t| graph.ty(t)) {
            Some(t) if LOCATOR_NAMESPACES.contains(&t.namespace.as_str()) => t.name.clone(),
            _ => WILDCARD.to_string(),
        })
        .collect()
}

/// C# translator stub generator, one file per recovered class
pub struct ClassStubGenerator<'a> {
    pattern: &'a NamingPattern,
    plugin_name: &'a str,
    compiler_generated: Regex,
}

impl<'a> ClassStubGenerator<'a> {
    pub fn new(pattern: &'a NamingPattern, plugin_name: &'a str) -> Result<Self> {
        let compiler_generated =
            Regex::new(COMPILER_GENERATED_PATTERN).map_err(|e| Error::InvalidPattern {
                pattern: COMPILER_GENERATED_PATTERN.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            pattern,
            plugin_name,
            compiler_generated,
        })
    }

    /// Translated types worth a stub, in ledger order
    pub fn exportable_types(&self, graph: &TypeGraph, translations: &Translations) -> Vec<TypeId> {
        let mut seen = HashSet::new();
        translations
            .changed()
            .map(|t| match t.target {
                TranslationTarget::Type(id) => id,
                TranslationTarget::Field(id) => graph.field(id).declaring_type,
            })
            .filter(|id| seen.insert(*id))
            .filter(|id| self.is_exportable(graph, *id))
            .collect()
    }

    fn is_exportable(&self, graph: &TypeGraph, id: TypeId) -> bool {
        let node = graph.ty(id);
        !node.is_nested()
            && !node.is_array
            && !node.is_generic
            && !node.namespace.contains("System")
            && !node.namespace.contains("MS")
            && !self.pattern.is_match(&node.name)
            && !self.compiler_generated.is_match(&node.name)
    }

    /// Render one stub
    pub fn generate(&self, graph: &TypeGraph, id: TypeId, locator: &Locator) -> String {
        let node = graph.ty(id);
        let mut output = String::new();

        output.push_str(&format!("// Generated by remapper for {}\n", self.plugin_name));
        output.push_str("// Do not edit manually\n\n");
        output.push_str("using System.Collections.Generic;\n\n");
        output.push_str(&format!("namespace {}.Translators\n{{\n", self.plugin_name));
        output.push_str(&format!("    [Translator]\n    public struct {}\n    {{\n", node.name));

        output.push_str("        public static TypeTranslator Locate()\n        {\n");
        output.push_str(&locator.render());
        output.push_str("\n        }\n\n");

        output.push_str("        public static void Register(TypeTranslator _type)\n        {\n");
        for field in graph.fields_of(id).filter(|f| !f.is_literal) {
            output.push_str(&Self::field_line(field));
            output.push('\n');
        }
        output.push_str("        }\n    }\n}\n");

        output
    }

    fn field_line(field: &FieldNode) -> String {
        format!(
            "            _type.AddField(new FieldTranslator() {{ Offset = 0x{:X}, Static = {}, Name = \"{}\", TranslateName = true }});",
            field.offset, field.is_static, field.name
        )
    }

    /// Render every exportable type in parallel and write them out in ledger order
    pub fn write_to_dir(
        &self,
        graph: &TypeGraph,
        translations: &Translations,
        directory: &Path,
        events: Option<&EventBus>,
    ) -> Result<Vec<PathBuf>> {
        let types = self.exportable_types(graph, translations);
        let counts = SequenceCounts::collect(graph);

        let rendered: Vec<(String, String)> = types
            .par_iter()
            .map(|&id| {
                let locator = counts.locator(graph, id);
                (
                    sanitize_file_name(&graph.ty(id).name),
                    self.generate(graph, id, &locator),
                )
            })
            .collect();

        let total = rendered.len();
        let mut names = HashSet::new();
        let mut written = Vec::with_capacity(total);
        for (current, (name, content)) in rendered.into_iter().enumerate() {
            events::emit(events, || LookupEvent::ExportProgress {
                current: current + 1,
                total,
            });
            if !names.insert(name.clone()) {
                warn!("Skipping duplicate class stub {}", name);
                continue;
            }

            let path = directory.join(format!("{}.cs", name));
            std::fs::write(&path, content)?;
            written.push(path);
        }

        Ok(written)
    }
}

/// Replace characters that are not allowed in file names, and trailing dots
pub fn sanitize_file_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let kept = sanitized.trim_end_matches('.').len();
    let trailing = sanitized.len() - kept;
    sanitized.truncate(kept);
    sanitized.extend(std::iter::repeat('_').take(trailing));
    sanitized
}
