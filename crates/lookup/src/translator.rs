//! Renaming of matched types, their nested types and their fields

use crate::graph::{FieldId, TypeGraph, TypeId};
use crate::ledger::{Translation, TranslationKind, TranslationTarget, Translations};
use crate::scoring;
use remapper_core::NamingPattern;
use tracing::debug;

/// Copies names from the clean graph onto the obfuscated one
#[derive(Debug, Clone, Copy)]
pub struct Translator<'a> {
    pub clean: &'a TypeGraph,
    pub pattern: &'a NamingPattern,
    pub check_offsets: bool,
}

impl<'a> Translator<'a> {
    pub fn new(clean: &'a TypeGraph, pattern: &'a NamingPattern, check_offsets: bool) -> Self {
        Self {
            clean,
            pattern,
            check_offsets,
        }
    }

    /// Rename an obfuscated type. Enums and types whose current name is not
    /// auto-generated are left alone.
    pub fn rename_type(
        &self,
        obfuscated: &mut TypeGraph,
        id: TypeId,
        name: &str,
        ledger: &mut Translations,
    ) -> bool {
        let node = obfuscated.ty_mut(id);
        if node.is_enum || !self.pattern.is_match(&node.name) {
            return false;
        }

        let original = std::mem::replace(&mut node.name, name.to_string());
        debug!("type {} -> {}", original, name);
        ledger.push(Translation {
            original,
            renamed: name.to_string(),
            kind: TranslationKind::Type,
            target: TranslationTarget::Type(id),
        });
        true
    }

    /// Rename an obfuscated field whose current name is auto-generated.
    /// A field is renamed at most once per ledger.
    pub fn rename_field(
        &self,
        obfuscated: &mut TypeGraph,
        id: FieldId,
        name: &str,
        ledger: &mut Translations,
    ) -> bool {
        if ledger.is_field_translated(id) {
            return false;
        }
        let field = obfuscated.field_mut(id);
        if !self.pattern.is_match(&field.name) {
            return false;
        }

        let original = std::mem::replace(&mut field.name, name.to_string());
        ledger.push(Translation {
            original,
            renamed: name.to_string(),
            kind: TranslationKind::Field,
            target: TranslationTarget::Field(id),
        });
        true
    }

    /// Align fields by position, instance and static storage separately.
    /// Returns the number of fields renamed.
    pub fn translate_fields(
        &self,
        obfuscated: &mut TypeGraph,
        obfuscated_type: TypeId,
        clean_type: TypeId,
        ledger: &mut Translations,
    ) -> usize {
        let pairs = [
            (
                obfuscated.instance_fields(obfuscated_type),
                self.clean.instance_fields(clean_type),
            ),
            (
                obfuscated.static_fields(obfuscated_type),
                self.clean.static_fields(clean_type),
            ),
        ];

        let mut renamed = 0;
        for (obfuscated_fields, clean_fields) in pairs {
            for (o, c) in obfuscated_fields.into_iter().zip(clean_fields) {
                let clean_field = self.clean.field(c);
                let field = obfuscated.field(o);
                let offsets_agree = !self.check_offsets || field.offset == clean_field.offset;

                if offsets_agree
                    && field.name != clean_field.name
                    && self.rename_field(obfuscated, o, &clean_field.name, ledger)
                {
                    renamed += 1;
                }
            }
        }
        renamed
    }

    /// Match the nested types of a matched pair and rename them, recursing while
    /// both sides keep nesting. Returns the number of nested types matched.
    pub fn translate_children(
        &self,
        obfuscated: &mut TypeGraph,
        obfuscated_type: TypeId,
        clean_type: TypeId,
        ledger: &mut Translations,
    ) -> usize {
        let children = obfuscated.ty(obfuscated_type).children.clone();
        let mut matched = 0;

        for child in children {
            let Some(clean_child) = self.best_child(obfuscated, child, clean_type) else {
                continue;
            };
            matched += 1;

            let name = self.clean.ty(clean_child).name.clone();
            self.rename_type(obfuscated, child, &name, ledger);
            self.translate_fields(obfuscated, child, clean_child, ledger);

            if !obfuscated.ty(child).children.is_empty()
                && !self.clean.ty(clean_child).children.is_empty()
            {
                matched += self.translate_children(obfuscated, child, clean_child, ledger);
            }
        }
        matched
    }

    fn best_child(
        &self,
        obfuscated: &TypeGraph,
        child: TypeId,
        clean_parent: TypeId,
    ) -> Option<TypeId> {
        let child_node = obfuscated.ty(child);
        let mut best: Option<(TypeId, f32)> = None;

        for &candidate in &self.clean.ty(clean_parent).children {
            let clean_node = self.clean.ty(candidate);
            if clean_node.fields.len() != child_node.fields.len() {
                continue;
            }
            if clean_node.name == child_node.name {
                return Some(candidate);
            }

            let Some(score) = scoring::score(
                obfuscated,
                child,
                self.clean,
                candidate,
                self.pattern,
                self.check_offsets,
            ) else {
                continue;
            };
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((candidate, score));
            }
        }

        best.map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ModelBuilder;
    use remapper_core::GraphRole;

    fn pattern() -> NamingPattern {
        NamingPattern::new(r"^[abc]\d+$").unwrap()
    }

    #[test]
    fn test_translate_fields_by_position() {
        let mut obf = ModelBuilder::new();
        let t = obf.ty("a1", "Game");
        obf.field(t, "b1", None, 0x10);
        obf.static_field(t, "b2", None, 0x0);
        obf.field(t, "b3", None, 0x18);
        obf.literal_field(t, "b4", None);

        let mut clean = ModelBuilder::new();
        let t = clean.ty("Player", "Game");
        clean.field(t, "health", None, 0x10);
        clean.field(t, "mana", None, 0x20);
        clean.static_field(t, "Instance", None, 0x0);
        clean.literal_field(t, "MaxLevel", None);

        let mut obf = TypeGraph::from_source(&obf.build(), GraphRole::Obfuscated);
        let clean = TypeGraph::from_source(&clean.build(), GraphRole::Clean);
        let pattern = pattern();
        let mut ledger = Translations::new();

        let o = obf.find_root("a1").unwrap();
        let c = clean.find_root("Player").unwrap();
        let renamed =
            Translator::new(&clean, &pattern, true).translate_fields(&mut obf, o, c, &mut ledger);

        // b3 sits at 0x18 where mana sits at 0x20
        assert_eq!(renamed, 2);
        let names: Vec<_> = obf.fields_of(o).map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["health", "Instance", "b3", "b4"]);
        assert_eq!(ledger.count(TranslationKind::Field), 2);
    }

    #[test]
    fn test_translate_fields_stops_at_shorter_side() {
        let mut obf = ModelBuilder::new();
        let t = obf.ty("a1", "Game");
        obf.field(t, "b1", None, 0x10);
        obf.field(t, "b2", None, 0x18);

        let mut clean = ModelBuilder::new();
        let t = clean.ty("Player", "Game");
        clean.field(t, "health", None, 0x10);

        let mut obf = TypeGraph::from_source(&obf.build(), GraphRole::Obfuscated);
        let clean = TypeGraph::from_source(&clean.build(), GraphRole::Clean);
        let pattern = pattern();
        let mut ledger = Translations::new();

        let o = obf.find_root("a1").unwrap();
        let c = clean.find_root("Player").unwrap();
        let translator = Translator::new(&clean, &pattern, false);
        assert_eq!(translator.translate_fields(&mut obf, o, c, &mut ledger), 1);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_rename_is_idempotent() {
        let mut obf = ModelBuilder::new();
        let t = obf.ty("a1", "Game");
        obf.field(t, "b1", None, 0x10);
        let mut obf = TypeGraph::from_source(&obf.build(), GraphRole::Obfuscated);
        let clean = TypeGraph::default();
        let pattern = pattern();
        let translator = Translator::new(&clean, &pattern, false);
        let mut ledger = Translations::new();

        let id = obf.find_root("a1").unwrap();
        assert!(translator.rename_type(&mut obf, id, "Player", &mut ledger));
        assert!(!translator.rename_type(&mut obf, id, "Player", &mut ledger));
        assert_eq!(obf.ty(id).name, "Player");
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_field_is_renamed_once() {
        let mut obf = ModelBuilder::new();
        let t = obf.ty("a1", "Game");
        obf.field(t, "b1", None, 0x10);

        let mut clean = ModelBuilder::new();
        let t = clean.ty("Player", "Game");
        clean.field(t, "b7", None, 0x10);
        let t = clean.ty("Enemy", "Game");
        clean.field(t, "health", None, 0x10);

        let mut obf = TypeGraph::from_source(&obf.build(), GraphRole::Obfuscated);
        let clean = TypeGraph::from_source(&clean.build(), GraphRole::Clean);
        let pattern = pattern();
        let translator = Translator::new(&clean, &pattern, true);
        let mut ledger = Translations::new();

        let o = obf.find_root("a1").unwrap();
        let player = clean.find_root("Player").unwrap();
        let enemy = clean.find_root("Enemy").unwrap();
        assert_eq!(translator.translate_fields(&mut obf, o, player, &mut ledger), 1);
        assert_eq!(translator.translate_fields(&mut obf, o, enemy, &mut ledger), 0);

        assert_eq!(obf.fields_of(o).next().unwrap().name, "b7");
        assert_eq!(ledger.count(TranslationKind::Field), 1);
    }

    #[test]
    fn test_enums_are_never_renamed() {
        let mut obf = ModelBuilder::new();
        obf.enumeration("a1", "Game");
        let mut obf = TypeGraph::from_source(&obf.build(), GraphRole::Obfuscated);
        let clean = TypeGraph::default();
        let pattern = pattern();
        let mut ledger = Translations::new();

        let id = obf.find_root("a1").unwrap();
        let translator = Translator::new(&clean, &pattern, false);
        assert!(!translator.rename_type(&mut obf, id, "Team", &mut ledger));
        assert_eq!(obf.ty(id).name, "a1");
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_children_are_translated_recursively() {
        let mut obf = ModelBuilder::new();
        let outer = obf.ty("a1", "Game");
        let inner = obf.nested("c1", outer);
        obf.field(inner, "b1", None, 0x10);
        let innermost = obf.nested("c2", inner);
        obf.field(innermost, "b2", None, 0x10);
        obf.field(innermost, "b3", None, 0x18);

        let mut clean = ModelBuilder::new();
        let outer = clean.ty("Player", "Game");
        let inner = clean.nested("Stats", outer);
        clean.field(inner, "health", None, 0x10);
        let innermost = clean.nested("Modifier", inner);
        clean.field(innermost, "amount", None, 0x10);
        clean.field(innermost, "duration", None, 0x18);

        let mut obf = TypeGraph::from_source(&obf.build(), GraphRole::Obfuscated);
        let clean = TypeGraph::from_source(&clean.build(), GraphRole::Clean);
        let pattern = pattern();
        let mut ledger = Translations::new();

        let o = obf.find_root("a1").unwrap();
        let c = clean.find_root("Player").unwrap();
        let matched = Translator::new(&clean, &pattern, true)
            .translate_children(&mut obf, o, c, &mut ledger);
        assert_eq!(matched, 2);

        let stats = obf.ty(o).children[0];
        assert_eq!(obf.ty(stats).name, "Stats");
        let modifier = obf.ty(stats).children[0];
        assert_eq!(obf.ty(modifier).name, "Modifier");
        let names: Vec<_> = obf.fields_of(modifier).map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["amount", "duration"]);
        assert_eq!(ledger.count(TranslationKind::Type), 2);
        assert_eq!(ledger.count(TranslationKind::Field), 3);
    }

    #[test]
    fn test_child_prefers_higher_score() {
        let mut obf = ModelBuilder::new();
        let outer = obf.ty("a1", "Game");
        let inner = obf.nested("c1", outer);
        obf.field(inner, "b1", None, 0x18);

        let mut clean = ModelBuilder::new();
        let outer = clean.ty("Player", "Game");
        let first = clean.nested("Stats", outer);
        clean.field(first, "health", None, 0x10);
        let second = clean.nested("Timer", outer);
        clean.field(second, "elapsed", None, 0x18);

        let mut obf = TypeGraph::from_source(&obf.build(), GraphRole::Obfuscated);
        let clean = TypeGraph::from_source(&clean.build(), GraphRole::Clean);
        let pattern = pattern();
        let mut ledger = Translations::new();

        let o = obf.find_root("a1").unwrap();
        let c = clean.find_root("Player").unwrap();
        Translator::new(&clean, &pattern, true).translate_children(&mut obf, o, c, &mut ledger);

        let child = obf.ty(o).children[0];
        assert_eq!(obf.ty(child).name, "Timer");
    }

    #[test]
    fn test_child_with_same_name_wins() {
        let mut obf = ModelBuilder::new();
        let outer = obf.ty("a1", "Game");
        let inner = obf.nested("Stats", outer);
        obf.field(inner, "b1", None, 0x18);

        let mut clean = ModelBuilder::new();
        let outer = clean.ty("Player", "Game");
        let timer = clean.nested("Timer", outer);
        clean.field(timer, "elapsed", None, 0x18);
        let stats = clean.nested("Stats", outer);
        clean.field(stats, "health", None, 0x10);

        let mut obf = TypeGraph::from_source(&obf.build(), GraphRole::Obfuscated);
        let clean = TypeGraph::from_source(&clean.build(), GraphRole::Clean);
        let pattern = pattern();
        let mut ledger = Translations::new();

        let o = obf.find_root("a1").unwrap();
        let c = clean.find_root("Player").unwrap();
        let matched = Translator::new(&clean, &pattern, true)
            .translate_children(&mut obf, o, c, &mut ledger);
        assert_eq!(matched, 1);

        // Offsets disagree with the clean Stats, so nothing is renamed
        let child = obf.ty(o).children[0];
        assert_eq!(obf.ty(child).name, "Stats");
        assert_eq!(obf.fields_of(child).next().unwrap().name, "b1");
        assert!(ledger.is_empty());
    }
}
