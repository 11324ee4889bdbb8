//! Structural type matching between an obfuscated and a clean build
//!
//! Two reflection sources are normalized into [`TypeGraph`]s, obfuscated types are
//! bucketed by member counts, and every clean type is paired with its best scoring
//! obfuscated candidate. Matched pairs exchange names for the type, its nested types
//! and its fields; every rename lands in the [`Translations`] ledger.

pub mod deobfuscator;
pub mod graph;
pub mod ledger;
pub mod output;
pub mod resolver;
pub mod scoring;
pub mod signature;
pub mod source;
pub mod translator;

#[cfg(test)]
mod fixtures;

pub use deobfuscator::{deobfuscate, Deobfuscation, Deobfuscator};
pub use graph::{FieldId, FieldNode, GraphBuilder, TypeGraph, TypeId, TypeNode};
pub use ledger::{Translation, TranslationKind, TranslationTarget, Translations};
pub use output::{export, ClassStubGenerator, Locator, PlainTextGenerator, TranslationsJson};
pub use resolver::{LookupModel, LookupOptions, LookupResult};
pub use signature::{Signature, SignatureIndex};
pub use source::TypeSource;
pub use translator::Translator;
