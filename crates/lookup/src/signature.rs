//! Structural signatures and the candidate index built from them

use crate::graph::{TypeGraph, TypeId};
use remapper_core::NamingPattern;
use std::collections::HashMap;
use tracing::debug;

/// Member counts two types must share before they are ever compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature {
    /// Static fields with storage
    pub static_fields: usize,
    pub literal_fields: usize,
    pub instance_fields: usize,
    pub properties: usize,
}

impl Signature {
    pub fn of(graph: &TypeGraph, id: TypeId) -> Self {
        let mut signature = Signature {
            static_fields: 0,
            literal_fields: 0,
            instance_fields: 0,
            properties: graph.ty(id).properties.len(),
        };

        for field in graph.fields_of(id) {
            if field.is_literal {
                signature.literal_fields += 1;
            } else if field.is_static {
                signature.static_fields += 1;
            } else {
                signature.instance_fields += 1;
            }
        }

        signature
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}s, {}l, {}i, {}p)",
            self.static_fields, self.literal_fields, self.instance_fields, self.properties
        )
    }
}

/// Obfuscated candidates bucketed by [`Signature`]
#[derive(Debug, Default)]
pub struct SignatureIndex {
    buckets: HashMap<Signature, Vec<TypeId>>,
    len: usize,
}

impl SignatureIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every root of `graph` that still carries an auto-generated name on
    /// the type itself or on one of its fields
    pub fn build(graph: &TypeGraph, pattern: &NamingPattern) -> Self {
        let mut index = Self::new();

        for &id in graph.roots() {
            let node = graph.ty(id);
            let eligible =
                pattern.is_match(&node.name) || graph.fields_of(id).any(|f| pattern.is_match(&f.name));
            if eligible {
                index.insert(graph, id);
            }
        }

        debug!(
            "Indexed {} candidates in {} signature buckets",
            index.len,
            index.buckets.len()
        );
        index
    }

    pub fn insert(&mut self, graph: &TypeGraph, id: TypeId) {
        self.buckets
            .entry(Signature::of(graph, id))
            .or_default()
            .push(id);
        self.len += 1;
    }

    /// Candidates sharing `signature`, in insertion order
    pub fn lookup(&self, signature: &Signature) -> &[TypeId] {
        self.buckets
            .get(signature)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
