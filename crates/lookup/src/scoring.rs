//! Similarity score between an obfuscated candidate and a clean reference type

use crate::graph::{FieldNode, TypeGraph, TypeId};
use remapper_core::NamingPattern;

/// Score returned as soon as a candidate shares a literal field name with the reference
pub const EXACT_FIELD_NAME_SCORE: f32 = 1.5;

/// Full score before penalties
pub const BASE_SCORE: f32 = 1.0;

/// Score `candidate` (from `candidate_graph`) against `reference` (from `reference_graph`).
///
/// Returns `None` when the two types declare a different number of fields and are
/// therefore never comparable. Otherwise the result lies in `0.0..=1.5`, higher is better.
pub fn score(
    candidate_graph: &TypeGraph,
    candidate: TypeId,
    reference_graph: &TypeGraph,
    reference: TypeId,
    pattern: &NamingPattern,
    check_offsets: bool,
) -> Option<f32> {
    let candidate_fields: Vec<&FieldNode> = candidate_graph.fields_of(candidate).collect();
    let reference_fields: Vec<&FieldNode> = reference_graph.fields_of(reference).collect();
    if candidate_fields.len() != reference_fields.len() {
        return None;
    }

    let instance_count = candidate_fields.iter().filter(|f| f.is_instance()).count();
    let penalty = if instance_count > 0 {
        BASE_SCORE / instance_count as f32
    } else {
        0.0
    };

    let mut score = BASE_SCORE;
    for (c, r) in candidate_fields.iter().zip(&reference_fields) {
        if c.name == r.name {
            return Some(EXACT_FIELD_NAME_SCORE);
        }
        // A clean name that differs means this is a different type altogether
        if !pattern.is_match(&c.name) {
            return Some(0.0);
        }
        if !c.is_instance() || !r.is_instance() {
            continue;
        }

        let type_mismatch = match (
            candidate_graph.field_type_name(c.id),
            reference_graph.field_type_name(r.id),
        ) {
            (Some(c_type), Some(r_type)) => {
                !pattern.is_match(c_type) && !pattern.is_match(r_type) && c_type != r_type
            }
            _ => false,
        };
        let offset_mismatch = check_offsets && c.offset != r.offset;

        if type_mismatch || offset_mismatch {
            score -= penalty;
        }
    }

    Some(score.max(0.0))
}
