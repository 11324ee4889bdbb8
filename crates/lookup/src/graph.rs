//! Arena-backed type graph
//!
//! Every raw type becomes exactly one [`TypeNode`], addressed by a [`TypeId`]. Fields,
//! declaring types and nested children refer to each other by id, so reference cycles
//! (a type holding a field of its own type, nested types pointing at their parent) are
//! plain indices rather than owning pointers.

use crate::source::{RawType, TypeSource};
use remapper_core::config::is_excluded_namespace;
use remapper_core::events::{self, EventBus, GraphRole, LookupEvent};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, info};

/// Names of compiler synthesized pseudo types that never take part in matching
const MODULE_TYPE_NAMES: &[&str] = &["<Module>", "_Module_"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(u32);

impl FieldId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A class, struct or enum in one of the two graphs
#[derive(Debug, Clone)]
pub struct TypeNode {
    pub id: TypeId,
    /// Handle of the raw type inside its source
    pub handle: usize,
    pub name: String,
    pub namespace: String,
    pub assembly: String,
    pub is_enum: bool,
    pub is_generic: bool,
    pub is_array: bool,
    pub declaring_type: Option<TypeId>,
    pub base_type: Option<TypeId>,
    pub children: Vec<TypeId>,
    pub fields: Vec<FieldId>,
    pub properties: Vec<PropertyNode>,
    pub methods: Vec<MethodNode>,
}

impl TypeNode {
    fn placeholder(id: TypeId, handle: usize, raw: &RawType) -> Self {
        Self {
            id,
            handle,
            name: raw.name.clone(),
            namespace: raw.namespace.clone(),
            assembly: raw.assembly.clone(),
            is_enum: raw.is_enum,
            is_generic: raw.is_generic,
            is_array: raw.is_array,
            declaring_type: None,
            base_type: None,
            children: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn is_nested(&self) -> bool {
        self.declaring_type.is_some()
    }
}

/// A field of a [`TypeNode`]
#[derive(Debug, Clone)]
pub struct FieldNode {
    pub id: FieldId,
    /// Position of the field in its declaring raw type
    pub index: usize,
    pub name: String,
    pub is_static: bool,
    pub is_literal: bool,
    /// Byte offset, 0 when the source has no layout information
    pub offset: u64,
    pub field_type: Option<TypeId>,
    pub declaring_type: TypeId,
}

impl FieldNode {
    /// Non-static, non-literal field with runtime storage in every instance
    pub fn is_instance(&self) -> bool {
        !self.is_static && !self.is_literal
    }

    /// Static field with storage; compile-time constants are excluded
    pub fn is_static_storage(&self) -> bool {
        self.is_static && !self.is_literal
    }
}

#[derive(Debug, Clone)]
pub struct PropertyNode {
    pub name: String,
    pub declaring_type: TypeId,
    pub property_type: Option<TypeId>,
    pub has_getter: bool,
    pub has_setter: bool,
}

/// Methods are tracked for completeness but never translated
#[derive(Debug, Clone)]
pub struct MethodNode {
    pub name: String,
    pub declaring_type: TypeId,
    pub return_type: Option<TypeId>,
    pub parameters: Vec<TypeId>,
    pub is_static: bool,
}

/// Fully materialized type universe of one application
#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
    types: Vec<TypeNode>,
    fields: Vec<FieldNode>,
    roots: Vec<TypeId>,
    namespaces: BTreeSet<String>,
}

impl TypeGraph {
    /// Build a graph from `source` with the default framework filter
    pub fn from_source<S: TypeSource + ?Sized>(source: &S, role: GraphRole) -> Self {
        let excluded = remapper_core::Config::default().excluded_namespaces;
        GraphBuilder::new(source, role)
            .exclude_namespaces(&excluded)
            .build()
    }

    pub fn ty(&self, id: TypeId) -> &TypeNode {
        &self.types[id.index()]
    }

    pub fn ty_mut(&mut self, id: TypeId) -> &mut TypeNode {
        &mut self.types[id.index()]
    }

    pub fn field(&self, id: FieldId) -> &FieldNode {
        &self.fields[id.index()]
    }

    pub fn field_mut(&mut self, id: FieldId) -> &mut FieldNode {
        &mut self.fields[id.index()]
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeNode> {
        self.types.iter()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Top-level, non-framework types of the module
    pub fn roots(&self) -> &[TypeId] {
        &self.roots
    }

    pub fn namespaces(&self) -> &BTreeSet<String> {
        &self.namespaces
    }

    /// Whether any namespace of the graph contains `needle`
    pub fn has_namespace_containing(&self, needle: &str) -> bool {
        self.namespaces.iter().any(|ns| ns.contains(needle))
    }

    pub fn fields_of(&self, id: TypeId) -> impl Iterator<Item = &FieldNode> + '_ {
        self.ty(id).fields.iter().map(move |f| self.field(*f))
    }

    pub fn instance_fields(&self, id: TypeId) -> Vec<FieldId> {
        self.fields_of(id)
            .filter(|f| f.is_instance())
            .map(|f| f.id)
            .collect()
    }

    pub fn static_fields(&self, id: TypeId) -> Vec<FieldId> {
        self.fields_of(id)
            .filter(|f| f.is_static_storage())
            .map(|f| f.id)
            .collect()
    }

    /// Name of the resolved element type of a field
    pub fn field_type_name(&self, id: FieldId) -> Option<&str> {
        self.field(id)
            .field_type
            .map(|t| self.ty(t).name.as_str())
    }

    /// First root with the given name
    pub fn find_root(&self, name: &str) -> Option<TypeId> {
        self.roots
            .iter()
            .copied()
            .find(|id| self.ty(*id).name == name)
    }
}

/// Converts a [`TypeSource`] into a [`TypeGraph`], converting each raw type once
pub struct GraphBuilder<'a, S: TypeSource + ?Sized> {
    source: &'a S,
    role: GraphRole,
    excluded_namespaces: &'a [String],
    events: Option<&'a EventBus>,
    graph: TypeGraph,
    memo: HashMap<usize, TypeId>,
    skipped: HashSet<usize>,
    pending: VecDeque<(TypeId, RawType)>,
}

impl<'a, S: TypeSource + ?Sized> GraphBuilder<'a, S> {
    pub fn new(source: &'a S, role: GraphRole) -> Self {
        Self {
            source,
            role,
            excluded_namespaces: &[],
            events: None,
            graph: TypeGraph::default(),
            memo: HashMap::new(),
            skipped: HashSet::new(),
            pending: VecDeque::new(),
        }
    }

    /// Namespace prefixes whose types are never roots
    pub fn exclude_namespaces(mut self, prefixes: &'a [String]) -> Self {
        self.excluded_namespaces = prefixes;
        self
    }

    pub fn with_events(mut self, events: Option<&'a EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn build(mut self) -> TypeGraph {
        let total = self.source.type_count();
        info!("Building {} type graph from {} raw types", self.role, total);

        for handle in 0..total {
            let Some(id) = self.convert(handle) else {
                continue;
            };

            let node = self.graph.ty(id);
            if !node.is_nested() && !is_excluded_namespace(self.excluded_namespaces, &node.namespace)
            {
                self.graph.roots.push(id);
            }

            let role = self.role;
            events::emit(self.events, || LookupEvent::GraphLoading {
                role,
                current: handle + 1,
                total,
            });
        }

        info!(
            "{} graph: {} nodes, {} fields, {} roots",
            self.role,
            self.graph.types.len(),
            self.graph.fields.len(),
            self.graph.roots.len()
        );
        self.graph
    }

    /// Resolve `handle` and everything it transitively references
    fn convert(&mut self, handle: usize) -> Option<TypeId> {
        let id = self.ensure(handle)?;
        while let Some((pending, raw)) = self.pending.pop_front() {
            self.populate(pending, raw);
        }
        Some(id)
    }

    /// Look up the node for `handle`, registering a placeholder on first sight
    fn ensure(&mut self, handle: usize) -> Option<TypeId> {
        if let Some(&id) = self.memo.get(&handle) {
            return Some(id);
        }
        if self.skipped.contains(&handle) {
            return None;
        }

        let raw = match self.source.read_type(handle) {
            Some(raw) if !MODULE_TYPE_NAMES.contains(&raw.name.as_str()) => raw,
            _ => {
                debug!("Skipping raw type {}", handle);
                self.skipped.insert(handle);
                return None;
            }
        };

        let id = TypeId(self.graph.types.len() as u32);
        self.graph.types.push(TypeNode::placeholder(id, handle, &raw));
        self.graph.namespaces.insert(raw.namespace.clone());
        self.memo.insert(handle, id);
        self.pending.push_back((id, raw));
        Some(id)
    }

    fn populate(&mut self, id: TypeId, raw: RawType) {
        let declaring = raw
            .declaring_type
            .and_then(|h| self.ensure(h))
            .filter(|parent| *parent != id);
        let base = raw.base_type.and_then(|h| self.ensure(h));

        let mut fields = Vec::with_capacity(raw.fields.len());
        for (index, field) in raw.fields.into_iter().enumerate() {
            let field_type = field.field_type.and_then(|h| self.ensure(h));
            let field_id = FieldId(self.graph.fields.len() as u32);
            self.graph.fields.push(FieldNode {
                id: field_id,
                index,
                name: field.name,
                is_static: field.is_static,
                is_literal: field.is_literal,
                offset: field.offset,
                field_type,
                declaring_type: id,
            });
            fields.push(field_id);
        }

        let properties = raw
            .properties
            .into_iter()
            .map(|p| PropertyNode {
                property_type: p.property_type.and_then(|h| self.ensure(h)),
                name: p.name,
                declaring_type: id,
                has_getter: p.has_getter,
                has_setter: p.has_setter,
            })
            .collect();

        let methods = raw
            .methods
            .into_iter()
            .map(|m| MethodNode {
                return_type: m.return_type.and_then(|h| self.ensure(h)),
                parameters: m
                    .parameters
                    .iter()
                    .filter_map(|h| self.ensure(*h))
                    .collect(),
                name: m.name,
                declaring_type: id,
                is_static: m.is_static,
            })
            .collect();

        let node = self.graph.ty_mut(id);
        node.declaring_type = declaring;
        node.base_type = base;
        node.fields = fields;
        node.properties = properties;
        node.methods = methods;

        if let Some(parent) = declaring {
            self.graph.ty_mut(parent).children.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ModelBuilder;

    #[test]
    fn test_self_referential_type_terminates() {
        let mut model = ModelBuilder::new();
        let node = model.ty("a1", "Game");
        model.field(node, "b1", Some(node), 0x10);
        model.field(node, "b2", Some(node), 0x18);

        let graph = TypeGraph::from_source(&model.build(), GraphRole::Obfuscated);
        assert_eq!(graph.type_count(), 1);

        let id = graph.roots()[0];
        let fields: Vec<_> = graph.fields_of(id).collect();
        assert_eq!(fields.len(), 2);
        assert!(fields.iter().all(|f| f.field_type == Some(id)));
    }

    #[test]
    fn test_conversion_is_memoized() {
        let mut model = ModelBuilder::new();
        let int = model.ty("Int32", "System");
        let a = model.ty("a1", "Game");
        let b = model.ty("a2", "Game");
        model.field(a, "b1", Some(int), 0x10);
        model.field(b, "b1", Some(int), 0x10);
        model.field(b, "b2", Some(a), 0x18);

        let graph = TypeGraph::from_source(&model.build(), GraphRole::Obfuscated);
        assert_eq!(graph.type_count(), 3);

        let a_id = graph.find_root("a1").unwrap();
        let b_id = graph.find_root("a2").unwrap();
        let a_int = graph.field(graph.ty(a_id).fields[0]).field_type;
        let b_int = graph.field(graph.ty(b_id).fields[0]).field_type;
        assert_eq!(a_int, b_int);
        assert_eq!(graph.field(graph.ty(b_id).fields[1]).field_type, Some(a_id));
    }

    #[test]
    fn test_nested_types_link_to_parent() {
        let mut model = ModelBuilder::new();
        let outer = model.ty("a1", "Game");
        let inner = model.nested("a2", outer);
        model.field(inner, "b1", Some(outer), 0x10);

        let graph = TypeGraph::from_source(&model.build(), GraphRole::Clean);
        let outer_id = graph.find_root("a1").unwrap();
        assert_eq!(graph.roots().len(), 1);

        let children = &graph.ty(outer_id).children;
        assert_eq!(children.len(), 1);
        let inner_node = graph.ty(children[0]);
        assert_eq!(inner_node.name, "a2");
        assert_eq!(inner_node.declaring_type, Some(outer_id));
        assert!(inner_node.is_nested());
    }

    #[test]
    fn test_nested_type_seen_before_parent() {
        let mut model = ModelBuilder::new();
        let inner = model.ty("Inner", "Game");
        let outer = model.ty("Outer", "Game");
        model.set_declaring(inner, outer);

        let graph = TypeGraph::from_source(&model.build(), GraphRole::Clean);
        let outer_id = graph.find_root("Outer").unwrap();
        assert_eq!(graph.roots(), &[outer_id]);
        assert_eq!(graph.ty(outer_id).children.len(), 1);
    }

    #[test]
    fn test_module_type_is_skipped() {
        let mut model = ModelBuilder::new();
        let module = model.ty("<Module>", "");
        let a = model.ty("a1", "Game");
        model.field(a, "b1", Some(module), 0);

        let graph = TypeGraph::from_source(&model.build(), GraphRole::Obfuscated);
        assert_eq!(graph.type_count(), 1);
        assert!(graph.types().all(|t| t.name != "<Module>"));
        let a_id = graph.find_root("a1").unwrap();
        assert_eq!(graph.field(graph.ty(a_id).fields[0]).field_type, None);
    }

    #[test]
    fn test_framework_types_are_not_roots() {
        let mut model = ModelBuilder::new();
        let string = model.ty("String", "System");
        let vector = model.ty("Vector3", "UnityEngine");
        let a = model.ty("a1", "Game");
        model.field(a, "b1", Some(string), 0x10);
        model.field(a, "b2", Some(vector), 0x18);

        let graph = TypeGraph::from_source(&model.build(), GraphRole::Obfuscated);
        assert_eq!(graph.type_count(), 3);
        assert_eq!(graph.roots().len(), 1);
        assert!(graph.namespaces().contains("UnityEngine"));
    }

    #[test]
    fn test_field_partitions() {
        let mut model = ModelBuilder::new();
        let a = model.ty("a1", "Game");
        model.field(a, "b1", None, 0x10);
        model.static_field(a, "b2", None, 0x0);
        model.literal_field(a, "b3", None);
        model.field(a, "b4", None, 0x18);

        let graph = TypeGraph::from_source(&model.build(), GraphRole::Obfuscated);
        let id = graph.roots()[0];
        let instance: Vec<_> = graph
            .instance_fields(id)
            .into_iter()
            .map(|f| graph.field(f).name.as_str())
            .collect();
        assert_eq!(instance, vec!["b1", "b4"]);
        assert_eq!(graph.static_fields(id).len(), 1);
    }

    #[test]
    fn test_progress_events() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let mut model = ModelBuilder::new();
        model.ty("a1", "Game");
        model.ty("a2", "Game");
        let model = model.build();

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let mut bus = EventBus::new();
        bus.subscribe(move |event| {
            if matches!(event, LookupEvent::GraphLoading { .. }) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let graph = GraphBuilder::new(&model, GraphRole::Clean)
            .with_events(Some(&bus))
            .build();
        assert_eq!(graph.roots().len(), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
