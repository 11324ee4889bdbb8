//! Reflection sources the type graph can be built from
//!
//! Both an IL2CPP reflection model and a decompiled managed assembly are exposed through
//! [`TypeSource`], so the graph builder and everything downstream never care which one
//! backs a node.

use remapper_core::{AssemblyModel, Compiler, Il2CppModel, TypeSig};

/// Normalized view of one raw type
#[derive(Debug, Clone, Default)]
pub struct RawType {
    pub name: String,
    pub namespace: String,
    pub assembly: String,
    pub is_enum: bool,
    pub is_generic: bool,
    pub is_array: bool,
    pub declaring_type: Option<usize>,
    pub base_type: Option<usize>,
    pub fields: Vec<RawField>,
    pub properties: Vec<RawProperty>,
    pub methods: Vec<RawMethod>,
}

#[derive(Debug, Clone, Default)]
pub struct RawField {
    pub name: String,
    pub field_type: Option<usize>,
    pub offset: u64,
    pub is_static: bool,
    pub is_literal: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RawProperty {
    pub name: String,
    pub property_type: Option<usize>,
    pub has_getter: bool,
    pub has_setter: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RawMethod {
    pub name: String,
    pub return_type: Option<usize>,
    pub parameters: Vec<usize>,
    pub is_static: bool,
}

/// A reflected type universe addressed by stable integer handles
pub trait TypeSource {
    /// Toolchain of the native binary, if the source knows it
    fn compiler(&self) -> Compiler {
        Compiler::Unknown
    }

    /// Whether field offsets reflect the real runtime layout
    fn has_layout(&self) -> bool;

    fn type_count(&self) -> usize;

    fn read_type(&self, handle: usize) -> Option<RawType>;

    /// Write a recovered type name back into the source
    fn set_type_name(&mut self, handle: usize, name: &str) -> bool;

    /// Write a recovered field name back into the source
    fn set_field_name(&mut self, handle: usize, field_index: usize, name: &str) -> bool;
}

impl TypeSource for Il2CppModel {
    fn compiler(&self) -> Compiler {
        self.compiler
    }

    fn has_layout(&self) -> bool {
        true
    }

    fn type_count(&self) -> usize {
        self.types.len()
    }

    fn read_type(&self, handle: usize) -> Option<RawType> {
        let info = self.types.get(handle)?;

        Some(RawType {
            name: info.name.clone(),
            namespace: info.namespace.clone(),
            assembly: info.assembly.clone(),
            is_enum: info.is_enum,
            is_generic: info.is_generic,
            is_array: info.is_array,
            declaring_type: info.declaring_type,
            base_type: info.base_type,
            fields: info
                .fields
                .iter()
                .map(|f| RawField {
                    name: f.name.clone(),
                    field_type: f.field_type,
                    offset: f.offset,
                    is_static: f.is_static,
                    is_literal: f.is_literal,
                })
                .collect(),
            properties: info
                .properties
                .iter()
                .map(|p| RawProperty {
                    name: p.name.clone(),
                    property_type: p.property_type,
                    has_getter: p.getter.is_some(),
                    has_setter: p.setter.is_some(),
                })
                .collect(),
            methods: info
                .methods
                .iter()
                .map(|m| RawMethod {
                    name: m.name.clone(),
                    return_type: m.return_type,
                    parameters: m.parameters.clone(),
                    is_static: m.is_static,
                })
                .collect(),
        })
    }

    fn set_type_name(&mut self, handle: usize, name: &str) -> bool {
        match self.types.get_mut(handle) {
            Some(info) => {
                info.name = name.to_string();
                true
            }
            None => false,
        }
    }

    fn set_field_name(&mut self, handle: usize, field_index: usize, name: &str) -> bool {
        match self
            .types
            .get_mut(handle)
            .and_then(|info| info.fields.get_mut(field_index))
        {
            Some(field) => {
                field.name = name.to_string();
                true
            }
            None => false,
        }
    }
}

fn is_enum_base(model: &AssemblyModel, base: &TypeSig) -> bool {
    match base {
        TypeSig::Unresolved(name) => name == "System.Enum",
        other => other
            .type_def()
            .and_then(|index| model.types.get(index))
            .map(|t| t.namespace == "System" && t.name == "Enum")
            .unwrap_or(false),
    }
}

impl TypeSource for AssemblyModel {
    fn has_layout(&self) -> bool {
        false
    }

    fn type_count(&self) -> usize {
        self.types.len()
    }

    fn read_type(&self, handle: usize) -> Option<RawType> {
        let def = self.types.get(handle)?;

        Some(RawType {
            name: def.name.clone(),
            namespace: def.namespace.clone(),
            assembly: self.name.clone(),
            is_enum: def
                .base_type
                .as_ref()
                .map(|base| is_enum_base(self, base))
                .unwrap_or(false),
            is_generic: def.generic_parameters > 0,
            is_array: false,
            declaring_type: def.declaring_type,
            base_type: def.base_type.as_ref().and_then(TypeSig::type_def),
            fields: def
                .fields
                .iter()
                .map(|f| RawField {
                    name: f.name.clone(),
                    field_type: f.signature.type_def(),
                    offset: f.field_offset.map(u64::from).unwrap_or(0),
                    is_static: f.is_static(),
                    is_literal: f.is_literal(),
                })
                .collect(),
            properties: def
                .properties
                .iter()
                .map(|p| RawProperty {
                    name: p.name.clone(),
                    property_type: p.signature.type_def(),
                    has_getter: p.get_method.is_some(),
                    has_setter: p.set_method.is_some(),
                })
                .collect(),
            methods: def
                .methods
                .iter()
                .map(|m| RawMethod {
                    name: m.name.clone(),
                    return_type: m.return_type.type_def(),
                    parameters: m.parameters.iter().filter_map(TypeSig::type_def).collect(),
                    is_static: m.is_static(),
                })
                .collect(),
        })
    }

    fn set_type_name(&mut self, handle: usize, name: &str) -> bool {
        match self.types.get_mut(handle) {
            Some(def) => {
                def.name = name.to_string();
                true
            }
            None => false,
        }
    }

    fn set_field_name(&mut self, handle: usize, field_index: usize, name: &str) -> bool {
        match self
            .types
            .get_mut(handle)
            .and_then(|def| def.fields.get_mut(field_index))
        {
            Some(field) => {
                field.name = name.to_string();
                true
            }
            None => false,
        }
    }
}
