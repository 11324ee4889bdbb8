//! Test helpers for assembling small reflection models

use remapper_core::{Compiler, Il2CppFieldInfo, Il2CppModel, Il2CppPropertyInfo, Il2CppTypeInfo};

pub(crate) struct ModelBuilder {
    model: Il2CppModel,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self {
            model: Il2CppModel {
                compiler: Compiler::Msvc,
                types: Vec::new(),
            },
        }
    }

    pub fn compiler(&mut self, compiler: Compiler) -> &mut Self {
        self.model.compiler = compiler;
        self
    }

    pub fn ty(&mut self, name: &str, namespace: &str) -> usize {
        self.model.types.push(Il2CppTypeInfo {
            name: name.to_string(),
            namespace: namespace.to_string(),
            assembly: "Assembly-CSharp".to_string(),
            ..Default::default()
        });
        self.model.types.len() - 1
    }

    pub fn nested(&mut self, name: &str, parent: usize) -> usize {
        let namespace = self.model.types[parent].namespace.clone();
        let handle = self.ty(name, &namespace);
        self.set_declaring(handle, parent);
        handle
    }

    pub fn set_declaring(&mut self, handle: usize, parent: usize) {
        self.model.types[handle].declaring_type = Some(parent);
    }

    pub fn enumeration(&mut self, name: &str, namespace: &str) -> usize {
        let handle = self.ty(name, namespace);
        self.model.types[handle].is_enum = true;
        handle
    }

    pub fn field(&mut self, owner: usize, name: &str, field_type: Option<usize>, offset: u64) {
        self.push_field(owner, name, field_type, offset, false, false);
    }

    pub fn static_field(
        &mut self,
        owner: usize,
        name: &str,
        field_type: Option<usize>,
        offset: u64,
    ) {
        self.push_field(owner, name, field_type, offset, true, false);
    }

    pub fn literal_field(&mut self, owner: usize, name: &str, field_type: Option<usize>) {
        self.push_field(owner, name, field_type, 0, true, true);
    }

    pub fn property(&mut self, owner: usize, name: &str, property_type: Option<usize>) {
        self.model.types[owner].properties.push(Il2CppPropertyInfo {
            name: name.to_string(),
            property_type,
            getter: Some(0),
            setter: None,
        });
    }

    fn push_field(
        &mut self,
        owner: usize,
        name: &str,
        field_type: Option<usize>,
        offset: u64,
        is_static: bool,
        is_literal: bool,
    ) {
        self.model.types[owner].fields.push(Il2CppFieldInfo {
            name: name.to_string(),
            field_type,
            offset,
            is_static,
            is_literal,
        });
    }

    pub fn build(&self) -> Il2CppModel {
        self.model.clone()
    }
}
