//! Reflection models exchanged with the dumpers, and run reports
//!
//! The two models mirror what an IL2CPP dumper and a managed decompiler export for a
//! build. Type references are indices into the owning model's `types` list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// C++ toolchain that produced a native IL2CPP binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compiler {
    Msvc,
    Gcc,
    Clang,
    #[default]
    Unknown,
}

impl Compiler {
    pub fn is_known(&self) -> bool {
        !matches!(self, Compiler::Unknown)
    }
}

impl std::fmt::Display for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compiler::Msvc => write!(f, "MSVC"),
            Compiler::Gcc => write!(f, "GCC"),
            Compiler::Clang => write!(f, "Clang"),
            Compiler::Unknown => write!(f, "unknown"),
        }
    }
}

/// Reflection model of an IL2CPP build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Il2CppModel {
    #[serde(default)]
    pub compiler: Compiler,
    pub types: Vec<Il2CppTypeInfo>,
}

/// Type definition as seen through IL2CPP reflection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Il2CppTypeInfo {
    pub name: String,
    pub namespace: String,
    pub assembly: String,
    pub declaring_type: Option<usize>,
    pub base_type: Option<usize>,
    pub is_enum: bool,
    pub is_generic: bool,
    pub is_array: bool,
    pub fields: Vec<Il2CppFieldInfo>,
    pub properties: Vec<Il2CppPropertyInfo>,
    pub methods: Vec<Il2CppMethodInfo>,
}

/// Field with its native layout offset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Il2CppFieldInfo {
    pub name: String,
    pub field_type: Option<usize>,
    pub offset: u64,
    pub is_static: bool,
    pub is_literal: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Il2CppPropertyInfo {
    pub name: String,
    pub property_type: Option<usize>,
    /// Index into the declaring type's `methods`
    pub getter: Option<usize>,
    pub setter: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Il2CppMethodInfo {
    pub name: String,
    pub return_type: Option<usize>,
    pub parameters: Vec<usize>,
    pub is_static: bool,
}

/// Decompiled managed assembly
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssemblyModel {
    pub name: String,
    pub types: Vec<TypeDef>,
}

/// Managed type definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeDef {
    pub name: String,
    pub namespace: String,
    pub declaring_type: Option<usize>,
    pub base_type: Option<TypeSig>,
    pub generic_parameters: u32,
    pub fields: Vec<FieldDef>,
    pub properties: Vec<PropertyDef>,
    pub methods: Vec<MethodDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldDef {
    pub name: String,
    pub signature: TypeSig,
    pub attributes: u16,
    /// Explicit layout offset, only present for `[StructLayout(Explicit)]` types
    pub field_offset: Option<u32>,
}

impl FieldDef {
    pub fn is_static(&self) -> bool {
        self.attributes & field_attributes::STATIC != 0
    }

    pub fn is_literal(&self) -> bool {
        self.attributes & field_attributes::LITERAL != 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyDef {
    pub name: String,
    pub signature: TypeSig,
    pub get_method: Option<usize>,
    pub set_method: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodDef {
    pub name: String,
    pub return_type: TypeSig,
    pub parameters: Vec<TypeSig>,
    pub attributes: u16,
}

impl MethodDef {
    pub fn is_static(&self) -> bool {
        self.attributes & method_attributes::STATIC != 0
    }
}

/// Type signature of a managed member
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeSig {
    /// Reference to a type defined in the same model
    Type(usize),
    /// Single-dimension array of the element signature
    SzArray(Box<TypeSig>),
    /// Instantiation of a generic type definition
    GenericInst(usize, Vec<TypeSig>),
    /// Type from an assembly that was not decompiled
    Unresolved(String),
    #[default]
    Void,
}

impl TypeSig {
    /// The type definition a signature ultimately refers to
    pub fn type_def(&self) -> Option<usize> {
        match self {
            TypeSig::Type(index) | TypeSig::GenericInst(index, _) => Some(*index),
            TypeSig::SzArray(element) => element.type_def(),
            TypeSig::Unresolved(_) | TypeSig::Void => None,
        }
    }
}

/// Managed field attribute flags
pub mod field_attributes {
    pub const PRIVATE: u16 = 0x0001;
    pub const PUBLIC: u16 = 0x0006;
    pub const STATIC: u16 = 0x0010;
    pub const LITERAL: u16 = 0x0040;
}

/// Managed method attribute flags
pub mod method_attributes {
    pub const STATIC: u16 = 0x0010;
}

macro_rules! json_file_io {
    ($ty:ty) => {
        impl $ty {
            /// Load from a JSON file written by the dumper
            pub fn load(path: &Path) -> crate::Result<Self> {
                let content = std::fs::read_to_string(path)?;
                serde_json::from_str(&content).map_err(|e| {
                    crate::Error::parse(format!("{}: {}", path.display(), e))
                })
            }

            /// Save to a JSON file
            pub fn save(&self, path: &Path) -> crate::Result<()> {
                let content = serde_json::to_string_pretty(self)
                    .map_err(|e| crate::Error::parse(e.to_string()))?;
                std::fs::write(path, content)?;
                Ok(())
            }
        }
    };
}

json_file_io!(Il2CppModel);
json_file_io!(AssemblyModel);

/// Summary of one deobfuscation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub timestamp: DateTime<Utc>,
    pub check_offsets: bool,
    pub statistics: RunStatistics,
}

/// Counters collected while matching
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub clean_types: usize,
    pub candidate_types: usize,
    pub types_matched: usize,
    pub types_renamed: usize,
    pub fields_renamed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_flags() {
        let field = FieldDef {
            name: "MaxHealth".to_string(),
            attributes: field_attributes::PUBLIC
                | field_attributes::STATIC
                | field_attributes::LITERAL,
            ..Default::default()
        };
        assert!(field.is_static());
        assert!(field.is_literal());
    }

    #[test]
    fn test_signature_type_def() {
        let sig = TypeSig::SzArray(Box::new(TypeSig::GenericInst(3, vec![TypeSig::Type(1)])));
        assert_eq!(sig.type_def(), Some(3));
        assert_eq!(TypeSig::Unresolved("System.Int32".into()).type_def(), None);
    }

    #[test]
    fn test_model_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model = Il2CppModel {
            compiler: Compiler::Msvc,
            types: vec![Il2CppTypeInfo {
                name: "a1".to_string(),
                fields: vec![Il2CppFieldInfo {
                    name: "b2".to_string(),
                    offset: 0x10,
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        model.save(&path).unwrap();

        let loaded = Il2CppModel::load(&path).unwrap();
        assert_eq!(loaded.compiler, Compiler::Msvc);
        assert_eq!(loaded.types[0].fields[0].offset, 0x10);
    }

    #[test]
    fn test_load_reports_path_on_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = AssemblyModel::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
