//! Binary loader: turns class files, archives and record dumps into
//! [`ClassRecord`]s.
//!
//! The records carry only the structural facts the entity model needs:
//! names, hierarchy, members, and the references found in method bodies.
//! Everything here is side-agnostic; sides are assigned when the records are
//! handed to [`crate::env::ClassEnvironment::build`].

mod archive;
pub mod classfile;
mod reader;

use serde::{Deserialize, Serialize};

use crate::error::MatcherError;

pub use archive::{load_path, LoadedClasses};
pub use classfile::parse_class;

/// Kind of a reference found while scanning a method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RefKind {
    Call,
    FieldRead,
    FieldWrite,
    TypeRef,
}

/// One instruction-level reference.
///
/// `owner` is an internal class name (`a/b/C`) or an array descriptor.
/// For [`RefKind::TypeRef`] the `name` and `descriptor` are empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionRef {
    pub kind: RefKind,
    pub owner: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub descriptor: String,
}

impl InstructionRef {
    pub fn call(owner: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self { kind: RefKind::Call, owner: owner.into(), name: name.into(), descriptor: desc.into() }
    }

    pub fn field_read(
        owner: impl Into<String>,
        name: impl Into<String>,
        desc: impl Into<String>,
    ) -> Self {
        Self {
            kind: RefKind::FieldRead,
            owner: owner.into(),
            name: name.into(),
            descriptor: desc.into(),
        }
    }

    pub fn field_write(
        owner: impl Into<String>,
        name: impl Into<String>,
        desc: impl Into<String>,
    ) -> Self {
        Self {
            kind: RefKind::FieldWrite,
            owner: owner.into(),
            name: name.into(),
            descriptor: desc.into(),
        }
    }

    pub fn type_ref(owner: impl Into<String>) -> Self {
        Self { kind: RefKind::TypeRef, owner: owner.into(), name: String::new(), descriptor: String::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRecord {
    pub name: String,
    pub descriptor: String,
    #[serde(default)]
    pub access: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodRecord {
    pub name: String,
    pub descriptor: String,
    #[serde(default)]
    pub access: u16,
    #[serde(default)]
    pub refs: Vec<InstructionRef>,
    /// String constants loaded by the body.
    #[serde(default)]
    pub strings: Vec<String>,
    /// Bytecode length; `None` for abstract and native methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_size: Option<u32>,
}

/// Structural facts for one class, as extracted by the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecord {
    /// Internal binary name, e.g. `com/example/Foo`.
    pub binary_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_name: Option<String>,
    #[serde(default)]
    pub interface_names: Vec<String>,
    #[serde(default)]
    pub access: u16,
    #[serde(default)]
    pub fields: Vec<FieldRecord>,
    #[serde(default)]
    pub methods: Vec<MethodRecord>,
}

impl ClassRecord {
    pub fn new(binary_name: impl Into<String>) -> Self {
        Self {
            binary_name: binary_name.into(),
            super_name: Some("java/lang/Object".to_string()),
            interface_names: Vec::new(),
            access: 0x0021,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Check every descriptor so a bad record is rejected before it enters a graph.
    pub fn validate(&self) -> Result<(), MatcherError> {
        use crate::model::descriptor;

        if self.binary_name.is_empty() {
            return Err(MatcherError::malformed("<unnamed>", "empty class name"));
        }
        for field in &self.fields {
            descriptor::parse_field_type(&field.descriptor).map_err(|msg| {
                MatcherError::malformed(
                    &self.binary_name,
                    format!("field {}: {msg}", field.name),
                )
            })?;
        }
        for method in &self.methods {
            descriptor::parse_method(&method.descriptor).map_err(|msg| {
                MatcherError::malformed(
                    &self.binary_name,
                    format!("method {}{}: {msg}", method.name, method.descriptor),
                )
            })?;
        }
        Ok(())
    }
}
