//! Entity model: per-side arenas of classes, methods and fields.
//!
//! Nodes are addressed by integer handles into their side's [`ClassGraph`].
//! Ownership and cross references are plain handle lists populated once by
//! [`GraphBuilder`]; after construction the graph is immutable. Match state is
//! kept outside the graph, in [`crate::matcher::MatchMap`].

pub mod descriptor;
mod builder;
mod graph;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use builder::{BuildIssue, GraphBuilder, IssueKind};
pub use graph::ClassGraph;

pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_VOLATILE: u16 = 0x0040;
pub const ACC_BRIDGE: u16 = 0x0040;
pub const ACC_TRANSIENT: u16 = 0x0080;
pub const ACC_VARARGS: u16 = 0x0080;
pub const ACC_NATIVE: u16 = 0x0100;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;

macro_rules! handle {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

handle!(ClassId);
handle!(MethodId);
handle!(FieldId);

/// One of the two programs being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("A"),
            Side::B => f.write_str("B"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Class,
    Method,
    Field,
}

/// Handle to any entity on one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    Class(ClassId),
    Method(MethodId),
    Field(FieldId),
}

impl EntityRef {
    pub fn kind(self) -> EntityKind {
        match self {
            EntityRef::Class(_) => EntityKind::Class,
            EntityRef::Method(_) => EntityKind::Method,
            EntityRef::Field(_) => EntityKind::Field,
        }
    }
}

impl From<ClassId> for EntityRef {
    fn from(id: ClassId) -> Self {
        EntityRef::Class(id)
    }
}

impl From<MethodId> for EntityRef {
    fn from(id: MethodId) -> Self {
        EntityRef::Method(id)
    }
}

impl From<FieldId> for EntityRef {
    fn from(id: FieldId) -> Self {
        EntityRef::Field(id)
    }
}

/// Where a class node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassOrigin {
    /// Defined by this side's input set.
    Input,
    /// Defined by the shared set present on both sides.
    Shared,
    /// Referenced but never defined: primitives, arrays, external types.
    Placeholder,
}

/// Stable, name-based identity of an entity, used for export and for
/// plugin-provided pair constraints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<String>,
}

impl EntityKey {
    pub fn class(name: impl Into<String>) -> Self {
        Self { kind: EntityKind::Class, owner: None, name: name.into(), descriptor: None }
    }

    pub fn method(owner: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Method,
            owner: Some(owner.into()),
            name: name.into(),
            descriptor: Some(desc.into()),
        }
    }

    pub fn field(owner: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Field,
            owner: Some(owner.into()),
            name: name.into(),
            descriptor: Some(desc.into()),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.owner, &self.descriptor) {
            (Some(owner), Some(desc)) => write!(f, "{owner}.{}{}{desc}", self.name, sep(self.kind)),
            _ => f.write_str(&self.name),
        }
    }
}

fn sep(kind: EntityKind) -> &'static str {
    if kind == EntityKind::Field {
        ":"
    } else {
        ""
    }
}

#[derive(Debug, Clone)]
pub struct ClassInstance {
    /// Type id in descriptor form.
    pub id: String,
    pub name: String,
    pub side: Side,
    pub origin: ClassOrigin,
    pub access: u16,
    pub super_class: Option<ClassId>,
    pub interfaces: Vec<ClassId>,
    pub methods: Vec<MethodId>,
    pub fields: Vec<FieldId>,
    pub children: Vec<ClassId>,
    pub implementers: Vec<ClassId>,
    /// Methods that use this class as an argument or return type.
    pub method_type_refs: Vec<MethodId>,
    /// Fields whose value type is this class.
    pub field_type_refs: Vec<FieldId>,
    pub strings: Vec<String>,
    /// Dimensions and element type for array placeholders.
    pub array: Option<(u8, ClassId)>,
    pub hierarchy_resolved: bool,
}

impl ClassInstance {
    pub fn is_interface(&self) -> bool {
        self.access & ACC_INTERFACE != 0
    }

    pub fn is_input(&self) -> bool {
        self.origin == ClassOrigin::Input
    }

    /// Package part of the internal name, if any.
    pub fn package(&self) -> Option<&str> {
        if self.array.is_some() {
            return None;
        }
        self.name.rfind('/').map(|i| &self.name[..i])
    }
}

#[derive(Debug, Clone)]
pub struct MethodInstance {
    pub owner: ClassId,
    pub name: String,
    pub descriptor: String,
    pub access: u16,
    /// Declaration index within the owner.
    pub position: usize,
    pub args: Vec<ClassId>,
    pub ret: ClassId,
    pub refs_out: Vec<MethodId>,
    pub refs_in: Vec<MethodId>,
    pub field_reads: Vec<FieldId>,
    pub field_writes: Vec<FieldId>,
    pub class_refs: Vec<ClassId>,
    pub strings: Vec<String>,
    /// Member accesses that did not resolve inside the graph, as `owner.name desc`.
    pub external_refs: Vec<String>,
    pub code_size: Option<u32>,
}

impl MethodInstance {
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_static_init(&self) -> bool {
        self.name == "<clinit>"
    }

    /// Constructors and static initialisers keep their names under obfuscation.
    pub fn is_name_obfuscatable(&self) -> bool {
        !self.is_constructor() && !self.is_static_init()
    }
}

#[derive(Debug, Clone)]
pub struct FieldInstance {
    pub owner: ClassId,
    pub name: String,
    pub descriptor: String,
    pub access: u16,
    pub position: usize,
    pub ty: ClassId,
    pub readers: Vec<MethodId>,
    pub writers: Vec<MethodId>,
}
