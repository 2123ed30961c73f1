use serde::{Deserialize, Serialize};

use crate::flags::{ClassFlags, ObjectFlags, PackageFlags};
use crate::handle::{Guid, ObjectHandle};
use crate::name::NameId;

/// One node of the object graph.
#[derive(Clone, Debug)]
pub struct ObjectRecord {
    pub name: NameId,
    /// The class this object is an instance of. The `Class` class points at itself.
    pub class: ObjectHandle,
    /// Containing object. `None` only for top-level packages.
    pub outer: Option<ObjectHandle>,
    /// Template this object was created from. Plain objects default to their class's CDO.
    pub archetype: Option<ObjectHandle>,
    pub flags: ObjectFlags,
    pub kind: ObjectKind,
    /// Tagged property values, serialized after the variant header.
    pub properties: Vec<Property>,
}

impl ObjectRecord {
    pub(crate) fn new(
        name: NameId,
        class: ObjectHandle,
        outer: Option<ObjectHandle>,
        flags: ObjectFlags,
        kind: ObjectKind,
    ) -> Self {
        Self {
            name,
            class,
            outer,
            archetype: None,
            flags,
            kind,
            properties: Vec::new(),
        }
    }
}

/// Node variants. Each one serializes its own header before the property list.
#[derive(Clone, Debug)]
pub enum ObjectKind {
    Plain,
    Package(PackageData),
    Struct(StructData),
    Field(FieldData),
    Component(ComponentData),
    Redirector(RedirectorData),
}

impl ObjectKind {
    pub fn as_package(&self) -> Option<&PackageData> {
        match self {
            Self::Package(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructData> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassData> {
        self.as_struct().and_then(|s| s.class.as_ref())
    }

    pub fn as_field(&self) -> Option<&FieldData> {
        match self {
            Self::Field(f) => Some(f),
            _ => None,
        }
    }

    /// Structs and plain fields both sit in a `Children`/`Next` chain.
    pub fn is_field_like(&self) -> bool {
        matches!(self, Self::Struct(_) | Self::Field(_))
    }

    /// Next sibling in the owning struct's field chain.
    pub fn next(&self) -> Option<ObjectHandle> {
        match self {
            Self::Struct(s) => s.next,
            Self::Field(f) => f.next,
            _ => None,
        }
    }
}

/// Package header state kept on the package object itself.
#[derive(Clone, Debug, Default)]
pub struct PackageData {
    pub flags: PackageFlags,
    pub guid: Guid,
    pub folder_name: String,
    /// Every export of the package is resident in memory.
    pub fully_loaded: bool,
    pub dirty: bool,
    /// Cross-level GUIDs this package's levels reference, grouped per level.
    pub import_guids: Vec<LevelGuids>,
    /// Cross-level GUIDs of objects inside this package.
    pub export_guids: Vec<(Guid, ObjectHandle)>,
    pub thumbnails: Vec<Thumbnail>,
    /// Net object counts by generation, carried from the last load.
    pub generation_net_object_counts: Vec<u32>,
}

/// GUIDs referenced in one other level.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelGuids {
    pub level_name: String,
    pub guids: Vec<Guid>,
}

/// Cached preview image for an object of the package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Thumbnail {
    pub object: ObjectHandle,
    pub width: u32,
    pub height: u32,
    pub image: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StructKind {
    ScriptStruct,
    Function,
    State,
    Class,
}

/// Struct-like node: script structs, functions, states and classes.
#[derive(Clone, Debug)]
pub struct StructData {
    pub kind: StructKind,
    /// Field flags; function flags for functions.
    pub field_flags: u64,
    pub next: Option<ObjectHandle>,
    pub super_struct: Option<ObjectHandle>,
    /// Head of the declared field chain.
    pub children: Option<ObjectHandle>,
    pub script: Vec<u8>,
    /// Objects referenced from compiled script.
    pub script_refs: Vec<ObjectHandle>,
    /// Present only for classes.
    pub class: Option<ClassData>,
}

impl StructData {
    pub(crate) fn new(kind: StructKind, super_struct: Option<ObjectHandle>) -> Self {
        Self {
            kind,
            field_flags: 0,
            next: None,
            super_struct,
            children: None,
            script: Vec::new(),
            script_refs: Vec::new(),
            class: None,
        }
    }

    pub(crate) fn class(super_struct: Option<ObjectHandle>, flags: ClassFlags) -> Self {
        Self {
            class: Some(ClassData {
                flags,
                default_object: None,
                within: None,
            }),
            ..Self::new(StructKind::Class, super_struct)
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClassData {
    pub flags: ClassFlags,
    pub default_object: Option<ObjectHandle>,
    /// Required outer class for instances.
    pub within: Option<ObjectHandle>,
}

/// Non-struct field declaration.
#[derive(Clone, Debug)]
pub struct FieldData {
    pub kind: FieldKind,
    pub flags: u64,
    pub next: Option<ObjectHandle>,
}

#[derive(Clone, Debug)]
pub enum FieldKind {
    Property(PropertyType),
    Enum(Vec<NameId>),
    Const(String),
}

/// Declared type of a property field.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyType {
    Byte { enum_def: Option<ObjectHandle> },
    Int,
    Bool,
    Float,
    Name,
    Str,
    Object { class: Option<ObjectHandle> },
    Array { inner: Option<ObjectHandle> },
    Struct { def: Option<ObjectHandle> },
}

impl PropertyType {
    /// Name of the intrinsic class that declares properties of this type.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Byte { .. } => "ByteProperty",
            Self::Int => "IntProperty",
            Self::Bool => "BoolProperty",
            Self::Float => "FloatProperty",
            Self::Name => "NameProperty",
            Self::Str => "StrProperty",
            Self::Object { .. } => "ObjectProperty",
            Self::Array { .. } => "ArrayProperty",
            Self::Struct { .. } => "StructProperty",
        }
    }

    pub(crate) fn tag(&self) -> u8 {
        match self {
            Self::Byte { .. } => 1,
            Self::Int => 2,
            Self::Bool => 3,
            Self::Float => 4,
            Self::Name => 5,
            Self::Str => 6,
            Self::Object { .. } => 7,
            Self::Array { .. } => 8,
            Self::Struct { .. } => 9,
        }
    }

    /// The object the declaration depends on (enum, class, inner or struct).
    pub fn referenced(&self) -> Option<ObjectHandle> {
        match self {
            Self::Byte { enum_def } => *enum_def,
            Self::Object { class } => *class,
            Self::Array { inner } => *inner,
            Self::Struct { def } => *def,
            _ => None,
        }
    }
}

/// Per-instance subobject template data.
#[derive(Clone, Debug)]
pub struct ComponentData {
    /// Class whose defaults own the template this component was created from.
    pub template_owner_class: Option<ObjectHandle>,
    pub template_name: NameId,
    /// Component on the owner class's default object that serves as the source template.
    pub source_default: Option<ObjectHandle>,
}

#[derive(Clone, Debug)]
pub struct RedirectorData {
    pub destination: Option<ObjectHandle>,
}

/// One tagged property value.
#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub name: NameId,
    pub value: PropertyValue,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Int(i32),
    Float(f32),
    Bool(bool),
    Str(String),
    Name(NameId),
    Object(Option<ObjectHandle>),
    /// Reference that may point into another level; resolved by GUID.
    CrossLevel(Option<ObjectHandle>),
    Bytes(Vec<u8>),
    Array(Vec<PropertyValue>),
    Struct(Vec<Property>),
}

impl PropertyValue {
    pub(crate) fn type_tag(&self) -> u8 {
        match self {
            Self::Int(_) => 1,
            Self::Float(_) => 2,
            Self::Bool(_) => 3,
            Self::Str(_) => 4,
            Self::Name(_) => 5,
            Self::Object(_) => 6,
            Self::CrossLevel(_) => 7,
            Self::Bytes(_) => 8,
            Self::Array(_) => 9,
            Self::Struct(_) => 10,
        }
    }
}
