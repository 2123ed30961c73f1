use std::collections::HashMap;

use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::flags::{ClassFlags, FunctionFlags, ObjectFlags, PropertyFlags};
use crate::handle::ObjectHandle;
use crate::name::{NameId, NamePool};
use crate::object::{
    ClassData, ComponentData, FieldData, FieldKind, ObjectKind, ObjectRecord, PackageData,
    Property, PropertyType, PropertyValue, RedirectorData, StructData, StructKind,
};

/// Name of the package holding the intrinsic classes.
pub const CORE_PACKAGE: &str = "Core";

/// Intrinsic class hierarchy, parents before children.
const INTRINSIC_CLASSES: &[(&str, Option<&str>)] = &[
    ("Object", None),
    ("Field", Some("Object")),
    ("Struct", Some("Field")),
    ("ScriptStruct", Some("Struct")),
    ("Function", Some("Struct")),
    ("State", Some("Struct")),
    ("Class", Some("State")),
    ("Enum", Some("Field")),
    ("Const", Some("Field")),
    ("Property", Some("Field")),
    ("ByteProperty", Some("Property")),
    ("IntProperty", Some("Property")),
    ("BoolProperty", Some("Property")),
    ("FloatProperty", Some("Property")),
    ("NameProperty", Some("Property")),
    ("StrProperty", Some("Property")),
    ("ObjectProperty", Some("Property")),
    ("ArrayProperty", Some("Property")),
    ("StructProperty", Some("Property")),
    ("Component", Some("Object")),
    ("Interface", Some("Object")),
];

/// Arena of objects plus the name pool they share.
///
/// `new()` bootstraps the `Core` package: every intrinsic class is created
/// followed directly by its default object, so the arena itself already
/// satisfies "a class's default object comes right after the class".
#[derive(Clone, Debug)]
pub struct ObjectGraph {
    objects: Vec<ObjectRecord>,
    names: NamePool,
    core_package: ObjectHandle,
    class_class: ObjectHandle,
    package_class: ObjectHandle,
    redirector_class: ObjectHandle,
    intrinsic: HashMap<&'static str, ObjectHandle>,
    bootstrap: Vec<ObjectHandle>,
}

impl ObjectGraph {
    /// Create a graph holding only the bootstrapped `Core` package.
    pub fn new() -> Self {
        let mut graph = Self {
            objects: Vec::new(),
            names: NamePool::new(),
            core_package: ObjectHandle::new(0),
            class_class: ObjectHandle::new(0),
            package_class: ObjectHandle::new(0),
            redirector_class: ObjectHandle::new(0),
            intrinsic: HashMap::new(),
            bootstrap: Vec::new(),
        };
        graph.bootstrap_core();
        graph
    }

    fn bootstrap_core(&mut self) {
        // Layout: Core package, then (class, default object) pairs.
        let class_slot = INTRINSIC_CLASSES
            .iter()
            .position(|(name, _)| *name == "Class")
            .map_or(0, |pos| 1 + 2 * pos);
        self.class_class = ObjectHandle::new(class_slot);

        let core_name = self.names.intern(CORE_PACKAGE);
        let core_flags = ObjectFlags::PUBLIC | ObjectFlags::NATIVE | ObjectFlags::STANDALONE;
        self.core_package = self.push(ObjectRecord::new(
            core_name,
            self.class_class,
            None,
            core_flags,
            ObjectKind::Package(PackageData {
                fully_loaded: true,
                ..PackageData::default()
            }),
        ));

        for &(name, parent) in INTRINSIC_CLASSES {
            let super_class = parent.and_then(|p| self.intrinsic.get(p).copied());
            let class = self.insert_class(
                self.core_package,
                name,
                super_class,
                ClassFlags::INTRINSIC | ClassFlags::NATIVE,
            );
            self.intrinsic.insert(name, class);
            self.bootstrap.push(class);
        }
        debug_assert_eq!(self.intrinsic.get("Class"), Some(&self.class_class));

        let object_class = self.intrinsic.get("Object").copied();
        self.package_class =
            self.insert_class(self.core_package, "Package", object_class, ClassFlags::NATIVE);
        self.redirector_class = self.insert_class(
            self.core_package,
            "ObjectRedirector",
            object_class,
            ClassFlags::NATIVE,
        );
        self.objects[self.core_package.index()].class = self.package_class;
        debug!(objects = self.objects.len(), "bootstrapped core package");
    }

    fn push(&mut self, record: ObjectRecord) -> ObjectHandle {
        let handle = ObjectHandle::new(self.objects.len());
        self.objects.push(record);
        handle
    }

    fn insert_class(
        &mut self,
        outer: ObjectHandle,
        name: &str,
        super_class: Option<ObjectHandle>,
        flags: ClassFlags,
    ) -> ObjectHandle {
        let name = self.names.intern(name);
        let mut object_flags = ObjectFlags::PUBLIC | ObjectFlags::STANDALONE;
        if flags.contains(ClassFlags::NATIVE) {
            object_flags |= ObjectFlags::NATIVE;
        }
        let class = self.push(ObjectRecord::new(
            name,
            self.class_class,
            Some(outer),
            object_flags,
            ObjectKind::Struct(StructData::class(super_class, flags)),
        ));
        self.attach_default_object(class);
        class
    }

    fn attach_default_object(&mut self, class: ObjectHandle) -> ObjectHandle {
        let record = &self.objects[class.index()];
        let outer = record.outer;
        let name = format!("Default__{}", self.names.resolve(record.name));
        let archetype = self
            .super_struct(class)
            .and_then(|parent| self.default_object(parent));

        let name = self.names.intern(&name);
        let mut cdo = ObjectRecord::new(
            name,
            class,
            outer,
            ObjectFlags::PUBLIC | ObjectFlags::CLASS_DEFAULT_OBJECT,
            ObjectKind::Plain,
        );
        cdo.archetype = archetype;
        let cdo = self.push(cdo);
        if let Some(data) = self.class_data_mut(class) {
            data.default_object = Some(cdo);
        }
        cdo
    }

    // ---------------------------------------------------------------
    // Names
    // ---------------------------------------------------------------

    pub fn names(&self) -> &NamePool {
        &self.names
    }

    pub fn intern(&mut self, text: &str) -> NameId {
        self.names.intern(text)
    }

    /// Object name as text.
    pub fn name(&self, object: ObjectHandle) -> &str {
        self.names.resolve(self.objects[object.index()].name)
    }

    // ---------------------------------------------------------------
    // Access
    // ---------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Every handle, in creation order.
    pub fn handles(&self) -> impl Iterator<Item = ObjectHandle> {
        (0..self.objects.len()).map(ObjectHandle::new)
    }

    pub fn get(&self, object: ObjectHandle) -> Option<&ObjectRecord> {
        self.objects.get(object.index())
    }

    /// Record for a handle issued by this graph.
    ///
    /// # Panics
    ///
    /// Panics if the handle came from another graph.
    pub fn object(&self, object: ObjectHandle) -> &ObjectRecord {
        &self.objects[object.index()]
    }

    pub fn object_mut(&mut self, object: ObjectHandle) -> &mut ObjectRecord {
        &mut self.objects[object.index()]
    }

    fn ensure(&self, object: ObjectHandle) -> GraphResult<&ObjectRecord> {
        self.objects
            .get(object.index())
            .ok_or(GraphError::UnknownObject(object))
    }

    pub fn core_package(&self) -> ObjectHandle {
        self.core_package
    }

    pub fn class_class(&self) -> ObjectHandle {
        self.class_class
    }

    pub fn package_class(&self) -> ObjectHandle {
        self.package_class
    }

    pub fn redirector_class(&self) -> ObjectHandle {
        self.redirector_class
    }

    /// Look up one of the intrinsic classes by name.
    pub fn intrinsic_class(&self, name: &str) -> Option<ObjectHandle> {
        self.intrinsic.get(name).copied()
    }

    /// The intrinsic classes in bootstrap order, parents first.
    pub fn bootstrap_classes(&self) -> &[ObjectHandle] {
        &self.bootstrap
    }

    // ---------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------

    fn ensure_unique(&self, outer: Option<ObjectHandle>, name: &str) -> GraphResult<()> {
        if self.find_object(outer, name).is_some() {
            return Err(GraphError::DuplicateObject {
                outer: outer.map_or_else(|| "<root>".to_string(), |o| self.path_name(o, None)),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_class(&self, class: ObjectHandle) -> GraphResult<()> {
        self.ensure(class)?;
        if !self.is_class(class) {
            return Err(GraphError::NotAClass(self.full_name(class)));
        }
        Ok(())
    }

    fn ensure_struct(&self, object: ObjectHandle) -> GraphResult<()> {
        if self.ensure(object)?.kind.as_struct().is_none() {
            return Err(GraphError::NotAStruct(self.full_name(object)));
        }
        Ok(())
    }

    /// Create a new, fully loaded top-level package.
    pub fn create_package(&mut self, name: &str) -> GraphResult<ObjectHandle> {
        self.ensure_unique(None, name)?;
        let name_id = self.names.intern(name);
        let package = self.push(ObjectRecord::new(
            name_id,
            self.package_class,
            None,
            ObjectFlags::PUBLIC | ObjectFlags::STANDALONE,
            ObjectKind::Package(PackageData {
                fully_loaded: true,
                dirty: true,
                ..PackageData::default()
            }),
        ));
        debug!(package = name, "created package");
        Ok(package)
    }

    /// Create a class with its default object.
    pub fn create_class(
        &mut self,
        outer: ObjectHandle,
        name: &str,
        super_class: Option<ObjectHandle>,
        flags: ClassFlags,
    ) -> GraphResult<ObjectHandle> {
        self.ensure(outer)?;
        if let Some(parent) = super_class {
            self.ensure_class(parent)?;
        }
        self.ensure_unique(Some(outer), name)?;
        let inherited = super_class.map_or(ClassFlags::empty(), |parent| {
            self.class_flags(parent) & ClassFlags::HAS_COMPONENTS
        });
        let flags = flags | inherited;
        Ok(self.insert_class(outer, name, super_class, flags))
    }

    fn insert_struct(
        &mut self,
        owner: ObjectHandle,
        name: &str,
        data: StructData,
        class_name: &str,
    ) -> GraphResult<ObjectHandle> {
        self.ensure_struct(owner)?;
        self.ensure_unique(Some(owner), name)?;
        let class = self
            .intrinsic_class(class_name)
            .ok_or_else(|| GraphError::NotAClass(class_name.to_string()))?;
        let name = self.names.intern(name);
        let mut record = ObjectRecord::new(
            name,
            class,
            Some(owner),
            ObjectFlags::PUBLIC,
            ObjectKind::Struct(data),
        );
        record.archetype = self.default_object(class);
        let handle = self.push(record);
        self.link_field(owner, handle);
        Ok(handle)
    }

    /// Declare a script struct inside `owner`.
    pub fn create_struct(
        &mut self,
        owner: ObjectHandle,
        name: &str,
        super_struct: Option<ObjectHandle>,
    ) -> GraphResult<ObjectHandle> {
        let data = StructData::new(StructKind::ScriptStruct, super_struct);
        self.insert_struct(owner, name, data, "ScriptStruct")
    }

    /// Declare a state inside `owner`.
    pub fn create_state(
        &mut self,
        owner: ObjectHandle,
        name: &str,
        super_state: Option<ObjectHandle>,
    ) -> GraphResult<ObjectHandle> {
        let data = StructData::new(StructKind::State, super_state);
        self.insert_struct(owner, name, data, "State")
    }

    /// Declare a function inside `owner`.
    pub fn create_function(
        &mut self,
        owner: ObjectHandle,
        name: &str,
        flags: FunctionFlags,
    ) -> GraphResult<ObjectHandle> {
        let mut data = StructData::new(StructKind::Function, None);
        data.field_flags = flags.bits();
        self.insert_struct(owner, name, data, "Function")
    }

    fn insert_field(
        &mut self,
        owner: ObjectHandle,
        name: &str,
        data: FieldData,
        class_name: &str,
    ) -> GraphResult<ObjectHandle> {
        self.ensure_struct(owner)?;
        self.ensure_unique(Some(owner), name)?;
        let class = self
            .intrinsic_class(class_name)
            .ok_or_else(|| GraphError::NotAClass(class_name.to_string()))?;
        let name = self.names.intern(name);
        let mut record = ObjectRecord::new(
            name,
            class,
            Some(owner),
            ObjectFlags::PUBLIC,
            ObjectKind::Field(data),
        );
        record.archetype = self.default_object(class);
        let handle = self.push(record);
        self.link_field(owner, handle);
        Ok(handle)
    }

    /// Declare a property at the end of `owner`'s field chain.
    pub fn add_property(
        &mut self,
        owner: ObjectHandle,
        name: &str,
        ty: PropertyType,
        flags: PropertyFlags,
    ) -> GraphResult<ObjectHandle> {
        let class_name = ty.class_name();
        let data = FieldData {
            kind: FieldKind::Property(ty),
            flags: flags.bits(),
            next: None,
        };
        self.insert_field(owner, name, data, class_name)
    }

    /// Declare an enumeration with the given value names.
    pub fn add_enum(
        &mut self,
        owner: ObjectHandle,
        name: &str,
        values: &[&str],
    ) -> GraphResult<ObjectHandle> {
        let values = values.iter().map(|v| self.names.intern(v)).collect();
        let data = FieldData {
            kind: FieldKind::Enum(values),
            flags: 0,
            next: None,
        };
        self.insert_field(owner, name, data, "Enum")
    }

    pub fn add_const(
        &mut self,
        owner: ObjectHandle,
        name: &str,
        value: &str,
    ) -> GraphResult<ObjectHandle> {
        let data = FieldData {
            kind: FieldKind::Const(value.to_string()),
            flags: 0,
            next: None,
        };
        self.insert_field(owner, name, data, "Const")
    }

    fn link_field(&mut self, owner: ObjectHandle, field: ObjectHandle) {
        let head = match &self.objects[owner.index()].kind {
            ObjectKind::Struct(s) => s.children,
            _ => return,
        };
        let Some(mut last) = head else {
            if let ObjectKind::Struct(s) = &mut self.objects[owner.index()].kind {
                s.children = Some(field);
            }
            return;
        };
        while let Some(next) = self.objects[last.index()].kind.next() {
            last = next;
        }
        match &mut self.objects[last.index()].kind {
            ObjectKind::Struct(s) => s.next = Some(field),
            ObjectKind::Field(f) => f.next = Some(field),
            _ => {}
        }
    }

    /// Instantiate `class` inside `outer`. The archetype defaults to the class's default object.
    pub fn create_object(
        &mut self,
        class: ObjectHandle,
        outer: ObjectHandle,
        name: &str,
        flags: ObjectFlags,
    ) -> GraphResult<ObjectHandle> {
        self.ensure_class(class)?;
        self.ensure(outer)?;
        self.ensure_unique(Some(outer), name)?;

        let kind = if self.is_child_of(class, self.package_class) {
            ObjectKind::Package(PackageData {
                fully_loaded: true,
                ..PackageData::default()
            })
        } else if self.is_child_of(class, self.redirector_class) {
            ObjectKind::Redirector(RedirectorData { destination: None })
        } else if self
            .intrinsic_class("Component")
            .is_some_and(|component| self.is_child_of(class, component))
        {
            ObjectKind::Component(ComponentData {
                template_owner_class: None,
                template_name: NameId::NONE,
                source_default: None,
            })
        } else {
            ObjectKind::Plain
        };

        let name = self.names.intern(name);
        let mut record = ObjectRecord::new(name, class, Some(outer), flags, kind);
        record.archetype = self.default_object(class);
        Ok(self.push(record))
    }

    /// Instantiate a component from the template named `template_name` on
    /// `template_owner`'s default object.
    pub fn create_component(
        &mut self,
        class: ObjectHandle,
        outer: ObjectHandle,
        name: &str,
        template_owner: Option<ObjectHandle>,
        template_name: &str,
    ) -> GraphResult<ObjectHandle> {
        let component = self.create_object(class, outer, name, ObjectFlags::empty())?;
        let source_default = template_owner
            .and_then(|owner| self.default_object(owner))
            .and_then(|cdo| self.find_object(Some(cdo), template_name));
        let template_name = self.names.intern(template_name);
        let record = &mut self.objects[component.index()];
        if let Some(source) = source_default {
            record.archetype = Some(source);
        }
        record.kind = ObjectKind::Component(ComponentData {
            template_owner_class: template_owner,
            template_name,
            source_default,
        });
        Ok(component)
    }

    /// Create a redirector that forwards loads to `destination`.
    pub fn create_redirector(
        &mut self,
        outer: ObjectHandle,
        name: &str,
        destination: ObjectHandle,
    ) -> GraphResult<ObjectHandle> {
        self.ensure(destination)?;
        let redirector = self.create_object(
            self.redirector_class,
            outer,
            name,
            ObjectFlags::PUBLIC | ObjectFlags::STANDALONE,
        )?;
        self.objects[redirector.index()].kind = ObjectKind::Redirector(RedirectorData {
            destination: Some(destination),
        });
        Ok(redirector)
    }

    /// Set (or replace) a tagged property value.
    pub fn set_property(
        &mut self,
        object: ObjectHandle,
        name: &str,
        value: PropertyValue,
    ) -> GraphResult<()> {
        self.ensure(object)?;
        let name = self.names.intern(name);
        let properties = &mut self.objects[object.index()].properties;
        match properties.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => properties.push(Property { name, value }),
        }
        Ok(())
    }

    pub fn set_archetype(
        &mut self,
        object: ObjectHandle,
        archetype: Option<ObjectHandle>,
    ) -> GraphResult<()> {
        self.ensure(object)?;
        if let Some(a) = archetype {
            self.ensure(a)?;
        }
        self.objects[object.index()].archetype = archetype;
        Ok(())
    }

    /// Record a script reference from a struct's compiled code.
    pub fn add_script_ref(&mut self, owner: ObjectHandle, target: ObjectHandle) -> GraphResult<()> {
        self.ensure_struct(owner)?;
        self.ensure(target)?;
        if let ObjectKind::Struct(s) = &mut self.objects[owner.index()].kind {
            s.script_refs.push(target);
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    pub fn class_of(&self, object: ObjectHandle) -> ObjectHandle {
        self.objects[object.index()].class
    }

    pub fn outer_of(&self, object: ObjectHandle) -> Option<ObjectHandle> {
        self.objects[object.index()].outer
    }

    pub fn archetype_of(&self, object: ObjectHandle) -> Option<ObjectHandle> {
        self.objects[object.index()].archetype
    }

    pub fn flags(&self, object: ObjectHandle) -> ObjectFlags {
        self.objects[object.index()].flags
    }

    pub fn has_flags(&self, object: ObjectHandle, flags: ObjectFlags) -> bool {
        self.flags(object).intersects(flags)
    }

    /// Top-level package containing `object` (the object itself when it has no outer).
    pub fn outermost(&self, object: ObjectHandle) -> ObjectHandle {
        let mut current = object;
        while let Some(outer) = self.objects[current.index()].outer {
            current = outer;
        }
        current
    }

    /// Returns `true` if `outer` appears in `object`'s outer chain.
    pub fn is_in(&self, object: ObjectHandle, outer: ObjectHandle) -> bool {
        let mut current = self.objects[object.index()].outer;
        while let Some(c) = current {
            if c == outer {
                return true;
            }
            current = self.objects[c.index()].outer;
        }
        false
    }

    pub fn is_package(&self, object: ObjectHandle) -> bool {
        self.objects[object.index()].kind.as_package().is_some()
    }

    pub fn is_class(&self, object: ObjectHandle) -> bool {
        self.objects[object.index()].kind.as_class().is_some()
    }

    /// Struct, function, state or class.
    pub fn is_struct(&self, object: ObjectHandle) -> bool {
        self.objects[object.index()].kind.as_struct().is_some()
    }

    pub fn is_default_object(&self, object: ObjectHandle) -> bool {
        self.has_flags(object, ObjectFlags::CLASS_DEFAULT_OBJECT)
    }

    /// Returns `true` if the object or any outer is a default object or archetype.
    pub fn is_template(&self, object: ObjectHandle) -> bool {
        let mut current = Some(object);
        while let Some(c) = current {
            if self.has_flags(c, ObjectFlags::CLASS_DEFAULT_OBJECT | ObjectFlags::ARCHETYPE_OBJECT) {
                return true;
            }
            current = self.objects[c.index()].outer;
        }
        false
    }

    pub fn super_struct(&self, object: ObjectHandle) -> Option<ObjectHandle> {
        self.objects[object.index()]
            .kind
            .as_struct()
            .and_then(|s| s.super_struct)
    }

    pub fn class_data(&self, class: ObjectHandle) -> Option<&ClassData> {
        self.objects.get(class.index())?.kind.as_class()
    }

    fn class_data_mut(&mut self, class: ObjectHandle) -> Option<&mut ClassData> {
        match &mut self.objects[class.index()].kind {
            ObjectKind::Struct(StructData {
                class: Some(data), ..
            }) => Some(data),
            _ => None,
        }
    }

    pub fn class_flags(&self, class: ObjectHandle) -> ClassFlags {
        self.class_data(class)
            .map_or(ClassFlags::empty(), |data| data.flags)
    }

    pub fn default_object(&self, class: ObjectHandle) -> Option<ObjectHandle> {
        self.class_data(class).and_then(|data| data.default_object)
    }

    pub fn is_intrinsic_class(&self, class: ObjectHandle) -> bool {
        self.class_flags(class).contains(ClassFlags::INTRINSIC)
    }

    /// Returns `true` if `class` is `base` or derives from it.
    pub fn is_child_of(&self, class: ObjectHandle, base: ObjectHandle) -> bool {
        let mut current = Some(class);
        while let Some(c) = current {
            if c == base {
                return true;
            }
            current = self.super_struct(c);
        }
        false
    }

    /// Returns `true` if `object` is an instance of `class` or a subclass.
    pub fn is_a(&self, object: ObjectHandle, class: ObjectHandle) -> bool {
        self.is_child_of(self.class_of(object), class)
    }

    /// Nearest class in the outer chain, starting at the object itself.
    pub fn owner_class(&self, object: ObjectHandle) -> Option<ObjectHandle> {
        let mut current = Some(object);
        while let Some(c) = current {
            if self.is_class(c) {
                return Some(c);
            }
            current = self.objects[c.index()].outer;
        }
        None
    }

    /// Declared fields of a struct in chain order.
    pub fn fields(&self, owner: ObjectHandle) -> Vec<ObjectHandle> {
        let mut fields = Vec::new();
        let mut current = self.objects[owner.index()]
            .kind
            .as_struct()
            .and_then(|s| s.children);
        while let Some(field) = current {
            fields.push(field);
            current = self.objects[field.index()].kind.next();
        }
        fields
    }

    pub fn package_data(&self, object: ObjectHandle) -> Option<&PackageData> {
        self.objects.get(object.index())?.kind.as_package()
    }

    pub fn package_data_mut(&mut self, object: ObjectHandle) -> Option<&mut PackageData> {
        match &mut self.objects.get_mut(object.index())?.kind {
            ObjectKind::Package(p) => Some(p),
            _ => None,
        }
    }

    /// Find a live object by outer and case-insensitive name.
    pub fn find_object(&self, outer: Option<ObjectHandle>, name: &str) -> Option<ObjectHandle> {
        let name = self.names.find(name)?;
        self.objects
            .iter()
            .position(|r| {
                r.outer == outer && r.name == name && !r.flags.contains(ObjectFlags::PENDING_KILL)
            })
            .map(ObjectHandle::new)
    }

    /// Resolve a dotted path such as `Core.Object`.
    pub fn find_path(&self, path: &str) -> Option<ObjectHandle> {
        let mut current = None;
        for segment in path.split('.') {
            current = Some(self.find_object(current, segment)?);
        }
        current
    }

    /// Dotted path from the outermost object down, excluding `stop` and its outers.
    pub fn path_name(&self, object: ObjectHandle, stop: Option<ObjectHandle>) -> String {
        let mut parts = Vec::new();
        let mut current = Some(object);
        while let Some(c) = current {
            if Some(c) == stop {
                break;
            }
            parts.push(self.name(c));
            current = self.objects[c.index()].outer;
        }
        parts.reverse();
        parts.join(".")
    }

    pub fn class_name(&self, object: ObjectHandle) -> &str {
        self.name(self.class_of(object))
    }

    /// `"<ClassName> <Path>"`, the identity used when conforming tables.
    pub fn full_name(&self, object: ObjectHandle) -> String {
        format!("{} {}", self.class_name(object), self.path_name(object, None))
    }
}

impl Default for ObjectGraph {
    fn default() -> Self {
        Self::new()
    }
}
