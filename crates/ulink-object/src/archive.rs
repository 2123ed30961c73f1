//! The `Archive` visitor and per-variant serialization.
//!
//! Every consumer of object data (tagger, dependency sorter, payload writer,
//! dependency collector) implements [`Archive`]. [`ObjectGraph::serialize`]
//! dispatches on the node variant and feeds the same sequence of references,
//! names and bytes to each of them.

use crate::graph::ObjectGraph;
use crate::handle::{Guid, ObjectHandle};
use crate::name::NameId;
use crate::object::{FieldKind, ObjectKind, Property, PropertyValue};

/// Receives the data of one object as it serializes itself.
///
/// Only [`serialize_object`](Archive::serialize_object) is required; the
/// other hooks default to forwarding or ignoring, so reference-only visitors
/// stay small.
pub trait Archive {
    /// An object reference. `None` is the null reference.
    fn serialize_object(&mut self, object: Option<ObjectHandle>);

    /// A reference that is allowed to point into another level.
    fn serialize_cross_level(&mut self, object: Option<ObjectHandle>) {
        self.serialize_object(object);
    }

    fn serialize_name(&mut self, _name: NameId) {}

    fn serialize_bytes(&mut self, _data: &[u8]) {}

    fn serialize_u8(&mut self, value: u8) {
        self.serialize_bytes(&[value]);
    }

    fn serialize_u32(&mut self, value: u32) {
        self.serialize_bytes(&value.to_be_bytes());
    }

    fn serialize_i32(&mut self, value: i32) {
        self.serialize_bytes(&value.to_be_bytes());
    }

    fn serialize_u64(&mut self, value: u64) {
        self.serialize_bytes(&value.to_be_bytes());
    }

    fn serialize_f32(&mut self, value: f32) {
        self.serialize_bytes(&value.to_bits().to_be_bytes());
    }

    /// Length-prefixed UTF-8 string.
    fn serialize_str(&mut self, value: &str) {
        self.serialize_u32(value.len() as u32);
        self.serialize_bytes(value.as_bytes());
    }

    fn serialize_guid(&mut self, value: &Guid) {
        self.serialize_bytes(value.as_bytes());
    }
}

/// One outgoing reference of an object, labelled with where it was found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    /// Slot that holds the reference (`"SuperStruct"`, a property name, ...).
    pub slot: String,
    pub target: ObjectHandle,
    pub cross_level: bool,
}

impl ObjectGraph {
    /// Route `object`'s payload through `ar`: variant header, then the tagged
    /// property list terminated by the `None` name.
    ///
    /// Class, outer and archetype are not part of the payload; they live in
    /// the export table.
    pub fn serialize(&self, object: ObjectHandle, ar: &mut dyn Archive) {
        let record = self.object(object);
        match &record.kind {
            ObjectKind::Plain => {}
            ObjectKind::Package(package) => {
                ar.serialize_u32(package.flags.bits());
                ar.serialize_guid(&package.guid);
            }
            ObjectKind::Struct(data) => {
                ar.serialize_u64(data.field_flags);
                ar.serialize_object(data.next);
                ar.serialize_object(data.super_struct);
                ar.serialize_object(data.children);
                ar.serialize_u32(data.script.len() as u32);
                ar.serialize_bytes(&data.script);
                ar.serialize_u32(data.script_refs.len() as u32);
                for target in &data.script_refs {
                    ar.serialize_object(Some(*target));
                }
                if let Some(class) = &data.class {
                    ar.serialize_u32(class.flags.bits());
                    ar.serialize_object(class.within);
                    ar.serialize_object(class.default_object);
                }
            }
            ObjectKind::Field(field) => {
                ar.serialize_u64(field.flags);
                ar.serialize_object(field.next);
                match &field.kind {
                    FieldKind::Property(ty) => {
                        ar.serialize_u8(ty.tag());
                        ar.serialize_object(ty.referenced());
                    }
                    FieldKind::Enum(values) => {
                        ar.serialize_u32(values.len() as u32);
                        for value in values {
                            ar.serialize_name(*value);
                        }
                    }
                    FieldKind::Const(value) => ar.serialize_str(value),
                }
            }
            ObjectKind::Component(component) => {
                ar.serialize_object(component.template_owner_class);
                ar.serialize_name(component.template_name);
            }
            ObjectKind::Redirector(redirector) => {
                ar.serialize_object(redirector.destination);
            }
        }
        serialize_properties(&record.properties, ar);
    }

    /// Every reference `object`'s payload carries, in serialization order.
    pub fn references(&self, object: ObjectHandle) -> Vec<Reference> {
        let mut out = Vec::new();
        let mut push = |slot: &str, target: Option<ObjectHandle>, cross_level: bool| {
            if let Some(target) = target {
                out.push(Reference {
                    slot: slot.to_string(),
                    target,
                    cross_level,
                });
            }
        };

        let record = self.object(object);
        match &record.kind {
            ObjectKind::Plain | ObjectKind::Package(_) => {}
            ObjectKind::Struct(data) => {
                push("Next", data.next, false);
                push("SuperStruct", data.super_struct, false);
                push("Children", data.children, false);
                for target in &data.script_refs {
                    push("Script", Some(*target), false);
                }
                if let Some(class) = &data.class {
                    push("ClassWithin", class.within, false);
                    push("ClassDefaultObject", class.default_object, false);
                }
            }
            ObjectKind::Field(field) => {
                push("Next", field.next, false);
                if let FieldKind::Property(ty) = &field.kind {
                    push("PropertyType", ty.referenced(), false);
                }
            }
            ObjectKind::Component(component) => {
                push("TemplateOwnerClass", component.template_owner_class, false);
            }
            ObjectKind::Redirector(redirector) => {
                push("DestinationObject", redirector.destination, false);
            }
        }

        for property in &record.properties {
            let slot = self.names().resolve(property.name);
            collect_value_references(slot, &property.value, self, &mut push);
        }
        out
    }
}

fn serialize_properties(properties: &[Property], ar: &mut dyn Archive) {
    for property in properties {
        ar.serialize_name(property.name);
        serialize_value(&property.value, ar);
    }
    ar.serialize_name(NameId::NONE);
}

fn serialize_value(value: &PropertyValue, ar: &mut dyn Archive) {
    ar.serialize_u8(value.type_tag());
    match value {
        PropertyValue::Int(v) => ar.serialize_i32(*v),
        PropertyValue::Float(v) => ar.serialize_f32(*v),
        PropertyValue::Bool(v) => ar.serialize_u8(u8::from(*v)),
        PropertyValue::Str(v) => ar.serialize_str(v),
        PropertyValue::Name(v) => ar.serialize_name(*v),
        PropertyValue::Object(v) => ar.serialize_object(*v),
        PropertyValue::CrossLevel(v) => ar.serialize_cross_level(*v),
        PropertyValue::Bytes(v) => {
            ar.serialize_u32(v.len() as u32);
            ar.serialize_bytes(v);
        }
        PropertyValue::Array(items) => {
            ar.serialize_u32(items.len() as u32);
            for item in items {
                serialize_value(item, ar);
            }
        }
        PropertyValue::Struct(fields) => serialize_properties(fields, ar),
    }
}

fn collect_value_references(
    slot: &str,
    value: &PropertyValue,
    graph: &ObjectGraph,
    push: &mut impl FnMut(&str, Option<ObjectHandle>, bool),
) {
    match value {
        PropertyValue::Object(target) => push(slot, *target, false),
        PropertyValue::CrossLevel(target) => push(slot, *target, true),
        PropertyValue::Array(items) => {
            for item in items {
                collect_value_references(slot, item, graph, push);
            }
        }
        PropertyValue::Struct(fields) => {
            for field in fields {
                let nested = format!("{slot}.{}", graph.names().resolve(field.name));
                collect_value_references(&nested, &field.value, graph, push);
            }
        }
        _ => {}
    }
}
