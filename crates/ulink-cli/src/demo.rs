//! Sample object graph saved by `ulink demo`.

use anyhow::Context;
use ulink_object::{
    ClassFlags, FunctionFlags, ObjectFlags, ObjectGraph, ObjectHandle, PackageFlags,
    PropertyFlags, PropertyType, PropertyValue, Thumbnail,
};

pub const DEMO_PACKAGE: &str = "Demo";

/// A graph with a `Demo` package: a small class hierarchy with replicated
/// fields, a component template, a redirector, a thumbnail and a
/// cross-level reference into a loaded map. Returns the graph, the package
/// and the save root.
pub fn build_demo_graph() -> anyhow::Result<(ObjectGraph, ObjectHandle, ObjectHandle)> {
    let mut graph = ObjectGraph::new();
    let demo = graph.create_package(DEMO_PACKAGE)?;
    let object = graph
        .intrinsic_class("Object")
        .context("Core is missing Object")?;
    let component = graph
        .intrinsic_class("Component")
        .context("Core is missing Component")?;

    let actor = graph.create_class(demo, "Actor", Some(object), ClassFlags::empty())?;
    // Script structs are declared inside a class.
    let vector = graph.create_struct(actor, "Vector", None)?;
    graph.add_property(vector, "X", PropertyType::Float, PropertyFlags::empty())?;
    graph.add_property(vector, "Y", PropertyType::Float, PropertyFlags::empty())?;
    graph.add_property(
        actor,
        "Location",
        PropertyType::Struct { def: Some(vector) },
        PropertyFlags::NET,
    )?;
    graph.add_enum(actor, "ERole", &["ROLE_None", "ROLE_Authority"])?;

    let light = graph.create_class(demo, "LightComponent", Some(component), ClassFlags::empty())?;
    graph.add_property(light, "Brightness", PropertyType::Float, PropertyFlags::empty())?;

    let pawn = graph.create_class(demo, "Pawn", Some(actor), ClassFlags::HAS_COMPONENTS)?;
    graph.add_property(pawn, "Health", PropertyType::Int, PropertyFlags::NET)?;
    graph.add_const(pawn, "MaxHealth", "100")?;
    graph.create_function(pawn, "ServerMove", FunctionFlags::NET | FunctionFlags::NET_SERVER)?;
    let pawn_default = graph
        .default_object(pawn)
        .context("Pawn has no default object")?;
    graph.create_component(light, pawn_default, "Light", None, "Light")?;

    let hero = graph.create_object(
        pawn,
        demo,
        "Hero",
        ObjectFlags::PUBLIC | ObjectFlags::STANDALONE,
    )?;
    graph.set_property(hero, "Health", PropertyValue::Int(100))?;
    let hero_light = graph.create_component(light, hero, "Light", Some(pawn), "Light")?;
    graph.set_property(hero_light, "Brightness", PropertyValue::Float(0.75))?;
    graph.set_property(hero, "Light", PropertyValue::Object(Some(hero_light)))?;

    let sidekick = graph.create_object(pawn, demo, "Sidekick", ObjectFlags::PUBLIC)?;
    graph.set_property(hero, "Friend", PropertyValue::Object(Some(sidekick)))?;
    graph.create_redirector(demo, "OldHero", hero)?;

    // A map that is loaded alongside; references into it go through GUIDs.
    let level = graph.create_package("Level01")?;
    if let Some(data) = graph.package_data_mut(level) {
        data.flags.insert(PackageFlags::CONTAINS_MAP);
    }
    let door = graph.create_object(actor, level, "Door", ObjectFlags::PUBLIC)?;
    graph.set_property(hero, "ExitDoor", PropertyValue::CrossLevel(Some(door)))?;

    if let Some(data) = graph.package_data_mut(demo) {
        data.folder_name = "Demo".to_string();
        data.thumbnails.push(Thumbnail {
            object: hero,
            width: 2,
            height: 2,
            image: vec![0xFF, 0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00, 0x00, 0xFF, 0xFF],
        });
    }
    Ok((graph, demo, hero))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_graph_builds() {
        let (graph, demo, hero) = build_demo_graph().unwrap();
        assert_eq!(graph.name(demo), DEMO_PACKAGE);
        assert_eq!(graph.full_name(hero), "Pawn Demo.Hero");
        assert!(graph.find_path("Demo.OldHero").is_some());
        assert!(graph.find_path("Demo.Actor.Vector").is_some());
        assert_eq!(graph.package_data(demo).unwrap().thumbnails.len(), 1);
    }
}
