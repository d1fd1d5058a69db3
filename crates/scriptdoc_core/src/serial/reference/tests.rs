use std::sync::Arc;

use crate::serial::{FieldSchema, FieldValue, IdentityConverter, PPtr, PrimitiveKind, Schema, SchemaSet, StructureInstance};

fn scene_schemas() -> Arc<SchemaSet> {
	SchemaSet::new(vec![
		Schema::new(
			"Scene",
			vec![
				FieldSchema::primitive("name", PrimitiveKind::String, 0),
				FieldSchema::complex("target", 1, 0),
				FieldSchema::complex("items", 2, 1),
				FieldSchema::complex("grid", 2, 2),
			],
		),
		Schema::pointer("PPtr<Object>"),
		Schema::new(
			"Item",
			vec![FieldSchema::primitive("id", PrimitiveKind::Int32, 0), FieldSchema::complex("link", 1, 0)],
		),
	])
	.expect("schemas validate")
}

fn item(parent: &StructureInstance, set: &Arc<SchemaSet>, path_id: i64) -> StructureInstance {
	let mut item = parent.child(set.find("Item").expect("schema exists"));
	item.initialize_fields();
	let link = item.by_name_mut("link").expect("field exists").as_struct_mut().expect("link is initialized");
	PPtr::new(0, path_id).store(link).expect("pointer stores");
	item
}

fn populated_scene(set: &Arc<SchemaSet>) -> StructureInstance {
	let mut scene = StructureInstance::new(set.find("Scene").expect("schema exists"));
	scene.initialize_fields();

	let target = scene.by_name_mut("target").expect("field exists").as_struct_mut().expect("target is initialized");
	PPtr::new(1, 42).store(target).expect("pointer stores");

	let items = vec![item(&scene, set, 10), item(&scene, set, 11)];
	let grid = vec![Vec::new(), vec![item(&scene, set, 20)]];
	*scene.by_name_mut("items").expect("field exists") = FieldValue::StructArray(items);
	*scene.by_name_mut("grid").expect("field exists") = FieldValue::StructArrayArray(grid);
	scene
}

#[test]
fn dependencies_follow_schema_order_with_paths() {
	let set = scene_schemas();
	let scene = populated_scene(&set);

	let found = scene.fetch_dependencies().collect::<Vec<_>>();
	assert_eq!(
		found,
		vec![
			("target".to_owned(), PPtr::new(1, 42)),
			("items[0].link".to_owned(), PPtr::new(0, 10)),
			("items[1].link".to_owned(), PPtr::new(0, 11)),
			("grid[1][0].link".to_owned(), PPtr::new(0, 20)),
		]
	);
}

#[test]
fn dependencies_include_null_but_skip_unpopulated_pointers() {
	let set = scene_schemas();
	let mut scene = StructureInstance::new(set.find("Scene").expect("schema exists"));
	assert_eq!(scene.fetch_dependencies().count(), 0);

	scene.initialize_fields();
	let found = scene.fetch_dependencies().collect::<Vec<_>>();
	assert_eq!(found, vec![("target".to_owned(), PPtr::NULL)]);
	assert!(found[0].1.is_null());
}

#[test]
fn dependencies_are_lazy() {
	let set = scene_schemas();
	let scene = populated_scene(&set);

	let mut deps = scene.fetch_dependencies();
	assert_eq!(deps.next().map(|(path, _)| path), Some("target".to_owned()));
	assert_eq!(deps.count(), 3);
}

#[test]
fn deep_clone_remaps_every_reference() {
	let set = scene_schemas();
	let scene = populated_scene(&set);

	let mut shift = |reference: PPtr| PPtr::new(reference.file_id, reference.path_id + 100);
	let clone = scene.deep_clone(&mut shift).expect("clone succeeds");
	let ids = clone.fetch_dependencies().map(|(_, reference)| reference.path_id).collect::<Vec<_>>();
	assert_eq!(ids, vec![142, 110, 111, 120]);

	let same = scene.deep_clone(&mut IdentityConverter).expect("clone succeeds");
	assert_eq!(same, scene);
}

#[test]
fn store_rejects_plain_schemas() {
	let set = scene_schemas();
	let mut scene = StructureInstance::new(set.find("Scene").expect("schema exists"));
	assert!(PPtr::new(0, 1).store(&mut scene).is_err());
	assert_eq!(PPtr::from_structure(&scene), None);
}
