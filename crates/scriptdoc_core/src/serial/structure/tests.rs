use std::sync::Arc;

use proptest::collection::vec;
use proptest::prelude::*;

use crate::serial::{
	ByteWriter, Cursor, EngineVersion, FieldSchema, FieldValue, IdentityConverter, PPtr, PrimitiveKind, ReadContext, Scalar, ScalarArray, Schema, SchemaSet,
	SerialError, StructureInstance, TransferFlags,
};

const LEGACY: EngineVersion = EngineVersion::new(5, 0, 0);
const MODERN: EngineVersion = EngineVersion::new(2019, 0, 0);

fn record_schemas() -> Arc<SchemaSet> {
	SchemaSet::new(vec![Schema::new(
		"Record",
		vec![
			FieldSchema::primitive("name", PrimitiveKind::String, 0),
			FieldSchema::primitive("list", PrimitiveKind::Int32, 1),
		],
	)])
	.expect("schemas validate")
}

fn record(set: &Arc<SchemaSet>) -> StructureInstance {
	StructureInstance::new(set.find("Record").expect("schema exists"))
}

fn encode(instance: &StructureInstance, version: &EngineVersion) -> Vec<u8> {
	let mut writer = ByteWriter::new();
	instance.write(&mut writer, version).expect("write succeeds");
	writer.into_bytes()
}

mod depth {
	use super::*;

	fn node_schemas() -> Arc<SchemaSet> {
		SchemaSet::new(vec![
			Schema::new(
				"Node",
				vec![
					FieldSchema::primitive("value", PrimitiveKind::Int32, 0),
					FieldSchema::complex("kids", 0, 1),
					FieldSchema::complex("next", 0, 0),
					FieldSchema::complex("origin", 1, 0).engine_struct(),
				],
			),
			Schema::new(
				"Vector3",
				vec![
					FieldSchema::primitive("x", PrimitiveKind::Float, 0),
					FieldSchema::primitive("y", PrimitiveKind::Float, 0),
					FieldSchema::primitive("z", PrimitiveKind::Float, 0),
				],
			),
		])
		.expect("schemas validate")
	}

	#[test]
	fn self_referential_schema_stops_at_cutoff() {
		let set = node_schemas();
		let mut root = StructureInstance::new(set.find("Node").expect("schema exists"));
		root.initialize_fields();

		let bytes = encode(&root, &MODERN);
		let mut decoded = StructureInstance::new(root.schema().clone());
		let mut cursor = Cursor::new(&bytes);
		decoded.read(&mut cursor, &MODERN, TransferFlags::NONE).expect("read succeeds");
		assert_eq!(cursor.pos(), bytes.len());
		assert_eq!(decoded, root);

		let mut node = &decoded;
		for depth in 0..8 {
			assert_eq!(node.depth(), depth);
			assert!(matches!(node.by_name("kids").expect("field exists"), FieldValue::StructArray(_)));
			node = node.by_name("next").expect("field exists").as_struct().expect("next populated below cutoff");
		}

		assert_eq!(node.depth(), 8);
		assert_eq!(node.by_name("value").expect("field exists"), &FieldValue::Scalar(Scalar::Int32(0)));
		assert!(node.by_name("kids").expect("field exists").is_empty());
		assert!(node.by_name("next").expect("field exists").is_empty());
		let origin = node.by_name("origin").expect("field exists").as_struct().expect("engine struct survives cutoff");
		assert_eq!(origin.depth(), 9);
		assert_eq!(origin.by_name("z").expect("field exists"), &FieldValue::Scalar(Scalar::Float(0.0)));
	}

	#[test]
	fn cutoff_is_configurable_per_root() {
		let set = node_schemas();
		let mut root = StructureInstance::with_max_depth(set.find("Node").expect("schema exists"), 1);
		root.initialize_fields();

		let child = root.by_name("next").expect("field exists").as_struct().expect("depth 0 is below cutoff");
		assert_eq!(child.max_depth(), 1);
		assert!(child.by_name("next").expect("field exists").is_empty());
		assert!(child.by_name("kids").expect("field exists").is_empty());
		assert!(child.by_name("origin").expect("field exists").as_struct().is_some());
	}

	#[test]
	fn cyclic_engine_struct_hits_hard_guard() {
		let set = SchemaSet::new(vec![Schema::new("Loop", vec![FieldSchema::complex("again", 0, 0).engine_struct()])]).expect("schemas validate");
		let mut looped = StructureInstance::new(set.find("Loop").expect("schema exists"));

		let err = looped.read(&mut Cursor::new(&[]), &MODERN, TransferFlags::NONE).expect_err("guard trips");
		assert!(matches!(err, SerialError::DepthExceeded { max_depth: 16 }));

		looped.initialize_fields();
		let mut writer = ByteWriter::new();
		assert!(matches!(looped.write(&mut writer, &MODERN), Err(SerialError::DepthExceeded { .. })));
	}
}

mod try_read {
	use super::*;

	fn shifted(tail_count: i32) -> Vec<u8> {
		let mut writer = ByteWriter::new();
		writer.write_i32(30);
		writer.write_bytes(&[b'a'; 30]);
		writer.align4();
		writer.write_i32(4);
		writer.write_bytes(b"wxyz");
		writer.write_i32(tail_count);
		writer.into_bytes()
	}

	#[test]
	fn single_retry_recovers_from_shifted_count() {
		let set = record_schemas();
		let bytes = shifted(0);
		assert_eq!(bytes.len(), 48);

		let mut plain = record(&set);
		let err = plain.read(&mut Cursor::new(&bytes), &MODERN, TransferFlags::NONE).expect_err("count 4 overruns the buffer");
		assert!(matches!(err, SerialError::UnexpectedEof { at: 40, .. }));

		let mut lenient = record(&set);
		let mut cursor = Cursor::new(&bytes);
		assert!(lenient.try_read(&mut cursor, &ReadContext::new(MODERN).with_owner("Record@1")));
		assert_eq!(lenient.by_name("name").expect("field exists").as_text(), Some("wxyz"));
		assert_eq!(lenient.by_name("list").expect("field exists"), &FieldValue::Array(ScalarArray::Int32(Vec::new())));
		assert_eq!(cursor.pos(), 48);
	}

	#[test]
	fn failed_retry_returns_false() {
		let set = record_schemas();
		let bytes = shifted(100);

		let mut lenient = record(&set);
		assert!(!lenient.try_read(&mut Cursor::new(&bytes), &ReadContext::new(MODERN)));
	}

	fn valid_with_tail(tail: usize) -> Vec<u8> {
		let mut writer = ByteWriter::new();
		writer.write_i32(2);
		writer.write_bytes(b"ab");
		writer.align4();
		writer.write_i32(1);
		writer.write_i32(7);
		writer.write_bytes(&vec![0; tail]);
		writer.into_bytes()
	}

	#[test]
	fn trailing_bytes_are_tolerated_below_slack() {
		let set = record_schemas();

		let exact = valid_with_tail(0);
		assert!(record(&set).try_read(&mut Cursor::new(&exact), &ReadContext::new(MODERN)));

		let short_tail = valid_with_tail(10);
		assert!(record(&set).try_read(&mut Cursor::new(&short_tail), &ReadContext::new(MODERN)));
		assert!(!record(&set).try_read(&mut Cursor::new(&short_tail), &ReadContext::new(MODERN).with_trailing_slack(5)));

		let long_tail = valid_with_tail(1000);
		assert!(!record(&set).try_read(&mut Cursor::new(&long_tail), &ReadContext::new(MODERN)));
	}

	#[test]
	fn non_shape_fault_is_not_retried() {
		let set = SchemaSet::new(vec![Schema::new("Loop", vec![FieldSchema::complex("again", 0, 0).engine_struct()])]).expect("schemas validate");
		let bytes = [0_u8; 12];
		let mut cursor = Cursor::new(&bytes);
		cursor.set_pos(8);

		let mut looped = StructureInstance::new(set.find("Loop").expect("schema exists"));
		assert!(!looped.try_read(&mut cursor, &ReadContext::new(MODERN).with_owner("Loop@8")));
		assert_eq!(cursor.pos(), 8, "cursor was not rewound for a retry");
	}

	#[test]
	fn truncated_buffer_fails_after_retry() {
		let set = record_schemas();
		let bytes = valid_with_tail(0);
		let mut cursor = Cursor::new(&bytes[..12]);

		let mut instance = record(&set);
		let ctx = ReadContext::new(MODERN).with_flags(TransferFlags::EDITOR.with(TransferFlags::PREFAB));
		assert!(ctx.flags.contains(TransferFlags::PREFAB));
		assert!(!instance.try_read(&mut cursor, &ctx));
	}
}

mod copy {
	use super::*;

	fn pair(set: &Arc<SchemaSet>, name: &str) -> StructureInstance {
		let mut instance = StructureInstance::new(set.find(name).expect("schema exists"));
		instance.initialize_fields();
		instance
	}

	#[test]
	fn cross_schema_copy_matches_by_name() {
		let set = SchemaSet::new(vec![
			Schema::new(
				"Source",
				vec![
					FieldSchema::primitive("a", PrimitiveKind::Int32, 0),
					FieldSchema::primitive("b", PrimitiveKind::Float, 0),
					FieldSchema::primitive("c", PrimitiveKind::String, 0),
				],
			),
			Schema::new(
				"Target",
				vec![
					FieldSchema::primitive("b", PrimitiveKind::Float, 0),
					FieldSchema::primitive("d", PrimitiveKind::Int32, 0),
				],
			),
		])
		.expect("schemas validate");

		let mut source = pair(&set, "Source");
		*source.by_name_mut("b").expect("field exists") = FieldValue::Scalar(Scalar::Float(1.5));
		let mut target = pair(&set, "Target");
		*target.by_name_mut("d").expect("field exists") = FieldValue::Scalar(Scalar::Int32(9));

		target.copy_values(&source, &mut IdentityConverter).expect("copy succeeds");
		assert_eq!(target.by_name("b").expect("field exists"), &FieldValue::Scalar(Scalar::Float(1.5)));
		assert!(target.by_name("d").expect("field exists").is_empty());
	}

	#[test]
	fn duplicate_source_names_take_last_match() {
		let set = SchemaSet::new(vec![
			Schema::new(
				"Dup",
				vec![
					FieldSchema::primitive("v", PrimitiveKind::Int32, 0),
					FieldSchema::primitive("v", PrimitiveKind::Int32, 0),
				],
			),
			Schema::new("Single", vec![FieldSchema::primitive("v", PrimitiveKind::Int64, 0)]),
		])
		.expect("schemas validate");

		let mut source = pair(&set, "Dup");
		*source.field_mut(0).expect("slot exists") = FieldValue::Scalar(Scalar::Int32(1));
		*source.field_mut(1).expect("slot exists") = FieldValue::Scalar(Scalar::Int32(2));
		assert_eq!(source.by_name("v").expect("field exists"), &FieldValue::Scalar(Scalar::Int32(1)));

		let mut target = pair(&set, "Single");
		target.copy_values(&source, &mut IdentityConverter).expect("copy succeeds");
		assert_eq!(target.by_name("v").expect("field exists"), &FieldValue::Scalar(Scalar::Int64(2)));
	}

	#[test]
	fn empty_or_incompatible_sources_reset_slots() {
		let set = SchemaSet::new(vec![
			Schema::new(
				"Old",
				vec![
					FieldSchema::primitive("n", PrimitiveKind::Int32, 0),
					FieldSchema::primitive("s", PrimitiveKind::String, 0),
				],
			),
			Schema::new(
				"New",
				vec![
					FieldSchema::primitive("n", PrimitiveKind::Int32, 0),
					FieldSchema::primitive("s", PrimitiveKind::Int32, 0),
				],
			),
		])
		.expect("schemas validate");

		let mut source = pair(&set, "Old");
		*source.by_name_mut("n").expect("field exists") = FieldValue::Empty;
		let mut target = pair(&set, "New");
		target.copy_values(&source, &mut IdentityConverter).expect("copy succeeds");
		assert!(target.by_name("n").expect("field exists").is_empty());
		assert!(target.by_name("s").expect("field exists").is_empty());
	}

	#[test]
	fn nested_values_migrate_into_destination_schema() {
		let set = SchemaSet::new(vec![
			Schema::new("OuterA", vec![FieldSchema::complex("inner", 2, 0), FieldSchema::complex("many", 2, 1)]),
			Schema::new("OuterB", vec![FieldSchema::complex("inner", 3, 0), FieldSchema::complex("many", 3, 1)]),
			Schema::new(
				"InnerA",
				vec![
					FieldSchema::primitive("x", PrimitiveKind::Int32, 0),
					FieldSchema::primitive("y", PrimitiveKind::Int32, 0),
				],
			),
			Schema::new("InnerB", vec![FieldSchema::primitive("y", PrimitiveKind::Int64, 0)]),
		])
		.expect("schemas validate");

		let mut source = pair(&set, "OuterA");
		let inner_schema = set.find("InnerA").expect("schema exists");
		let mut inner = source.child(inner_schema.clone());
		inner.initialize_fields();
		*inner.by_name_mut("y").expect("field exists") = FieldValue::Scalar(Scalar::Int32(-3));
		*source.by_name_mut("many").expect("field exists") = FieldValue::StructArray(vec![inner.clone(), inner.clone()]);
		*source.by_name_mut("inner").expect("field exists") = FieldValue::Struct(Box::new(inner));

		let mut target = pair(&set, "OuterB");
		target.copy_values(&source, &mut IdentityConverter).expect("copy succeeds");

		let copied = target.by_name("inner").expect("field exists").as_struct().expect("inner copied");
		assert_eq!(copied.schema().name.as_ref(), "InnerB");
		assert_eq!(copied.depth(), 1);
		assert_eq!(copied.by_name("y").expect("field exists"), &FieldValue::Scalar(Scalar::Int64(-3)));

		let FieldValue::StructArray(many) = target.by_name("many").expect("field exists") else {
			panic!("expected struct array");
		};
		assert_eq!(many.len(), 2);
		assert!(many.iter().all(|item| item.schema() == copied.schema()));
	}

	#[test]
	fn same_schema_copy_requires_equal_depth() {
		let set = record_schemas();
		let mut root = record(&set);
		root.initialize_fields();
		let nested = root.child(root.schema().clone());

		let err = root.copy_values(&nested, &mut IdentityConverter).expect_err("depths differ");
		assert!(matches!(err, SerialError::DepthMismatch { target: 0, source_depth: 1, .. }));
		assert!(err.is_schema_mismatch());
	}

	#[test]
	fn deep_clone_is_detached() {
		let set = record_schemas();
		let mut original = record(&set);
		original.initialize_fields();
		*original.by_name_mut("name").expect("field exists") = FieldValue::Text("first".to_owned());

		let mut clone = original.deep_clone(&mut IdentityConverter).expect("clone succeeds");
		assert_eq!(clone, original);
		*clone.by_name_mut("name").expect("field exists") = FieldValue::Text("second".to_owned());
		assert_eq!(original.by_name("name").expect("field exists").as_text(), Some("first"));

		clone.reset();
		assert!(clone.fields().iter().all(FieldValue::is_empty));
		assert_eq!(clone.fields().len(), 2);
	}

	#[test]
	fn pointer_copies_pass_through_converter() {
		let set = SchemaSet::new(vec![Schema::pointer("PPtr<Object>"), Schema::pointer("PPtr<Texture>")]).expect("schemas validate");
		let mut source = pair(&set, "PPtr<Object>");
		PPtr::new(2, 5).store(&mut source).expect("pointer stores");

		let mut target = pair(&set, "PPtr<Texture>");
		let mut relink = |reference: PPtr| PPtr::new(0, reference.path_id * 10);
		target.copy_values(&source, &mut relink).expect("copy succeeds");
		assert_eq!(PPtr::from_structure(&target), Some(PPtr::new(0, 50)));
	}
}

mod encode {
	use super::*;

	#[test]
	fn empty_slots_write_as_defaults() {
		let set = record_schemas();
		let fresh = record(&set);
		let mut initialized = record(&set);
		initialized.initialize_fields();

		assert_eq!(encode(&fresh, &MODERN), encode(&initialized, &MODERN));
		assert_eq!(encode(&fresh, &MODERN), [0_u8; 8].to_vec());
	}

	#[test]
	fn mismatched_value_shape_is_rejected() {
		let set = record_schemas();
		let mut instance = record(&set);
		instance.initialize_fields();
		*instance.by_name_mut("list").expect("field exists") = FieldValue::Text("nope".to_owned());

		let mut writer = ByteWriter::new();
		let err = instance.write(&mut writer, &MODERN).expect_err("text in an int array slot");
		assert!(matches!(err, SerialError::ValueShapeMismatch { expected: "array", .. }));
	}

	#[test]
	fn struct_rows_need_a_count_each() {
		let set = SchemaSet::new(vec![
			Schema::new("Grid", vec![FieldSchema::complex("rows", 1, 2)]),
			Schema::new("Cell", vec![FieldSchema::primitive("v", PrimitiveKind::Int32, 0)]),
		])
		.expect("schemas validate");
		let bytes = le_rows(3, 8);

		let mut grid = StructureInstance::new(set.find("Grid").expect("schema exists"));
		let err = grid.read(&mut Cursor::new(&bytes), &MODERN, TransferFlags::NONE).expect_err("three rows cannot fit in 8 bytes");
		assert!(matches!(err, SerialError::UnexpectedEof { at: 4, need: 12, rem: 8 }));
	}

	fn le_rows(count: i32, tail: usize) -> Vec<u8> {
		let mut writer = ByteWriter::new();
		writer.write_i32(count);
		writer.write_bytes(&vec![0; tail]);
		writer.into_bytes()
	}

	#[test]
	fn unknown_field_names_are_reported() {
		let set = record_schemas();
		let instance = record(&set);
		assert!(matches!(instance.by_name("ghost"), Err(SerialError::FieldNotFound { .. })));
	}

	fn sample_schemas() -> Arc<SchemaSet> {
		SchemaSet::new(vec![
			Schema::new(
				"Sample",
				vec![
					FieldSchema::primitive("flag", PrimitiveKind::Bool, 0),
					FieldSchema::primitive("small", PrimitiveKind::Int16, 0),
					FieldSchema::primitive("count", PrimitiveKind::Int32, 0),
					FieldSchema::primitive("big", PrimitiveKind::UInt64, 0),
					FieldSchema::primitive("name", PrimitiveKind::String, 0),
					FieldSchema::primitive("bytes", PrimitiveKind::UInt8, 1),
					FieldSchema::primitive("weights", PrimitiveKind::Float, 1),
					FieldSchema::primitive("grid", PrimitiveKind::Int8, 2),
					FieldSchema::primitive("tags", PrimitiveKind::String, 1),
					FieldSchema::complex("inners", 1, 1),
				],
			),
			Schema::new(
				"Inner",
				vec![
					FieldSchema::primitive("x", PrimitiveKind::Double, 0),
					FieldSchema::primitive("note", PrimitiveKind::String, 0),
				],
			),
		])
		.expect("schemas validate")
	}

	#[allow(clippy::too_many_arguments)]
	fn sample(
		set: &Arc<SchemaSet>,
		flag: bool,
		small: i16,
		count: i32,
		big: u64,
		name: String,
		bytes: Vec<u8>,
		weights: Vec<f32>,
		grid: Vec<Vec<i8>>,
		tags: Vec<String>,
		inners: Vec<(f64, String)>,
	) -> StructureInstance {
		let mut instance = StructureInstance::new(set.find("Sample").expect("schema exists"));
		instance.initialize_fields();
		let inner_schema = set.find("Inner").expect("schema exists");
		let inners = inners
			.into_iter()
			.map(|(x, note)| {
				let mut inner = instance.child(inner_schema.clone());
				*inner.by_name_mut("x").expect("field exists") = FieldValue::Scalar(Scalar::Double(x));
				*inner.by_name_mut("note").expect("field exists") = FieldValue::Text(note);
				inner
			})
			.collect();

		let values = [
			("flag", FieldValue::Scalar(Scalar::Bool(flag))),
			("small", FieldValue::Scalar(Scalar::Int16(small))),
			("count", FieldValue::Scalar(Scalar::Int32(count))),
			("big", FieldValue::Scalar(Scalar::UInt64(big))),
			("name", FieldValue::Text(name)),
			("bytes", FieldValue::Array(ScalarArray::UInt8(bytes))),
			("weights", FieldValue::Array(ScalarArray::Float(weights))),
			("grid", FieldValue::ArrayArray(grid.into_iter().map(ScalarArray::Int8).collect())),
			("tags", FieldValue::TextArray(tags)),
			("inners", FieldValue::StructArray(inners)),
		];
		for (name, value) in values {
			*instance.by_name_mut(name).expect("field exists") = value;
		}
		instance
	}

	proptest! {
		#[test]
		fn write_then_read_reproduces_fields(
			flag in any::<bool>(),
			small in any::<i16>(),
			count in any::<i32>(),
			big in any::<u64>(),
			name in "[a-z]{0,9}",
			bytes in vec(any::<u8>(), 0..7),
			weights in vec(-1.0e6_f32..1.0e6, 0..5),
			grid in vec(vec(any::<i8>(), 0..5), 0..4),
			tags in vec("[a-z ]{0,6}", 0..4),
			inners in vec((-1.0e9_f64..1.0e9, "[a-z]{0,5}"), 0..3),
			modern in any::<bool>(),
		) {
			let set = sample_schemas();
			let version = if modern { MODERN } else { LEGACY };
			let original = sample(&set, flag, small, count, big, name, bytes, weights, grid, tags, inners);

			let encoded = encode(&original, &version);
			let mut decoded = StructureInstance::new(original.schema().clone());
			let mut cursor = Cursor::new(&encoded);
			decoded.read(&mut cursor, &version, TransferFlags::NONE).expect("read succeeds");

			prop_assert_eq!(cursor.pos(), encoded.len());
			prop_assert_eq!(decoded, original);
		}
	}
}

mod fixture {
	use super::*;
	use scriptdoc_testkit::fixture_bytes;

	fn inventory_schemas() -> Arc<SchemaSet> {
		SchemaSet::new(vec![
			Schema::new(
				"Inventory",
				vec![
					FieldSchema::primitive("owner", PrimitiveKind::String, 0),
					FieldSchema::primitive("slots", PrimitiveKind::Int32, 0),
					FieldSchema::complex("items", 1, 1),
					FieldSchema::primitive("tags", PrimitiveKind::String, 1),
					FieldSchema::primitive("weights", PrimitiveKind::Float, 1),
					FieldSchema::complex("origin", 2, 0).engine_struct(),
					FieldSchema::complex("home", 3, 0),
				],
			),
			Schema::new(
				"Item",
				vec![
					FieldSchema::primitive("id", PrimitiveKind::UInt16, 0),
					FieldSchema::primitive("count", PrimitiveKind::Int32, 0),
					FieldSchema::complex("ref", 3, 0),
				],
			),
			Schema::new(
				"Vector3",
				vec![
					FieldSchema::primitive("x", PrimitiveKind::Float, 0),
					FieldSchema::primitive("y", PrimitiveKind::Float, 0),
					FieldSchema::primitive("z", PrimitiveKind::Float, 0),
				],
			),
			Schema::pointer("PPtr<GameObject>"),
		])
		.expect("schemas validate")
	}

	#[test]
	fn inventory_fixture_decodes_and_reencodes() {
		let bytes = fixture_bytes("inventory.bin");
		let set = inventory_schemas();
		let version = EngineVersion::parse("2019.4.0f1").expect("version parses");

		let mut inventory = StructureInstance::new(set.find("Inventory").expect("schema exists"));
		let mut cursor = Cursor::new(&bytes);
		assert!(inventory.try_read(&mut cursor, &ReadContext::new(version).with_owner("fixture")));

		assert_eq!(inventory.by_name("owner").expect("field exists").as_text(), Some("hero"));
		assert_eq!(
			inventory.by_name("weights").expect("field exists"),
			&FieldValue::Array(ScalarArray::Float(vec![0.5, 1.25, 2.0]))
		);
		assert_eq!(
			inventory.by_name("tags").expect("field exists"),
			&FieldValue::TextArray(vec!["a".to_owned(), "bc".to_owned()])
		);

		let refs = inventory.fetch_dependencies().collect::<Vec<_>>();
		assert_eq!(
			refs,
			vec![
				("items[0].ref".to_owned(), PPtr::new(0, 1001)),
				("items[1].ref".to_owned(), PPtr::new(0, 1002)),
				("home".to_owned(), PPtr::new(1, 77)),
			]
		);

		assert_eq!(encode(&inventory, &version), bytes);
	}
}
