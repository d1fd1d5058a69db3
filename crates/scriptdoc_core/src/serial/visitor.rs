use crate::serial::{FieldValue, Scalar, Schema};

/// Receiver of depth-first traversal events.
///
/// Every method defaults to a no-op so visitors only implement what they use.
#[allow(unused_variables)]
pub trait StructureVisitor {
	/// A structure begins.
	fn enter_structure(&mut self, schema: &Schema) {}

	/// The current structure ends.
	fn exit_structure(&mut self, schema: &Schema) {}

	/// A field begins.
	fn enter_field(&mut self, name: &str) {}

	/// The current field ends.
	fn exit_field(&mut self, name: &str) {}

	/// Emitted between sibling fields and between array elements.
	fn separator(&mut self) {}

	/// An array of `len` elements begins.
	fn enter_array(&mut self, len: usize) {}

	/// The current array ends.
	fn exit_array(&mut self) {}

	/// Fixed-width value.
	fn scalar(&mut self, value: Scalar) {}

	/// Text value.
	fn text(&mut self, value: &str) {}

	/// Unpopulated slot.
	fn empty(&mut self) {}
}

impl FieldValue {
	/// Emit this value's events.
	pub fn traverse<V: StructureVisitor + ?Sized>(&self, visitor: &mut V) {
		match self {
			Self::Empty => visitor.empty(),
			Self::Scalar(value) => visitor.scalar(*value),
			Self::Text(value) => visitor.text(value),
			Self::Array(items) => visit_items(visitor, items.len(), items.iter(), |visitor, item| visitor.scalar(item)),
			Self::ArrayArray(rows) => visit_items(visitor, rows.len(), rows.iter(), |visitor, row| {
				visit_items(visitor, row.len(), row.iter(), |visitor, item| visitor.scalar(item))
			}),
			Self::TextArray(items) => visit_items(visitor, items.len(), items.iter(), |visitor, item| visitor.text(item)),
			Self::TextArrayArray(rows) => visit_items(visitor, rows.len(), rows.iter(), |visitor, row| {
				visit_items(visitor, row.len(), row.iter(), |visitor, item| visitor.text(item))
			}),
			Self::Struct(item) => item.traverse(visitor),
			Self::StructArray(items) => visit_items(visitor, items.len(), items.iter(), |visitor, item| item.traverse(visitor)),
			Self::StructArrayArray(rows) => visit_items(visitor, rows.len(), rows.iter(), |visitor, row| {
				visit_items(visitor, row.len(), row.iter(), |visitor, item| item.traverse(visitor))
			}),
		}
	}
}

/// Wrap `items` in array events with separators between elements.
pub fn visit_items<V, T>(visitor: &mut V, len: usize, items: impl Iterator<Item = T>, mut each: impl FnMut(&mut V, T))
where
	V: StructureVisitor + ?Sized,
{
	visitor.enter_array(len);
	for (index, item) in items.enumerate() {
		if index > 0 {
			visitor.separator();
		}
		each(visitor, item);
	}
	visitor.exit_array();
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::StructureVisitor;
	use crate::serial::{FieldSchema, FieldValue, PrimitiveKind, Scalar, ScalarArray, Schema, SchemaSet, StructureInstance};

	#[derive(Default)]
	struct Trace(Vec<String>);

	impl StructureVisitor for Trace {
		fn enter_structure(&mut self, schema: &Schema) {
			self.0.push(format!("<{}", schema.name));
		}

		fn exit_structure(&mut self, schema: &Schema) {
			self.0.push(format!("{}>", schema.name));
		}

		fn enter_field(&mut self, name: &str) {
			self.0.push(format!("{name}="));
		}

		fn separator(&mut self) {
			self.0.push(",".to_owned());
		}

		fn enter_array(&mut self, len: usize) {
			self.0.push(format!("[{len}"));
		}

		fn exit_array(&mut self) {
			self.0.push("]".to_owned());
		}

		fn scalar(&mut self, value: Scalar) {
			self.0.push(format!("{}", value.as_i128()));
		}

		fn text(&mut self, value: &str) {
			self.0.push(format!("'{value}'"));
		}

		fn empty(&mut self) {
			self.0.push("_".to_owned());
		}
	}

	fn pair_schema() -> Arc<SchemaSet> {
		SchemaSet::new(vec![
			Schema::new(
				"Pair",
				vec![
					FieldSchema::primitive("label", PrimitiveKind::String, 0),
					FieldSchema::primitive("values", PrimitiveKind::Int16, 1),
					FieldSchema::complex("inner", 1, 0),
					FieldSchema::primitive("unset", PrimitiveKind::Int32, 0),
				],
			),
			Schema::new("Inner", vec![FieldSchema::primitive("x", PrimitiveKind::UInt8, 0)]),
		])
		.expect("schemas validate")
	}

	#[test]
	fn emits_separators_between_fields_and_elements() {
		let set = pair_schema();
		let mut pair = StructureInstance::new(set.find("Pair").expect("schema exists"));
		pair.initialize_fields();
		*pair.by_name_mut("label").expect("field exists") = FieldValue::Text("a".to_owned());
		*pair.by_name_mut("values").expect("field exists") = FieldValue::Array(ScalarArray::Int16(vec![1, 2]));
		*pair.by_name_mut("unset").expect("field exists") = FieldValue::Empty;

		let mut trace = Trace::default();
		pair.traverse(&mut trace);
		assert_eq!(
			trace.0.concat(),
			"<Pairlabel='a',values=[21,2],inner=<Innerx=0Inner>,unset=_Pair>"
		);
	}

	#[test]
	fn editor_and_release_traversals_match() {
		let set = pair_schema();
		let mut pair = StructureInstance::new(set.find("Pair").expect("schema exists"));
		pair.initialize_fields();

		let mut editor = Trace::default();
		let mut release = Trace::default();
		pair.traverse_editor(&mut editor);
		pair.traverse_release(&mut release);
		assert_eq!(editor.0, release.0);
	}
}
