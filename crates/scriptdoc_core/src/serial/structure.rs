//! Schema-driven structure instances: read, write, traverse, copy.

use tracing::{debug, warn};

use crate::serial::array::{
	COUNT_FIELD_SIZE, finish_array, finish_array_write, read_array, read_array_array, read_count, read_scalar, read_text, read_text_array, read_text_array_array,
	write_array, write_array_array, write_count, write_scalar, write_text, write_text_array, write_text_array_array,
};
use crate::serial::{
	ByteWriter, Cursor, Dependencies, EngineVersion, FieldSchema, FieldValue, PPtr, PrimitiveKind, ReferenceConverter, Result, Scalar, ScalarArray,
	SchemaRef, SerialError, StructureVisitor,
};

/// Default nesting depth at which the availability cutoff starts.
pub const MAX_DEPTH: u32 = 8;
/// Extra levels engine structs may nest past the cutoff before reads fail.
pub const ENGINE_DEPTH_ALLOWANCE: u32 = 8;
/// Default unread-byte tolerance for [`StructureInstance::try_read`].
pub const TRAILING_SLACK: usize = 1000;
/// Bytes rewound from the failure position before the single retry.
pub const RETRY_REWIND: usize = 4;

/// Bit set of transfer options threaded through reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TransferFlags(pub u32);

impl TransferFlags {
	/// No options.
	pub const NONE: Self = Self(0);
	/// Data comes from an editor build.
	pub const EDITOR: Self = Self(1 << 0);
	/// Data belongs to a prefab or variant override.
	pub const PREFAB: Self = Self(1 << 1);

	/// Whether every bit in `other` is set.
	pub fn contains(self, other: Self) -> bool {
		self.0 & other.0 == other.0
	}

	/// Union of both sets.
	pub fn with(self, other: Self) -> Self {
		Self(self.0 | other.0)
	}
}

/// Inputs for the fault-tolerant read.
#[derive(Debug, Clone, Copy)]
pub struct ReadContext<'a> {
	/// Engine version that wrote the bytes.
	pub version: EngineVersion,
	/// Transfer options.
	pub flags: TransferFlags,
	/// Identity of the owning object, used in diagnostics.
	pub owner: &'a str,
	/// Unread bytes accepted (with a warning) after a successful read.
	pub trailing_slack: usize,
}

impl<'a> ReadContext<'a> {
	/// Context with default flags and slack.
	pub fn new(version: EngineVersion) -> Self {
		Self {
			version,
			flags: TransferFlags::NONE,
			owner: "",
			trailing_slack: TRAILING_SLACK,
		}
	}

	/// Set the owner identity.
	pub fn with_owner(mut self, owner: &'a str) -> Self {
		self.owner = owner;
		self
	}

	/// Set transfer flags.
	pub fn with_flags(mut self, flags: TransferFlags) -> Self {
		self.flags = flags;
		self
	}

	/// Set the trailing-byte tolerance.
	pub fn with_trailing_slack(mut self, trailing_slack: usize) -> Self {
		self.trailing_slack = trailing_slack;
		self
	}
}

/// One decoded structure: a value slot per schema field.
///
/// The slot count always equals the schema's field count.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureInstance {
	schema: SchemaRef,
	depth: u32,
	max_depth: u32,
	fields: Vec<FieldValue>,
}

impl StructureInstance {
	/// Empty root instance using [`MAX_DEPTH`].
	pub fn new(schema: SchemaRef) -> Self {
		Self::with_max_depth(schema, MAX_DEPTH)
	}

	/// Empty root instance with a custom depth cutoff.
	pub fn with_max_depth(schema: SchemaRef, max_depth: u32) -> Self {
		Self::at_depth(schema, 0, max_depth)
	}

	fn at_depth(schema: SchemaRef, depth: u32, max_depth: u32) -> Self {
		let fields = vec![FieldValue::Empty; schema.fields.len()];
		Self {
			schema,
			depth,
			max_depth,
			fields,
		}
	}

	/// Empty instance one level below `self`, sharing its cutoff.
	pub fn child(&self, schema: SchemaRef) -> Self {
		Self::at_depth(schema, self.depth + 1, self.max_depth)
	}

	/// Schema handle.
	pub fn schema(&self) -> &SchemaRef {
		&self.schema
	}

	/// Nesting depth this instance was created at.
	pub fn depth(&self) -> u32 {
		self.depth
	}

	/// Depth cutoff inherited from the root.
	pub fn max_depth(&self) -> u32 {
		self.max_depth
	}

	/// Field slots in schema order.
	pub fn fields(&self) -> &[FieldValue] {
		&self.fields
	}

	/// Mutable slot at `index`.
	pub fn field_mut(&mut self, index: usize) -> Option<&mut FieldValue> {
		self.fields.get_mut(index)
	}

	/// Value of the first field called `name`.
	pub fn by_name(&self, name: &str) -> Result<&FieldValue> {
		let index = self.lookup(name)?;
		Ok(&self.fields[index])
	}

	/// Mutable value of the first field called `name`.
	pub fn by_name_mut(&mut self, name: &str) -> Result<&mut FieldValue> {
		let index = self.lookup(name)?;
		Ok(&mut self.fields[index])
	}

	fn lookup(&self, name: &str) -> Result<usize> {
		self.schema.field_index(name).ok_or_else(|| SerialError::FieldNotFound {
			type_name: self.schema.name.to_string(),
			name: name.to_owned(),
		})
	}

	/// Whether `field` takes part in read/write/traverse at this depth.
	///
	/// Below the cutoff every field is available. At or past it array fields
	/// drop out and scalar complex fields survive only for engine structs.
	pub fn is_available(&self, field: &FieldSchema) -> bool {
		if self.depth < self.max_depth {
			return true;
		}
		if field.array_depth > 0 {
			return false;
		}
		field.kind != PrimitiveKind::Complex || field.is_engine_struct
	}

	fn depth_limit(&self) -> u32 {
		self.max_depth.saturating_add(ENGINE_DEPTH_ALLOWANCE)
	}

	fn check_depth(&self) -> Result<()> {
		if self.depth > self.depth_limit() {
			return Err(SerialError::DepthExceeded { max_depth: self.depth_limit() });
		}
		Ok(())
	}

	/// Set every slot back to `Empty`.
	pub fn reset(&mut self) {
		self.fields.fill(FieldValue::Empty);
	}

	/// Populate every available field with its default value.
	pub fn initialize_fields(&mut self) {
		if self.check_depth().is_err() {
			self.reset();
			return;
		}
		let schema = self.schema.clone();
		for (index, field) in schema.fields.iter().enumerate() {
			self.fields[index] = if self.is_available(field) {
				self.default_value(field)
			} else {
				FieldValue::Empty
			};
		}
	}

	/// Default value for `field`: zero, empty text or array, or an initialized child.
	pub fn default_value(&self, field: &FieldSchema) -> FieldValue {
		match (field.kind, field.array_depth) {
			(PrimitiveKind::String, 0) => FieldValue::Text(String::new()),
			(PrimitiveKind::String, 1) => FieldValue::TextArray(Vec::new()),
			(PrimitiveKind::String, _) => FieldValue::TextArrayArray(Vec::new()),
			(PrimitiveKind::Complex, 0) => match self.schema.nested(field) {
				Some(nested) => {
					let mut child = self.child(nested);
					child.initialize_fields();
					FieldValue::Struct(Box::new(child))
				}
				None => FieldValue::Empty,
			},
			(PrimitiveKind::Complex, 1) => FieldValue::StructArray(Vec::new()),
			(PrimitiveKind::Complex, _) => FieldValue::StructArrayArray(Vec::new()),
			(kind, 0) => Scalar::zero(kind).map_or(FieldValue::Empty, FieldValue::Scalar),
			(kind, 1) => ScalarArray::empty(kind).map_or(FieldValue::Empty, FieldValue::Array),
			(_, _) => FieldValue::ArrayArray(Vec::new()),
		}
	}

	fn nested_schema(&self, field: &FieldSchema) -> Result<SchemaRef> {
		self.schema.nested(field).ok_or_else(|| SerialError::InvalidSchema {
			type_name: self.schema.name.to_string(),
			field: field.name.to_string(),
			reason: "complex field without nested type",
		})
	}

	/// Decode every available field in schema order.
	///
	/// Faults propagate unchanged; fields read before the fault stay populated.
	pub fn read(&mut self, cursor: &mut Cursor<'_>, version: &EngineVersion, flags: TransferFlags) -> Result<()> {
		self.check_depth()?;
		let schema = self.schema.clone();
		for (index, field) in schema.fields.iter().enumerate() {
			self.fields[index] = if self.is_available(field) {
				self.read_field(cursor, field, version, flags)?
			} else {
				FieldValue::Empty
			};
		}
		Ok(())
	}

	fn read_field(&self, cursor: &mut Cursor<'_>, field: &FieldSchema, version: &EngineVersion, flags: TransferFlags) -> Result<FieldValue> {
		Ok(match (field.kind, field.array_depth) {
			(PrimitiveKind::String, 0) => FieldValue::Text(read_text(cursor)),
			(PrimitiveKind::String, 1) => FieldValue::TextArray(read_text_array(cursor, version)?),
			(PrimitiveKind::String, _) => FieldValue::TextArrayArray(read_text_array_array(cursor, version)?),
			(PrimitiveKind::Complex, depth) => {
				let nested = self.nested_schema(field)?;
				match depth {
					0 => FieldValue::Struct(Box::new(self.read_child(&nested, cursor, version, flags)?)),
					1 => FieldValue::StructArray(self.read_children(&nested, cursor, version, flags)?),
					_ => {
						let count = read_count(cursor, COUNT_FIELD_SIZE)?;
						let mut rows = Vec::with_capacity(count.min(cursor.remaining()));
						for _ in 0..count {
							rows.push(self.read_children(&nested, cursor, version, flags)?);
						}
						finish_array(cursor, version)?;
						FieldValue::StructArrayArray(rows)
					}
				}
			}
			(kind, 0) => FieldValue::Scalar(read_scalar(cursor, kind)?),
			(kind, 1) => FieldValue::Array(read_array(cursor, kind, version)?),
			(kind, _) => FieldValue::ArrayArray(read_array_array(cursor, kind, version)?),
		})
	}

	fn read_child(&self, schema: &SchemaRef, cursor: &mut Cursor<'_>, version: &EngineVersion, flags: TransferFlags) -> Result<StructureInstance> {
		let mut child = self.child(schema.clone());
		child.read(cursor, version, flags)?;
		Ok(child)
	}

	fn read_children(&self, schema: &SchemaRef, cursor: &mut Cursor<'_>, version: &EngineVersion, flags: TransferFlags) -> Result<Vec<StructureInstance>> {
		let count = read_count(cursor, 0)?;
		let mut items = Vec::with_capacity(count.min(cursor.remaining()));
		for _ in 0..count {
			items.push(self.read_child(schema, cursor, version, flags)?);
		}
		finish_array(cursor, version)?;
		Ok(items)
	}

	/// Encode every available field in schema order.
	///
	/// `Empty` slots are written as their default value.
	pub fn write(&self, writer: &mut ByteWriter, version: &EngineVersion) -> Result<()> {
		self.check_depth()?;
		for (field, value) in self.schema.fields.iter().zip(&self.fields) {
			if self.is_available(field) {
				self.write_field(writer, field, value, version)?;
			}
		}
		Ok(())
	}

	fn write_field(&self, writer: &mut ByteWriter, field: &FieldSchema, value: &FieldValue, version: &EngineVersion) -> Result<()> {
		match (value, field.kind, field.array_depth) {
			(FieldValue::Empty, ..) => {
				let value = self.default_value(field);
				if value.is_empty() {
					return Err(shape_mismatch(field));
				}
				return self.write_field(writer, field, &value, version);
			}
			(FieldValue::Text(text), PrimitiveKind::String, 0) => write_text(writer, text)?,
			(FieldValue::TextArray(items), PrimitiveKind::String, 1) => write_text_array(writer, items, version)?,
			(FieldValue::TextArrayArray(rows), PrimitiveKind::String, 2) => write_text_array_array(writer, rows, version)?,
			(FieldValue::Struct(child), PrimitiveKind::Complex, 0) => child.write(writer, version)?,
			(FieldValue::StructArray(items), PrimitiveKind::Complex, 1) => write_children(writer, items, version)?,
			(FieldValue::StructArrayArray(rows), PrimitiveKind::Complex, 2) => {
				write_count(writer, rows.len())?;
				for row in rows {
					write_children(writer, row, version)?;
				}
				finish_array_write(writer, version);
			}
			(FieldValue::Scalar(scalar), kind, 0) if scalar.kind() == kind => write_scalar(writer, *scalar),
			(FieldValue::Array(items), kind, 1) if items.kind() == kind => write_array(writer, items, version)?,
			(FieldValue::ArrayArray(rows), kind, 2) if rows.iter().all(|row| row.kind() == kind) => write_array_array(writer, rows, version)?,
			_ => return Err(shape_mismatch(field)),
		}
		Ok(())
	}

	/// Fault-tolerant read for untrusted data.
	///
	/// A shape fault triggers one retry from 4 bytes before the failure
	/// position. Afterwards the unread tail must be empty or shorter than the
	/// context's trailing slack. Failures are logged and reported as `false`.
	pub fn try_read(&mut self, cursor: &mut Cursor<'_>, ctx: &ReadContext<'_>) -> bool {
		let outcome = match self.read(cursor, &ctx.version, ctx.flags) {
			Err(err) if err.is_shape_mismatch() => {
				let failed_at = cursor.pos();
				let retry_at = failed_at.saturating_sub(RETRY_REWIND);
				debug!(owner = ctx.owner, type_name = %self.schema.name, error = %err, failed_at, retry_at, "retrying structure read");
				self.reset();
				cursor.set_pos(retry_at);
				self.read(cursor, &ctx.version, ctx.flags)
			}
			other => other,
		};

		match outcome.and_then(|()| self.check_trailing(cursor, ctx)) {
			Ok(()) => true,
			Err(err) => {
				warn!(owner = ctx.owner, type_name = %self.schema.name, error = %err, "structure read failed");
				false
			}
		}
	}

	fn check_trailing(&self, cursor: &Cursor<'_>, ctx: &ReadContext<'_>) -> Result<()> {
		let leftover = cursor.len() as i64 - cursor.pos() as i64;
		match leftover {
			0 => Ok(()),
			1.. if (leftover as u64) < ctx.trailing_slack as u64 => {
				warn!(owner = ctx.owner, type_name = %self.schema.name, leftover, "unread bytes after structure");
				Ok(())
			}
			_ => Err(SerialError::StructuralMismatch {
				type_name: self.schema.name.to_string(),
				leftover,
			}),
		}
	}

	/// Visit the instance depth-first.
	pub fn traverse<V: StructureVisitor + ?Sized>(&self, visitor: &mut V) {
		visitor.enter_structure(&self.schema);
		let mut first = true;
		for (field, value) in self.schema.fields.iter().zip(&self.fields) {
			if !self.is_available(field) {
				continue;
			}
			if !first {
				visitor.separator();
			}
			first = false;
			visitor.enter_field(&field.name);
			value.traverse(visitor);
			visitor.exit_field(&field.name);
		}
		visitor.exit_structure(&self.schema);
	}

	/// Traversal for editor consumers; identical to [`Self::traverse`].
	pub fn traverse_editor<V: StructureVisitor + ?Sized>(&self, visitor: &mut V) {
		self.traverse(visitor);
	}

	/// Traversal for release consumers; identical to [`Self::traverse`].
	pub fn traverse_release<V: StructureVisitor + ?Sized>(&self, visitor: &mut V) {
		self.traverse(visitor);
	}

	/// Lazily list every populated reference reachable from this instance.
	pub fn fetch_dependencies(&self) -> Dependencies<'_> {
		Dependencies::new(self)
	}

	/// Copy values from `source`.
	///
	/// With the same schema the copy is positional and depths must match.
	/// Otherwise each field takes the last source field with the same name,
	/// casting numeric kinds; unmatched or empty sources leave the slot `Empty`.
	pub fn copy_values(&mut self, source: &StructureInstance, converter: &mut dyn ReferenceConverter) -> Result<()> {
		if self.schema == source.schema {
			if self.depth != source.depth {
				return Err(SerialError::DepthMismatch {
					type_name: self.schema.name.to_string(),
					target: self.depth,
					source_depth: source.depth,
				});
			}
			for (slot, value) in self.fields.iter_mut().zip(&source.fields) {
				*slot = clone_value(value, converter)?;
			}
		} else {
			let schema = self.schema.clone();
			for (index, field) in schema.fields.iter().enumerate() {
				let found = source.schema.fields.iter().rposition(|item| item.name == field.name);
				self.fields[index] = match found.map(|at| &source.fields[at]) {
					None | Some(FieldValue::Empty) => FieldValue::Empty,
					Some(value) => self.migrate_value(field, value, converter)?,
				};
			}
		}

		if self.schema.is_pointer {
			self.remap_reference(converter)?;
		}
		Ok(())
	}

	fn migrate_value(&self, field: &FieldSchema, value: &FieldValue, converter: &mut dyn ReferenceConverter) -> Result<FieldValue> {
		if field.kind != PrimitiveKind::Complex {
			return Ok(value.cast_to(field).unwrap_or_default());
		}
		let nested = self.nested_schema(field)?;

		Ok(match (value, field.array_depth) {
			(FieldValue::Struct(item), 0) => FieldValue::Struct(Box::new(self.migrate_child(&nested, item, converter)?)),
			(FieldValue::StructArray(items), 1) => FieldValue::StructArray(self.migrate_children(&nested, items, converter)?),
			(FieldValue::StructArrayArray(rows), 2) => {
				let mut out = Vec::with_capacity(rows.len());
				for row in rows {
					out.push(self.migrate_children(&nested, row, converter)?);
				}
				FieldValue::StructArrayArray(out)
			}
			_ => FieldValue::Empty,
		})
	}

	fn migrate_child(&self, schema: &SchemaRef, source: &StructureInstance, converter: &mut dyn ReferenceConverter) -> Result<StructureInstance> {
		let mut child = self.child(schema.clone());
		child.copy_values(source, converter)?;
		Ok(child)
	}

	fn migrate_children(&self, schema: &SchemaRef, sources: &[StructureInstance], converter: &mut dyn ReferenceConverter) -> Result<Vec<StructureInstance>> {
		let mut out = Vec::with_capacity(sources.len());
		for source in sources {
			out.push(self.migrate_child(schema, source, converter)?);
		}
		Ok(out)
	}

	/// Fully detached copy with the same schema, depth and cutoff.
	pub fn deep_clone(&self, converter: &mut dyn ReferenceConverter) -> Result<StructureInstance> {
		let mut clone = Self::at_depth(self.schema.clone(), self.depth, self.max_depth);
		clone.copy_values(self, converter)?;
		Ok(clone)
	}

	/// Pass a pointer instance's reference through `converter`.
	pub fn remap_reference(&mut self, converter: &mut dyn ReferenceConverter) -> Result<()> {
		if let Some(reference) = PPtr::from_structure(self) {
			converter.convert(reference).store(self)?;
		}
		Ok(())
	}
}

fn clone_value(value: &FieldValue, converter: &mut dyn ReferenceConverter) -> Result<FieldValue> {
	Ok(match value {
		FieldValue::Struct(item) => FieldValue::Struct(Box::new(item.deep_clone(converter)?)),
		FieldValue::StructArray(items) => FieldValue::StructArray(clone_children(items, converter)?),
		FieldValue::StructArrayArray(rows) => {
			let mut out = Vec::with_capacity(rows.len());
			for row in rows {
				out.push(clone_children(row, converter)?);
			}
			FieldValue::StructArrayArray(out)
		}
		other => other.clone(),
	})
}

fn clone_children(items: &[StructureInstance], converter: &mut dyn ReferenceConverter) -> Result<Vec<StructureInstance>> {
	let mut out = Vec::with_capacity(items.len());
	for item in items {
		out.push(item.deep_clone(converter)?);
	}
	Ok(out)
}

fn write_children(writer: &mut ByteWriter, items: &[StructureInstance], version: &EngineVersion) -> Result<()> {
	write_count(writer, items.len())?;
	for item in items {
		item.write(writer, version)?;
	}
	finish_array_write(writer, version);
	Ok(())
}

fn shape_mismatch(field: &FieldSchema) -> SerialError {
	let expected = match (field.kind, field.array_depth) {
		(PrimitiveKind::String, 0) => "text",
		(PrimitiveKind::String, 1) => "text_array",
		(PrimitiveKind::String, _) => "text_array_array",
		(PrimitiveKind::Complex, 0) => "struct",
		(PrimitiveKind::Complex, 1) => "struct_array",
		(PrimitiveKind::Complex, _) => "struct_array_array",
		(_, 0) => "scalar",
		(_, 1) => "array",
		(_, _) => "array_array",
	};
	SerialError::ValueShapeMismatch {
		field: field.name.to_string(),
		expected,
	}
}

#[cfg(test)]
mod tests;
