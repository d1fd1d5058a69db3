use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::serial::{Result, SerialError};

/// Field name holding the file index of a pointer schema.
pub const POINTER_FILE_ID: &str = "m_FileID";
/// Field name holding the object id of a pointer schema.
pub const POINTER_PATH_ID: &str = "m_PathID";

/// Storage kind of one schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
	/// One-byte boolean.
	Bool,
	/// Signed 8-bit integer.
	Int8,
	/// Signed 16-bit integer.
	Int16,
	/// Signed 32-bit integer.
	Int32,
	/// Signed 64-bit integer.
	Int64,
	/// Unsigned 8-bit integer.
	UInt8,
	/// Unsigned 16-bit integer.
	UInt16,
	/// Unsigned 32-bit integer.
	UInt32,
	/// Unsigned 64-bit integer.
	UInt64,
	/// 32-bit float.
	Float,
	/// 64-bit float.
	Double,
	/// Length-prefixed text.
	String,
	/// Nested structure described by another schema.
	Complex,
}

impl PrimitiveKind {
	/// Encoded size of fixed-width kinds.
	pub fn fixed_size(self) -> Option<usize> {
		match self {
			Self::Bool | Self::Int8 | Self::UInt8 => Some(1),
			Self::Int16 | Self::UInt16 => Some(2),
			Self::Int32 | Self::UInt32 | Self::Float => Some(4),
			Self::Int64 | Self::UInt64 | Self::Double => Some(8),
			Self::String | Self::Complex => None,
		}
	}

	/// Whether a scalar field of this kind is followed by 4-byte padding.
	pub fn pads_scalar(self) -> bool {
		matches!(self.fixed_size(), Some(1 | 2))
	}

	/// Render kind as a stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Bool => "bool",
			Self::Int8 => "int8",
			Self::Int16 => "int16",
			Self::Int32 => "int32",
			Self::Int64 => "int64",
			Self::UInt8 => "uint8",
			Self::UInt16 => "uint16",
			Self::UInt32 => "uint32",
			Self::UInt64 => "uint64",
			Self::Float => "float",
			Self::Double => "double",
			Self::String => "string",
			Self::Complex => "complex",
		}
	}

	/// Parse a label produced by [`PrimitiveKind::as_str`].
	pub fn from_label(label: &str) -> Option<Self> {
		Some(match label {
			"bool" => Self::Bool,
			"int8" => Self::Int8,
			"int16" => Self::Int16,
			"int32" => Self::Int32,
			"int64" => Self::Int64,
			"uint8" => Self::UInt8,
			"uint16" => Self::UInt16,
			"uint32" => Self::UInt32,
			"uint64" => Self::UInt64,
			"float" => Self::Float,
			"double" => Self::Double,
			"string" => Self::String,
			"complex" => Self::Complex,
			_ => return None,
		})
	}
}

/// One field declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
	/// Field name.
	pub name: Box<str>,
	/// Storage kind.
	pub kind: PrimitiveKind,
	/// `0` scalar, `1` array, `2` array of arrays.
	pub array_depth: u8,
	/// Schema table index of the nested type for `Complex` fields.
	pub nested: Option<u32>,
	/// Whether the nested type is a built-in engine value struct.
	pub is_engine_struct: bool,
}

impl FieldSchema {
	/// Declare a primitive or text field.
	pub fn primitive(name: &str, kind: PrimitiveKind, array_depth: u8) -> Self {
		Self {
			name: name.into(),
			kind,
			array_depth,
			nested: None,
			is_engine_struct: false,
		}
	}

	/// Declare a complex field whose type is `nested` in the same table.
	pub fn complex(name: &str, nested: u32, array_depth: u8) -> Self {
		Self {
			name: name.into(),
			kind: PrimitiveKind::Complex,
			array_depth,
			nested: Some(nested),
			is_engine_struct: false,
		}
	}

	/// Mark the nested type as a built-in engine value struct.
	pub fn engine_struct(mut self) -> Self {
		self.is_engine_struct = true;
		self
	}
}

/// One structure schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
	/// Type name.
	pub name: Box<str>,
	/// Field declarations in serialization order.
	pub fields: Vec<FieldSchema>,
	/// Whether instances are inter-object references.
	pub is_pointer: bool,
}

impl Schema {
	/// Declare a plain structure.
	pub fn new(name: &str, fields: Vec<FieldSchema>) -> Self {
		Self {
			name: name.into(),
			fields,
			is_pointer: false,
		}
	}

	/// Declare a reference schema laid out as `m_FileID: Int32, m_PathID: Int64`.
	pub fn pointer(name: &str) -> Self {
		Self {
			name: name.into(),
			fields: vec![
				FieldSchema::primitive(POINTER_FILE_ID, PrimitiveKind::Int32, 0),
				FieldSchema::primitive(POINTER_PATH_ID, PrimitiveKind::Int64, 0),
			],
			is_pointer: true,
		}
	}

	/// Position of the first field called `name`.
	pub fn field_index(&self, name: &str) -> Option<usize> {
		self.fields.iter().position(|field| field.name.as_ref() == name)
	}
}

/// Validated table of schemas; nested types are table indices.
#[derive(Debug)]
pub struct SchemaSet {
	schemas: Vec<Schema>,
}

impl SchemaSet {
	/// Validate and share a schema table.
	pub fn new(schemas: Vec<Schema>) -> Result<Arc<Self>> {
		for schema in &schemas {
			for field in &schema.fields {
				check_field(schema, field, schemas.len())?;
			}
			if schema.is_pointer {
				check_pointer(schema)?;
			}
		}
		Ok(Arc::new(Self { schemas }))
	}

	/// Number of schemas.
	pub fn len(&self) -> usize {
		self.schemas.len()
	}

	/// Whether the table is empty.
	pub fn is_empty(&self) -> bool {
		self.schemas.is_empty()
	}

	/// Iterate schemas in table order.
	pub fn iter(&self) -> impl Iterator<Item = &Schema> {
		self.schemas.iter()
	}

	/// Handle for the schema at `index`.
	pub fn get(self: &Arc<Self>, index: u32) -> Option<SchemaRef> {
		if (index as usize) < self.schemas.len() {
			Some(SchemaRef { set: self.clone(), index })
		} else {
			None
		}
	}

	/// Handle for the first schema called `name`.
	pub fn find(self: &Arc<Self>, name: &str) -> Result<SchemaRef> {
		let index = self
			.schemas
			.iter()
			.position(|item| item.name.as_ref() == name)
			.ok_or_else(|| SerialError::SchemaNotFound { name: name.to_owned() })?;
		Ok(SchemaRef {
			set: self.clone(),
			index: index as u32,
		})
	}
}

/// Shared handle to one schema in a [`SchemaSet`].
///
/// Equality is identity: same table allocation and same index.
#[derive(Clone)]
pub struct SchemaRef {
	set: Arc<SchemaSet>,
	index: u32,
}

impl SchemaRef {
	/// Table index of this schema.
	pub fn index(&self) -> u32 {
		self.index
	}

	/// Owning table.
	pub fn set(&self) -> &Arc<SchemaSet> {
		&self.set
	}

	/// Handle for a field's nested schema.
	pub fn nested(&self, field: &FieldSchema) -> Option<SchemaRef> {
		field.nested.and_then(|index| self.set.get(index))
	}
}

impl Deref for SchemaRef {
	type Target = Schema;

	fn deref(&self) -> &Schema {
		&self.set.schemas[self.index as usize]
	}
}

impl PartialEq for SchemaRef {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.set, &other.set) && self.index == other.index
	}
}

impl Eq for SchemaRef {}

impl fmt::Debug for SchemaRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SchemaRef({}#{})", self.name, self.index)
	}
}

fn check_field(schema: &Schema, field: &FieldSchema, len: usize) -> Result<()> {
	let invalid = |reason| SerialError::InvalidSchema {
		type_name: schema.name.to_string(),
		field: field.name.to_string(),
		reason,
	};

	if field.array_depth > 2 {
		return Err(invalid("array depth above 2"));
	}
	match (field.kind, field.nested) {
		(PrimitiveKind::Complex, None) => Err(invalid("complex field without nested type")),
		(PrimitiveKind::Complex, Some(index)) if index as usize >= len => Err(invalid("nested type index out of range")),
		(PrimitiveKind::Complex, Some(_)) => Ok(()),
		(_, Some(_)) => Err(invalid("nested type on primitive field")),
		(_, None) if field.is_engine_struct => Err(invalid("engine struct flag on primitive field")),
		(_, None) => Ok(()),
	}
}

fn check_pointer(schema: &Schema) -> Result<()> {
	let has = |name: &str, kind: PrimitiveKind| {
		schema
			.fields
			.iter()
			.any(|field| field.name.as_ref() == name && field.kind == kind && field.array_depth == 0)
	};
	if has(POINTER_FILE_ID, PrimitiveKind::Int32) && has(POINTER_PATH_ID, PrimitiveKind::Int64) {
		return Ok(());
	}
	Err(SerialError::InvalidSchema {
		type_name: schema.name.to_string(),
		field: POINTER_PATH_ID.to_owned(),
		reason: "pointer schema needs m_FileID:int32 and m_PathID:int64",
	})
}
