use thiserror::Error;

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, SerialError>;

/// Errors produced while decoding, encoding, and copying script structures.
#[derive(Debug, Error)]
pub enum SerialError {
	/// Not enough bytes remained for a requested read.
	#[error("unexpected eof at offset {at}, need {need} bytes, remaining {rem}")]
	UnexpectedEof {
		/// Byte offset where the read was attempted.
		at: usize,
		/// Requested bytes.
		need: usize,
		/// Bytes still available.
		rem: usize,
	},
	/// Count prefix stayed negative after recovery.
	#[error("negative count {count} at offset {at}")]
	NegativeCount {
		/// Count value after recovery.
		count: i32,
		/// Offset just past the count field.
		at: usize,
	},
	/// No recovery strategy produced a usable count.
	#[error("corrupt length {raw} at offset {at} (remaining {remaining})")]
	CorruptLength {
		/// Raw count as read from the buffer.
		raw: i32,
		/// Offset just past the count field.
		at: usize,
		/// Bytes remaining after the count field.
		remaining: usize,
	},
	/// An element inside an array failed to decode.
	#[error("array element {index} failed: {source}")]
	ElementRead {
		/// Zero-based element index reached.
		index: usize,
		/// Underlying element fault.
		#[source]
		source: Box<SerialError>,
	},
	/// Trailing byte budget after a read did not match the schema.
	#[error("structural mismatch in {type_name}: leftover={leftover}")]
	StructuralMismatch {
		/// Schema name of the decoded structure.
		type_name: String,
		/// Unread bytes; negative when the cursor ran past the end.
		leftover: i64,
	},
	/// Copy between instances of one schema created at different depths.
	#[error("depth mismatch copying {type_name}: target={target}, source={source_depth}")]
	DepthMismatch {
		/// Schema name shared by both instances.
		type_name: String,
		/// Destination instance depth.
		target: u32,
		/// Source instance depth.
		source_depth: u32,
	},
	/// Stored field value does not fit the field's declared shape.
	#[error("value for field {field} does not match schema (expected {expected})")]
	ValueShapeMismatch {
		/// Field name.
		field: String,
		/// Expected value shape.
		expected: &'static str,
	},
	/// Schema table failed validation.
	#[error("invalid schema {type_name}.{field}: {reason}")]
	InvalidSchema {
		/// Schema name.
		type_name: String,
		/// Field name.
		field: String,
		/// What was wrong.
		reason: &'static str,
	},
	/// Array or text is too long to encode as a count prefix.
	#[error("array of {count} elements exceeds count limit {max}")]
	ArrayTooLarge {
		/// Element count requested.
		count: usize,
		/// Largest encodable count.
		max: usize,
	},
	/// Requested field name is not declared by the schema.
	#[error("field not found: {type_name}.{name}")]
	FieldNotFound {
		/// Schema name.
		type_name: String,
		/// Requested field name.
		name: String,
	},
	/// Requested schema name is not in the table.
	#[error("schema not found: {name}")]
	SchemaNotFound {
		/// Requested schema name.
		name: String,
	},
	/// Structure nesting went past the hard depth guard.
	#[error("structure depth exceeded (max={max_depth})")]
	DepthExceeded {
		/// Depth ceiling that was hit.
		max_depth: u32,
	},
	/// Engine version string could not be parsed.
	#[error("invalid engine version: {value}")]
	InvalidVersion {
		/// User-provided version text.
		value: String,
	},
	/// zstd stream failure while unpacking an input buffer.
	#[error("decompress: {0}")]
	Decompress(#[from] std::io::Error),
	/// Decompression output exceeded configured safety limit.
	#[error("decompressed output exceeded limit {limit} bytes")]
	DecompressedTooLarge {
		/// Maximum allowed output bytes.
		limit: usize,
	},
}

impl SerialError {
	/// Whether this fault signals that a field's declared shape disagreed with the bytes.
	pub fn is_shape_mismatch(&self) -> bool {
		matches!(
			self,
			Self::UnexpectedEof { .. } | Self::NegativeCount { .. } | Self::CorruptLength { .. } | Self::ElementRead { .. }
		)
	}

	/// Whether this fault is a caller-side schema disagreement rather than a data fault.
	pub fn is_schema_mismatch(&self) -> bool {
		matches!(self, Self::DepthMismatch { .. } | Self::ValueShapeMismatch { .. } | Self::InvalidSchema { .. })
	}
}
