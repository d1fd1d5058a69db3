use std::path::Path;

use scriptdoc::serial::{Compression, Cursor, EngineVersion, PPtr, Scalar, decode_bytes};

use crate::error::{CliError, Result};

/// Print a serializable payload as pretty JSON on stdout.
pub(crate) fn emit_json<T: serde::Serialize>(payload: &T) {
	match serde_json::to_string_pretty(payload) {
		Ok(text) => println!("{text}"),
		Err(err) => eprintln!("error: json encode failed: {err}"),
	}
}

/// Read a data file, undoing zstd compression when present.
pub(crate) fn load_data(path: &Path) -> Result<(Compression, Vec<u8>)> {
	let raw = std::fs::read(path).map_err(|source| CliError::Io {
		path: path.display().to_string(),
		source,
	})?;
	Ok(decode_bytes(raw)?)
}

/// Parse an engine version argument.
pub(crate) fn parse_version(text: &str) -> Result<EngineVersion> {
	Ok(EngineVersion::parse(text)?)
}

/// Cursor over `bytes` starting at `offset`.
pub(crate) fn cursor_at(bytes: &[u8], offset: usize) -> Result<Cursor<'_>> {
	if offset > bytes.len() {
		return Err(CliError::OffsetOutOfRange { offset, len: bytes.len() });
	}
	let mut cursor = Cursor::new(bytes);
	cursor.set_pos(offset);
	Ok(cursor)
}

/// Render a scalar as a JSON value; non-finite floats become `null`.
pub(crate) fn scalar_json(value: Scalar) -> serde_json::Value {
	use serde_json::Value;

	match value {
		Scalar::Bool(item) => Value::Bool(item),
		Scalar::Int8(item) => Value::from(item),
		Scalar::Int16(item) => Value::from(item),
		Scalar::Int32(item) => Value::from(item),
		Scalar::Int64(item) => Value::from(item),
		Scalar::UInt8(item) => Value::from(item),
		Scalar::UInt16(item) => Value::from(item),
		Scalar::UInt32(item) => Value::from(item),
		Scalar::UInt64(item) => Value::from(item),
		Scalar::Float(item) => serde_json::Number::from_f64(f64::from(item)).map_or(Value::Null, Value::Number),
		Scalar::Double(item) => serde_json::Number::from_f64(item).map_or(Value::Null, Value::Number),
	}
}

/// Render a scalar for tab-separated text output.
pub(crate) fn scalar_text(value: Scalar) -> String {
	match value {
		Scalar::Bool(item) => item.to_string(),
		Scalar::Float(item) => item.to_string(),
		Scalar::Double(item) => item.to_string(),
		other => other.as_i128().to_string(),
	}
}

/// Render a reference as `file_id:path_id`.
pub(crate) fn pptr_label(reference: PPtr) -> String {
	format!("{}:{}", reference.file_id, reference.path_id)
}
