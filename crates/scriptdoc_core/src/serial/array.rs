//! Count-prefixed primitive, array and text codecs plus the recovery
//! heuristics used when a count or length prefix looks implausible.

use tracing::{debug, warn};

use crate::serial::value::{with_array, with_primitive};
use crate::serial::{ByteWriter, Cursor, EngineVersion, FixedWidth, Primitive, PrimitiveKind, Result, Scalar, ScalarArray, SerialError};

/// Largest count or text length accepted without recovery.
pub const COUNT_CEILING: i32 = 1_000_000;
/// First major version that pads arrays to a 4-byte boundary.
pub const ALIGN_ARRAYS_SINCE: u16 = 2017;

const FLOAT_EPSILON: f32 = 1e-4;
const PREVIOUS_FIELD_MAX: i16 = 10_000;
const ESTIMATED_COUNT_MAX: usize = 1000;
pub(crate) const COUNT_FIELD_SIZE: usize = 4;

/// Whether arrays written by `version` are followed by 4-byte padding.
pub fn aligns_arrays(version: &EngineVersion) -> bool {
	version.greater_than_or_equals(ALIGN_ARRAYS_SINCE)
}

/// Read a count prefix, recover it if implausible, and check that at least
/// `min_element_size` bytes per element remain.
pub fn read_count(cursor: &mut Cursor<'_>, min_element_size: usize) -> Result<usize> {
	let raw = cursor.read_i32()?;
	let count = if !(0..=COUNT_CEILING).contains(&raw) {
		recover_count(cursor, raw)?
	} else {
		raw
	};
	if count < 0 {
		return Err(SerialError::NegativeCount { count, at: cursor.pos() });
	}

	let count = count as usize;
	let need = count.saturating_mul(min_element_size);
	if need > cursor.remaining() {
		return Err(SerialError::UnexpectedEof {
			at: cursor.pos(),
			need,
			rem: cursor.remaining(),
		});
	}
	Ok(count)
}

/// Guess a usable count after `raw` was read from the 4 bytes just before the cursor.
///
/// Strategies in order: the count bytes as an `f32`, the preceding field as
/// an `i16`, then an estimate from the remaining byte budget. The cursor is
/// left just after the count field on every path.
pub fn recover_count(cursor: &mut Cursor<'_>, raw: i32) -> Result<i32> {
	let after = cursor.pos();
	let remaining = cursor.remaining();
	let mut probe = cursor.probe();

	if let Some(start) = after.checked_sub(COUNT_FIELD_SIZE) {
		probe.set_pos(start);
		if let Ok(value) = probe.read_fixed::<f32>()
			&& let Some(count) = float_count(value)
		{
			debug!(raw, count, at = after, "count recovered as float");
			return Ok(count);
		}
	}

	if let Some(start) = after.checked_sub(2 * COUNT_FIELD_SIZE) {
		probe.set_pos(start);
		if let Ok(value) = probe.read_fixed::<i16>()
			&& (0..=PREVIOUS_FIELD_MAX).contains(&value)
		{
			debug!(raw, count = value, at = after, "count recovered from preceding field");
			return Ok(i32::from(value));
		}
	}

	let estimate = (remaining / COUNT_FIELD_SIZE).min(ESTIMATED_COUNT_MAX);
	if estimate > 0 {
		debug!(raw, count = estimate, at = after, "count estimated from remaining bytes");
		return Ok(estimate as i32);
	}

	Err(SerialError::CorruptLength { raw, at: after, remaining })
}

fn float_count(value: f32) -> Option<i32> {
	if !value.is_finite() || value.is_subnormal() || value < 0.0 || value > COUNT_CEILING as f32 {
		return None;
	}
	let rounded = value.round();
	if (value - rounded).abs() > FLOAT_EPSILON {
		return None;
	}
	Some(rounded as i32)
}

/// Pad to 4 bytes after an array when `version` requires it.
pub fn finish_array(cursor: &mut Cursor<'_>, version: &EngineVersion) -> Result<()> {
	if aligns_arrays(version) {
		cursor.align4()?;
	}
	Ok(())
}

/// Read a scalar of a fixed-width kind; 1- and 2-byte scalars are followed by padding.
pub fn read_scalar(cursor: &mut Cursor<'_>, kind: PrimitiveKind) -> Result<Scalar> {
	let value = with_primitive!(
		kind,
		T => cursor.read_fixed::<T>()?.into_scalar(),
		_ => return Err(not_fixed_width(kind))
	);
	if kind.pads_scalar() {
		cursor.align4()?;
	}
	Ok(value)
}

/// Read a count-prefixed array of `T`.
pub fn read_primitive_array<T: FixedWidth>(cursor: &mut Cursor<'_>, version: &EngineVersion) -> Result<Vec<T>> {
	let count = read_count(cursor, T::SIZE)?;
	let mut items = Vec::with_capacity(count);
	for index in 0..count {
		let item = cursor
			.read_fixed::<T>()
			.map_err(|source| SerialError::ElementRead {
				index,
				source: Box::new(source),
			})?;
		items.push(item);
	}
	finish_array(cursor, version)?;
	Ok(items)
}

/// Read a count-prefixed array of arrays of `T`.
pub fn read_primitive_array_array<T: FixedWidth>(cursor: &mut Cursor<'_>, version: &EngineVersion) -> Result<Vec<Vec<T>>> {
	let count = read_count(cursor, COUNT_FIELD_SIZE)?;
	let mut rows = Vec::with_capacity(count);
	for _ in 0..count {
		rows.push(read_primitive_array(cursor, version)?);
	}
	finish_array(cursor, version)?;
	Ok(rows)
}

/// Read an array of a fixed-width kind.
pub fn read_array(cursor: &mut Cursor<'_>, kind: PrimitiveKind, version: &EngineVersion) -> Result<ScalarArray> {
	with_primitive!(
		kind,
		T => Ok(T::into_array(read_primitive_array::<T>(cursor, version)?)),
		_ => Err(not_fixed_width(kind))
	)
}

/// Read an array of arrays of a fixed-width kind.
pub fn read_array_array(cursor: &mut Cursor<'_>, kind: PrimitiveKind, version: &EngineVersion) -> Result<Vec<ScalarArray>> {
	with_primitive!(
		kind,
		T => Ok(read_primitive_array_array::<T>(cursor, version)?.into_iter().map(T::into_array).collect()),
		_ => Err(not_fixed_width(kind))
	)
}

/// Read one length-prefixed text value; never fails.
///
/// Padding after text is unconditional, unlike the version-gated padding
/// after arrays. A bad length falls back to [`recover_text`].
pub fn read_text(cursor: &mut Cursor<'_>) -> String {
	let start = cursor.pos();
	match read_text_exact(cursor) {
		Ok(text) => text,
		Err(err) => {
			debug!(at = start, error = %err, "text length fault");
			cursor.set_pos(start);
			recover_text(cursor)
		}
	}
}

fn read_text_exact(cursor: &mut Cursor<'_>) -> Result<String> {
	let len = cursor.read_i32()?;
	if !(0..=COUNT_CEILING).contains(&len) {
		return Err(SerialError::CorruptLength {
			raw: len,
			at: cursor.pos(),
			remaining: cursor.remaining(),
		});
	}
	let bytes = cursor.read_exact(len as usize)?;
	let text = String::from_utf8_lossy(bytes).into_owned();
	finish_text(cursor);
	Ok(text)
}

/// Best-effort text read after a length fault, starting at the length field.
///
/// Implausible lengths are reinterpreted as `f32` or dropped to zero, and
/// the length is clamped to the remaining bytes. Any further failure yields
/// an empty string.
pub fn recover_text(cursor: &mut Cursor<'_>) -> String {
	let at = cursor.pos();
	let Ok(raw) = cursor.read_i32() else {
		warn!(at, "text recovery: length field unreadable");
		return String::new();
	};

	let len = if (0..=COUNT_CEILING).contains(&raw) {
		raw
	} else {
		float_count(f32::from_bits(raw as u32)).unwrap_or(0)
	};
	let len = (len as usize).min(cursor.remaining());

	let Ok(bytes) = cursor.read_exact(len) else {
		return String::new();
	};
	let text = String::from_utf8_lossy(bytes).into_owned();
	finish_text(cursor);
	warn!(at, raw, len, "text recovered");
	text
}

fn finish_text(cursor: &mut Cursor<'_>) {
	// trailing padding may be cut off at the end of the buffer
	if cursor.align4().is_err() {
		let end = cursor.len();
		cursor.set_pos(end);
	}
}

/// Read a count-prefixed array of text values.
pub fn read_text_array(cursor: &mut Cursor<'_>, version: &EngineVersion) -> Result<Vec<String>> {
	let count = read_count(cursor, COUNT_FIELD_SIZE)?;
	let mut items = Vec::with_capacity(count);
	for _ in 0..count {
		items.push(read_text(cursor));
	}
	finish_array(cursor, version)?;
	Ok(items)
}

/// Read a count-prefixed array of text arrays.
pub fn read_text_array_array(cursor: &mut Cursor<'_>, version: &EngineVersion) -> Result<Vec<Vec<String>>> {
	let count = read_count(cursor, COUNT_FIELD_SIZE)?;
	let mut rows = Vec::with_capacity(count);
	for _ in 0..count {
		rows.push(read_text_array(cursor, version)?);
	}
	finish_array(cursor, version)?;
	Ok(rows)
}

/// Write a count prefix.
pub fn write_count(writer: &mut ByteWriter, count: usize) -> Result<()> {
	let value = i32::try_from(count)
		.ok()
		.filter(|value| *value <= COUNT_CEILING)
		.ok_or(SerialError::ArrayTooLarge {
			count,
			max: COUNT_CEILING as usize,
		})?;
	writer.write_i32(value);
	Ok(())
}

/// Pad after an array when `version` requires it.
pub fn finish_array_write(writer: &mut ByteWriter, version: &EngineVersion) {
	if aligns_arrays(version) {
		writer.align4();
	}
}

/// Write a scalar, padding 1- and 2-byte kinds.
pub fn write_scalar(writer: &mut ByteWriter, value: Scalar) {
	match value {
		Scalar::Bool(item) => writer.write_fixed(item),
		Scalar::Int8(item) => writer.write_fixed(item),
		Scalar::Int16(item) => writer.write_fixed(item),
		Scalar::Int32(item) => writer.write_fixed(item),
		Scalar::Int64(item) => writer.write_fixed(item),
		Scalar::UInt8(item) => writer.write_fixed(item),
		Scalar::UInt16(item) => writer.write_fixed(item),
		Scalar::UInt32(item) => writer.write_fixed(item),
		Scalar::UInt64(item) => writer.write_fixed(item),
		Scalar::Float(item) => writer.write_fixed(item),
		Scalar::Double(item) => writer.write_fixed(item),
	}
	if value.kind().pads_scalar() {
		writer.align4();
	}
}

/// Write a count-prefixed array of `T`.
pub fn write_primitive_array<T: FixedWidth>(writer: &mut ByteWriter, items: &[T], version: &EngineVersion) -> Result<()> {
	write_count(writer, items.len())?;
	for item in items {
		writer.write_fixed(*item);
	}
	finish_array_write(writer, version);
	Ok(())
}

/// Write a count-prefixed array of arrays of `T`.
pub fn write_primitive_array_array<T: FixedWidth>(writer: &mut ByteWriter, rows: &[Vec<T>], version: &EngineVersion) -> Result<()> {
	write_count(writer, rows.len())?;
	for row in rows {
		write_primitive_array(writer, row, version)?;
	}
	finish_array_write(writer, version);
	Ok(())
}

/// Write an array of a fixed-width kind.
pub fn write_array(writer: &mut ByteWriter, items: &ScalarArray, version: &EngineVersion) -> Result<()> {
	with_array!(items, values => write_primitive_array(writer, values, version))
}

/// Write an array of arrays of fixed-width values.
pub fn write_array_array(writer: &mut ByteWriter, rows: &[ScalarArray], version: &EngineVersion) -> Result<()> {
	write_count(writer, rows.len())?;
	for row in rows {
		write_array(writer, row, version)?;
	}
	finish_array_write(writer, version);
	Ok(())
}

/// Write one length-prefixed text value followed by padding.
pub fn write_text(writer: &mut ByteWriter, text: &str) -> Result<()> {
	write_count(writer, text.len())?;
	writer.write_bytes(text.as_bytes());
	writer.align4();
	Ok(())
}

/// Write a count-prefixed array of text values.
pub fn write_text_array(writer: &mut ByteWriter, items: &[String], version: &EngineVersion) -> Result<()> {
	write_count(writer, items.len())?;
	for item in items {
		write_text(writer, item)?;
	}
	finish_array_write(writer, version);
	Ok(())
}

/// Write a count-prefixed array of text arrays.
pub fn write_text_array_array(writer: &mut ByteWriter, rows: &[Vec<String>], version: &EngineVersion) -> Result<()> {
	write_count(writer, rows.len())?;
	for row in rows {
		write_text_array(writer, row, version)?;
	}
	finish_array_write(writer, version);
	Ok(())
}

fn not_fixed_width(kind: PrimitiveKind) -> SerialError {
	SerialError::ValueShapeMismatch {
		field: kind.as_str().to_owned(),
		expected: "fixed-width kind",
	}
}
