use std::ops::{Deref, DerefMut};

use crate::serial::{Result, SerialError};

/// Byte order used by a serialized buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
	/// Least significant byte first.
	#[default]
	Little,
	/// Most significant byte first.
	Big,
}

/// Fixed-width primitive that can be read from and written to a byte stream.
pub trait FixedWidth: Copy + Default + PartialEq + std::fmt::Debug {
	/// Encoded size in bytes.
	const SIZE: usize;

	/// Decode from exactly `SIZE` bytes.
	fn decode(raw: &[u8], endianness: Endianness) -> Self;

	/// Append the encoded value to `out`.
	fn encode(self, endianness: Endianness, out: &mut Vec<u8>);
}

macro_rules! impl_fixed_width {
	($($ty:ty),* $(,)?) => {
		$(
			impl FixedWidth for $ty {
				const SIZE: usize = std::mem::size_of::<$ty>();

				fn decode(raw: &[u8], endianness: Endianness) -> Self {
					let mut buf = [0_u8; std::mem::size_of::<$ty>()];
					buf.copy_from_slice(raw);
					match endianness {
						Endianness::Little => <$ty>::from_le_bytes(buf),
						Endianness::Big => <$ty>::from_be_bytes(buf),
					}
				}

				fn encode(self, endianness: Endianness, out: &mut Vec<u8>) {
					match endianness {
						Endianness::Little => out.extend_from_slice(&self.to_le_bytes()),
						Endianness::Big => out.extend_from_slice(&self.to_be_bytes()),
					}
				}
			}
		)*
	};
}

impl_fixed_width!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl FixedWidth for bool {
	const SIZE: usize = 1;

	fn decode(raw: &[u8], _endianness: Endianness) -> Self {
		raw[0] != 0
	}

	fn encode(self, _endianness: Endianness, out: &mut Vec<u8>) {
		out.push(u8::from(self));
	}
}

/// Bounded read cursor over an immutable byte slice.
///
/// The position is freely settable (including past the end) so recovery code
/// can rewind; reads past the end fail with [`SerialError::UnexpectedEof`].
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
	bytes: &'a [u8],
	pos: usize,
	endianness: Endianness,
}

impl<'a> Cursor<'a> {
	/// Create a little-endian cursor at position 0.
	pub fn new(bytes: &'a [u8]) -> Self {
		Self::with_endianness(bytes, Endianness::Little)
	}

	/// Create a cursor at position 0 with explicit byte order.
	pub fn with_endianness(bytes: &'a [u8], endianness: Endianness) -> Self {
		Self { bytes, pos: 0, endianness }
	}

	/// Return current byte offset.
	pub fn pos(&self) -> usize {
		self.pos
	}

	/// Move to an absolute byte offset.
	pub fn set_pos(&mut self, pos: usize) {
		self.pos = pos;
	}

	/// Return total buffer length.
	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	/// Whether the underlying buffer is empty.
	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}

	/// Return the buffer byte order.
	pub fn endianness(&self) -> Endianness {
		self.endianness
	}

	/// Return remaining unread bytes.
	pub fn remaining(&self) -> usize {
		self.bytes.len().saturating_sub(self.pos)
	}

	/// Read exactly `n` bytes and advance cursor.
	pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8]> {
		let start = self.pos;
		let bytes = self.bytes;
		let Some(slice) = start.checked_add(n).and_then(|end| bytes.get(start..end)) else {
			return Err(SerialError::UnexpectedEof {
				at: start,
				need: n,
				rem: self.remaining(),
			});
		};

		self.pos = start + n;
		Ok(slice)
	}

	/// Read one fixed-width primitive in buffer byte order.
	pub fn read_fixed<T: FixedWidth>(&mut self) -> Result<T> {
		let raw = self.read_exact(T::SIZE)?;
		Ok(T::decode(raw, self.endianness))
	}

	/// Read an `i32` in buffer byte order.
	pub fn read_i32(&mut self) -> Result<i32> {
		self.read_fixed()
	}

	/// Advance to the next 4-byte aligned position.
	pub fn align4(&mut self) -> Result<()> {
		let aligned = (self.pos + 3) & !3;
		let skip = aligned.saturating_sub(self.pos);
		let _ = self.read_exact(skip)?;
		Ok(())
	}

	/// Borrow the cursor for look-ahead; the position is restored when the probe drops.
	pub fn probe(&mut self) -> Probe<'_, 'a> {
		let saved = self.pos;
		Probe { cursor: self, saved }
	}
}

/// Scoped look-ahead over a [`Cursor`].
///
/// Dropping the probe puts the cursor back where it was when the probe was
/// taken, whichever way the probing code exits.
pub struct Probe<'c, 'a> {
	cursor: &'c mut Cursor<'a>,
	saved: usize,
}

impl Probe<'_, '_> {
	/// Position the cursor had when the probe was taken.
	pub fn saved_pos(&self) -> usize {
		self.saved
	}
}

impl<'a> Deref for Probe<'_, 'a> {
	type Target = Cursor<'a>;

	fn deref(&self) -> &Self::Target {
		self.cursor
	}
}

impl DerefMut for Probe<'_, '_> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		self.cursor
	}
}

impl Drop for Probe<'_, '_> {
	fn drop(&mut self) {
		self.cursor.pos = self.saved;
	}
}

/// Growable output buffer mirroring [`Cursor`] for encoding.
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
	bytes: Vec<u8>,
	endianness: Endianness,
}

impl ByteWriter {
	/// Create an empty little-endian writer.
	pub fn new() -> Self {
		Self::default()
	}

	/// Create an empty writer with explicit byte order.
	pub fn with_endianness(endianness: Endianness) -> Self {
		Self {
			bytes: Vec::new(),
			endianness,
		}
	}

	/// Return bytes written so far.
	pub fn pos(&self) -> usize {
		self.bytes.len()
	}

	/// Append one fixed-width primitive.
	pub fn write_fixed<T: FixedWidth>(&mut self, value: T) {
		value.encode(self.endianness, &mut self.bytes);
	}

	/// Append an `i32`.
	pub fn write_i32(&mut self, value: i32) {
		self.write_fixed(value);
	}

	/// Append raw bytes.
	pub fn write_bytes(&mut self, bytes: &[u8]) {
		self.bytes.extend_from_slice(bytes);
	}

	/// Zero-pad to the next 4-byte boundary.
	pub fn align4(&mut self) {
		let aligned = (self.bytes.len() + 3) & !3;
		self.bytes.resize(aligned, 0);
	}

	/// Borrow the encoded bytes.
	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	/// Take the encoded bytes.
	pub fn into_bytes(self) -> Vec<u8> {
		self.bytes
	}
}
