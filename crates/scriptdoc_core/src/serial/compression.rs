use std::io::Read;

use crate::serial::{Result, SerialError};

const MAX_DECOMPRESSED_BYTES: usize = 512 * 1024 * 1024;
/// zstd frame magic.
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Compression mode detected for an input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
	/// Raw bytes.
	None,
	/// zstd-compressed bytes.
	Zstd,
}

impl Compression {
	/// Render compression mode as a stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::None => "none",
			Self::Zstd => "zstd",
		}
	}
}

/// Detect and undo compression, returning `(mode, decoded_bytes)`.
///
/// Buffers without the zstd frame magic pass through unchanged.
pub fn decode_bytes(raw: Vec<u8>) -> Result<(Compression, Vec<u8>)> {
	decode_bytes_with_limit(raw, MAX_DECOMPRESSED_BYTES)
}

/// [`decode_bytes`] with an explicit output ceiling.
pub fn decode_bytes_with_limit(raw: Vec<u8>, limit: usize) -> Result<(Compression, Vec<u8>)> {
	if !raw.starts_with(&ZSTD_MAGIC) {
		return Ok((Compression::None, raw));
	}
	let out = decode_zstd(&raw, limit)?;
	Ok((Compression::Zstd, out))
}

fn decode_zstd(raw: &[u8], limit: usize) -> Result<Vec<u8>> {
	let mut decoder = zstd::stream::read::Decoder::new(raw)?;
	let mut out = Vec::new();
	let mut buf = [0_u8; 8192];

	loop {
		let read = decoder.read(&mut buf)?;
		if read == 0 {
			break;
		}

		if out.len() + read > limit {
			return Err(SerialError::DecompressedTooLarge { limit });
		}

		out.extend_from_slice(&buf[..read]);
	}

	Ok(out)
}
