use scriptdoc::serial::SerialError;
use thiserror::Error;

pub(crate) type Result<T> = std::result::Result<T, CliError>;

/// Failures surfaced by CLI commands.
#[derive(Debug, Error)]
pub(crate) enum CliError {
	#[error(transparent)]
	Serial(#[from] SerialError),
	#[error("read {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},
	#[error("parse schema file {path}: {source}")]
	SchemaJson {
		path: String,
		#[source]
		source: serde_json::Error,
	},
	#[error("unknown kind {kind:?} for {type_name}.{field}")]
	UnknownKind { type_name: String, field: String, kind: String },
	#[error("unknown nested type {nested:?} for {type_name}.{field}")]
	UnknownNestedType { type_name: String, field: String, nested: String },
	#[error("offset {offset} is past the end of a {len}-byte buffer")]
	OffsetOutOfRange { offset: usize, len: usize },
	#[error("lenient decode of {type_name} failed; rerun without --lenient for the underlying fault")]
	LenientReadFailed { type_name: String },
}
