/// Count-prefixed primitive, array, and text codecs with recovery heuristics.
pub mod array;
mod bytes;
mod compression;
mod error;
mod reference;
mod schema;
mod structure;
mod value;
mod version;
mod visitor;

/// Byte cursor, writer, and fixed-width primitives.
pub use bytes::{ByteWriter, Cursor, Endianness, FixedWidth, Probe};
/// Compression detection and decoding.
pub use compression::{Compression, ZSTD_MAGIC, decode_bytes, decode_bytes_with_limit};
/// Error and result aliases.
pub use error::{Result, SerialError};
/// Inter-object references and dependency walks.
pub use reference::{Dependencies, IdentityConverter, PPtr, ReferenceConverter};
/// Schema table types.
pub use schema::{FieldSchema, POINTER_FILE_ID, POINTER_PATH_ID, PrimitiveKind, Schema, SchemaRef, SchemaSet};
/// Structure instances and read options.
pub use structure::{ENGINE_DEPTH_ALLOWANCE, MAX_DEPTH, RETRY_REWIND, ReadContext, StructureInstance, TRAILING_SLACK, TransferFlags};
/// Decoded value types.
pub use value::{FieldValue, Primitive, Scalar, ScalarArray};
/// Engine version type.
pub use version::EngineVersion;
/// Traversal visitor interface.
pub use visitor::{StructureVisitor, visit_items};
