//! Schema-driven decoding and encoding of serialized engine script structures.

/// Structure codec, primitive array codec, schemas, and supporting types.
pub mod serial;
