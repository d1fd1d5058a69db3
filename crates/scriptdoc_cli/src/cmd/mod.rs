/// Structure decode command.
pub mod decode;
/// Reference listing command.
pub mod refs;
/// Schema table listing command.
pub mod schema;
/// JSON schema descriptor loading.
pub mod schema_file;
#[cfg(test)]
pub(crate) mod test_support;
/// Shared command helpers.
pub mod util;
