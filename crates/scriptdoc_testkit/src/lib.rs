//! Shared test helpers for workspace crates.

use std::path::{Path, PathBuf};

/// Resolve the workspace root path.
pub fn workspace_root() -> PathBuf {
	let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
	manifest_dir
		.join("..")
		.join("..")
		.canonicalize()
		.unwrap_or_else(|_| manifest_dir.join("..").join(".."))
}

/// Resolve a fixture path under `<workspace>/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
	workspace_root().join("fixtures").join(name)
}

/// Read a fixture file into memory.
pub fn fixture_bytes(name: &str) -> Vec<u8> {
	let path = fixture_path(name);
	std::fs::read(&path).unwrap_or_else(|err| panic!("fixture {} should be readable: {err}", path.display()))
}

/// Resolve the workspace target directory.
pub fn target_dir() -> PathBuf {
	std::env::var_os("CARGO_TARGET_DIR")
		.map(PathBuf::from)
		.unwrap_or_else(|| workspace_root().join("target"))
}

/// Create (if needed) a per-test scratch directory under the target directory.
pub fn scratch_dir(name: &str) -> PathBuf {
	let dir = target_dir().join("scriptdoc-scratch").join(name);
	std::fs::create_dir_all(&dir).unwrap_or_else(|err| panic!("scratch dir {} should be creatable: {err}", dir.display()));
	dir
}

/// Write `bytes` to `<scratch_dir(test)>/<file>` and return the path.
pub fn write_scratch(test: &str, file: &str, bytes: &[u8]) -> PathBuf {
	let path = scratch_dir(test).join(file);
	std::fs::write(&path, bytes).unwrap_or_else(|err| panic!("scratch file {} should be writable: {err}", path.display()));
	path
}
