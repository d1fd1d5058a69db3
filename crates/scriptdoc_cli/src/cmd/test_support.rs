use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::OnceLock;

use scriptdoc_testkit::{fixture_path as shared_fixture_path, target_dir as workspace_target_dir};

static SCRIPTDOC_BIN: OnceLock<PathBuf> = OnceLock::new();

pub(crate) fn fixture_path(name: &str) -> PathBuf {
	shared_fixture_path(name)
}

pub(crate) fn fixture_arg(name: &str) -> String {
	fixture_path(name).to_string_lossy().into_owned()
}

pub(crate) fn run_scriptdoc(args: &[&str]) -> Output {
	Command::new(scriptdoc_bin())
		.args(args)
		.env_remove("RUST_LOG")
		.output()
		.expect("scriptdoc command executes")
}

pub(crate) fn run_scriptdoc_json(args: &[&str]) -> serde_json::Value {
	let output = run_scriptdoc(args);
	assert!(
		output.status.success(),
		"scriptdoc command failed with status={}: {}",
		output.status,
		String::from_utf8_lossy(&output.stderr)
	);
	serde_json::from_slice(&output.stdout).expect("stdout should be valid json")
}

/// Run a command that must fail and return its stderr.
///
/// The CLI reports every failure as one `error: ...` line and exit code 1.
pub(crate) fn run_scriptdoc_error(args: &[&str]) -> String {
	let output = run_scriptdoc(args);
	assert_eq!(
		output.status.code(),
		Some(1),
		"scriptdoc command should fail with exit 1, stdout: {}",
		String::from_utf8_lossy(&output.stdout)
	);
	let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
	assert!(
		stderr.lines().any(|line| line.starts_with("error: ")),
		"stderr should carry an error line: {stderr}"
	);
	stderr
}

fn scriptdoc_bin() -> &'static PathBuf {
	SCRIPTDOC_BIN.get_or_init(resolve_scriptdoc_bin)
}

fn resolve_scriptdoc_bin() -> PathBuf {
	if let Ok(path) = std::env::var("CARGO_BIN_EXE_scriptdoc") {
		return PathBuf::from(path);
	}

	let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
	let target_dir = workspace_target_dir();

	let mut bin = target_dir.join("debug");
	bin.push(if cfg!(windows) { "scriptdoc.exe" } else { "scriptdoc" });

	let status = Command::new("cargo")
		.current_dir(&manifest_dir)
		.args(["build", "--quiet", "--bin", "scriptdoc"])
		.status()
		.expect("cargo build executes");
	assert!(status.success(), "failed to build scriptdoc binary at {}", bin.display());

	bin
}
