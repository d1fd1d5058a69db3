use std::fmt;
use std::str::FromStr;

use crate::serial::{Result, SerialError};

/// Engine release version, compared component-wise.
///
/// Text form is `major.minor.patch` with an optional release suffix
/// (`2019.4.31f1`); the suffix is accepted and ignored for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EngineVersion {
	/// Major component (`5`, `2017`, `2022`, `6000`).
	pub major: u16,
	/// Minor component.
	pub minor: u16,
	/// Patch component.
	pub patch: u16,
}

impl EngineVersion {
	/// Build a version from components.
	pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
		Self { major, minor, patch }
	}

	/// Parse `major[.minor[.patch[suffix]]]`.
	pub fn parse(text: &str) -> Result<Self> {
		let invalid = || SerialError::InvalidVersion { value: text.to_owned() };

		let mut parts = text.trim().split('.');
		let major = parts.next().and_then(parse_digits).ok_or_else(invalid)?;
		let minor = match parts.next() {
			Some(part) => parse_digits(part).ok_or_else(invalid)?,
			None => 0,
		};
		let patch = match parts.next() {
			Some(part) => parse_leading_digits(part).ok_or_else(invalid)?,
			None => 0,
		};
		if parts.next().is_some() {
			return Err(invalid());
		}

		Ok(Self { major, minor, patch })
	}

	/// Whether this version is at or after the start of `major`.
	pub fn greater_than_or_equals(&self, major: u16) -> bool {
		self.major >= major
	}
}

impl FromStr for EngineVersion {
	type Err = SerialError;

	fn from_str(text: &str) -> Result<Self> {
		Self::parse(text)
	}
}

impl fmt::Display for EngineVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
	}
}

fn parse_digits(text: &str) -> Option<u16> {
	if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
		return None;
	}
	text.parse().ok()
}

fn parse_leading_digits(text: &str) -> Option<u16> {
	let end = text.bytes().position(|byte| !byte.is_ascii_digit()).unwrap_or(text.len());
	let (digits, suffix) = text.split_at(end);
	if !suffix.is_empty() && !suffix.starts_with(|c: char| c.is_ascii_alphabetic()) {
		return None;
	}
	parse_digits(digits)
}

#[cfg(test)]
mod tests {
	use super::EngineVersion;

	#[test]
	fn parses_release_suffix() {
		let version = EngineVersion::parse("2019.4.31f1").expect("version parses");
		assert_eq!(version, EngineVersion::new(2019, 4, 31));
		assert_eq!(version.to_string(), "2019.4.31");
	}

	#[test]
	fn missing_components_default_to_zero() {
		assert_eq!("2017".parse::<EngineVersion>().expect("version parses"), EngineVersion::new(2017, 0, 0));
	}

	#[test]
	fn rejects_garbage() {
		assert!(EngineVersion::parse("").is_err());
		assert!(EngineVersion::parse("x.1").is_err());
		assert!(EngineVersion::parse("1.2.3.4").is_err());
		assert!(EngineVersion::parse("1.2.-3").is_err());
	}

	#[test]
	fn year_gate_compares_major_only() {
		assert!(EngineVersion::new(2017, 0, 0).greater_than_or_equals(2017));
		assert!(EngineVersion::new(2019, 4, 0).greater_than_or_equals(2017));
		assert!(!EngineVersion::new(5, 6, 7).greater_than_or_equals(2017));
	}
}
