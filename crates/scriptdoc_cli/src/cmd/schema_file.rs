use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use scriptdoc::serial::{FieldSchema, PrimitiveKind, Schema, SchemaSet};

use crate::error::{CliError, Result};

#[derive(serde::Deserialize)]
struct SchemaFile {
	types: Vec<TypeDesc>,
}

#[derive(serde::Deserialize)]
struct TypeDesc {
	name: String,
	#[serde(default)]
	pointer: bool,
	#[serde(default)]
	fields: Vec<FieldDesc>,
}

#[derive(serde::Deserialize)]
struct FieldDesc {
	name: String,
	kind: String,
	#[serde(default)]
	array_depth: u8,
	#[serde(default)]
	nested: Option<String>,
	#[serde(default)]
	engine_struct: bool,
}

/// Load and validate a JSON schema table from disk.
pub fn load(path: &Path) -> Result<Arc<SchemaSet>> {
	let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
		path: path.display().to_string(),
		source,
	})?;
	let file: SchemaFile = serde_json::from_str(&text).map_err(|source| CliError::SchemaJson {
		path: path.display().to_string(),
		source,
	})?;
	build(file)
}

/// Parse a JSON schema table from text.
pub fn parse(text: &str) -> Result<Arc<SchemaSet>> {
	let file: SchemaFile = serde_json::from_str(text).map_err(|source| CliError::SchemaJson {
		path: "<inline>".to_owned(),
		source,
	})?;
	build(file)
}

fn build(file: SchemaFile) -> Result<Arc<SchemaSet>> {
	let mut index = HashMap::new();
	for (at, desc) in file.types.iter().enumerate() {
		index.entry(desc.name.clone()).or_insert(at as u32);
	}

	let mut schemas = Vec::with_capacity(file.types.len());
	for desc in &file.types {
		if desc.pointer && desc.fields.is_empty() {
			schemas.push(Schema::pointer(&desc.name));
			continue;
		}

		let mut fields = Vec::with_capacity(desc.fields.len());
		for field in &desc.fields {
			fields.push(build_field(desc, field, &index)?);
		}
		schemas.push(Schema {
			name: desc.name.as_str().into(),
			fields,
			is_pointer: desc.pointer,
		});
	}

	Ok(SchemaSet::new(schemas)?)
}

fn build_field(owner: &TypeDesc, field: &FieldDesc, index: &HashMap<String, u32>) -> Result<FieldSchema> {
	let kind = PrimitiveKind::from_label(&field.kind).ok_or_else(|| CliError::UnknownKind {
		type_name: owner.name.clone(),
		field: field.name.clone(),
		kind: field.kind.clone(),
	})?;

	let nested = match &field.nested {
		Some(name) => Some(*index.get(name).ok_or_else(|| CliError::UnknownNestedType {
			type_name: owner.name.clone(),
			field: field.name.clone(),
			nested: name.clone(),
		})?),
		None => None,
	};

	Ok(FieldSchema {
		name: field.name.as_str().into(),
		kind,
		array_depth: field.array_depth,
		nested,
		is_engine_struct: field.engine_struct,
	})
}
