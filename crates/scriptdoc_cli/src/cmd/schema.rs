use std::path::PathBuf;

use scriptdoc::serial::{FieldSchema, Schema, SchemaSet};

use crate::cmd::schema_file;
use crate::cmd::util::emit_json;
use crate::error::Result;

#[derive(clap::Args)]
pub struct Args {
	pub schema: PathBuf,
	#[arg(long = "type")]
	pub type_name: Option<String>,
	#[arg(long)]
	pub json: bool,
}

/// Print the types of a schema file, or the fields of one type.
pub fn run(args: Args) -> Result<()> {
	let Args { schema: path, type_name, json } = args;

	let set = schema_file::load(&path)?;
	let selected: Vec<&Schema> = match &type_name {
		Some(name) => {
			let index = set.find(name)?.index() as usize;
			set.iter().skip(index).take(1).collect()
		}
		None => set.iter().collect(),
	};

	if json {
		let payload = SchemaJson {
			path: path.display().to_string(),
			types: selected.iter().map(|schema| type_json(&set, schema)).collect(),
		};
		emit_json(&payload);
		return Ok(());
	}

	println!("path: {}", path.display());
	println!("types: {}", set.len());
	for schema in selected {
		println!();
		println!("{}{}", schema.name, if schema.is_pointer { " (pointer)" } else { "" });
		println!("field\tkind\tarray_depth\tnested\tengine_struct");
		for field in &schema.fields {
			println!(
				"{}\t{}\t{}\t{}\t{}",
				field.name,
				field.kind.as_str(),
				field.array_depth,
				nested_name(&set, field).unwrap_or_else(|| "-".to_owned()),
				field.is_engine_struct
			);
		}
	}

	Ok(())
}

fn nested_name(set: &SchemaSet, field: &FieldSchema) -> Option<String> {
	let index = field.nested? as usize;
	set.iter().nth(index).map(|nested| nested.name.to_string())
}

fn type_json(set: &SchemaSet, schema: &Schema) -> TypeJson {
	TypeJson {
		name: schema.name.to_string(),
		pointer: schema.is_pointer,
		fields: schema
			.fields
			.iter()
			.map(|field| FieldJson {
				name: field.name.to_string(),
				kind: field.kind.as_str().to_owned(),
				array_depth: field.array_depth,
				nested: nested_name(set, field),
				engine_struct: field.is_engine_struct,
			})
			.collect(),
	}
}

#[derive(serde::Serialize)]
struct SchemaJson {
	path: String,
	types: Vec<TypeJson>,
}

#[derive(serde::Serialize)]
struct TypeJson {
	name: String,
	pointer: bool,
	fields: Vec<FieldJson>,
}

#[derive(serde::Serialize)]
struct FieldJson {
	name: String,
	kind: String,
	array_depth: u8,
	#[serde(skip_serializing_if = "Option::is_none")]
	nested: Option<String>,
	engine_struct: bool,
}

#[cfg(test)]
mod tests {
	use crate::cmd::test_support::{fixture_arg, run_scriptdoc_error, run_scriptdoc_json};

	#[test]
	fn schema_json_lists_every_type() {
		let schema = fixture_arg("inventory.schema.json");
		let json = run_scriptdoc_json(&["schema", &schema, "--json"]);

		let types = json["types"].as_array().expect("types array");
		assert_eq!(types.len(), 5);
		assert_eq!(types[0]["name"], "Inventory");
		assert_eq!(types[0]["fields"][2]["nested"], "Item");
		assert_eq!(types[0]["fields"][5]["engine_struct"], true);
		assert_eq!(types[3]["pointer"], true);
	}

	#[test]
	fn schema_type_filter_selects_one_type() {
		let schema = fixture_arg("inventory.schema.json");
		let json = run_scriptdoc_json(&["schema", &schema, "--type", "Item", "--json"]);
		let types = json["types"].as_array().expect("types array");
		assert_eq!(types.len(), 1);
		assert_eq!(types[0]["fields"][0]["kind"], "uint16");

		let stderr = run_scriptdoc_error(&["schema", &schema, "--type", "Ghost"]);
		assert!(stderr.contains("schema not found: Ghost"));
	}
}
