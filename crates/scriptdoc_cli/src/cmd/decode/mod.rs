use std::path::PathBuf;

use scriptdoc::serial::{Compression, ReadContext, Scalar, Schema, StructureInstance, StructureVisitor, TransferFlags};
use serde_json::{Map, Value};

use crate::cmd::schema_file;
use crate::cmd::util::{cursor_at, emit_json, load_data, parse_version, scalar_json, scalar_text};
use crate::error::{CliError, Result};

/// Inputs shared by commands that decode one structure.
#[derive(clap::Args)]
pub struct SourceArgs {
	pub schema: PathBuf,
	pub data: PathBuf,
	#[arg(long = "type")]
	pub type_name: String,
	#[arg(long)]
	pub version: String,
	#[arg(long)]
	pub offset: Option<usize>,
	#[arg(long = "max-depth")]
	pub max_depth: Option<u32>,
	#[arg(long)]
	pub lenient: bool,
}

#[derive(clap::Args)]
pub struct Args {
	#[command(flatten)]
	pub source: SourceArgs,
	#[arg(long)]
	pub json: bool,
}

/// One decoded root structure plus buffer bookkeeping.
pub(crate) struct Decoded {
	pub compression: Compression,
	pub length: usize,
	pub consumed: usize,
	pub instance: StructureInstance,
}

/// Load schema and data, then decode the requested type.
pub(crate) fn decode_source(source: &SourceArgs) -> Result<Decoded> {
	let set = schema_file::load(&source.schema)?;
	let schema = set.find(&source.type_name)?;
	let version = parse_version(&source.version)?;
	let (compression, bytes) = load_data(&source.data)?;
	tracing::debug!(compression = compression.as_str(), len = bytes.len(), "loaded data");
	let mut cursor = cursor_at(&bytes, source.offset.unwrap_or(0))?;

	let mut instance = match source.max_depth {
		Some(max_depth) => StructureInstance::with_max_depth(schema, max_depth),
		None => StructureInstance::new(schema),
	};

	if source.lenient {
		let owner = format!("{}@{}", source.data.display(), cursor.pos());
		let ctx = ReadContext::new(version).with_owner(&owner);
		if !instance.try_read(&mut cursor, &ctx) {
			return Err(CliError::LenientReadFailed {
				type_name: source.type_name.clone(),
			});
		}
	} else {
		instance.read(&mut cursor, &version, TransferFlags::NONE)?;
	}

	Ok(Decoded {
		compression,
		length: bytes.len(),
		consumed: cursor.pos(),
		instance,
	})
}

/// Decode one structure and print its fields.
pub fn run(args: Args) -> Result<()> {
	let Args { source, json } = args;
	let decoded = decode_source(&source)?;

	if json {
		let mut visitor = JsonVisitor::default();
		decoded.instance.traverse(&mut visitor);
		let payload = DecodeJson {
			path: source.data.display().to_string(),
			type_name: source.type_name,
			version: source.version,
			compression: decoded.compression.as_str().to_owned(),
			length: decoded.length,
			consumed: decoded.consumed,
			lenient: source.lenient,
			value: visitor.finish(),
		};
		emit_json(&payload);
		return Ok(());
	}

	println!("path: {}", source.data.display());
	println!("type: {}", source.type_name);
	println!("version: {}", source.version);
	println!("compression: {}", decoded.compression.as_str());
	println!("consumed: {}/{}", decoded.consumed, decoded.length);
	println!("field\tvalue");
	let mut visitor = TextVisitor::default();
	decoded.instance.traverse(&mut visitor);

	Ok(())
}

#[derive(serde::Serialize)]
struct DecodeJson {
	path: String,
	#[serde(rename = "type")]
	type_name: String,
	version: String,
	compression: String,
	length: usize,
	consumed: usize,
	lenient: bool,
	value: Value,
}

enum JsonFrame {
	Object(Map<String, Value>),
	Array(Vec<Value>),
}

/// Builds a JSON tree from traversal events.
#[derive(Default)]
pub(crate) struct JsonVisitor {
	frames: Vec<JsonFrame>,
	keys: Vec<String>,
	root: Option<Value>,
}

impl JsonVisitor {
	/// Take the finished tree; `null` if nothing was visited.
	pub(crate) fn finish(self) -> Value {
		self.root.unwrap_or(Value::Null)
	}

	fn emit(&mut self, value: Value) {
		match self.frames.last_mut() {
			Some(JsonFrame::Object(map)) => {
				let key = self.keys.pop().unwrap_or_default();
				map.insert(key, value);
			}
			Some(JsonFrame::Array(items)) => items.push(value),
			None => self.root = Some(value),
		}
	}
}

impl StructureVisitor for JsonVisitor {
	fn enter_structure(&mut self, _schema: &Schema) {
		self.frames.push(JsonFrame::Object(Map::new()));
	}

	fn exit_structure(&mut self, _schema: &Schema) {
		if let Some(JsonFrame::Object(map)) = self.frames.pop() {
			self.emit(Value::Object(map));
		}
	}

	fn enter_field(&mut self, name: &str) {
		self.keys.push(name.to_owned());
	}

	fn enter_array(&mut self, len: usize) {
		self.frames.push(JsonFrame::Array(Vec::with_capacity(len)));
	}

	fn exit_array(&mut self) {
		if let Some(JsonFrame::Array(items)) = self.frames.pop() {
			self.emit(Value::Array(items));
		}
	}

	fn scalar(&mut self, value: Scalar) {
		self.emit(scalar_json(value));
	}

	fn text(&mut self, value: &str) {
		self.emit(Value::String(value.to_owned()));
	}

	fn empty(&mut self) {
		self.emit(Value::Null);
	}
}

enum Segment {
	Field(String),
	Index(usize),
	Structure,
}

/// Prints one `path<TAB>value` line per leaf.
#[derive(Default)]
pub(crate) struct TextVisitor {
	segments: Vec<Segment>,
}

impl TextVisitor {
	fn path(&self) -> String {
		let mut out = String::new();
		for segment in &self.segments {
			match segment {
				Segment::Field(name) => {
					if !out.is_empty() {
						out.push('.');
					}
					out.push_str(name);
				}
				Segment::Index(index) => out.push_str(&format!("[{index}]")),
				Segment::Structure => {}
			}
		}
		out
	}

	fn line(&self, value: &str) {
		println!("{}\t{value}", self.path());
	}
}

impl StructureVisitor for TextVisitor {
	fn enter_structure(&mut self, _schema: &Schema) {
		self.segments.push(Segment::Structure);
	}

	fn exit_structure(&mut self, _schema: &Schema) {
		self.segments.pop();
	}

	fn enter_field(&mut self, name: &str) {
		self.segments.push(Segment::Field(name.to_owned()));
	}

	fn exit_field(&mut self, _name: &str) {
		self.segments.pop();
	}

	fn separator(&mut self) {
		if let Some(Segment::Index(index)) = self.segments.last_mut() {
			*index += 1;
		}
	}

	fn enter_array(&mut self, len: usize) {
		if len == 0 {
			self.line("[]");
		}
		self.segments.push(Segment::Index(0));
	}

	fn exit_array(&mut self) {
		self.segments.pop();
	}

	fn scalar(&mut self, value: Scalar) {
		self.line(&scalar_text(value));
	}

	fn text(&mut self, value: &str) {
		self.line(&format!("{value:?}"));
	}

	fn empty(&mut self) {
		self.line("-");
	}
}
