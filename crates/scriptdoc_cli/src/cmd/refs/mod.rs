use crate::cmd::decode::{SourceArgs, decode_source};
use crate::cmd::util::{emit_json, pptr_label};
use crate::error::Result;

#[derive(clap::Args)]
pub struct Args {
	#[command(flatten)]
	pub source: SourceArgs,
	#[arg(long = "skip-null")]
	pub skip_null: bool,
	#[arg(long)]
	pub limit: Option<usize>,
	#[arg(long)]
	pub json: bool,
}

/// Decode one structure and list the references it holds.
pub fn run(args: Args) -> Result<()> {
	let Args {
		source,
		skip_null,
		limit,
		json,
	} = args;

	let decoded = decode_source(&source)?;
	let refs = decoded
		.instance
		.fetch_dependencies()
		.filter(|(_, reference)| !skip_null || !reference.is_null())
		.take(limit.unwrap_or(usize::MAX))
		.collect::<Vec<_>>();

	if json {
		let payload = RefsJson {
			path: source.data.display().to_string(),
			type_name: source.type_name,
			refs: refs
				.iter()
				.map(|(field, reference)| RefJson {
					field: field.clone(),
					file_id: reference.file_id,
					path_id: reference.path_id,
					null: reference.is_null(),
				})
				.collect(),
		};
		emit_json(&payload);
		return Ok(());
	}

	println!("path: {}", source.data.display());
	println!("type: {}", source.type_name);
	println!("refs: {}", refs.len());
	println!("field\tpptr");
	for (field, reference) in &refs {
		println!("{field}\t{}", pptr_label(*reference));
	}

	Ok(())
}

#[derive(serde::Serialize)]
struct RefsJson {
	path: String,
	#[serde(rename = "type")]
	type_name: String,
	refs: Vec<RefJson>,
}

#[derive(serde::Serialize)]
struct RefJson {
	field: String,
	file_id: i32,
	path_id: i64,
	null: bool,
}
