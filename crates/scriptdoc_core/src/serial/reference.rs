use crate::serial::{FieldValue, POINTER_FILE_ID, POINTER_PATH_ID, Result, Scalar, SerialError, StructureInstance};

/// Inter-object reference stored by pointer schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct PPtr {
	/// Index into the owning file's external reference table; `0` is the file itself.
	pub file_id: i32,
	/// Object id inside the referenced file.
	pub path_id: i64,
}

impl PPtr {
	/// Reference to nothing.
	pub const NULL: Self = Self { file_id: 0, path_id: 0 };

	/// Build a reference.
	pub const fn new(file_id: i32, path_id: i64) -> Self {
		Self { file_id, path_id }
	}

	/// Whether this is the null reference (path id `0`).
	pub fn is_null(&self) -> bool {
		self.path_id == 0
	}

	/// Read the reference held by a populated pointer-schema instance.
	pub fn from_structure(instance: &StructureInstance) -> Option<Self> {
		if !instance.schema().is_pointer {
			return None;
		}
		let file_id = instance.by_name(POINTER_FILE_ID).ok()?.as_scalar()?;
		let path_id = instance.by_name(POINTER_PATH_ID).ok()?.as_scalar()?;
		Some(Self {
			file_id: file_id.as_i128() as i32,
			path_id: path_id.as_i128() as i64,
		})
	}

	/// Write this reference into a pointer-schema instance.
	pub fn store(self, instance: &mut StructureInstance) -> Result<()> {
		if !instance.schema().is_pointer {
			return Err(SerialError::ValueShapeMismatch {
				field: instance.schema().name.to_string(),
				expected: "pointer schema",
			});
		}
		*instance.by_name_mut(POINTER_FILE_ID)? = FieldValue::Scalar(Scalar::Int32(self.file_id));
		*instance.by_name_mut(POINTER_PATH_ID)? = FieldValue::Scalar(Scalar::Int64(self.path_id));
		Ok(())
	}
}

/// Rewrites references while values are copied between instances.
pub trait ReferenceConverter {
	/// Map one reference to its replacement.
	fn convert(&mut self, reference: PPtr) -> PPtr;
}

impl<F: FnMut(PPtr) -> PPtr> ReferenceConverter for F {
	fn convert(&mut self, reference: PPtr) -> PPtr {
		self(reference)
	}
}

/// Converter that keeps every reference unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityConverter;

impl ReferenceConverter for IdentityConverter {
	fn convert(&mut self, reference: PPtr) -> PPtr {
		reference
	}
}

/// Lazy depth-first walk yielding `(field_path, reference)` pairs.
///
/// Created by [`StructureInstance::fetch_dependencies`]. Pointer instances
/// are yielded in schema order; null references are included.
pub struct Dependencies<'a> {
	pending: Vec<(String, &'a StructureInstance)>,
}

impl<'a> Dependencies<'a> {
	pub(crate) fn new(root: &'a StructureInstance) -> Self {
		Self {
			pending: vec![(String::new(), root)],
		}
	}

	fn expand(&mut self, path: &str, instance: &'a StructureInstance) {
		let fields = instance.schema().fields.iter().zip(instance.fields());
		for (field, value) in fields.rev() {
			let base = join(path, &field.name);
			match value {
				FieldValue::Struct(item) => self.pending.push((base, &**item)),
				FieldValue::StructArray(items) => {
					for (index, item) in items.iter().enumerate().rev() {
						self.pending.push((format!("{base}[{index}]"), item));
					}
				}
				FieldValue::StructArrayArray(rows) => {
					for (row_index, row) in rows.iter().enumerate().rev() {
						for (index, item) in row.iter().enumerate().rev() {
							self.pending.push((format!("{base}[{row_index}][{index}]"), item));
						}
					}
				}
				_ => {}
			}
		}
	}
}

impl Iterator for Dependencies<'_> {
	type Item = (String, PPtr);

	fn next(&mut self) -> Option<Self::Item> {
		while let Some((path, instance)) = self.pending.pop() {
			if instance.schema().is_pointer {
				if let Some(reference) = PPtr::from_structure(instance) {
					return Some((path, reference));
				}
				continue;
			}
			self.expand(&path, instance);
		}
		None
	}
}

fn join(path: &str, name: &str) -> String {
	if path.is_empty() { name.to_owned() } else { format!("{path}.{name}") }
}

#[cfg(test)]
mod tests;
