use crate::serial::{FieldSchema, FixedWidth, PrimitiveKind, StructureInstance};

/// Fixed-width Rust type backing one [`PrimitiveKind`].
pub trait Primitive: FixedWidth {
	/// Schema kind stored by this type.
	const KIND: PrimitiveKind;

	/// Wrap into a [`Scalar`].
	fn into_scalar(self) -> Scalar;

	/// Unwrap a [`Scalar`] of exactly this kind.
	fn from_scalar(scalar: Scalar) -> Option<Self>;

	/// Wrap a vector into a [`ScalarArray`].
	fn into_array(items: Vec<Self>) -> ScalarArray;
}

macro_rules! define_scalars {
	($($variant:ident => $ty:ty),* $(,)?) => {
		/// One decoded fixed-width primitive.
		#[derive(Debug, Clone, Copy, PartialEq)]
		pub enum Scalar {
			$(
				#[doc = concat!("`", stringify!($ty), "` value.")]
				$variant($ty),
			)*
		}

		/// Homogeneous run of fixed-width primitives.
		#[derive(Debug, Clone, PartialEq)]
		pub enum ScalarArray {
			$(
				#[doc = concat!("`", stringify!($ty), "` elements.")]
				$variant(Vec<$ty>),
			)*
		}

		$(
			impl Primitive for $ty {
				const KIND: PrimitiveKind = PrimitiveKind::$variant;

				fn into_scalar(self) -> Scalar {
					Scalar::$variant(self)
				}

				fn from_scalar(scalar: Scalar) -> Option<Self> {
					match scalar {
						Scalar::$variant(value) => Some(value),
						_ => None,
					}
				}

				fn into_array(items: Vec<Self>) -> ScalarArray {
					ScalarArray::$variant(items)
				}
			}
		)*

		impl Scalar {
			/// Schema kind of this value.
			pub fn kind(self) -> PrimitiveKind {
				match self {
					$(Self::$variant(_) => PrimitiveKind::$variant,)*
				}
			}
		}

		impl ScalarArray {
			/// Schema kind of the elements.
			pub fn kind(&self) -> PrimitiveKind {
				match self {
					$(Self::$variant(_) => PrimitiveKind::$variant,)*
				}
			}

			/// Number of elements.
			pub fn len(&self) -> usize {
				match self {
					$(Self::$variant(items) => items.len(),)*
				}
			}

			/// Element at `index`.
			pub fn get(&self, index: usize) -> Option<Scalar> {
				match self {
					$(Self::$variant(items) => items.get(index).copied().map(Scalar::$variant),)*
				}
			}
		}
	};
}

define_scalars! {
	Bool => bool,
	Int8 => i8,
	Int16 => i16,
	Int32 => i32,
	Int64 => i64,
	UInt8 => u8,
	UInt16 => u16,
	UInt32 => u32,
	UInt64 => u64,
	Float => f32,
	Double => f64,
}

/// Run `$body` with `$t` bound to the Rust type of a fixed-width kind.
macro_rules! with_primitive {
	($kind:expr, $t:ident => $body:expr, _ => $fallback:expr) => {
		match $kind {
			$crate::serial::PrimitiveKind::Bool => {
				type $t = bool;
				$body
			}
			$crate::serial::PrimitiveKind::Int8 => {
				type $t = i8;
				$body
			}
			$crate::serial::PrimitiveKind::Int16 => {
				type $t = i16;
				$body
			}
			$crate::serial::PrimitiveKind::Int32 => {
				type $t = i32;
				$body
			}
			$crate::serial::PrimitiveKind::Int64 => {
				type $t = i64;
				$body
			}
			$crate::serial::PrimitiveKind::UInt8 => {
				type $t = u8;
				$body
			}
			$crate::serial::PrimitiveKind::UInt16 => {
				type $t = u16;
				$body
			}
			$crate::serial::PrimitiveKind::UInt32 => {
				type $t = u32;
				$body
			}
			$crate::serial::PrimitiveKind::UInt64 => {
				type $t = u64;
				$body
			}
			$crate::serial::PrimitiveKind::Float => {
				type $t = f32;
				$body
			}
			$crate::serial::PrimitiveKind::Double => {
				type $t = f64;
				$body
			}
			_ => $fallback,
		}
	};
}
pub(crate) use with_primitive;

/// Run `$body` with `$items` bound to the element vector of a [`ScalarArray`].
macro_rules! with_array {
	($array:expr, $items:ident => $body:expr) => {
		match $array {
			$crate::serial::ScalarArray::Bool($items) => $body,
			$crate::serial::ScalarArray::Int8($items) => $body,
			$crate::serial::ScalarArray::Int16($items) => $body,
			$crate::serial::ScalarArray::Int32($items) => $body,
			$crate::serial::ScalarArray::Int64($items) => $body,
			$crate::serial::ScalarArray::UInt8($items) => $body,
			$crate::serial::ScalarArray::UInt16($items) => $body,
			$crate::serial::ScalarArray::UInt32($items) => $body,
			$crate::serial::ScalarArray::UInt64($items) => $body,
			$crate::serial::ScalarArray::Float($items) => $body,
			$crate::serial::ScalarArray::Double($items) => $body,
		}
	};
}
pub(crate) use with_array;

impl Scalar {
	/// Zero value of a fixed-width kind.
	pub fn zero(kind: PrimitiveKind) -> Option<Self> {
		with_primitive!(kind, T => Some(T::default().into_scalar()), _ => None)
	}

	/// Integer view; floats truncate toward zero and saturate.
	pub fn as_i128(self) -> i128 {
		match self {
			Self::Bool(value) => i128::from(value),
			Self::Int8(value) => i128::from(value),
			Self::Int16(value) => i128::from(value),
			Self::Int32(value) => i128::from(value),
			Self::Int64(value) => i128::from(value),
			Self::UInt8(value) => i128::from(value),
			Self::UInt16(value) => i128::from(value),
			Self::UInt32(value) => i128::from(value),
			Self::UInt64(value) => i128::from(value),
			Self::Float(value) => value as i128,
			Self::Double(value) => value as i128,
		}
	}

	/// Floating-point view.
	pub fn as_f64(self) -> f64 {
		match self {
			Self::Float(value) => f64::from(value),
			Self::Double(value) => value,
			other => other.as_i128() as f64,
		}
	}

	/// Convert to another fixed-width kind with unchecked numeric cast rules.
	pub fn cast(self, kind: PrimitiveKind) -> Option<Self> {
		if self.kind() == kind {
			return Some(self);
		}

		let int = self.as_i128();
		Some(match kind {
			PrimitiveKind::Bool => Self::Bool(self.as_f64() != 0.0),
			PrimitiveKind::Int8 => Self::Int8(int as i8),
			PrimitiveKind::Int16 => Self::Int16(int as i16),
			PrimitiveKind::Int32 => Self::Int32(int as i32),
			PrimitiveKind::Int64 => Self::Int64(int as i64),
			PrimitiveKind::UInt8 => Self::UInt8(int as u8),
			PrimitiveKind::UInt16 => Self::UInt16(int as u16),
			PrimitiveKind::UInt32 => Self::UInt32(int as u32),
			PrimitiveKind::UInt64 => Self::UInt64(int as u64),
			PrimitiveKind::Float => Self::Float(self.as_f64() as f32),
			PrimitiveKind::Double => Self::Double(self.as_f64()),
			PrimitiveKind::String | PrimitiveKind::Complex => return None,
		})
	}
}

impl ScalarArray {
	/// Empty array of a fixed-width kind.
	pub fn empty(kind: PrimitiveKind) -> Option<Self> {
		with_primitive!(kind, T => Some(T::into_array(Vec::new())), _ => None)
	}

	/// Whether the array has no elements.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Iterate elements as scalars.
	pub fn iter(&self) -> impl Iterator<Item = Scalar> + '_ {
		(0..self.len()).filter_map(move |index| self.get(index))
	}

	/// Element-wise cast to another fixed-width kind.
	pub fn cast(&self, kind: PrimitiveKind) -> Option<Self> {
		if self.kind() == kind {
			return Some(self.clone());
		}
		with_primitive!(
			kind,
			T => self
				.iter()
				.map(|item| item.cast(kind).and_then(T::from_scalar))
				.collect::<Option<Vec<T>>>()
				.map(T::into_array),
			_ => None
		)
	}
}

/// Slot content of one structure field.
///
/// `Empty` means "not populated" and is distinct from a zero or empty payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
	/// Not populated.
	#[default]
	Empty,
	/// Fixed-width scalar.
	Scalar(Scalar),
	/// Array of fixed-width values.
	Array(ScalarArray),
	/// Array of arrays of fixed-width values.
	ArrayArray(Vec<ScalarArray>),
	/// Text value.
	Text(String),
	/// Array of text values.
	TextArray(Vec<String>),
	/// Array of arrays of text values.
	TextArrayArray(Vec<Vec<String>>),
	/// Owned nested structure.
	Struct(Box<StructureInstance>),
	/// Array of nested structures.
	StructArray(Vec<StructureInstance>),
	/// Array of arrays of nested structures.
	StructArrayArray(Vec<Vec<StructureInstance>>),
}

impl FieldValue {
	/// Whether the slot is unpopulated.
	pub fn is_empty(&self) -> bool {
		matches!(self, Self::Empty)
	}

	/// Scalar payload, if any.
	pub fn as_scalar(&self) -> Option<Scalar> {
		match self {
			Self::Scalar(value) => Some(*value),
			_ => None,
		}
	}

	/// Text payload, if any.
	pub fn as_text(&self) -> Option<&str> {
		match self {
			Self::Text(value) => Some(value),
			_ => None,
		}
	}

	/// Nested structure, if any.
	pub fn as_struct(&self) -> Option<&StructureInstance> {
		match self {
			Self::Struct(value) => Some(value),
			_ => None,
		}
	}

	/// Mutable nested structure, if any.
	pub fn as_struct_mut(&mut self) -> Option<&mut StructureInstance> {
		match self {
			Self::Struct(value) => Some(value),
			_ => None,
		}
	}

	/// Re-shape a primitive or text value for `field`, casting numeric kinds.
	///
	/// Structure-bearing values and incompatible shapes return `None`.
	pub fn cast_to(&self, field: &FieldSchema) -> Option<Self> {
		match (self, field.kind, field.array_depth) {
			(Self::Text(_), PrimitiveKind::String, 0) | (Self::TextArray(_), PrimitiveKind::String, 1) | (Self::TextArrayArray(_), PrimitiveKind::String, 2) => {
				Some(self.clone())
			}
			(Self::Scalar(value), kind, 0) => value.cast(kind).map(Self::Scalar),
			(Self::Array(items), kind, 1) => items.cast(kind).map(Self::Array),
			(Self::ArrayArray(rows), kind, 2) => rows.iter().map(|row| row.cast(kind)).collect::<Option<Vec<_>>>().map(Self::ArrayArray),
			_ => None,
		}
	}
}
