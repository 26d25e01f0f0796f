//! Decoder and encoder traits and the per-type conversion table.
//!
//! - [`FromValue`]: decode a host [`Value`] into a native type
//! - [`IntoValue`]: encode a native value into a host [`Value`]
//!
//! Decoding never partially succeeds: fixed-size types check the sequence
//! length before reading any element, and sequences stop at the first element
//! that fails. Encoding is total.
//!
//! ## Supported Types
//!
//! - Integers: `i8`, `i16`, `i32`, `i64`, `u8`, `u16`, `u32`, `usize`
//!   (only `Int` values, range-checked)
//! - Floats: `f32`, `f64` (`Int` or `Float`)
//! - `bool`, `String`
//! - Geometry: points, sizes, rectangles, [`RotatedRect`], [`Scalar`],
//!   [`Range`], [`TermCriteria`]
//! - `Vec<T>`, `Option<T>` (nil is `None`), [`Handle<T>`]
//! - `Mat` (see the `bridge` module)

use std::any::{Any, type_name};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::ConversionError;
use crate::geometry::{Point_, Point3_, Range, Rect_, RotatedRect, Scalar, Size_, TermCriteria};
use crate::value::{HostObject, Value};

/// Decode a native value from a host value.
pub trait FromValue: Sized {
    /// Returns a `ConversionError` if `value` does not describe a `Self`.
    fn from_value(value: &Value) -> Result<Self, ConversionError>;
}

/// Encode a native value as a host value.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Nil
    }
}

fn mismatch(expected: &'static str, actual: &Value) -> ConversionError {
    ConversionError::TypeMismatch {
        expected,
        actual: actual.type_name(),
    }
}

// ============================================================================
// Primitives
// ============================================================================

macro_rules! impl_int {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self, ConversionError> {
                    match value {
                        Value::Int(v) => <$ty>::try_from(*v).map_err(|_| {
                            ConversionError::IntegerOverflow {
                                value: *v,
                                target_type: stringify!($ty),
                            }
                        }),
                        other => Err(mismatch("int", other)),
                    }
                }
            }
        )*
    };
}

/// Encoders for integer types that always fit a host integer.
macro_rules! impl_int_into {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Int(i64::from(self))
                }
            }
        )*
    };
}

impl_int!(i8, i16, i32, i64, u8, u16, u32, usize);
impl_int_into!(i8, i16, i32, i64, u8, u16, u32);

impl IntoValue for usize {
    /// Host integers are 64-bit signed. Sizes above `i64::MAX` cannot come
    /// from any real buffer and have no host representation.
    fn into_value(self) -> Value {
        match i64::try_from(self) {
            Ok(v) => Value::Int(v),
            Err(_) => unreachable!("usize value {self} exceeds the host integer range"),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            other => Err(mismatch("float", other)),
        }
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let v = f64::from_value(value)?;
        if v.is_finite() && v.abs() > f32::MAX as f64 {
            return Err(ConversionError::FloatConversion {
                value: v,
                target_type: "f32",
            });
        }
        Ok(v as f32)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(self as f64)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(v) => Ok(*v),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            other => Err(mismatch("string", other)),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Str(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Str(self.to_owned())
    }
}

// ============================================================================
// Sequences
// ============================================================================

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Nil => Ok(Vec::new()),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| T::from_value(item).map_err(|e| e.at_index(i)))
                .collect(),
            other => Err(mismatch("array", other)),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::Array(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Nil, IntoValue::into_value)
    }
}

/// Borrow `value` as a sequence of exactly `len` items.
fn fixed<'a>(
    value: &'a Value,
    target_type: &'static str,
    len: usize,
) -> Result<&'a [Value], ConversionError> {
    let items = value.as_array().ok_or_else(|| mismatch("array", value))?;
    if items.len() != len {
        return Err(ConversionError::WrongLength {
            target_type,
            expected: len,
            actual: items.len(),
        });
    }
    Ok(items)
}

fn item<T: FromValue>(items: &[Value], index: usize) -> Result<T, ConversionError> {
    T::from_value(&items[index]).map_err(|e| e.at_index(index))
}

// ============================================================================
// Geometry
// ============================================================================

impl<T: FromValue> FromValue for Point_<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let items = fixed(value, "Point", 2)?;
        Ok(Point_::new(item(items, 0)?, item(items, 1)?))
    }
}

impl<T: IntoValue> IntoValue for Point_<T> {
    fn into_value(self) -> Value {
        Value::Array(vec![self.x.into_value(), self.y.into_value()])
    }
}

impl<T: FromValue> FromValue for Point3_<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let items = fixed(value, "Point3", 3)?;
        Ok(Point3_::new(
            item(items, 0)?,
            item(items, 1)?,
            item(items, 2)?,
        ))
    }
}

impl<T: IntoValue> IntoValue for Point3_<T> {
    fn into_value(self) -> Value {
        Value::Array(vec![
            self.x.into_value(),
            self.y.into_value(),
            self.z.into_value(),
        ])
    }
}

impl<T: FromValue> FromValue for Size_<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let items = fixed(value, "Size", 2)?;
        Ok(Size_::new(item(items, 0)?, item(items, 1)?))
    }
}

impl<T: IntoValue> IntoValue for Size_<T> {
    fn into_value(self) -> Value {
        Value::Array(vec![self.width.into_value(), self.height.into_value()])
    }
}

impl<T: FromValue> FromValue for Rect_<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let items = fixed(value, "Rect", 4)?;
        Ok(Rect_::new(
            item(items, 0)?,
            item(items, 1)?,
            item(items, 2)?,
            item(items, 3)?,
        ))
    }
}

impl<T: IntoValue> IntoValue for Rect_<T> {
    fn into_value(self) -> Value {
        Value::Array(vec![
            self.x.into_value(),
            self.y.into_value(),
            self.width.into_value(),
            self.height.into_value(),
        ])
    }
}

impl FromValue for RotatedRect {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let items = fixed(value, "RotatedRect", 3)?;
        Ok(RotatedRect::new(
            item(items, 0)?,
            item(items, 1)?,
            item(items, 2)?,
        ))
    }
}

impl IntoValue for RotatedRect {
    fn into_value(self) -> Value {
        Value::Array(vec![
            self.center.into_value(),
            self.size.into_value(),
            self.angle.into_value(),
        ])
    }
}

impl FromValue for Scalar {
    /// Accepts a number or a sequence of up to four numbers.
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let items = match value {
            Value::Int(_) | Value::Float(_) => {
                return Ok(Scalar::new(f64::from_value(value)?, 0.0, 0.0, 0.0));
            }
            Value::Array(items) => items,
            other => return Err(mismatch("array", other)),
        };
        if items.len() > 4 {
            return Err(ConversionError::TooLong {
                target_type: "Scalar",
                max: 4,
                actual: items.len(),
            });
        }
        let mut scalar = Scalar::default();
        for (i, slot) in scalar.0.iter_mut().enumerate().take(items.len()) {
            *slot = item(items, i)?;
        }
        Ok(scalar)
    }
}

impl IntoValue for Scalar {
    fn into_value(self) -> Value {
        Value::Array(self.0.into_iter().map(Value::Float).collect())
    }
}

impl FromValue for Range {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let items = fixed(value, "Range", 2)?;
        Ok(Range::new(item(items, 0)?, item(items, 1)?))
    }
}

impl IntoValue for Range {
    fn into_value(self) -> Value {
        Value::Array(vec![self.start.into_value(), self.end.into_value()])
    }
}

impl FromValue for TermCriteria {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let items = fixed(value, "TermCriteria", 3)?;
        Ok(TermCriteria::new(
            item(items, 0)?,
            item(items, 1)?,
            item(items, 2)?,
        ))
    }
}

impl IntoValue for TermCriteria {
    fn into_value(self) -> Value {
        Value::Array(vec![
            self.kind.into_value(),
            self.max_count.into_value(),
            self.epsilon.into_value(),
        ])
    }
}

// ============================================================================
// Wrapped native objects
// ============================================================================

/// A native class exposed to the host as a wrapped object.
pub trait NativeClass: Any + Send + Sync {
    /// Host-visible class name.
    const CLASS_NAME: &'static str;
}

/// Shared handle to a wrapped native instance.
pub struct Handle<T: NativeClass>(pub Arc<T>);

impl<T: NativeClass> Handle<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl<T: NativeClass> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: NativeClass> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: NativeClass + fmt::Debug> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.0).finish()
    }
}

impl<T: NativeClass> FromValue for Handle<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let Value::Object(obj) = value else {
            return Err(mismatch("object", value));
        };
        obj.downcast::<T>()
            .map(Handle)
            .ok_or_else(|| ConversionError::ObjectClass {
                expected: T::CLASS_NAME,
                actual: obj.class_name().to_owned(),
            })
    }
}

impl<T: NativeClass> IntoValue for Handle<T> {
    fn into_value(self) -> Value {
        Value::Object(HostObject::from_arc(T::CLASS_NAME, self.0))
    }
}

// ============================================================================
// Unreachable fallback
// ============================================================================

/// Marker for a native type the binding has no conversion for.
///
/// Generated call sites use it where a parameter or return type is outside
/// the conversion table. Converting through it panics: reaching one is a
/// coverage bug in the generated bindings, not a runtime condition.
pub struct NoConversion<T>(pub T);

impl<T> FromValue for NoConversion<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        unreachable!(
            "no conversion from host {} to native {}",
            value.type_name(),
            type_name::<T>()
        )
    }
}

impl<T> IntoValue for NoConversion<T> {
    fn into_value(self) -> Value {
        unreachable!("no conversion from native {} to a host value", type_name::<T>())
    }
}
