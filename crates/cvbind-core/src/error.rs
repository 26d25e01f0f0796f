//! Error types for value conversion and native calls.
//!
//! ```text
//! ConversionError   - one decode attempt did not match the target type
//! NativeError       - user-visible failure of a call into native code
//! ```
//!
//! A `ConversionError` is never surfaced on its own: the dispatcher folds it
//! into the overload-resolution diagnostic carried by
//! [`NativeError::OverloadResolution`].

use thiserror::Error;

use crate::num_array::DType;

/// Errors that can occur when converting between host values and native types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The value's dynamic tag does not match the target type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Integer value does not fit the target integer type.
    #[error("integer overflow: value {value} does not fit in {target_type}")]
    IntegerOverflow { value: i64, target_type: &'static str },

    /// Float value cannot be represented by the target float type.
    #[error("float conversion error: value {value} cannot be represented as {target_type}")]
    FloatConversion {
        value: f64,
        target_type: &'static str,
    },

    /// A fixed-size type received a sequence of the wrong length.
    #[error("{target_type} requires a sequence of length {expected}, got {actual}")]
    WrongLength {
        target_type: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A bounded sequence type received too many elements.
    #[error("{target_type} accepts at most {max} elements, got {actual}")]
    TooLong {
        target_type: &'static str,
        max: usize,
        actual: usize,
    },

    /// An element of a sequence failed to convert.
    #[error("sequence item with index {index} has a wrong type ({source})")]
    Element {
        index: usize,
        source: Box<ConversionError>,
    },

    /// The numeric array's element type has no native depth.
    #[error("array data type {dtype} is not supported")]
    UnsupportedDType { dtype: DType },

    /// 64-bit integer arrays would need a copy-and-downcast to int32.
    #[error("array data type {dtype} requires a cast to int32, which is not supported")]
    NeedsCast { dtype: DType },

    /// The array has more dimensions than the native matrix supports.
    #[error("array dimensionality ({ndim}) is too high (max {max})")]
    TooManyDimensions { ndim: usize, max: usize },

    /// The array layout cannot be aliased without a copy.
    #[error("array is not contiguous in its last axis or has transposed/flipped strides")]
    NonContiguous,

    /// The array view has no stride description (index-gathered view).
    #[error("array view is not strided")]
    NotStrided,

    /// Typed element access used the wrong element type.
    #[error("element type mismatch: array holds {actual}, requested {expected}")]
    DTypeMismatch { expected: DType, actual: DType },

    /// Element index outside the array or matrix bounds.
    #[error("index {index:?} is out of bounds for shape {shape:?}")]
    IndexOutOfBounds { index: Vec<usize>, shape: Vec<usize> },

    /// A wrapped host object has a different class than expected.
    #[error("expected object of class {expected}, got {actual}")]
    ObjectClass {
        expected: &'static str,
        actual: String,
    },

    /// Generic conversion failure
    #[error("conversion failed: {message}")]
    Failed { message: String },
}

impl ConversionError {
    /// Wrap an element failure with its position in the enclosing sequence.
    pub fn at_index(self, index: usize) -> Self {
        ConversionError::Element {
            index,
            source: Box::new(self),
        }
    }
}

/// Errors surfaced to the host from a native call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// Every overload candidate failed to bind its arguments.
    #[error("{}", render_overload_failure(.function, .attempts))]
    OverloadResolution {
        function: String,
        attempts: Vec<String>,
    },

    /// The native library reported an error.
    #[error("{function}: native error ({code}): {message}")]
    Native {
        function: String,
        code: i32,
        message: String,
    },

    /// Generic native error
    #[error("native error: {message}")]
    Other { message: String },
}

impl NativeError {
    /// Error code the native library uses for bad arguments.
    pub const BAD_ARG: i32 = -5;
    /// Error code the native library uses for internal failures.
    pub const INTERNAL: i32 = -3;
    /// Error code the native library uses for allocation failures.
    pub const NO_MEM: i32 = -4;

    /// Create a native-library error.
    pub fn native(function: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        NativeError::Native {
            function: function.into(),
            code,
            message: message.into(),
        }
    }

    /// Create a generic native error.
    pub fn other(message: impl Into<String>) -> Self {
        NativeError::Other {
            message: message.into(),
        }
    }
}

fn render_overload_failure(function: &str, attempts: &[String]) -> String {
    if attempts.is_empty() {
        return format!("{function}: Overload resolution failed, but no errors reported");
    }

    const BULLET: &str = "\n - ";
    let required = attempts.iter().map(String::len).sum::<usize>() + BULLET.len() * attempts.len();
    let mut out = String::with_capacity(function.len() + 32 + required);
    out.push_str(function);
    out.push_str(": Overload resolution failed:");
    for line in attempts {
        out.push_str(BULLET);
        out.push_str(line);
    }
    out
}
