//! cvbind core
//!
//! Value marshaling between a dynamic scripting host and a native
//! computer-vision library.
//!
//! ## Modules
//!
//! - [`value`]: Host values (`Value`, wrapped objects, keyword arguments)
//! - [`num_array`]: Host numeric array objects and their views
//! - [`mat`]: Native reference-counted matrix and allocator hook
//! - [`geometry`]: Fixed-size native value types
//! - [`convert`]: Decoder/encoder traits and the per-type conversion table
//! - [`bridge`]: Zero-copy aliasing of host arrays as native matrices
//! - [`error`]: Conversion and native-call errors

mod buffer;

pub mod bridge;
pub mod convert;
pub mod error;
pub mod geometry;
pub mod mat;
pub mod num_array;
pub mod value;

pub use bridge::{
    BridgeStats, HostArrayAllocator, array_from_mat, host_allocator, mat_from_array,
    mat_from_array_with,
};
pub use convert::{FromValue, Handle, IntoValue, NativeClass, NoConversion};
pub use error::{ConversionError, NativeError};
pub use geometry::{
    Point, Point_, Point2d, Point2f, Point3_, Point3f, Point3i, Range, Rect, Rect_, Rect2d,
    RotatedRect, Scalar, Size, Size_, Size2f, TermCriteria,
};
pub use mat::{
    Allocation, CN_MAX, Depth, MAX_DIM, Mat, MatAllocator, MatData, MatElement, MatType,
    StdMatAllocator, std_allocator,
};
pub use num_array::{DType, Element, NumArray};
pub use value::{HostObject, KwArgs, Value};
