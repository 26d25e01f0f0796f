//! cvbind
//!
//! Binding layer between a dynamic scripting host and a native
//! computer-vision library: value marshaling, zero-copy matrix bridging and
//! overload dispatch.
//!
//! ## Crates
//!
//! - [`cvbind_core`]: host values, native matrices, the conversion table and
//!   the buffer bridge
//! - [`cvbind_dispatch`]: overload resolution and the per-thread error log
//! - [`cvbind_registry`]: module tables and the namespace tree
//!
//! This crate adds the [`Context`] that ties them together and a set of
//! demonstration natives in [`bind_test`].

mod context;

pub use context::{Context, ContextError};

pub use cvbind_core as core;
pub use cvbind_dispatch as dispatch;
pub use cvbind_registry as registry;

// Re-export main types
pub mod prelude {
    pub use crate::context::{Context, ContextError};
    pub use cvbind_core::{
        ConversionError, DType, Depth, FromValue, Handle, HostObject, IntoValue, KwArgs, Mat,
        MatType, NativeClass, NativeError, NumArray, Point, Point2f, Rect, RotatedRect, Scalar,
        Size, Size2f, Value,
    };
    pub use cvbind_dispatch::{
        ArgError, CallContext, CallError, Outputs, OverloadSet, Param, Signature, error_log,
    };
    pub use cvbind_registry::{Module, RegistrationError};
}
