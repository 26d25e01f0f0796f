//! cvbind dispatch
//!
//! Overload resolution for native functions exposed to the scripting host.
//!
//! - [`error_log`]: Per-thread log of rejected candidates
//! - [`signature`]: Parameter lists and arity
//! - [`context`]: Argument binding for one candidate
//! - [`overload`]: Candidate sets and the resolution loop
//! - [`outputs`]: Multi-output result packing

pub mod context;
pub mod error_log;
pub mod outputs;
pub mod overload;
pub mod signature;

pub use context::{ArgError, CallContext, CallError};
pub use outputs::Outputs;
pub use overload::{Overload, OverloadSet};
pub use signature::{Param, ParamFlags, Signature};
