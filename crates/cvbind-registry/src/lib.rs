//! cvbind registry
//!
//! Registration glue between binding tables and the host module hierarchy.

mod error;
pub mod module;
pub mod namespace_tree;

pub use error::RegistrationError;
pub use module::{ConstantVisibility, Module, constant_visibility, module_path};
pub use namespace_tree::{InstallSummary, NamespaceData, NamespaceEdge, NamespaceTree};
