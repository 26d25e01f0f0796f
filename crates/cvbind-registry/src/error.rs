//! Registration errors.

use thiserror::Error;

/// Errors raised while installing modules into the namespace tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A function with this name already exists in the namespace.
    #[error("duplicate function: '{name}' already registered in {namespace}")]
    DuplicateFunction { namespace: String, name: String },

    /// A constant with this name already exists in the namespace.
    #[error("duplicate constant: '{name}' already registered in {namespace}")]
    DuplicateConstant { namespace: String, name: String },

    /// The name cannot be used as a host identifier.
    #[error("invalid name: '{0}'")]
    InvalidName(String),
}
