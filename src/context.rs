//! Binding context.
//!
//! A `Context` collects registration modules and, once sealed, dispatches
//! host calls to their overload sets.
//!
//! # Example
//!
//! ```ignore
//! use cvbind::prelude::*;
//!
//! let mut ctx = Context::new();
//! for module in cvbind::bind_test::modules() {
//!     ctx.install(module)?;
//! }
//! ctx.seal()?;
//!
//! let ret = ctx.call("cv", "bindTest3", &[Value::Int(1)], &KwArgs::new())?;
//! assert_eq!(ret, Value::Int(2));
//! ```

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use cvbind_core::{KwArgs, NativeError, Value};
use cvbind_registry::{Module, NamespaceTree, RegistrationError, module_path};

/// Owner of installed modules and, after sealing, their namespace tree.
#[derive(Debug, Default)]
pub struct Context {
    /// Installed modules, in installation order
    modules: Vec<Module>,
    /// Built on seal
    tree: Option<Arc<NamespaceTree>>,
}

impl Context {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Context::install`].
    pub fn with_module(mut self, module: Module) -> Result<Self, ContextError> {
        self.install(module)?;
        Ok(self)
    }

    /// Install a module.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::AlreadySealed` if the context has been sealed.
    pub fn install(&mut self, module: Module) -> Result<(), ContextError> {
        if self.is_sealed() {
            return Err(ContextError::AlreadySealed);
        }
        self.modules.push(module);
        Ok(())
    }

    /// Build the namespace tree from every installed module.
    ///
    /// Calling `seal()` again is a no-op. All registration errors are
    /// reported together.
    pub fn seal(&mut self) -> Result<(), ContextError> {
        if self.is_sealed() {
            return Ok(());
        }

        let mut tree = NamespaceTree::new();
        let mut errors = Vec::new();
        for module in &self.modules {
            match tree.install(module) {
                Ok(summary) => debug!(module = module.native_path(), ?summary, "module installed"),
                Err(err) => errors.push(err),
            }
        }
        if !errors.is_empty() {
            return Err(ContextError::RegistryBuildFailed(errors));
        }

        self.tree = Some(Arc::new(tree));
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        self.tree.is_some()
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// The namespace tree (available after sealing).
    pub fn namespace_tree(&self) -> Option<&Arc<NamespaceTree>> {
        self.tree.as_ref()
    }

    fn sealed_tree(&self) -> Result<&NamespaceTree, ContextError> {
        self.tree.as_deref().ok_or(ContextError::NotSealed)
    }

    /// Call the function `name` of the native namespace `native_path`.
    pub fn call(
        &self,
        native_path: &str,
        name: &str,
        args: &[Value],
        kwargs: &KwArgs,
    ) -> Result<Value, ContextError> {
        let path = module_path(native_path);
        let set = self
            .sealed_tree()?
            .function(path.as_slice(), name)
            .ok_or_else(|| ContextError::FunctionNotFound {
                namespace: native_path.to_string(),
                name: name.to_string(),
            })?;
        Ok(set.call(args, kwargs)?)
    }

    /// Value of the constant `name` of the native namespace `native_path`.
    pub fn constant(&self, native_path: &str, name: &str) -> Result<i64, ContextError> {
        let path = module_path(native_path);
        self.sealed_tree()?
            .constant(path.as_slice(), name)
            .ok_or_else(|| ContextError::ConstantNotFound {
                namespace: native_path.to_string(),
                name: name.to_string(),
            })
    }
}

/// Errors that can occur during context operations.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Context is already sealed - cannot install modules
    #[error("context is already sealed - cannot install modules after seal()")]
    AlreadySealed,

    /// Context is not sealed - must call seal() before calling functions
    #[error("context is not sealed - call seal() first")]
    NotSealed,

    /// Installing modules into the namespace tree failed
    #[error("failed to build namespace tree: {0:?}")]
    RegistryBuildFailed(Vec<RegistrationError>),

    #[error("function not found: '{name}' in {namespace}")]
    FunctionNotFound { namespace: String, name: String },

    #[error("constant not found: '{name}' in {namespace}")]
    ConstantNotFound { namespace: String, name: String },

    /// The call itself failed
    #[error(transparent)]
    Native(#[from] NativeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvbind_dispatch::{OverloadSet, Signature};

    fn module() -> Module {
        Module::new("cv")
            .function(OverloadSet::new("ping").overload(Signature::new("ping", []), |_| {
                Ok(Value::from("pong"))
            }))
            .constant("ANSWER", 42)
    }

    #[test]
    fn calls_require_seal() {
        let ctx = Context::new().with_module(module()).unwrap();
        assert!(matches!(
            ctx.call("cv", "ping", &[], &KwArgs::new()),
            Err(ContextError::NotSealed)
        ));
    }

    #[test]
    fn install_after_seal_fails() {
        let mut ctx = Context::new();
        ctx.seal().unwrap();
        ctx.seal().unwrap();
        assert!(matches!(
            ctx.install(module()),
            Err(ContextError::AlreadySealed)
        ));
    }

    #[test]
    fn sealed_context_dispatches() {
        let mut ctx = Context::new().with_module(module()).unwrap();
        ctx.seal().unwrap();
        let pong = ctx.call("cv", "ping", &[], &KwArgs::new()).unwrap();
        assert_eq!(pong, Value::from("pong"));
        assert_eq!(ctx.constant("cv", "ANSWER").unwrap(), 42);
        assert!(matches!(
            ctx.call("cv.aruco", "ping", &[], &KwArgs::new()),
            Err(ContextError::FunctionNotFound { .. })
        ));
    }

    #[test]
    fn seal_reports_every_registration_error() {
        let mut ctx = Context::new();
        ctx.install(module()).unwrap();
        ctx.install(module()).unwrap();
        let Err(ContextError::RegistryBuildFailed(errors)) = ctx.seal() else {
            panic!("expected registration failure");
        };
        assert_eq!(errors.len(), 1);
        assert!(!ctx.is_sealed());
    }
}
