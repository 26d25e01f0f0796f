//! Overload candidate sets and resolution.
//!
//! ## Algorithm
//!
//! 1. Clear the thread's error log and reserve one line per candidate
//! 2. For each candidate, in declaration order:
//!    - reject it if the positional count is outside its arity or a keyword
//!      does not name one of its optional inputs
//!    - otherwise invoke its binding, which decodes every input and then
//!      calls native code
//!    - an argument error logs one line and moves on; success returns the
//!      encoded result; a native error is returned as is
//! 3. If no candidate bound, drain the log into one
//!    [`NativeError::OverloadResolution`]
//!
//! There is no ranking: the first candidate whose arguments all decode wins.
//!
//! A binding may itself dispatch through another set. The log is set aside
//! while a binding runs and put back afterwards, so nested calls never
//! clobber the lines of the call that invoked them.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use cvbind_core::{KwArgs, NativeError, Value};

use crate::context::{CallContext, CallError};
use crate::error_log;
use crate::signature::Signature;

type Binding = dyn Fn(&mut CallContext<'_>) -> Result<Value, CallError> + Send + Sync;

/// One candidate: a signature plus the binding that decodes, calls and
/// encodes.
#[derive(Clone)]
pub struct Overload {
    signature: Signature,
    binding: Arc<Binding>,
}

impl Overload {
    pub fn new<F>(signature: Signature, binding: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self {
            signature,
            binding: Arc::new(binding),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Reason this candidate cannot take the given argument shape, if any.
    fn shape_mismatch(&self, positional: usize, kwargs: &KwArgs) -> Option<String> {
        let arity = self.signature.arity();
        if !arity.contains(&positional) {
            let expected = if arity.start() == arity.end() {
                arity.start().to_string()
            } else {
                format!("{} to {}", arity.start(), arity.end())
            };
            return Some(format!(
                "expected {expected} positional arguments, got {positional}"
            ));
        }
        kwargs.names().find_map(|name| match self.signature.input(name) {
            Some(param) if param.optional => None,
            _ => Some(format!(
                "keyword argument '{name}' does not name an optional parameter"
            )),
        })
    }
}

impl fmt::Debug for Overload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overload")
            .field("signature", &self.signature.to_string())
            .finish_non_exhaustive()
    }
}

/// All candidates sharing one host-visible name.
#[derive(Debug, Clone)]
pub struct OverloadSet {
    name: String,
    overloads: Vec<Overload>,
}

impl OverloadSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overloads: Vec::new(),
        }
    }

    /// Add a candidate after the existing ones.
    pub fn overload<F>(mut self, signature: Signature, binding: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        self.push(Overload::new(signature, binding));
        self
    }

    pub fn push(&mut self, overload: Overload) {
        self.overloads.push(overload);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn overloads(&self) -> &[Overload] {
        &self.overloads
    }

    pub fn len(&self) -> usize {
        self.overloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overloads.is_empty()
    }

    /// Resolve and invoke the first candidate that accepts the arguments.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call(&self, args: &[Value], kwargs: &KwArgs) -> Result<Value, NativeError> {
        error_log::clear_and_reserve(self.overloads.len());

        for overload in &self.overloads {
            let reason = match overload.shape_mismatch(args.len(), kwargs) {
                Some(reason) => reason,
                None => {
                    let mut ctx = CallContext::new(&overload.signature, args, kwargs);
                    let lines = error_log::take();
                    let outcome = (overload.binding)(&mut ctx);
                    error_log::restore(lines);
                    match outcome {
                        Ok(value) => return Ok(value),
                        Err(CallError::Native(err)) => return Err(err),
                        Err(CallError::Arg(err)) => err.to_string(),
                    }
                }
            };
            debug!(candidate = %overload.signature, %reason, "overload candidate rejected");
            error_log::record(format!("{}: {reason}", overload.signature));
        }

        Err(NativeError::OverloadResolution {
            function: self.name.clone(),
            attempts: error_log::take(),
        })
    }
}
