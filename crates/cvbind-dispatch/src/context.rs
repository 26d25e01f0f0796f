//! Argument binding for one overload candidate.

use thiserror::Error;

use cvbind_core::{ConversionError, FromValue, KwArgs, NativeError, Value};

use crate::signature::Signature;

/// Failure to bind one argument of a candidate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgError {
    /// The host value did not decode to the parameter's native type.
    #[error("can't parse '{name}': {source}")]
    Parse {
        name: String,
        source: ConversionError,
    },

    /// A mandatory argument was not supplied positionally.
    #[error("missing required argument '{name}'")]
    Missing { name: String },

    /// The binding asked for a parameter its signature does not declare.
    #[error("'{name}' is not an input parameter")]
    UnknownParam { name: String },
}

/// Outcome of invoking one candidate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// Arguments did not bind: try the next candidate.
    #[error(transparent)]
    Arg(#[from] ArgError),

    /// Native code failed after binding succeeded: stop resolution.
    #[error(transparent)]
    Native(#[from] NativeError),
}

/// Positional and keyword arguments as seen by one candidate.
///
/// Bindings decode every input before touching native state, so a failed
/// decode leaves nothing behind.
#[derive(Debug)]
pub struct CallContext<'a> {
    signature: &'a Signature,
    args: &'a [Value],
    kwargs: &'a KwArgs,
}

impl<'a> CallContext<'a> {
    pub fn new(signature: &'a Signature, args: &'a [Value], kwargs: &'a KwArgs) -> Self {
        Self {
            signature,
            args,
            kwargs,
        }
    }

    pub fn signature(&self) -> &Signature {
        self.signature
    }

    pub fn args(&self) -> &[Value] {
        self.args
    }

    pub fn kwargs(&self) -> &KwArgs {
        self.kwargs
    }

    fn decode<T: FromValue>(name: &str, value: &Value) -> Result<T, ArgError> {
        T::from_value(value).map_err(|source| ArgError::Parse {
            name: name.to_owned(),
            source,
        })
    }

    fn position(&self, name: &str) -> Result<usize, ArgError> {
        self.signature
            .input_position(name)
            .ok_or_else(|| ArgError::UnknownParam {
                name: name.to_owned(),
            })
    }

    /// Decode the mandatory positional argument `name`.
    pub fn arg<T: FromValue>(&self, name: &str) -> Result<T, ArgError> {
        let position = self.position(name)?;
        let value = self.args.get(position).ok_or_else(|| ArgError::Missing {
            name: name.to_owned(),
        })?;
        Self::decode(name, value)
    }

    /// Decode the optional argument `name`.
    ///
    /// A keyword of the same name wins over a positional value; with neither,
    /// `default` is used.
    pub fn arg_or<T: FromValue>(&self, name: &str, default: T) -> Result<T, ArgError> {
        let position = self.position(name)?;
        match self.kwargs.get(name).or_else(|| self.args.get(position)) {
            Some(value) => Self::decode(name, value),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Param;
    use cvbind_core::Point;

    fn signature() -> Signature {
        Signature::new(
            "bindTest1",
            [
                Param::input("a"),
                Param::in_out("b"),
                Param::output("c"),
                Param::optional("d"),
                Param::optional("e"),
            ],
        )
    }

    #[test]
    fn positional_then_keyword_then_default() {
        let sig = signature();
        let args = [
            Value::Int(1),
            Value::Array(vec![Value::Int(10), Value::Int(11)]),
            Value::Int(100),
        ];
        let kwargs = KwArgs::new().with("e", Value::Int(1000));
        let ctx = CallContext::new(&sig, &args, &kwargs);

        assert_eq!(ctx.arg::<i32>("a").unwrap(), 1);
        assert_eq!(ctx.arg::<Point>("b").unwrap(), Point::new(10, 11));
        assert_eq!(ctx.arg_or::<i32>("d", 10).unwrap(), 100);
        assert_eq!(ctx.arg_or::<f64>("e", 1.2).unwrap(), 1000.0);
    }

    #[test]
    fn keyword_overrides_positional() {
        let sig = signature();
        let args = [Value::Int(1), Value::Nil, Value::Int(5)];
        let kwargs = KwArgs::new().with("d", Value::Int(7));
        let ctx = CallContext::new(&sig, &args, &kwargs);
        assert_eq!(ctx.arg_or::<i32>("d", 10).unwrap(), 7);
        assert_eq!(ctx.arg_or::<f64>("e", 1.2).unwrap(), 1.2);
    }

    #[test]
    fn parse_error_names_argument() {
        let sig = signature();
        let args = [Value::Float(1.5)];
        let kwargs = KwArgs::new();
        let ctx = CallContext::new(&sig, &args, &kwargs);
        let err = ctx.arg::<i32>("a").unwrap_err();
        assert!(err.to_string().starts_with("can't parse 'a'"));
        assert!(matches!(ctx.arg::<Point>("b"), Err(ArgError::Missing { .. })));
        assert!(matches!(
            ctx.arg::<i32>("c"),
            Err(ArgError::UnknownParam { .. })
        ));
    }
}
