//! Packing of native results into one host value.

use cvbind_core::{IntoValue, Value};

/// Return value followed by output parameters, in declaration order.
///
/// No outputs encode to nil, one output to itself, and several to an
/// ordered sequence.
#[derive(Debug, Clone, Default)]
pub struct Outputs(Vec<Value>);

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next output.
    pub fn push(mut self, value: impl IntoValue) -> Self {
        self.0.push(value.into_value());
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoValue for Outputs {
    fn into_value(self) -> Value {
        let mut values = self.0;
        match values.len() {
            0 => Value::Nil,
            1 => values.pop().unwrap_or_default(),
            _ => Value::Array(values),
        }
    }
}
