//! Host value model.
//!
//! [`Value`] is the dynamically typed value the scripting host passes across
//! the binding boundary. Ordered sequences, numeric arrays and wrapped objects
//! are reference types on the host side; `Value` holds them by handle.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::num_array::NumArray;

/// A dynamically typed host value.
#[derive(Clone, Default)]
pub enum Value {
    /// The host's nil/absence value.
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered sequence.
    Array(Vec<Value>),
    /// Numeric array object.
    NumArray(NumArray),
    /// Wrapped native instance.
    Object(HostObject),
}

impl Value {
    /// Dynamic tag used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::NumArray(_) => "numeric array",
            Value::Object(_) => "object",
        }
    }

    /// Host class name; the wrapped class for objects.
    pub fn class_name(&self) -> &'static str {
        match self {
            Value::Object(obj) => obj.class_name(),
            other => other.type_name(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_num_array(&self) -> Option<&NumArray> {
        match self {
            Value::NumArray(array) => Some(array),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Structural for scalars and sequences; identity for numeric arrays and
    /// objects, matching host reference semantics.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::NumArray(a), Value::NumArray(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Str(v) => write!(f, "{v:?}"),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::NumArray(array) => array.fmt(f),
            Value::Object(obj) => obj.fmt(f),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<NumArray> for Value {
    fn from(array: NumArray) -> Self {
        Value::NumArray(array)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

// =============================================================================
// Wrapped objects
// =============================================================================

/// A native instance wrapped in a host object.
#[derive(Clone)]
pub struct HostObject {
    class_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl HostObject {
    pub fn new<T: Any + Send + Sync>(class_name: &'static str, value: T) -> Self {
        Self {
            class_name,
            inner: Arc::new(value),
        }
    }

    pub fn from_arc<T: Any + Send + Sync>(class_name: &'static str, value: Arc<T>) -> Self {
        Self {
            class_name,
            inner: value,
        }
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    /// Shared reference to the wrapped instance if it is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    pub fn ptr_eq(&self, other: &HostObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<{}>", self.class_name)
    }
}

// =============================================================================
// Keyword arguments
// =============================================================================

/// Insertion-ordered keyword arguments.
#[derive(Debug, Clone, Default)]
pub struct KwArgs {
    entries: Vec<(String, Value)>,
    index: FxHashMap<String, usize>,
}

impl KwArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a keyword. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(&slot) = self.index.get(&name) {
            self.entries[slot].1 = value;
        } else {
            self.index.insert(name.clone(), self.entries.len());
            self.entries.push((name, value));
        }
    }

    /// Builder form of [`KwArgs::insert`].
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&slot| &self.entries[slot].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num_array::DType;

    #[test]
    fn type_names() {
        assert_eq!(Value::Nil.type_name(), "nil");
        assert_eq!(Value::Int(1).type_name(), "int");
        assert_eq!(Value::Array(vec![]).type_name(), "array");
        let obj = Value::Object(HostObject::new("Algorithm", 5u32));
        assert_eq!(obj.type_name(), "object");
        assert_eq!(obj.class_name(), "Algorithm");
    }

    #[test]
    fn numeric_arrays_compare_by_identity() {
        let a = NumArray::zeros(DType::UInt8, &[2]);
        let b = NumArray::zeros(DType::UInt8, &[2]);
        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn host_object_downcast() {
        let obj = HostObject::new("Counter", 7i64);
        assert_eq!(*obj.downcast::<i64>().unwrap(), 7);
        assert!(obj.downcast::<String>().is_none());
    }

    #[test]
    fn kwargs_keep_insertion_order() {
        let mut kw = KwArgs::new()
            .with("thickness", Value::Int(2))
            .with("color", Value::Nil);
        kw.insert("thickness", Value::Int(3));
        assert_eq!(kw.names().collect::<Vec<_>>(), vec!["thickness", "color"]);
        assert_eq!(kw.get("thickness"), Some(&Value::Int(3)));
        assert!(!kw.contains("shift"));
    }
}
