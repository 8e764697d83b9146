//! # Reconstructed Values
//!
//! What a snapshot turns back into.
//!
//! Built-in containers reference their children by [`ObjectId`] into the
//! owning [`ProxyGraph`] rather than owning them, so cyclic structures decode
//! into an arena without reference cycles. Two parents that pointed at the same
//! original object resolve to the same `Arc<Value>`.

pub mod graph;
pub mod proxy;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::types::ObjectId;

pub use graph::{FrameView, GraphLink, ProxyGraph};
pub use proxy::Proxy;

/// Shared `Unknown` value handed out for ids the graph does not contain.
pub static UNKNOWN: Lazy<Arc<Value>> = Lazy::new(|| Arc::new(Value::Unknown));

/// A third-party type a support rebuilt in full instead of proxying.
pub trait NativeValue: Any + Send + Sync
{
    /// Wire type name, e.g. `"decimal.Decimal"`.
    fn type_name(&self) -> &str;

    /// Display form, e.g. `Decimal('3.14')`.
    fn repr(&self) -> String;

    fn as_any(&self) -> &dyn Any;
}

/// One reconstructed object.
pub enum Value
{
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<ObjectId>),
    Tuple(Vec<ObjectId>),
    /// Insertion-ordered `key -> value` pairs.
    Dict(Vec<(ObjectId, ObjectId)>),
    Set(Vec<ObjectId>),
    FrozenSet(Vec<ObjectId>),
    /// Module, by name.
    Module(String),
    /// Runtime builtin function, by name.
    BuiltinFunction(String),
    /// Runtime builtin type, by name.
    Type(String),
    Native(Arc<dyn NativeValue>),
    Proxy(Proxy),
    /// Referenced but never captured.
    Unknown,
}

impl Value
{
    /// Type name as the captured program would report it.
    #[must_use]
    pub fn type_name(&self) -> &str
    {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::Set(_) => "set",
            Self::FrozenSet(_) => "frozenset",
            Self::Module(_) => "module",
            Self::BuiltinFunction(_) => "builtin_function_or_method",
            Self::Type(_) => "type",
            Self::Native(native) => native.type_name(),
            Self::Proxy(proxy) => proxy.type_tag(),
            Self::Unknown => "Unknown",
        }
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool
    {
        matches!(self, Self::Unknown)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64>
    {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str>
    {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_proxy(&self) -> Option<&Proxy>
    {
        match self {
            Self::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// Borrow a rebuilt native value as its concrete type.
    #[must_use]
    pub fn downcast_native<T: NativeValue>(&self) -> Option<&T>
    {
        match self {
            Self::Native(native) => native.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Child ids in the order they appear.
    #[must_use]
    pub fn child_ids(&self) -> Vec<ObjectId>
    {
        match self {
            Self::List(ids) | Self::Tuple(ids) | Self::Set(ids) | Self::FrozenSet(ids) => ids.clone(),
            Self::Dict(pairs) => pairs.iter().flat_map(|(key, value)| [key.clone(), value.clone()]).collect(),
            Self::Proxy(proxy) => proxy.attr_ids().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for Value
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Self::Int(value) => f.debug_tuple("Int").field(value).finish(),
            Self::Float(value) => f.debug_tuple("Float").field(value).finish(),
            Self::Str(value) => f.debug_tuple("Str").field(value).finish(),
            Self::Bytes(value) => f.debug_tuple("Bytes").field(value).finish(),
            Self::List(ids) => f.debug_tuple("List").field(ids).finish(),
            Self::Tuple(ids) => f.debug_tuple("Tuple").field(ids).finish(),
            Self::Dict(pairs) => f.debug_tuple("Dict").field(pairs).finish(),
            Self::Set(ids) => f.debug_tuple("Set").field(ids).finish(),
            Self::FrozenSet(ids) => f.debug_tuple("FrozenSet").field(ids).finish(),
            Self::Module(name) => f.debug_tuple("Module").field(name).finish(),
            Self::BuiltinFunction(name) => f.debug_tuple("BuiltinFunction").field(name).finish(),
            Self::Type(name) => f.debug_tuple("Type").field(name).finish(),
            Self::Native(native) => f.debug_tuple("Native").field(&native.repr()).finish(),
            Self::Proxy(proxy) => fmt::Debug::fmt(proxy, f),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}

impl PartialEq for Value
{
    fn eq(&self, other: &Self) -> bool
    {
        match (self, other) {
            (Self::None, Self::None) | (Self::Unknown, Self::Unknown) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b))
            | (Self::Tuple(a), Self::Tuple(b))
            | (Self::Set(a), Self::Set(b))
            | (Self::FrozenSet(a), Self::FrozenSet(b)) => a == b,
            (Self::Dict(a), Self::Dict(b)) => a == b,
            (Self::Module(a), Self::Module(b))
            | (Self::BuiltinFunction(a), Self::BuiltinFunction(b))
            | (Self::Type(a), Self::Type(b)) => a == b,
            (Self::Native(a), Self::Native(b)) => a.type_name() == b.type_name() && a.repr() == b.repr(),
            (Self::Proxy(a), Self::Proxy(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_unknown_is_shared()
    {
        assert!(Arc::ptr_eq(&UNKNOWN, &UNKNOWN.clone()));
        assert!(UNKNOWN.is_unknown());
        assert_eq!(UNKNOWN.type_name(), "Unknown");
    }

    #[test]
    fn test_dict_child_ids_interleave_keys_and_values()
    {
        let value = Value::Dict(vec![
            (ObjectId::from("1"), ObjectId::from("2")),
            (ObjectId::from("3"), ObjectId::from("4")),
        ]);
        let ids: Vec<String> = value.child_ids().iter().map(|id| id.as_str().to_string()).collect();
        assert_eq!(ids, ["1", "2", "3", "4"]);
    }
}
