//! # Live Object Model
//!
//! The objects a capture walks.
//!
//! Rust has no ambient reflection, so the program state that gets captured is
//! expressed through the [`Object`] trait. Every participating type opts in by
//! describing its qualified type name and its public members; the registry
//! dispatches on the concrete Rust type (`TypeId`) and falls back to walking
//! [`Object::members`] when no dedicated support claims the type.
//!
//! ## Identity
//!
//! Objects are shared as [`ObjRef`] (`Arc<dyn Object>`). Two references are
//! the same object exactly when they point at the same allocation, which is
//! what [`ObjectId::of`](crate::types::ObjectId::of) encodes. Cycles are built
//! through the interior-mutable containers ([`List`], [`Dict`], [`Set`],
//! [`Instance`]).
//!
//! ## Example
//!
//! ```rust
//! use postmortem_core::object::{self, List, ObjRef};
//!
//! let list = List::new(vec![object::int(3)]);
//! let dict = object::dict(vec![(object::string("key"), list.clone() as ObjRef)]);
//! list.push(dict); // list -> dict -> list
//! assert_eq!(list.len(), 2);
//! ```

pub mod builtins;
pub mod decimal;
pub mod frame;
pub mod module;

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::sync::Arc;

pub use builtins::{
    Bool, BuiltinFunction, Bytes, Class, Dict, Float, FrozenSet, Function, Instance, Int, List, Module, NoneType, Set,
    Str, Tuple,
};
pub use decimal::Decimal;
pub use frame::{Code, Frame};
pub use module::ModuleTable;

/// Shared handle to a live object.
pub type ObjRef = Arc<dyn Object>;

/// How the generic encoder should treat an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind
{
    /// Plain data; members are walked.
    Data,
    /// Function, method, or other callable. Recorded by type tag only.
    Callable,
    /// Module object. Recorded by type tag only unless a support claims it.
    Module,
}

/// A live object that can be captured.
pub trait Object: Any + Send + Sync
{
    /// Qualified type name, e.g. `"int"` or `"app.models.User"`.
    fn type_name(&self) -> Cow<'_, str>;

    /// Public attributes as `(name, value)` pairs.
    ///
    /// Names starting with `__` and callable values are filtered out by the
    /// generic encoder, so implementations may return everything they have.
    fn members(&self) -> Vec<(String, ObjRef)>
    {
        Vec::new()
    }

    /// Whether this object is data, a callable, or a module.
    fn kind(&self) -> ObjectKind
    {
        ObjectKind::Data
    }

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// Concrete Rust type of a live object, used as the registry key.
#[must_use]
pub fn type_key(obj: &ObjRef) -> TypeId
{
    obj.as_any().type_id()
}

/// Borrow a live object as its concrete type.
#[must_use]
pub fn downcast<T: Object>(obj: &ObjRef) -> Option<&T>
{
    obj.as_any().downcast_ref::<T>()
}

/// `true` for functions, methods and other callables.
#[must_use]
pub fn is_callable(obj: &ObjRef) -> bool
{
    obj.kind() == ObjectKind::Callable
}

/// `true` if both handles refer to the same object.
#[must_use]
pub fn same(a: &ObjRef, b: &ObjRef) -> bool
{
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// A fresh `None`.
#[must_use]
pub fn none() -> ObjRef
{
    Arc::new(NoneType)
}

#[must_use]
pub fn boolean(value: bool) -> ObjRef
{
    Arc::new(Bool(value))
}

#[must_use]
pub fn int(value: i64) -> ObjRef
{
    Arc::new(Int(value))
}

#[must_use]
pub fn float(value: f64) -> ObjRef
{
    Arc::new(Float(value))
}

pub fn string(value: impl Into<String>) -> ObjRef
{
    Arc::new(Str(value.into()))
}

pub fn bytes(value: impl Into<Vec<u8>>) -> ObjRef
{
    Arc::new(Bytes(value.into()))
}

#[must_use]
pub fn list(items: Vec<ObjRef>) -> ObjRef
{
    List::new(items)
}

#[must_use]
pub fn tuple(items: Vec<ObjRef>) -> ObjRef
{
    Arc::new(Tuple::new(items))
}

#[must_use]
pub fn dict(entries: Vec<(ObjRef, ObjRef)>) -> ObjRef
{
    Dict::new(entries)
}

#[must_use]
pub fn set(items: Vec<ObjRef>) -> ObjRef
{
    Set::new(items)
}

#[must_use]
pub fn frozenset(items: Vec<ObjRef>) -> ObjRef
{
    Arc::new(FrozenSet::new(items))
}
