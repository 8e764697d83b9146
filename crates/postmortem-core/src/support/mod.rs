//! # Type Supports
//!
//! Pluggable encoders and decoders, one per runtime type.
//!
//! A [`TypeSupport`] turns live objects of one type into [`EncodedRecord`]s
//! and records carrying its wire name back into [`Value`]s. The
//! [`TypeRegistry`] dispatches to supports and falls back to the generic
//! strategy when none applies or a support declines.
//!
//! ## Decoding Protocol
//!
//! Decoders see a [`PartialGraph`] of the ids resolved so far and answer with
//! a [`Loaded`]:
//!
//! - [`Loaded::Ready`]: the value is complete.
//! - [`Loaded::Partial`]: the value exists and may be shared right away, but
//!   some children are still missing. [`TypeSupport::reload`] is called again
//!   once more ids resolve.
//! - [`Loaded::NotReady`]: the value cannot exist until the listed ids
//!   resolve (immutable containers).

pub mod builtins;
pub mod generic;
pub mod registry;
pub mod stdlib;

use std::any::TypeId;
use std::collections::HashSet;

use smallvec::SmallVec;
use thiserror::Error;

use crate::object::ObjRef;
use crate::types::{EncodedRecord, ObjectId};
use crate::value::Value;

pub use builtins::{
    BoolSupport, BuiltinFunctionSupport, BytesSupport, DictSupport, FloatSupport, FrozenSetSupport, IntSupport,
    ListSupport, ModuleSupport, NoneSupport, SetSupport, StrSupport, TupleSupport, TypeObjectSupport,
};
pub use registry::TypeRegistry;
pub use stdlib::DecimalSupport;

/// Ids a decoder is still waiting on.
pub type Pending = SmallVec<[ObjectId; 4]>;

/// Zero-argument check yielding the concrete type once it can exist.
pub type LazyCheck = Box<dyn Fn() -> Option<TypeId> + Send + Sync>;

/// A support declining one particular object or record.
///
/// Never escapes the registry: it always falls back to the generic strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("type support not implemented for this instance")]
pub struct NotImplemented;

/// Which live objects a support encodes.
pub enum TypeMatch
{
    /// Exactly this Rust type.
    Exact(TypeId),
    /// A type that may not be available yet. The check is re-run by
    /// [`TypeRegistry::resolve_pending`] until it yields a type.
    Lazy(LazyCheck),
}

impl TypeMatch
{
    #[must_use]
    pub fn of<T: 'static>() -> Self
    {
        Self::Exact(TypeId::of::<T>())
    }
}

/// Output of an encoder: the record plus every object it references.
pub struct Dumped
{
    pub record: EncodedRecord,
    pub children: Vec<ObjRef>,
}

impl Dumped
{
    #[must_use]
    pub fn new(record: EncodedRecord, children: Vec<ObjRef>) -> Self
    {
        Self { record, children }
    }

    /// Record with no children.
    #[must_use]
    pub fn leaf(record: EncodedRecord) -> Self
    {
        Self::new(record, Vec::new())
    }
}

/// Output of a decoder.
#[derive(Debug)]
pub enum Loaded
{
    Ready(Value),
    Partial
    {
        value: Value,
        pending: Pending,
    },
    NotReady
    {
        pending: Pending,
    },
}

impl Loaded
{
    /// `Ready` when nothing is pending, `Partial` otherwise.
    #[must_use]
    pub fn partial(value: Value, pending: Pending) -> Self
    {
        if pending.is_empty() {
            Self::Ready(value)
        } else {
            Self::Partial { value, pending }
        }
    }
}

/// The ids resolved so far during reconstruction.
#[derive(Clone, Copy)]
pub struct PartialGraph<'a>
{
    resolved: &'a HashSet<ObjectId>,
}

impl<'a> PartialGraph<'a>
{
    #[must_use]
    pub fn new(resolved: &'a HashSet<ObjectId>) -> Self
    {
        Self { resolved }
    }

    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool
    {
        self.resolved.contains(id)
    }

    /// The subset of `ids` not resolved yet, in order.
    pub fn missing<'b>(&self, ids: impl IntoIterator<Item = &'b ObjectId>) -> Pending
    {
        ids.into_iter().filter(|id| !self.contains(id)).cloned().collect()
    }
}

/// Encoder/decoder pair for one runtime type.
///
/// Implementations return `Err(NotImplemented)` to decline an object or
/// record they cannot handle; the registry then uses the generic strategy.
pub trait TypeSupport: Send + Sync
{
    /// Type tag written into records and used to pick the decoder.
    fn wire_name(&self) -> &str;

    fn matcher(&self) -> TypeMatch;

    /// Encode `obj`, which is of the matched type.
    fn dump(&self, obj: &ObjRef) -> Result<Dumped, NotImplemented>;

    /// Decode a record carrying this support's wire name.
    fn load(&self, record: &EncodedRecord, graph: &PartialGraph<'_>) -> Result<Loaded, NotImplemented>;

    /// Continue filling a value previously returned as [`Loaded::Partial`],
    /// returning what is still missing.
    fn reload(
        &self,
        _value: &mut Value,
        _record: &EncodedRecord,
        _graph: &PartialGraph<'_>,
    ) -> Result<Pending, NotImplemented>
    {
        Ok(Pending::new())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_missing_keeps_order()
    {
        let resolved: HashSet<ObjectId> = ["2"].into_iter().map(ObjectId::from).collect();
        let graph = PartialGraph::new(&resolved);
        let ids: Vec<ObjectId> = ["3", "2", "1"].into_iter().map(ObjectId::from).collect();
        let missing = graph.missing(&ids);
        assert_eq!(missing.as_slice(), [ObjectId::from("3"), ObjectId::from("1")]);
    }

    #[test]
    fn test_partial_without_pending_is_ready()
    {
        assert!(matches!(Loaded::partial(Value::None, Pending::new()), Loaded::Ready(Value::None)));
    }
}
