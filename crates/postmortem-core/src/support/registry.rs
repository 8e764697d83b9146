//! Type-support registry.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::object::{type_key, ModuleTable, ObjRef};
use crate::redaction::RedactionPolicy;
use crate::types::EncodedRecord;
use crate::value::Value;

use super::builtins::{
    BoolSupport, BuiltinFunctionSupport, BytesSupport, DictSupport, FloatSupport, FrozenSetSupport, IntSupport,
    ListSupport, ModuleSupport, NoneSupport, SetSupport, StrSupport, TupleSupport, TypeObjectSupport,
};
use super::stdlib::DecimalSupport;
use super::{generic, Dumped, LazyCheck, Loaded, PartialGraph, Pending, TypeMatch, TypeSupport};

#[derive(Default)]
struct RegistryInner
{
    encoders: HashMap<TypeId, Arc<dyn TypeSupport>>,
    decoders: HashMap<String, Arc<dyn TypeSupport>>,
    pending: Vec<(LazyCheck, Arc<dyn TypeSupport>)>,
}

/// Dispatch table from runtime types to encoders and wire names to decoders
///
/// One registry is built at startup and shared as `Arc<TypeRegistry>` by
/// every container that captures or reconstructs with it. The table sits
/// behind a lock that is never held while a support runs.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use postmortem_core::object;
/// use postmortem_core::redaction::RedactionPolicy;
/// use postmortem_core::support::TypeRegistry;
///
/// let registry = TypeRegistry::with_builtins(Arc::new(RedactionPolicy::new()));
/// let dumped = registry.dump(&object::int(142_857));
/// assert_eq!(dumped.record.type_tag, "int");
/// ```
pub struct TypeRegistry
{
    inner: RwLock<RegistryInner>,
    redaction: Arc<RedactionPolicy>,
}

impl TypeRegistry
{
    /// Registry with no supports: everything goes through the generic
    /// strategy.
    #[must_use]
    pub fn new(redaction: Arc<RedactionPolicy>) -> Self
    {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            redaction,
        }
    }

    /// Registry with a support for every built-in type.
    #[must_use]
    pub fn with_builtins(redaction: Arc<RedactionPolicy>) -> Self
    {
        let registry = Self::new(Arc::clone(&redaction));
        registry.register(NoneSupport);
        registry.register(BoolSupport);
        registry.register(IntSupport);
        registry.register(FloatSupport);
        registry.register(StrSupport::new(redaction));
        registry.register(BytesSupport);
        registry.register(ListSupport);
        registry.register(TupleSupport);
        registry.register(DictSupport);
        registry.register(SetSupport);
        registry.register(FrozenSetSupport);
        registry.register(ModuleSupport);
        registry.register(BuiltinFunctionSupport);
        registry.register(TypeObjectSupport);
        registry
    }

    /// Built-in supports plus the lazily activated standard-library ones,
    /// probing `modules` for availability.
    #[must_use]
    pub fn standard(redaction: Arc<RedactionPolicy>, modules: &ModuleTable) -> Self
    {
        let registry = Self::with_builtins(redaction);
        registry.register(DecimalSupport::new(modules.clone()));
        registry
    }

    /// Add a support.
    ///
    /// Its decoder is available immediately. Its encoder is available
    /// immediately for [`TypeMatch::Exact`], and after a successful
    /// [`resolve_pending`](Self::resolve_pending) for [`TypeMatch::Lazy`].
    /// A later registration for the same type or wire name replaces an
    /// earlier one.
    pub fn register(&self, support: impl TypeSupport + 'static)
    {
        self.register_arc(Arc::new(support));
    }

    pub fn register_arc(&self, support: Arc<dyn TypeSupport>)
    {
        let matcher = support.matcher();
        let mut inner = self.inner.write();
        inner.decoders.insert(support.wire_name().to_string(), Arc::clone(&support));
        match matcher {
            TypeMatch::Exact(type_id) => {
                inner.encoders.insert(type_id, support);
            }
            TypeMatch::Lazy(check) => {
                trace!(wire_name = support.wire_name(), "lazy type support pending");
                inner.pending.push((check, support));
            }
        }
    }

    /// Re-run every pending check, promoting supports whose type is now
    /// available. Returns how many were promoted.
    pub fn resolve_pending(&self) -> usize
    {
        if self.inner.read().pending.is_empty() {
            return 0;
        }

        let mut inner = self.inner.write();
        let pending = std::mem::take(&mut inner.pending);
        let mut promoted = 0;
        for (check, support) in pending {
            match check() {
                Some(type_id) => {
                    debug!(wire_name = support.wire_name(), "lazy type support promoted");
                    inner.encoders.insert(type_id, support);
                    promoted += 1;
                }
                None => inner.pending.push((check, support)),
            }
        }
        promoted
    }

    /// Number of lazy supports still waiting for their type.
    #[must_use]
    pub fn pending_len(&self) -> usize
    {
        self.inner.read().pending.len()
    }

    /// `true` if live objects of type `T` have a dedicated encoder.
    #[must_use]
    pub fn encodes<T: 'static>(&self) -> bool
    {
        self.inner.read().encoders.contains_key(&TypeId::of::<T>())
    }

    /// `true` if records tagged `wire_name` have a dedicated decoder.
    #[must_use]
    pub fn decodes(&self, wire_name: &str) -> bool
    {
        self.inner.read().decoders.contains_key(wire_name)
    }

    #[must_use]
    pub fn redaction(&self) -> &Arc<RedactionPolicy>
    {
        &self.redaction
    }

    /// Encode `obj` with its type's support, or generically.
    #[must_use]
    pub fn dump(&self, obj: &ObjRef) -> Dumped
    {
        let support = self.inner.read().encoders.get(&type_key(obj)).cloned();
        if let Some(support) = support {
            match support.dump(obj) {
                Ok(dumped) => return dumped,
                Err(_) => trace!(type_name = %obj.type_name(), "encoder declined, using generic"),
            }
        }
        generic::dump(obj)
    }

    /// Decode `record` with the support for its tag, or into a proxy.
    #[must_use]
    pub fn load(&self, record: &EncodedRecord, graph: &PartialGraph<'_>) -> Loaded
    {
        if let Some(support) = self.decoder(&record.type_tag) {
            match support.load(record, graph) {
                Ok(loaded) => return loaded,
                Err(_) => trace!(type_tag = %record.type_tag, "decoder declined, using generic"),
            }
        }
        generic::load(record)
    }

    /// Continue a partially decoded value. Returns the ids still missing.
    #[must_use]
    pub fn reload(&self, value: &mut Value, record: &EncodedRecord, graph: &PartialGraph<'_>) -> Pending
    {
        let Some(support) = self.decoder(&record.type_tag) else {
            return Pending::new();
        };
        support.reload(value, record, graph).unwrap_or_else(|_| {
            trace!(type_tag = %record.type_tag, "reload declined, keeping value as is");
            Pending::new()
        })
    }

    fn decoder(&self, type_tag: &str) -> Option<Arc<dyn TypeSupport>>
    {
        self.inner.read().decoders.get(type_tag).cloned()
    }
}

#[cfg(test)]
mod tests
{
    use std::collections::HashSet;

    use super::*;
    use crate::object::{self, Decimal};
    use crate::types::RecordKind;

    #[test]
    fn test_resolve_pending_is_idempotent()
    {
        let modules = ModuleTable::new();
        let registry = TypeRegistry::standard(Arc::new(RedactionPolicy::new()), &modules);
        assert_eq!(registry.pending_len(), 1);
        assert_eq!(registry.resolve_pending(), 0);
        assert!(!registry.encodes::<Decimal>());
        assert!(registry.decodes("decimal.Decimal"));

        modules.import("decimal");
        assert_eq!(registry.resolve_pending(), 1);
        assert_eq!(registry.resolve_pending(), 0);
        assert!(registry.encodes::<Decimal>());
    }

    #[test]
    fn test_declined_encoder_falls_back_to_generic()
    {
        let registry = TypeRegistry::with_builtins(Arc::new(RedactionPolicy::new()));
        let class = object::Class::new("Config");
        class.set_attr("retries", object::int(3));
        let obj: ObjRef = class;

        let dumped = registry.dump(&obj);
        assert_eq!(dumped.record.type_tag, "type");
        assert_eq!(dumped.record.kind(), RecordKind::Generic);
        assert_eq!(dumped.children.len(), 1);
    }

    #[test]
    fn test_unknown_tag_loads_as_proxy()
    {
        let registry = TypeRegistry::with_builtins(Arc::new(RedactionPolicy::new()));
        let resolved = HashSet::new();
        let record = EncodedRecord::tag("function");
        let loaded = registry.load(&record, &PartialGraph::new(&resolved));
        assert!(matches!(loaded, Loaded::Ready(Value::Proxy(ref proxy)) if proxy.type_tag() == "function"));
    }

    #[test]
    fn test_declined_decoder_loads_as_proxy()
    {
        let registry = TypeRegistry::with_builtins(Arc::new(RedactionPolicy::new()));
        let resolved = HashSet::new();
        let record = EncodedRecord::scalar("int", "not a number");
        let loaded = registry.load(&record, &PartialGraph::new(&resolved));
        assert!(matches!(loaded, Loaded::Ready(Value::Proxy(_))));
    }
}
