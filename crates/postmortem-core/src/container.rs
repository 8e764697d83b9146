//! # Object Container
//!
//! Capture and reconstruction of object graphs.
//!
//! [`ObjectContainer::add_objects`] walks live objects breadth first and
//! records each one once. [`ObjectContainer::load_objects`] turns the
//! records back into a [`ProxyGraph`], resolving forward references and
//! cycles with a retry queue instead of recursion.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use postmortem_core::object::{self, List, ObjRef};
//! use postmortem_core::prelude::*;
//!
//! let registry = Arc::new(TypeRegistry::with_builtins(Arc::new(RedactionPolicy::new())));
//! let list = List::new(vec![object::int(3)]);
//! let root: ObjRef = list.clone();
//! list.push(object::dict(vec![(object::string("self"), root.clone())]));
//!
//! let mut capture = ObjectContainer::new(Arc::clone(&registry));
//! capture.add_objects(&[root.clone()], None);
//!
//! let mut replay = ObjectContainer::new(registry);
//! replay.load_objects(capture.get_objects().clone());
//! assert_eq!(replay.graph().repr(&ObjectId::of(&root)), "[3, {'self': [...]}]");
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::CaptureConfig;
use crate::object::ObjRef;
use crate::support::{Dumped, Loaded, PartialGraph, Pending, TypeRegistry};
use crate::types::{EncodedRecord, ObjectId, ObjectMap};
use crate::value::{FrameView, ProxyGraph, Value};

/// Owner of one snapshot's records and reconstructed values.
///
/// A container is single-writer: concurrent captures each need their own
/// container, though they may share one registry.
pub struct ObjectContainer
{
    registry: Arc<TypeRegistry>,
    config: CaptureConfig,
    objects: ObjectMap,
    /// Every object dumped or referenced, so addresses stay unique until
    /// `clear`.
    holder: HashMap<ObjectId, ObjRef>,
    graph: ProxyGraph,
}

impl ObjectContainer
{
    /// Container with the default capture budget.
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>) -> Self
    {
        Self::with_config(registry, CaptureConfig::default())
    }

    #[must_use]
    pub fn with_config(registry: Arc<TypeRegistry>, config: CaptureConfig) -> Self
    {
        Self {
            registry,
            config,
            objects: ObjectMap::new(),
            holder: HashMap::new(),
            graph: ProxyGraph::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry>
    {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &CaptureConfig
    {
        &self.config
    }

    pub fn set_config(&mut self, config: CaptureConfig)
    {
        self.config = config;
    }

    /// Capture everything reachable from `roots`, up to `depth` levels
    /// (default [`CaptureConfig::max_depth`]) or until the time budget runs
    /// out, whichever comes first.
    ///
    /// Budgets are checked between levels; the roots themselves are always
    /// recorded. Objects already in the container are not dumped again.
    /// Returns the record of each root, in order.
    pub fn add_objects(&mut self, roots: &[ObjRef], depth: Option<usize>) -> Vec<EncodedRecord>
    {
        self.registry.resolve_pending();
        let _environ = self.registry.redaction().enter_environ();

        let max_depth = depth.unwrap_or(self.config.max_depth).max(1);
        let started = Instant::now();
        let mut frontier: Vec<ObjRef> = roots.to_vec();
        let mut level = 0;

        while !frontier.is_empty() && level < max_depth {
            if level > 0 && started.elapsed() >= self.config.timeout {
                debug!(level, remaining = frontier.len(), "capture time budget exhausted");
                break;
            }

            let mut next = Vec::new();
            let mut next_ids = HashSet::new();
            let mut dumped = 0usize;
            for obj in frontier {
                let id = ObjectId::of(&obj);
                if self.objects.contains_key(&id) {
                    continue;
                }
                let Dumped { record, children } = self.registry.dump(&obj);
                self.objects.insert(id.clone(), record);
                self.holder.insert(id, obj);
                dumped += 1;

                for child in children {
                    let child_id = ObjectId::of(&child);
                    if self.objects.contains_key(&child_id) || !next_ids.insert(child_id.clone()) {
                        continue;
                    }
                    self.holder.entry(child_id).or_insert_with(|| Arc::clone(&child));
                    next.push(child);
                }
            }

            debug!(level, dumped, next = next.len(), "capture level done");
            level += 1;
            frontier = next;
        }

        roots
            .iter()
            .filter_map(|root| self.objects.get(&ObjectId::of(root)).cloned())
            .collect()
    }

    /// [`add_objects`](Self::add_objects) for a single root.
    pub fn add_object(&mut self, root: &ObjRef, depth: Option<usize>) -> Option<EncodedRecord>
    {
        self.add_objects(std::slice::from_ref(root), depth).into_iter().next()
    }

    /// Every record captured or loaded so far.
    #[must_use]
    pub fn get_objects(&self) -> &ObjectMap
    {
        &self.objects
    }

    /// Rebuild the graph from `objects`, replacing whatever was loaded before.
    ///
    /// Dangling references become [`Value::Unknown`]. Never fails: records
    /// that cannot make progress (a cycle made only of immutable containers)
    /// are bound to `Unknown` with a warning.
    pub fn load_objects(&mut self, objects: ObjectMap)
    {
        self.registry.resolve_pending();
        self.objects = objects;

        let mut reconciler = Reconciler::new(&self.registry, &self.objects);
        let passes = reconciler.run();
        debug!(records = self.objects.len(), values = reconciler.values.len(), passes, "objects loaded");
        self.graph.replace(reconciler.values);
    }

    /// Reconstructed value for `id`, or `Unknown`.
    #[must_use]
    pub fn get_object(&self, id: &ObjectId) -> Arc<Value>
    {
        self.graph.get(id)
    }

    #[must_use]
    pub fn graph(&self) -> &ProxyGraph
    {
        &self.graph
    }

    /// View the frame stored under `id`.
    #[must_use]
    pub fn frame(&self, id: &ObjectId) -> Option<FrameView>
    {
        self.graph.frame(id)
    }

    /// Drop all records, held objects and reconstructed values.
    pub fn clear(&mut self)
    {
        self.objects.clear();
        self.holder.clear();
        self.graph.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.objects.is_empty()
    }
}

/// Work-queue resolution of an [`ObjectMap`].
struct Reconciler<'a>
{
    registry: &'a TypeRegistry,
    objects: &'a ObjectMap,
    values: HashMap<ObjectId, Value>,
    resolved: HashSet<ObjectId>,
    not_ready: HashSet<ObjectId>,
    pending_counts: HashMap<ObjectId, usize>,
    queue: VecDeque<ObjectId>,
    queued: HashSet<ObjectId>,
    seen: HashSet<ObjectId>,
}

impl<'a> Reconciler<'a>
{
    fn new(registry: &'a TypeRegistry, objects: &'a ObjectMap) -> Self
    {
        let queue: VecDeque<ObjectId> = objects.keys().cloned().collect();
        let queued = queue.iter().cloned().collect();
        Self {
            registry,
            objects,
            values: HashMap::with_capacity(objects.len()),
            resolved: HashSet::with_capacity(objects.len()),
            not_ready: HashSet::new(),
            pending_counts: HashMap::new(),
            queue,
            queued,
            seen: HashSet::new(),
        }
    }

    /// Drain the queue. Returns the number of passes taken.
    fn run(&mut self) -> usize
    {
        let mut passes = 0;
        while !self.queue.is_empty() {
            passes += 1;
            let mut progressed = false;
            for _ in 0..self.queue.len() {
                let Some(id) = self.pop() else {
                    break;
                };
                progressed |= self.step(id);
            }
            if !progressed {
                self.break_stall();
            }
        }
        passes
    }

    fn pop(&mut self) -> Option<ObjectId>
    {
        let id = self.queue.pop_front()?;
        self.queued.remove(&id);
        self.seen.insert(id.clone());
        Some(id)
    }

    /// Queue `id` unless it already is. Returns `true` if the id was never
    /// visited before.
    fn push(&mut self, id: ObjectId) -> bool
    {
        let discovered = !self.seen.contains(&id);
        if self.queued.insert(id.clone()) {
            self.queue.push_back(id);
        }
        discovered
    }

    /// Process one id. Returns `true` if anything changed.
    fn step(&mut self, id: ObjectId) -> bool
    {
        let objects = self.objects;
        let Some(record) = objects.get(&id) else {
            self.bind(id, Value::Unknown);
            return true;
        };

        if self.resolved.contains(&id) {
            if !self.not_ready.contains(&id) {
                return false;
            }
            let graph = PartialGraph::new(&self.resolved);
            let Some(value) = self.values.get_mut(&id) else {
                return false;
            };
            let pending = self.registry.reload(value, record, &graph);
            return self.settle(id, pending);
        }

        let loaded = self.registry.load(record, &PartialGraph::new(&self.resolved));
        match loaded {
            Loaded::Ready(value) => {
                self.bind(id, value);
                true
            }
            Loaded::Partial { value, pending } => {
                self.bind(id.clone(), value);
                self.not_ready.insert(id.clone());
                self.pending_counts.insert(id.clone(), pending.len());
                self.wait_on(id, pending);
                true
            }
            Loaded::NotReady { pending } => self.wait_on(id, pending),
        }
    }

    fn bind(&mut self, id: ObjectId, value: Value)
    {
        self.resolved.insert(id.clone());
        self.values.insert(id, value);
    }

    /// Requeue the dependencies, then `id` after them.
    fn wait_on(&mut self, id: ObjectId, pending: Pending) -> bool
    {
        let mut discovered = false;
        for dep in pending {
            discovered |= self.push(dep);
        }
        self.push(id);
        discovered
    }

    fn settle(&mut self, id: ObjectId, pending: Pending) -> bool
    {
        if pending.is_empty() {
            self.not_ready.remove(&id);
            self.pending_counts.remove(&id);
            return true;
        }
        let previous = self.pending_counts.insert(id.clone(), pending.len());
        let shrank = previous.map_or(true, |previous| pending.len() < previous);
        let discovered = self.wait_on(id, pending);
        shrank || discovered
    }

    /// A full pass changed nothing: give up on one unresolved id.
    fn break_stall(&mut self)
    {
        let stuck = self.queue.iter().find(|id| !self.resolved.contains(*id)).cloned();
        if let Some(id) = stuck {
            warn!(id = %id, "reconstruction stalled, binding object to Unknown");
            self.bind(id, Value::Unknown);
            return;
        }

        warn!(remaining = self.queue.len(), "reconstruction stalled, leaving containers incomplete");
        self.queue.clear();
        self.queued.clear();
        self.not_ready.clear();
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::object::{self, List};
    use crate::redaction::RedactionPolicy;
    use crate::types::EncodedRecord;

    fn registry() -> Arc<TypeRegistry>
    {
        Arc::new(TypeRegistry::with_builtins(Arc::new(RedactionPolicy::disabled())))
    }

    fn id(raw: &str) -> ObjectId
    {
        ObjectId::from(raw)
    }

    #[test]
    fn test_roots_always_recorded()
    {
        let mut container = ObjectContainer::new(registry());
        let root = object::list(vec![object::int(1)]);
        let records = container.add_objects(&[root], Some(0));
        assert_eq!(records.len(), 1);
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_shared_child_recorded_once()
    {
        let mut container = ObjectContainer::new(registry());
        let shared = object::string("shared");
        let root = object::list(vec![shared.clone(), shared.clone()]);
        container.add_objects(&[root.clone(), root], None);
        assert_eq!(container.len(), 2);
    }

    #[test]
    fn test_tuple_cycle_is_broken()
    {
        // two tuples that contain each other can never both be built
        let mut objects = ObjectMap::new();
        objects.insert(id("1"), EncodedRecord::sequence("tuple", [&id("2")]));
        objects.insert(id("2"), EncodedRecord::sequence("tuple", [&id("1")]));

        let mut container = ObjectContainer::new(registry());
        container.load_objects(objects);

        let unknown = [id("1"), id("2")].into_iter().filter(|id| container.get_object(id).is_unknown()).count();
        assert_eq!(unknown, 1);
    }

    #[test]
    fn test_partial_list_shared_before_complete()
    {
        let mut objects = ObjectMap::new();
        objects.insert(id("1"), EncodedRecord::sequence("list", [&id("2"), &id("3")]));
        objects.insert(id("2"), EncodedRecord::sequence("tuple", [&id("1")]));
        objects.insert(id("3"), EncodedRecord::scalar("int", 7));

        let mut container = ObjectContainer::new(registry());
        container.load_objects(objects);

        assert_eq!(container.get_object(&id("1")).as_ref(), &Value::List(vec![id("2"), id("3")]));
        assert_eq!(container.get_object(&id("2")).as_ref(), &Value::Tuple(vec![id("1")]));
        assert_eq!(container.graph().repr(&id("1")), "[([...],), 7]");
    }

    #[test]
    fn test_clear_releases_everything()
    {
        let mut container = ObjectContainer::new(registry());
        let list = List::new(Vec::new());
        let root: ObjRef = list.clone();
        container.add_objects(&[root], None);
        assert_eq!(Arc::strong_count(&list), 2);

        container.clear();
        assert!(container.is_empty());
        assert_eq!(Arc::strong_count(&list), 1);
    }
}
