//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use postmortem_core::object::{self, Code, Dict, Frame, ObjRef};
use postmortem_core::prelude::*;

/// Policy with default toggles and an empty environment, so test strings
/// never collide with the host's variables.
pub fn policy() -> Arc<RedactionPolicy>
{
    let policy = RedactionPolicy::new();
    policy.set_environ_source(Vec::new);
    Arc::new(policy)
}

pub fn registry() -> Arc<TypeRegistry>
{
    Arc::new(TypeRegistry::with_builtins(policy()))
}

/// Capture `roots` and load the records into a fresh container.
pub fn round_trip(registry: &Arc<TypeRegistry>, roots: &[ObjRef], depth: Option<usize>) -> ObjectContainer
{
    let mut capture = ObjectContainer::new(Arc::clone(registry));
    capture.add_objects(roots, depth);
    let mut restore = ObjectContainer::new(Arc::clone(registry));
    restore.load_objects(capture.get_objects().clone());
    restore
}

pub fn frame(name: &str, filename: &str, lineno: i64, locals: Vec<(&str, ObjRef)>, back: Option<Arc<Frame>>)
    -> Arc<Frame>
{
    let locals = locals
        .into_iter()
        .map(|(key, value)| (object::string(key), value))
        .collect();
    Frame::new(Code::new(name, filename, 1), lineno, Dict::new(locals), Dict::new(Vec::new()), back)
}
