//! # postmortem-core
//!
//! Object-graph capture and reconstruction for postmortem debugging.
//!
//! This crate provides the engine behind postmortem snapshots:
//! - Walking live objects breadth-first and encoding each one as a record
//! - Persisting the records with the call stack and source files
//! - Rebuilding a navigable graph of values and proxies from a snapshot
//!
//! ## Capture and Reconstruction
//!
//! A capture starts from one or more roots (usually the frames of a call
//! stack) and walks everything reachable up to a depth bound and a time
//! budget. Each object is encoded exactly once, keyed by its [`ObjectId`], so
//! shared and cyclic references survive the round trip.
//!
//! Reconstruction never needs the original types. Built-in values come back
//! as [`Value`]s; everything else becomes a [`Proxy`](value::Proxy) that
//! exposes the captured attributes. References to objects that were never
//! captured resolve to the unknown sentinel instead of failing.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use postmortem_core::object;
//! use postmortem_core::prelude::*;
//!
//! let registry = Arc::new(TypeRegistry::with_builtins(Arc::new(RedactionPolicy::new())));
//! let mut capture = ObjectContainer::new(Arc::clone(&registry));
//! let root = object::list(vec![object::string("hello"), object::float(2.5)]);
//! capture.add_object(&root, None);
//!
//! let mut restore = ObjectContainer::new(registry);
//! restore.load_objects(capture.get_objects().clone());
//! assert_eq!(restore.graph().repr(&ObjectId::of(&root)), "['hello', 2.5]");
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod object;
pub mod prelude;
pub mod redaction;
pub mod snapshot;
pub mod support;
pub mod types;
pub mod value;

pub use config::CaptureConfig;
pub use container::ObjectContainer;
// Re-export commonly used types
pub use error::{PostmortemError, Result};
pub use redaction::RedactionPolicy;
pub use snapshot::{CaptureOptions, LoadedSnapshot, PeekSummary, Snapshot};
pub use support::TypeRegistry;
pub use types::{EncodedRecord, ObjectId, ObjectMap};
pub use value::{FrameView, Proxy, ProxyGraph, Value};
