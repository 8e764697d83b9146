//! Common module for library exports

pub use crate::config::CaptureConfig;
pub use crate::container::ObjectContainer;
pub use crate::error::{PostmortemError, Result};
pub use crate::object::{Object, ObjRef};
pub use crate::redaction::RedactionPolicy;
pub use crate::snapshot::{peek_files, CaptureOptions, LoadedSnapshot, PeekSummary, Snapshot};
pub use crate::support::{TypeRegistry, TypeSupport};
pub use crate::types::{EncodedRecord, ObjectId, ObjectMap};
pub use crate::value::{FrameView, Proxy, ProxyGraph, Value};
