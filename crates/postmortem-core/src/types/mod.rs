//! # Types
//!
//! Wire-level types shared by the capture and reconstruction passes.
//!
//! These types are what ends up in a snapshot file: object identifiers and
//! the encoded records they key. Nothing in here knows about live objects or
//! reconstructed values.

pub mod id;
pub mod record;

// Re-export all public types
pub use id::ObjectId;
pub use record::{EncodedRecord, ObjectMap, RecordKind};
