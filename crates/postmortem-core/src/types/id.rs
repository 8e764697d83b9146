//! Object identifier type.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::object::Object;

/// Opaque identifier for an object within one snapshot
///
/// During capture the id is derived from the allocation address of the live
/// object, rendered as a decimal string. The container keeps every dumped
/// object alive until [`clear`](crate::ObjectContainer::clear), so an address
/// cannot be reused for a different object while a capture is running.
///
/// Ids carry no meaning outside the snapshot they came from.
///
/// ## Example
///
/// ```rust
/// use postmortem_core::object;
/// use postmortem_core::types::ObjectId;
///
/// let a = object::int(1);
/// let b = object::int(1);
/// assert_eq!(ObjectId::of(&a), ObjectId::of(&a));
/// assert_ne!(ObjectId::of(&a), ObjectId::of(&b));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId
{
    /// Identity of a live object.
    #[must_use]
    pub fn of(obj: &Arc<dyn Object>) -> Self
    {
        let address = Arc::as_ptr(obj).cast::<()>() as usize;
        Self(address.to_string())
    }

    /// Wrap a raw id, e.g. one read back from a snapshot.
    pub fn new(raw: impl Into<String>) -> Self
    {
        Self(raw.into())
    }

    /// The raw string form used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str
    {
        &self.0
    }

    /// Numeric address, when the id was produced from one.
    #[must_use]
    pub fn address(&self) -> Option<u64>
    {
        self.0.parse().ok()
    }
}

impl fmt::Display for ObjectId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.address() {
            Some(address) => write!(f, "0x{address:x}"),
            None => f.write_str(&self.0),
        }
    }
}

impl From<&str> for ObjectId
{
    fn from(raw: &str) -> Self
    {
        Self(raw.to_string())
    }
}

impl From<String> for ObjectId
{
    fn from(raw: String) -> Self
    {
        Self(raw)
    }
}
