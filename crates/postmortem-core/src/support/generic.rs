//! Generic fallback strategy.
//!
//! Used when no support matches or the matching support declines. Encoding
//! walks [`Object::members`](crate::object::Object::members); decoding builds a
//! [`Proxy`].

use std::collections::BTreeMap;

use crate::object::{is_callable, ObjRef, ObjectKind};
use crate::types::{EncodedRecord, ObjectId};
use crate::value::{Proxy, Value};

use super::{Dumped, Loaded};

/// Encode `obj` as `{type, attrs}`.
///
/// Callables and modules get a type tag only. For data objects every member
/// is recorded except names starting with `__` and callable values.
#[must_use]
pub fn dump(obj: &ObjRef) -> Dumped
{
    let type_tag = obj.type_name().into_owned();
    if obj.kind() != ObjectKind::Data {
        return Dumped::leaf(EncodedRecord::tag(type_tag));
    }

    let mut attrs = BTreeMap::new();
    let mut children = Vec::new();
    for (name, value) in obj.members() {
        if name.starts_with("__") || is_callable(&value) {
            continue;
        }
        attrs.insert(name, ObjectId::of(&value));
        children.push(value);
    }
    Dumped::new(EncodedRecord::generic(type_tag, attrs), children)
}

/// Decode any record into an unlinked [`Proxy`].
#[must_use]
pub fn load(record: &EncodedRecord) -> Loaded
{
    let attrs = record.attrs.clone().unwrap_or_default();
    Loaded::Ready(Value::Proxy(Proxy::new(record.type_tag.clone(), attrs)))
}
