//! The reconstructed-value arena.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::types::ObjectId;

use super::{Value, UNKNOWN};

type Arena = RwLock<HashMap<ObjectId, Arc<Value>>>;

/// Containers nested deeper than this print as `...`.
pub const MAX_REPR_DEPTH: usize = 256;

/// Id-keyed store owning every reconstructed value of one snapshot.
///
/// Cloning shares the arena. Values reference each other by id only, so
/// dropping the last `ProxyGraph` frees everything even for cyclic data.
#[derive(Clone, Default)]
pub struct ProxyGraph
{
    inner: Arc<Arena>,
}

/// Non-owning handle a [`Proxy`](super::Proxy) uses to reach its graph.
#[derive(Clone)]
pub struct GraphLink
{
    inner: Weak<Arena>,
}

impl GraphLink
{
    #[must_use]
    pub fn upgrade(&self) -> Option<ProxyGraph>
    {
        self.inner.upgrade().map(|inner| ProxyGraph { inner })
    }
}

impl ProxyGraph
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    #[must_use]
    pub fn link(&self) -> GraphLink
    {
        GraphLink {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Value stored under `id`, or the shared [`UNKNOWN`].
    #[must_use]
    pub fn get(&self, id: &ObjectId) -> Arc<Value>
    {
        self.try_get(id).unwrap_or_else(|| UNKNOWN.clone())
    }

    #[must_use]
    pub fn try_get(&self, id: &ObjectId) -> Option<Arc<Value>>
    {
        self.inner.read().get(id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool
    {
        self.inner.read().contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.inner.read().is_empty()
    }

    /// Every stored id, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<ObjectId>
    {
        let mut ids: Vec<ObjectId> = self.inner.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Detach this handle from its arena and start empty.
    ///
    /// Proxies bound to the old arena report
    /// [`GraphNotLinked`](crate::error::PostmortemError::GraphNotLinked) once
    /// no other handle (a cloned graph or a [`FrameView`]) keeps it alive.
    pub fn clear(&mut self)
    {
        self.inner = Arc::default();
    }

    /// Swap in a freshly reconstructed set of values, binding every proxy to
    /// this graph.
    pub fn replace(&self, values: HashMap<ObjectId, Value>)
    {
        let link = self.link();
        let values = values
            .into_iter()
            .map(|(id, mut value)| {
                if let Value::Proxy(proxy) = &mut value {
                    proxy.bind(id.clone(), link.clone());
                }
                (id, Arc::new(value))
            })
            .collect();
        *self.inner.write() = values;
    }

    /// View the frame proxy stored under `id`.
    #[must_use]
    pub fn frame(&self, id: &ObjectId) -> Option<FrameView>
    {
        FrameView::new(self.clone(), id.clone())
    }

    /// Display form of the value under `id`, in the captured language's
    /// notation. Self-references print as `[...]` or `{...}`; containers
    /// nested more than [`MAX_REPR_DEPTH`] levels down print as `...`.
    #[must_use]
    pub fn repr(&self, id: &ObjectId) -> String
    {
        let mut active = HashSet::new();
        self.repr_inner(id, &mut active)
    }

    fn repr_inner(&self, id: &ObjectId, active: &mut HashSet<ObjectId>) -> String
    {
        let value = self.get(id);
        if active.contains(id) {
            return match value.as_ref() {
                Value::List(_) => "[...]".to_string(),
                Value::Dict(_) => "{...}".to_string(),
                _ => "...".to_string(),
            };
        }
        let nested = matches!(
            value.as_ref(),
            Value::List(_) | Value::Tuple(_) | Value::Dict(_) | Value::Set(_) | Value::FrozenSet(_)
        );
        if nested && active.len() >= MAX_REPR_DEPTH {
            return "...".to_string();
        }

        active.insert(id.clone());
        let repr = match value.as_ref() {
            Value::List(ids) => format!("[{}]", self.join(ids, active)),
            Value::Tuple(ids) if ids.len() == 1 => format!("({},)", self.join(ids, active)),
            Value::Tuple(ids) => format!("({})", self.join(ids, active)),
            Value::Set(ids) if ids.is_empty() => "set()".to_string(),
            Value::Set(ids) => format!("{{{}}}", self.join(ids, active)),
            Value::FrozenSet(ids) if ids.is_empty() => "frozenset()".to_string(),
            Value::FrozenSet(ids) => format!("frozenset({{{}}})", self.join(ids, active)),
            Value::Dict(pairs) => {
                let entries: Vec<String> = pairs
                    .iter()
                    .map(|(key, value)| format!("{}: {}", self.repr_inner(key, active), self.repr_inner(value, active)))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
            scalar => scalar_repr(scalar),
        };
        active.remove(id);
        repr
    }

    fn join(&self, ids: &[ObjectId], active: &mut HashSet<ObjectId>) -> String
    {
        ids.iter()
            .map(|id| self.repr_inner(id, active))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Repr of a value with no children.
fn scalar_repr(value: &Value) -> String
{
    match value {
        Value::None => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(value) => value.to_string(),
        Value::Float(value) => float_repr(*value),
        Value::Str(value) => str_repr(value),
        Value::Bytes(value) => bytes_repr(value),
        Value::Module(name) => format!("<module '{name}'>"),
        Value::BuiltinFunction(name) => format!("<built-in function {name}>"),
        Value::Type(name) => format!("<class '{name}'>"),
        Value::Native(native) => native.repr(),
        Value::Proxy(proxy) => proxy.to_string(),
        Value::Unknown => "<Unknown Object>".to_string(),
        Value::List(_) | Value::Tuple(_) | Value::Dict(_) | Value::Set(_) | Value::FrozenSet(_) => {
            format!("<{}>", value.type_name())
        }
    }
}

fn float_repr(value: f64) -> String
{
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        let repr = if value > 0.0 { "inf" } else { "-inf" };
        repr.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

fn str_repr(value: &str) -> String
{
    let quote = if value.contains('\'') && !value.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn bytes_repr(value: &[u8]) -> String
{
    let mut out = String::from("b'");
    for &byte in value {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(char::from(byte)),
            _ => {
                let _ = write!(out, "\\x{byte:02x}");
            }
        }
    }
    out.push('\'');
    out
}

/// Read-only view over a reconstructed frame proxy.
///
/// Exposes the fields a stack-oriented front end needs without it having to
/// know the frame's attribute layout.
#[derive(Clone)]
pub struct FrameView
{
    graph: ProxyGraph,
    id: ObjectId,
    value: Arc<Value>,
}

impl FrameView
{
    /// View `id` as a frame. `None` unless the value is a `frame` proxy.
    #[must_use]
    pub fn new(graph: ProxyGraph, id: ObjectId) -> Option<Self>
    {
        let value = graph.try_get(&id)?;
        match value.as_proxy() {
            Some(proxy) if proxy.type_tag() == "frame" => Some(Self { graph, id, value }),
            _ => None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &ObjectId
    {
        &self.id
    }

    fn attr(&self, name: &str) -> Option<Arc<Value>>
    {
        let proxy = self.value.as_proxy()?;
        proxy.attr_id(name).map(|id| self.graph.get(id))
    }

    fn code_attr(&self, name: &str) -> Option<Arc<Value>>
    {
        let code = self.attr("f_code")?;
        let id = code.as_proxy()?.attr_id(name)?;
        Some(self.graph.get(id))
    }

    /// Name of the function executing in this frame.
    #[must_use]
    pub fn name(&self) -> Option<String>
    {
        self.code_attr("co_name").and_then(|value| value.as_str().map(str::to_string))
    }

    #[must_use]
    pub fn filename(&self) -> Option<String>
    {
        self.code_attr("co_filename").and_then(|value| value.as_str().map(str::to_string))
    }

    #[must_use]
    pub fn lineno(&self) -> Option<i64>
    {
        self.attr("f_lineno").and_then(|value| value.as_int())
    }

    /// The calling frame, if it was captured.
    #[must_use]
    pub fn back(&self) -> Option<FrameView>
    {
        let id = self.value.as_proxy()?.attr_id("f_back")?.clone();
        Self::new(self.graph.clone(), id)
    }

    /// Local variable names and the ids they point at, in definition order.
    #[must_use]
    pub fn locals(&self) -> Vec<(String, ObjectId)>
    {
        self.named_entries("f_locals")
    }

    #[must_use]
    pub fn globals(&self) -> Vec<(String, ObjectId)>
    {
        self.named_entries("f_globals")
    }

    /// Value of local variable `name`.
    #[must_use]
    pub fn local(&self, name: &str) -> Option<Arc<Value>>
    {
        self.locals()
            .into_iter()
            .find(|(local, _)| local == name)
            .map(|(_, id)| self.graph.get(&id))
    }

    fn named_entries(&self, attr: &str) -> Vec<(String, ObjectId)>
    {
        let Some(mapping) = self.attr(attr) else {
            return Vec::new();
        };
        let Value::Dict(pairs) = mapping.as_ref() else {
            return Vec::new();
        };
        pairs
            .iter()
            .map(|(key, value)| {
                let name = match self.graph.get(key).as_str() {
                    Some(name) => name.to_string(),
                    None => self.graph.repr(key),
                };
                (name, value.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn id(raw: &str) -> ObjectId
    {
        ObjectId::from(raw)
    }

    #[test]
    fn test_repr_of_self_referencing_list()
    {
        let graph = ProxyGraph::new();
        let mut values = HashMap::new();
        values.insert(id("1"), Value::List(vec![id("2"), id("3")]));
        values.insert(id("2"), Value::Int(3));
        values.insert(id("3"), Value::Dict(vec![(id("4"), id("1"))]));
        values.insert(id("4"), Value::Str("a".to_string()));
        graph.replace(values);

        assert_eq!(graph.repr(&id("1")), "[3, {'a': [...]}]");
        assert_eq!(graph.repr(&id("3")), "{'a': [3, {...}]}");
    }

    #[test]
    fn test_scalar_reprs()
    {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.25), "0.25");
        assert_eq!(float_repr(f64::NEG_INFINITY), "-inf");
        assert_eq!(str_repr("it's"), "\"it's\"");
        assert_eq!(str_repr("a\nb"), "'a\\nb'");
        assert_eq!(bytes_repr(b"ab\x00"), "b'ab\\x00'");
    }

    #[test]
    fn test_missing_id_is_unknown()
    {
        let graph = ProxyGraph::new();
        assert!(graph.get(&id("404")).is_unknown());
        assert_eq!(graph.repr(&id("404")), "<Unknown Object>");
        assert!(graph.frame(&id("404")).is_none());
    }

    #[test]
    fn test_tuple_and_set_reprs()
    {
        let graph = ProxyGraph::new();
        let mut values = HashMap::new();
        values.insert(id("1"), Value::Tuple(vec![id("2")]));
        values.insert(id("2"), Value::None);
        values.insert(id("3"), Value::Set(Vec::new()));
        values.insert(id("4"), Value::FrozenSet(vec![id("2")]));
        graph.replace(values);

        assert_eq!(graph.repr(&id("1")), "(None,)");
        assert_eq!(graph.repr(&id("3")), "set()");
        assert_eq!(graph.repr(&id("4")), "frozenset({None})");
    }

    #[test]
    fn test_deep_nesting_is_truncated()
    {
        let depth = 100_000;
        let graph = ProxyGraph::new();
        let mut values = HashMap::with_capacity(depth + 1);
        for level in 0..depth {
            values.insert(id(&level.to_string()), Value::List(vec![id(&(level + 1).to_string())]));
        }
        values.insert(id(&depth.to_string()), Value::Int(7));
        graph.replace(values);

        let repr = graph.repr(&id("0"));
        assert!(repr.starts_with(&"[".repeat(MAX_REPR_DEPTH)));
        assert!(repr.contains("..."));
        assert!(!repr.contains('7'));
        assert_eq!(repr.len(), 2 * MAX_REPR_DEPTH + 3);

        // shallow enough to print in full
        let tail = (depth - 3).to_string();
        assert_eq!(graph.repr(&id(&tail)), "[[[7]]]");
    }

    #[test]
    fn test_clear_unlinks_proxies()
    {
        let mut graph = ProxyGraph::new();
        let mut attrs = std::collections::BTreeMap::new();
        attrs.insert("x".to_string(), id("2"));
        let mut values = HashMap::new();
        values.insert(id("1"), Value::Proxy(crate::value::Proxy::new("Point", attrs)));
        values.insert(id("2"), Value::Int(1));
        graph.replace(values);

        let point = graph.get(&id("1"));
        let proxy = point.as_proxy().unwrap();
        assert_eq!(proxy.getattr("x").unwrap().as_int(), Some(1));

        graph.clear();
        assert!(graph.is_empty());
        assert!(matches!(
            proxy.getattr("x"),
            Err(crate::error::PostmortemError::GraphNotLinked(_))
        ));
    }
}
