//! Generic stand-in for objects no support could rebuild.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{PostmortemError, Result};
use crate::types::ObjectId;

use super::{GraphLink, Value, UNKNOWN};

/// Type tag plus attribute references.
///
/// Attributes are resolved through the owning [`ProxyGraph`](super::ProxyGraph)
/// on every access and never copied in, which is what lets proxies take part
/// in cycles.
#[derive(Clone)]
pub struct Proxy
{
    type_tag: String,
    id: Option<ObjectId>,
    attrs: BTreeMap<String, ObjectId>,
    link: Option<GraphLink>,
}

impl Proxy
{
    /// Unlinked proxy. It becomes usable once the graph that owns it binds it.
    pub fn new(type_tag: impl Into<String>, attrs: BTreeMap<String, ObjectId>) -> Self
    {
        Self {
            type_tag: type_tag.into(),
            id: None,
            attrs,
            link: None,
        }
    }

    pub(crate) fn bind(&mut self, id: ObjectId, link: GraphLink)
    {
        self.id = Some(id);
        self.link = Some(link);
    }

    #[must_use]
    pub fn type_tag(&self) -> &str
    {
        &self.type_tag
    }

    /// Id this proxy was stored under.
    #[must_use]
    pub fn id(&self) -> Option<&ObjectId>
    {
        self.id.as_ref()
    }

    /// `true` once bound to a graph that is still alive.
    #[must_use]
    pub fn is_linked(&self) -> bool
    {
        self.link.as_ref().is_some_and(|link| link.upgrade().is_some())
    }

    /// Resolve attribute `name`.
    ///
    /// An attribute whose target was never captured resolves to
    /// [`Value::Unknown`].
    ///
    /// ## Errors
    ///
    /// - [`PostmortemError::AttributeNotFound`] if `name` was never recorded.
    /// - [`PostmortemError::GraphNotLinked`] if the proxy is not bound to a
    ///   live graph.
    pub fn getattr(&self, name: &str) -> Result<Arc<Value>>
    {
        let Some(target) = self.attrs.get(name) else {
            return Err(PostmortemError::AttributeNotFound {
                type_name: self.type_tag.clone(),
                attr: name.to_string(),
            });
        };
        let graph = self
            .link
            .as_ref()
            .and_then(GraphLink::upgrade)
            .ok_or_else(|| PostmortemError::GraphNotLinked(self.type_tag.clone()))?;
        Ok(graph.try_get(target).unwrap_or_else(|| UNKNOWN.clone()))
    }

    /// Id an attribute points at, without resolving it.
    #[must_use]
    pub fn attr_id(&self, name: &str) -> Option<&ObjectId>
    {
        self.attrs.get(name)
    }

    /// Recorded attribute names, sorted.
    pub fn attr_names(&self) -> impl Iterator<Item = &str>
    {
        self.attrs.keys().map(String::as_str)
    }

    pub fn attr_ids(&self) -> impl Iterator<Item = &ObjectId>
    {
        self.attrs.values()
    }
}

impl fmt::Display for Proxy
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match &self.id {
            Some(id) => write!(f, "<{} object at {id}>", self.type_tag),
            None => write!(f, "<{} object>", self.type_tag),
        }
    }
}

impl fmt::Debug for Proxy
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Proxy")
            .field("type_tag", &self.type_tag)
            .field("id", &self.id)
            .field("attrs", &self.attrs)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Proxy
{
    fn eq(&self, other: &Self) -> bool
    {
        self.type_tag == other.type_tag && self.id == other.id && self.attrs == other.attrs
    }
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use super::*;
    use crate::value::ProxyGraph;

    fn proxy_with_attr() -> Proxy
    {
        let mut attrs = BTreeMap::new();
        attrs.insert("x".to_string(), ObjectId::from("10"));
        attrs.insert("gone".to_string(), ObjectId::from("99"));
        Proxy::new("A", attrs)
    }

    #[test]
    fn test_getattr_missing_name()
    {
        let proxy = proxy_with_attr();
        let err = proxy.getattr("y").unwrap_err();
        assert!(matches!(err, PostmortemError::AttributeNotFound { .. }));
        assert_eq!(err.to_string(), "'A' object has no attribute 'y'");
    }

    #[test]
    fn test_getattr_before_linking()
    {
        let proxy = proxy_with_attr();
        assert!(!proxy.is_linked());
        assert!(matches!(proxy.getattr("x"), Err(PostmortemError::GraphNotLinked(_))));
    }

    #[test]
    fn test_getattr_after_graph_dropped()
    {
        let mut proxy = proxy_with_attr();
        let graph = ProxyGraph::new();
        proxy.bind(ObjectId::from("1"), graph.link());
        drop(graph);
        assert!(matches!(proxy.getattr("x"), Err(PostmortemError::GraphNotLinked(_))));
    }

    #[test]
    fn test_getattr_resolves_through_graph()
    {
        let graph = ProxyGraph::new();
        let mut values = HashMap::new();
        values.insert(ObjectId::from("10"), Value::Int(142_857));
        values.insert(ObjectId::from("1"), Value::Proxy(proxy_with_attr()));
        graph.replace(values);

        let value = graph.get(&ObjectId::from("1"));
        let proxy = value.as_proxy().unwrap();
        assert_eq!(proxy.getattr("x").unwrap().as_int(), Some(142_857));
        assert!(proxy.getattr("gone").unwrap().is_unknown());
        assert_eq!(proxy.to_string(), "<A object at 0x1>");
    }
}
