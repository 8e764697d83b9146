//! Built-in live object types.
//!
//! Scalars are immutable. Containers that can take part in reference cycles
//! (`List`, `Dict`, `Set`, `Instance`, `Class`) use interior mutability so a
//! cycle can be closed after the objects exist.

use std::any::Any;
use std::borrow::Cow;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{same, ObjRef, Object, ObjectKind};

macro_rules! scalar_object {
    ($ty:ident, $name:literal) => {
        impl Object for $ty
        {
            fn type_name(&self) -> Cow<'_, str>
            {
                Cow::Borrowed($name)
            }

            fn as_any(&self) -> &dyn Any
            {
                self
            }
        }
    };
}

/// The `None` singleton of the captured program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoneType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bool(pub bool);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Int(pub i64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Float(pub f64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Str(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bytes(pub Vec<u8>);

scalar_object!(NoneType, "NoneType");
scalar_object!(Bool, "bool");
scalar_object!(Int, "int");
scalar_object!(Float, "float");
scalar_object!(Str, "str");
scalar_object!(Bytes, "bytes");

/// Mutable ordered sequence.
pub struct List
{
    items: RwLock<Vec<ObjRef>>,
}

impl List
{
    #[must_use]
    pub fn new(items: Vec<ObjRef>) -> Arc<Self>
    {
        Arc::new(Self {
            items: RwLock::new(items),
        })
    }

    pub fn push(&self, item: ObjRef)
    {
        self.items.write().push(item);
    }

    /// Snapshot of the current elements.
    #[must_use]
    pub fn items(&self) -> Vec<ObjRef>
    {
        self.items.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.items.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.items.read().is_empty()
    }
}

impl Object for List
{
    fn type_name(&self) -> Cow<'_, str>
    {
        Cow::Borrowed("list")
    }

    fn as_any(&self) -> &dyn Any
    {
        self
    }
}

/// Immutable ordered sequence.
pub struct Tuple
{
    items: Vec<ObjRef>,
}

impl Tuple
{
    #[must_use]
    pub fn new(items: Vec<ObjRef>) -> Self
    {
        Self { items }
    }

    #[must_use]
    pub fn items(&self) -> &[ObjRef]
    {
        &self.items
    }
}

impl Object for Tuple
{
    fn type_name(&self) -> Cow<'_, str>
    {
        Cow::Borrowed("tuple")
    }

    fn as_any(&self) -> &dyn Any
    {
        self
    }
}

/// Insertion-ordered mapping.
///
/// Keys compare by identity, or by value for `str`, `int` and `bool` keys,
/// which is enough to model the keys real programs put in frame locals.
pub struct Dict
{
    entries: RwLock<Vec<(ObjRef, ObjRef)>>,
}

impl Dict
{
    #[must_use]
    pub fn new(entries: Vec<(ObjRef, ObjRef)>) -> Arc<Self>
    {
        let dict = Arc::new(Self {
            entries: RwLock::new(Vec::with_capacity(entries.len())),
        });
        for (key, value) in entries {
            dict.insert(key, value);
        }
        dict
    }

    /// Insert or replace the value stored under `key`.
    pub fn insert(&self, key: ObjRef, value: ObjRef)
    {
        let mut entries = self.entries.write();
        if let Some(slot) = entries.iter_mut().find(|(existing, _)| keys_equal(existing, &key)) {
            slot.1 = value;
        } else {
            entries.push((key, value));
        }
    }

    /// Look up a `str` key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<ObjRef>
    {
        self.entries
            .read()
            .iter()
            .find(|(existing, _)| super::downcast::<Str>(existing).is_some_and(|s| s.0 == key))
            .map(|(_, value)| value.clone())
    }

    /// Snapshot of the current entries.
    #[must_use]
    pub fn entries(&self) -> Vec<(ObjRef, ObjRef)>
    {
        self.entries.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.entries.read().is_empty()
    }
}

impl Object for Dict
{
    fn type_name(&self) -> Cow<'_, str>
    {
        Cow::Borrowed("dict")
    }

    fn as_any(&self) -> &dyn Any
    {
        self
    }
}

fn keys_equal(a: &ObjRef, b: &ObjRef) -> bool
{
    use super::downcast;

    if same(a, b) {
        return true;
    }
    if let (Some(a), Some(b)) = (downcast::<Str>(a), downcast::<Str>(b)) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (downcast::<Int>(a), downcast::<Int>(b)) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (downcast::<Bool>(a), downcast::<Bool>(b)) {
        return a == b;
    }
    false
}

/// Mutable unordered collection of distinct objects.
pub struct Set
{
    items: RwLock<Vec<ObjRef>>,
}

impl Set
{
    #[must_use]
    pub fn new(items: Vec<ObjRef>) -> Arc<Self>
    {
        let set = Arc::new(Self {
            items: RwLock::new(Vec::with_capacity(items.len())),
        });
        for item in items {
            set.add(item);
        }
        set
    }

    pub fn add(&self, item: ObjRef)
    {
        let mut items = self.items.write();
        if !items.iter().any(|existing| keys_equal(existing, &item)) {
            items.push(item);
        }
    }

    #[must_use]
    pub fn items(&self) -> Vec<ObjRef>
    {
        self.items.read().clone()
    }
}

impl Object for Set
{
    fn type_name(&self) -> Cow<'_, str>
    {
        Cow::Borrowed("set")
    }

    fn as_any(&self) -> &dyn Any
    {
        self
    }
}

/// Immutable unordered collection.
pub struct FrozenSet
{
    items: Vec<ObjRef>,
}

impl FrozenSet
{
    #[must_use]
    pub fn new(items: Vec<ObjRef>) -> Self
    {
        let mut distinct: Vec<ObjRef> = Vec::with_capacity(items.len());
        for item in items {
            if !distinct.iter().any(|existing| keys_equal(existing, &item)) {
                distinct.push(item);
            }
        }
        Self { items: distinct }
    }

    #[must_use]
    pub fn items(&self) -> &[ObjRef]
    {
        &self.items
    }
}

impl Object for FrozenSet
{
    fn type_name(&self) -> Cow<'_, str>
    {
        Cow::Borrowed("frozenset")
    }

    fn as_any(&self) -> &dyn Any
    {
        self
    }
}

/// An imported module.
///
/// Create through [`ModuleTable::import`](super::ModuleTable::import) so the
/// module is also registered as loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module
{
    name: String,
}

impl Module
{
    pub fn new(name: impl Into<String>) -> Self
    {
        Self { name: name.into() }
    }

    #[must_use]
    pub fn name(&self) -> &str
    {
        &self.name
    }
}

impl Object for Module
{
    fn type_name(&self) -> Cow<'_, str>
    {
        Cow::Borrowed("module")
    }

    fn kind(&self) -> ObjectKind
    {
        ObjectKind::Module
    }

    fn as_any(&self) -> &dyn Any
    {
        self
    }
}

/// A user-defined function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function
{
    qualname: String,
}

impl Function
{
    pub fn new(qualname: impl Into<String>) -> Self
    {
        Self {
            qualname: qualname.into(),
        }
    }

    #[must_use]
    pub fn qualname(&self) -> &str
    {
        &self.qualname
    }
}

impl Object for Function
{
    fn type_name(&self) -> Cow<'_, str>
    {
        Cow::Borrowed("function")
    }

    fn kind(&self) -> ObjectKind
    {
        ObjectKind::Callable
    }

    fn as_any(&self) -> &dyn Any
    {
        self
    }
}

/// A function implemented by the runtime itself (`len`, `print`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinFunction
{
    name: String,
}

impl BuiltinFunction
{
    pub fn new(name: impl Into<String>) -> Self
    {
        Self { name: name.into() }
    }

    #[must_use]
    pub fn name(&self) -> &str
    {
        &self.name
    }
}

impl Object for BuiltinFunction
{
    fn type_name(&self) -> Cow<'_, str>
    {
        Cow::Borrowed("builtin_function_or_method")
    }

    fn kind(&self) -> ObjectKind
    {
        ObjectKind::Callable
    }

    fn as_any(&self) -> &dyn Any
    {
        self
    }
}

/// A type object.
///
/// Class-level attributes live here and are visible through every
/// [`Instance`] of the class.
pub struct Class
{
    module: String,
    name: String,
    attrs: RwLock<Vec<(String, ObjRef)>>,
}

impl Class
{
    /// A class defined by the program's entry module.
    pub fn new(name: impl Into<String>) -> Arc<Self>
    {
        Self::in_module("__main__", name)
    }

    /// A class defined in `module`.
    pub fn in_module(module: impl Into<String>, name: impl Into<String>) -> Arc<Self>
    {
        Arc::new(Self {
            module: module.into(),
            name: name.into(),
            attrs: RwLock::new(Vec::new()),
        })
    }

    /// One of the runtime's own types (`int`, `str`, `object`, ...).
    pub fn builtin(name: impl Into<String>) -> Arc<Self>
    {
        Self::in_module("builtins", name)
    }

    #[must_use]
    pub fn name(&self) -> &str
    {
        &self.name
    }

    #[must_use]
    pub fn module(&self) -> &str
    {
        &self.module
    }

    /// `true` for types defined by the runtime itself.
    #[must_use]
    pub fn is_builtin(&self) -> bool
    {
        self.module == "builtins"
    }

    /// Name as recorded in type tags: bare for builtins and the entry module,
    /// `module.Name` otherwise.
    #[must_use]
    pub fn qualified_name(&self) -> String
    {
        match self.module.as_str() {
            "builtins" | "__main__" => self.name.clone(),
            module => format!("{module}.{}", self.name),
        }
    }

    pub fn set_attr(&self, name: impl Into<String>, value: ObjRef)
    {
        set_named(&self.attrs, name.into(), value);
    }

    #[must_use]
    pub fn attrs(&self) -> Vec<(String, ObjRef)>
    {
        self.attrs.read().clone()
    }
}

impl Object for Class
{
    fn type_name(&self) -> Cow<'_, str>
    {
        Cow::Borrowed("type")
    }

    fn members(&self) -> Vec<(String, ObjRef)>
    {
        self.attrs()
    }

    fn as_any(&self) -> &dyn Any
    {
        self
    }
}

/// An instance of a user-defined class.
pub struct Instance
{
    class: Arc<Class>,
    attrs: RwLock<Vec<(String, ObjRef)>>,
}

impl Instance
{
    #[must_use]
    pub fn new(class: Arc<Class>) -> Arc<Self>
    {
        Arc::new(Self {
            class,
            attrs: RwLock::new(Vec::new()),
        })
    }

    /// Instance of a fresh class named `name` in the entry module.
    pub fn of_class(name: impl Into<String>) -> Arc<Self>
    {
        Self::new(Class::new(name))
    }

    /// Builder-style [`set_attr`](Self::set_attr).
    #[must_use]
    pub fn with_attr(self: Arc<Self>, name: impl Into<String>, value: ObjRef) -> Arc<Self>
    {
        self.set_attr(name, value);
        self
    }

    pub fn set_attr(&self, name: impl Into<String>, value: ObjRef)
    {
        set_named(&self.attrs, name.into(), value);
    }

    #[must_use]
    pub fn class(&self) -> &Arc<Class>
    {
        &self.class
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<ObjRef>
    {
        self.attrs
            .read()
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.clone())
    }
}

impl Object for Instance
{
    fn type_name(&self) -> Cow<'_, str>
    {
        Cow::Owned(self.class.qualified_name())
    }

    /// Instance attributes, then class attributes they do not shadow.
    fn members(&self) -> Vec<(String, ObjRef)>
    {
        let mut members = self.attrs.read().clone();
        for (name, value) in self.class.attrs() {
            if !members.iter().any(|(existing, _)| *existing == name) {
                members.push((name, value));
            }
        }
        members
    }

    fn as_any(&self) -> &dyn Any
    {
        self
    }
}

fn set_named(attrs: &RwLock<Vec<(String, ObjRef)>>, name: String, value: ObjRef)
{
    let mut attrs = attrs.write();
    if let Some(slot) = attrs.iter_mut().find(|(existing, _)| *existing == name) {
        slot.1 = value;
    } else {
        attrs.push((name, value));
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::object::{self, downcast};

    #[test]
    fn test_dict_replaces_equal_keys()
    {
        let dict = Dict::new(vec![(object::string("a"), object::int(1))]);
        dict.insert(object::string("a"), object::int(2));
        assert_eq!(dict.len(), 1);
        let value = dict.get_str("a").unwrap();
        assert_eq!(downcast::<Int>(&value), Some(&Int(2)));
    }

    #[test]
    fn test_set_deduplicates_values()
    {
        let set = Set::new(vec![object::int(1), object::int(1), object::int(2)]);
        assert_eq!(set.items().len(), 2);
    }

    #[test]
    fn test_instance_members_include_class_attributes()
    {
        let class = Class::new("A");
        class.set_attr("shared", object::int(3));
        class.set_attr("x", object::int(0));
        let instance = Instance::new(class).with_attr("x", object::int(142_857));

        let members = instance.members();
        let names: Vec<&str> = members.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["x", "shared"]);
        assert_eq!(downcast::<Int>(&members[0].1), Some(&Int(142_857)));
        assert_eq!(instance.type_name(), "A");
    }

    #[test]
    fn test_qualified_names()
    {
        assert_eq!(Class::builtin("object").qualified_name(), "object");
        assert_eq!(Class::new("A").qualified_name(), "A");
        assert_eq!(Class::in_module("app.models", "User").qualified_name(), "app.models.User");
    }
}
