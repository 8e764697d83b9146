//! Supports for the runtime's built-in types.

use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value as Json;

use crate::object::{
    downcast, Bool, BuiltinFunction, Bytes, Class, Dict, Float, FrozenSet, Int, List, Module, NoneType, ObjRef, Set,
    Str, Tuple,
};
use crate::redaction::RedactionPolicy;
use crate::types::{EncodedRecord, ObjectId};
use crate::value::Value;

use super::{Dumped, Loaded, NotImplemented, PartialGraph, Pending, TypeMatch, TypeSupport};

/// Functions the runtime provides without an import.
static BUILTIN_FUNCTIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "__build_class__",
        "__import__",
        "abs",
        "aiter",
        "all",
        "anext",
        "any",
        "ascii",
        "bin",
        "breakpoint",
        "callable",
        "chr",
        "compile",
        "delattr",
        "dir",
        "divmod",
        "eval",
        "exec",
        "format",
        "getattr",
        "globals",
        "hasattr",
        "hash",
        "hex",
        "id",
        "input",
        "isinstance",
        "issubclass",
        "iter",
        "len",
        "locals",
        "max",
        "min",
        "next",
        "oct",
        "open",
        "ord",
        "pow",
        "print",
        "repr",
        "round",
        "setattr",
        "sorted",
        "sum",
        "vars",
    ]
    .into_iter()
    .collect()
});

/// Types the runtime provides without an import.
static BUILTIN_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "ArithmeticError",
        "AssertionError",
        "AttributeError",
        "BaseException",
        "Exception",
        "ImportError",
        "IndexError",
        "KeyError",
        "LookupError",
        "NameError",
        "NotImplementedError",
        "OSError",
        "RuntimeError",
        "StopIteration",
        "TypeError",
        "ValueError",
        "ZeroDivisionError",
        "bool",
        "bytearray",
        "bytes",
        "classmethod",
        "complex",
        "dict",
        "enumerate",
        "filter",
        "float",
        "frozenset",
        "int",
        "list",
        "map",
        "memoryview",
        "object",
        "property",
        "range",
        "reversed",
        "set",
        "slice",
        "staticmethod",
        "str",
        "super",
        "tuple",
        "type",
        "zip",
    ]
    .into_iter()
    .collect()
});

/// `true` if `name` is one of the runtime's builtin functions.
#[must_use]
pub fn is_builtin_function(name: &str) -> bool
{
    BUILTIN_FUNCTIONS.contains(name)
}

/// `true` if `name` is one of the runtime's builtin types.
#[must_use]
pub fn is_builtin_type(name: &str) -> bool
{
    BUILTIN_TYPES.contains(name)
}

fn concrete<T: crate::object::Object>(obj: &ObjRef) -> Result<&T, NotImplemented>
{
    downcast::<T>(obj).ok_or(NotImplemented)
}

fn ids_of(items: &[ObjRef]) -> Vec<ObjectId>
{
    items.iter().map(ObjectId::of).collect()
}

pub struct NoneSupport;

impl TypeSupport for NoneSupport
{
    fn wire_name(&self) -> &str
    {
        "NoneType"
    }

    fn matcher(&self) -> TypeMatch
    {
        TypeMatch::of::<NoneType>()
    }

    fn dump(&self, _obj: &ObjRef) -> Result<Dumped, NotImplemented>
    {
        Ok(Dumped::leaf(EncodedRecord::tag("NoneType")))
    }

    fn load(&self, _record: &EncodedRecord, _graph: &PartialGraph<'_>) -> Result<Loaded, NotImplemented>
    {
        Ok(Loaded::Ready(Value::None))
    }
}

pub struct BoolSupport;

impl TypeSupport for BoolSupport
{
    fn wire_name(&self) -> &str
    {
        "bool"
    }

    fn matcher(&self) -> TypeMatch
    {
        TypeMatch::of::<Bool>()
    }

    fn dump(&self, obj: &ObjRef) -> Result<Dumped, NotImplemented>
    {
        let Bool(value) = concrete::<Bool>(obj)?;
        Ok(Dumped::leaf(EncodedRecord::scalar("bool", *value)))
    }

    fn load(&self, record: &EncodedRecord, _graph: &PartialGraph<'_>) -> Result<Loaded, NotImplemented>
    {
        let value = record.value.as_ref().and_then(Json::as_bool).ok_or(NotImplemented)?;
        Ok(Loaded::Ready(Value::Bool(value)))
    }
}

pub struct IntSupport;

impl TypeSupport for IntSupport
{
    fn wire_name(&self) -> &str
    {
        "int"
    }

    fn matcher(&self) -> TypeMatch
    {
        TypeMatch::of::<Int>()
    }

    fn dump(&self, obj: &ObjRef) -> Result<Dumped, NotImplemented>
    {
        let Int(value) = concrete::<Int>(obj)?;
        Ok(Dumped::leaf(EncodedRecord::scalar("int", *value)))
    }

    fn load(&self, record: &EncodedRecord, _graph: &PartialGraph<'_>) -> Result<Loaded, NotImplemented>
    {
        let value = record.value.as_ref().and_then(Json::as_i64).ok_or(NotImplemented)?;
        Ok(Loaded::Ready(Value::Int(value)))
    }
}

/// Floats are JSON numbers; NaN and the infinities, which JSON cannot hold,
/// are written as the strings `"nan"`, `"inf"` and `"-inf"`.
pub struct FloatSupport;

impl TypeSupport for FloatSupport
{
    fn wire_name(&self) -> &str
    {
        "float"
    }

    fn matcher(&self) -> TypeMatch
    {
        TypeMatch::of::<Float>()
    }

    fn dump(&self, obj: &ObjRef) -> Result<Dumped, NotImplemented>
    {
        let Float(value) = *concrete::<Float>(obj)?;
        let payload = match serde_json::Number::from_f64(value) {
            Some(number) => Json::Number(number),
            None if value.is_nan() => Json::from("nan"),
            None if value > 0.0 => Json::from("inf"),
            None => Json::from("-inf"),
        };
        Ok(Dumped::leaf(EncodedRecord::scalar("float", payload)))
    }

    fn load(&self, record: &EncodedRecord, _graph: &PartialGraph<'_>) -> Result<Loaded, NotImplemented>
    {
        let value = match record.value.as_ref() {
            Some(Json::Number(number)) => number.as_f64(),
            Some(Json::String(text)) => match text.as_str() {
                "nan" => Some(f64::NAN),
                "inf" => Some(f64::INFINITY),
                "-inf" => Some(f64::NEG_INFINITY),
                _ => None,
            },
            _ => None,
        };
        value.map(|value| Loaded::Ready(Value::Float(value))).ok_or(NotImplemented)
    }
}

/// Strings, passed through the redaction policy before encoding.
pub struct StrSupport
{
    redaction: Arc<RedactionPolicy>,
}

impl StrSupport
{
    #[must_use]
    pub fn new(redaction: Arc<RedactionPolicy>) -> Self
    {
        Self { redaction }
    }
}

impl TypeSupport for StrSupport
{
    fn wire_name(&self) -> &str
    {
        "str"
    }

    fn matcher(&self) -> TypeMatch
    {
        TypeMatch::of::<Str>()
    }

    fn dump(&self, obj: &ObjRef) -> Result<Dumped, NotImplemented>
    {
        let Str(value) = concrete::<Str>(obj)?;
        let value = self.redaction.redact(value);
        Ok(Dumped::leaf(EncodedRecord::scalar("str", value.into_owned())))
    }

    fn load(&self, record: &EncodedRecord, _graph: &PartialGraph<'_>) -> Result<Loaded, NotImplemented>
    {
        let value = record.str_value().ok_or(NotImplemented)?;
        Ok(Loaded::Ready(Value::Str(value.to_string())))
    }
}

/// Bytes, as a lowercase hex string.
pub struct BytesSupport;

impl TypeSupport for BytesSupport
{
    fn wire_name(&self) -> &str
    {
        "bytes"
    }

    fn matcher(&self) -> TypeMatch
    {
        TypeMatch::of::<Bytes>()
    }

    fn dump(&self, obj: &ObjRef) -> Result<Dumped, NotImplemented>
    {
        let Bytes(value) = concrete::<Bytes>(obj)?;
        Ok(Dumped::leaf(EncodedRecord::scalar("bytes", hex::encode(value))))
    }

    fn load(&self, record: &EncodedRecord, _graph: &PartialGraph<'_>) -> Result<Loaded, NotImplemented>
    {
        let payload = record.str_value().ok_or(NotImplemented)?;
        let bytes = hex::decode(payload).map_err(|_| NotImplemented)?;
        Ok(Loaded::Ready(Value::Bytes(bytes)))
    }
}

/// Lists are created right away and shared while their elements resolve.
pub struct ListSupport;

impl TypeSupport for ListSupport
{
    fn wire_name(&self) -> &str
    {
        "list"
    }

    fn matcher(&self) -> TypeMatch
    {
        TypeMatch::of::<List>()
    }

    fn dump(&self, obj: &ObjRef) -> Result<Dumped, NotImplemented>
    {
        let items = concrete::<List>(obj)?.items();
        let ids = ids_of(&items);
        Ok(Dumped::new(EncodedRecord::sequence("list", &ids), items))
    }

    fn load(&self, record: &EncodedRecord, graph: &PartialGraph<'_>) -> Result<Loaded, NotImplemented>
    {
        let ids = record.sequence_ids().ok_or(NotImplemented)?;
        let pending = graph.missing(&ids);
        Ok(Loaded::partial(Value::List(ids), pending))
    }

    fn reload(&self, _value: &mut Value, record: &EncodedRecord, graph: &PartialGraph<'_>) -> Result<Pending, NotImplemented>
    {
        let ids = record.sequence_ids().ok_or(NotImplemented)?;
        Ok(graph.missing(&ids))
    }
}

/// Tuples only come into existence once every element has.
pub struct TupleSupport;

impl TypeSupport for TupleSupport
{
    fn wire_name(&self) -> &str
    {
        "tuple"
    }

    fn matcher(&self) -> TypeMatch
    {
        TypeMatch::of::<Tuple>()
    }

    fn dump(&self, obj: &ObjRef) -> Result<Dumped, NotImplemented>
    {
        let items = concrete::<Tuple>(obj)?.items().to_vec();
        let ids = ids_of(&items);
        Ok(Dumped::new(EncodedRecord::sequence("tuple", &ids), items))
    }

    fn load(&self, record: &EncodedRecord, graph: &PartialGraph<'_>) -> Result<Loaded, NotImplemented>
    {
        let ids = record.sequence_ids().ok_or(NotImplemented)?;
        let pending = graph.missing(&ids);
        if pending.is_empty() {
            Ok(Loaded::Ready(Value::Tuple(ids)))
        } else {
            Ok(Loaded::NotReady { pending })
        }
    }
}

/// Dicts start with the entries whose key and value are both resolved and
/// gain the rest on reload, always in recorded order.
pub struct DictSupport;

impl DictSupport
{
    fn fill(pairs: &[(ObjectId, ObjectId)], graph: &PartialGraph<'_>) -> (Vec<(ObjectId, ObjectId)>, Pending)
    {
        let mut ready = Vec::with_capacity(pairs.len());
        let mut pending = Pending::new();
        for (key, value) in pairs {
            let key_ready = graph.contains(key);
            let value_ready = graph.contains(value);
            if key_ready && value_ready {
                ready.push((key.clone(), value.clone()));
                continue;
            }
            if !key_ready {
                pending.push(key.clone());
            }
            if !value_ready {
                pending.push(value.clone());
            }
        }
        (ready, pending)
    }
}

impl TypeSupport for DictSupport
{
    fn wire_name(&self) -> &str
    {
        "dict"
    }

    fn matcher(&self) -> TypeMatch
    {
        TypeMatch::of::<Dict>()
    }

    fn dump(&self, obj: &ObjRef) -> Result<Dumped, NotImplemented>
    {
        let entries = concrete::<Dict>(obj)?.entries();
        let ids: Vec<(ObjectId, ObjectId)> = entries
            .iter()
            .map(|(key, value)| (ObjectId::of(key), ObjectId::of(value)))
            .collect();
        let record = EncodedRecord::mapping("dict", ids.iter().map(|(key, value)| (key, value)));
        let children = entries.into_iter().flat_map(|(key, value)| [key, value]).collect();
        Ok(Dumped::new(record, children))
    }

    fn load(&self, record: &EncodedRecord, graph: &PartialGraph<'_>) -> Result<Loaded, NotImplemented>
    {
        let pairs = record.mapping_ids().ok_or(NotImplemented)?;
        let (ready, pending) = Self::fill(&pairs, graph);
        Ok(Loaded::partial(Value::Dict(ready), pending))
    }

    fn reload(&self, value: &mut Value, record: &EncodedRecord, graph: &PartialGraph<'_>) -> Result<Pending, NotImplemented>
    {
        let Value::Dict(entries) = value else {
            return Err(NotImplemented);
        };
        let pairs = record.mapping_ids().ok_or(NotImplemented)?;
        let (ready, pending) = Self::fill(&pairs, graph);
        *entries = ready;
        Ok(pending)
    }
}

/// Sets start with their resolved members and gain the rest on reload.
pub struct SetSupport;

impl TypeSupport for SetSupport
{
    fn wire_name(&self) -> &str
    {
        "set"
    }

    fn matcher(&self) -> TypeMatch
    {
        TypeMatch::of::<Set>()
    }

    fn dump(&self, obj: &ObjRef) -> Result<Dumped, NotImplemented>
    {
        let items = concrete::<Set>(obj)?.items();
        let ids = ids_of(&items);
        Ok(Dumped::new(EncodedRecord::sequence("set", &ids), items))
    }

    fn load(&self, record: &EncodedRecord, graph: &PartialGraph<'_>) -> Result<Loaded, NotImplemented>
    {
        let ids = record.sequence_ids().ok_or(NotImplemented)?;
        let pending = graph.missing(&ids);
        let ready = ids.into_iter().filter(|id| graph.contains(id)).collect();
        Ok(Loaded::partial(Value::Set(ready), pending))
    }

    fn reload(&self, value: &mut Value, record: &EncodedRecord, graph: &PartialGraph<'_>) -> Result<Pending, NotImplemented>
    {
        let Value::Set(members) = value else {
            return Err(NotImplemented);
        };
        let ids = record.sequence_ids().ok_or(NotImplemented)?;
        let pending = graph.missing(&ids);
        *members = ids.into_iter().filter(|id| graph.contains(id)).collect();
        Ok(pending)
    }
}

/// Frozensets, like tuples, wait for every member.
pub struct FrozenSetSupport;

impl TypeSupport for FrozenSetSupport
{
    fn wire_name(&self) -> &str
    {
        "frozenset"
    }

    fn matcher(&self) -> TypeMatch
    {
        TypeMatch::of::<FrozenSet>()
    }

    fn dump(&self, obj: &ObjRef) -> Result<Dumped, NotImplemented>
    {
        let items = concrete::<FrozenSet>(obj)?.items().to_vec();
        let ids = ids_of(&items);
        Ok(Dumped::new(EncodedRecord::sequence("frozenset", &ids), items))
    }

    fn load(&self, record: &EncodedRecord, graph: &PartialGraph<'_>) -> Result<Loaded, NotImplemented>
    {
        let ids = record.sequence_ids().ok_or(NotImplemented)?;
        let pending = graph.missing(&ids);
        if pending.is_empty() {
            Ok(Loaded::Ready(Value::FrozenSet(ids)))
        } else {
            Ok(Loaded::NotReady { pending })
        }
    }
}

/// Modules, by name.
pub struct ModuleSupport;

impl TypeSupport for ModuleSupport
{
    fn wire_name(&self) -> &str
    {
        "module"
    }

    fn matcher(&self) -> TypeMatch
    {
        TypeMatch::of::<Module>()
    }

    fn dump(&self, obj: &ObjRef) -> Result<Dumped, NotImplemented>
    {
        let module = concrete::<Module>(obj)?;
        Ok(Dumped::leaf(EncodedRecord::scalar("module", module.name())))
    }

    fn load(&self, record: &EncodedRecord, _graph: &PartialGraph<'_>) -> Result<Loaded, NotImplemented>
    {
        let name = record.str_value().ok_or(NotImplemented)?;
        Ok(Loaded::Ready(Value::Module(name.to_string())))
    }
}

/// Builtin functions by name. Anything not in the builtin table declines.
pub struct BuiltinFunctionSupport;

impl TypeSupport for BuiltinFunctionSupport
{
    fn wire_name(&self) -> &str
    {
        "builtin_function"
    }

    fn matcher(&self) -> TypeMatch
    {
        TypeMatch::of::<BuiltinFunction>()
    }

    fn dump(&self, obj: &ObjRef) -> Result<Dumped, NotImplemented>
    {
        let function = concrete::<BuiltinFunction>(obj)?;
        if !is_builtin_function(function.name()) {
            return Err(NotImplemented);
        }
        Ok(Dumped::leaf(EncodedRecord::scalar("builtin_function", function.name())))
    }

    fn load(&self, record: &EncodedRecord, _graph: &PartialGraph<'_>) -> Result<Loaded, NotImplemented>
    {
        match record.str_value() {
            Some(name) if is_builtin_function(name) => Ok(Loaded::Ready(Value::BuiltinFunction(name.to_string()))),
            _ => Err(NotImplemented),
        }
    }
}

/// Builtin type objects by name. User classes decline and are walked
/// generically.
pub struct TypeObjectSupport;

impl TypeSupport for TypeObjectSupport
{
    fn wire_name(&self) -> &str
    {
        "type"
    }

    fn matcher(&self) -> TypeMatch
    {
        TypeMatch::of::<Class>()
    }

    fn dump(&self, obj: &ObjRef) -> Result<Dumped, NotImplemented>
    {
        let class = concrete::<Class>(obj)?;
        if !class.is_builtin() || !is_builtin_type(class.name()) {
            return Err(NotImplemented);
        }
        Ok(Dumped::leaf(EncodedRecord::scalar("type", class.name())))
    }

    fn load(&self, record: &EncodedRecord, _graph: &PartialGraph<'_>) -> Result<Loaded, NotImplemented>
    {
        match record.str_value() {
            Some(name) if is_builtin_type(name) => Ok(Loaded::Ready(Value::Type(name.to_string()))),
            _ => Err(NotImplemented),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::object;
    use crate::redaction::RedactionPolicy;
    use crate::support::TypeRegistry;

    fn resolved(ids: &[&ObjectId]) -> HashSet<ObjectId>
    {
        ids.iter().map(|id| (*id).clone()).collect()
    }

    #[test]
    fn test_bytes_hex_payload()
    {
        let obj = object::bytes(vec![0x00, 0xab, 0x10]);
        let dumped = BytesSupport.dump(&obj).unwrap();
        assert_eq!(dumped.record.str_value(), Some("00ab10"));

        let empty = HashSet::new();
        let loaded = BytesSupport.load(&dumped.record, &PartialGraph::new(&empty)).unwrap();
        assert!(matches!(loaded, Loaded::Ready(Value::Bytes(ref b)) if b == &[0x00, 0xab, 0x10]));
    }

    #[test]
    fn test_malformed_bytes_fall_back_to_proxy()
    {
        let registry = TypeRegistry::with_builtins(Arc::new(RedactionPolicy::disabled()));
        let empty = HashSet::new();
        for payload in ["+f+f", "abc", "zz", "0x10"] {
            let record = EncodedRecord::scalar("bytes", payload);
            assert!(BytesSupport.load(&record, &PartialGraph::new(&empty)).is_err(), "{payload}");
            let loaded = registry.load(&record, &PartialGraph::new(&empty));
            assert!(
                matches!(loaded, Loaded::Ready(Value::Proxy(ref proxy)) if proxy.type_tag() == "bytes"),
                "{payload}"
            );
        }
    }

    #[test]
    fn test_float_non_finite()
    {
        let obj = object::float(f64::NEG_INFINITY);
        let dumped = FloatSupport.dump(&obj).unwrap();
        assert_eq!(dumped.record.str_value(), Some("-inf"));

        let empty = HashSet::new();
        let loaded = FloatSupport.load(&dumped.record, &PartialGraph::new(&empty)).unwrap();
        assert!(matches!(loaded, Loaded::Ready(Value::Float(v)) if v == f64::NEG_INFINITY));
    }

    #[test]
    fn test_tuple_waits_for_children()
    {
        let a = ObjectId::from("1");
        let b = ObjectId::from("2");
        let record = EncodedRecord::sequence("tuple", [&a, &b]);

        let some = resolved(&[&a]);
        match TupleSupport.load(&record, &PartialGraph::new(&some)).unwrap() {
            Loaded::NotReady { pending } => assert_eq!(pending.as_slice(), [b.clone()]),
            other => panic!("unexpected {other:?}"),
        }

        let all = resolved(&[&a, &b]);
        let loaded = TupleSupport.load(&record, &PartialGraph::new(&all)).unwrap();
        assert!(matches!(loaded, Loaded::Ready(Value::Tuple(ids)) if ids == vec![a.clone(), b.clone()]));
    }

    #[test]
    fn test_dict_backfills_in_recorded_order()
    {
        let ids: Vec<ObjectId> = ["k1", "v1", "k2", "v2"].into_iter().map(ObjectId::from).collect();
        let record = EncodedRecord::mapping("dict", [(&ids[0], &ids[1]), (&ids[2], &ids[3])]);

        let partial = resolved(&[&ids[2], &ids[3]]);
        let Loaded::Partial { mut value, pending } = DictSupport.load(&record, &PartialGraph::new(&partial)).unwrap()
        else {
            panic!("expected a partial dict");
        };
        assert_eq!(value, Value::Dict(vec![(ids[2].clone(), ids[3].clone())]));
        assert_eq!(pending.len(), 2);

        let all = resolved(&[&ids[0], &ids[1], &ids[2], &ids[3]]);
        let pending = DictSupport.reload(&mut value, &record, &PartialGraph::new(&all)).unwrap();
        assert!(pending.is_empty());
        assert_eq!(
            value,
            Value::Dict(vec![(ids[0].clone(), ids[1].clone()), (ids[2].clone(), ids[3].clone())])
        );
    }

    #[test]
    fn test_builtin_function_declines_unknown_names()
    {
        let len: ObjRef = Arc::new(BuiltinFunction::new("len"));
        assert!(BuiltinFunctionSupport.dump(&len).is_ok());
        let custom: ObjRef = Arc::new(BuiltinFunction::new("_private_helper"));
        assert_eq!(BuiltinFunctionSupport.dump(&custom).err(), Some(NotImplemented));
    }

    #[test]
    fn test_type_declines_user_classes()
    {
        let int_type: ObjRef = Class::builtin("int");
        let dumped = TypeObjectSupport.dump(&int_type).unwrap();
        assert_eq!(dumped.record.str_value(), Some("int"));

        let user: ObjRef = Class::new("int");
        assert!(TypeObjectSupport.dump(&user).is_err());
    }
}
