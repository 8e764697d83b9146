//! Supports for optional standard-library types.
//!
//! These register lazily: their check only yields a type once the owning
//! module is in the program's [`ModuleTable`].

use std::any::TypeId;
use std::sync::Arc;

use crate::object::{downcast, Decimal, ModuleTable, ObjRef};
use crate::types::EncodedRecord;
use crate::value::Value;

use super::{Dumped, Loaded, NotImplemented, PartialGraph, TypeMatch, TypeSupport};

/// `decimal.Decimal`, rebuilt in full from its exact text.
pub struct DecimalSupport
{
    modules: ModuleTable,
}

impl DecimalSupport
{
    #[must_use]
    pub fn new(modules: ModuleTable) -> Self
    {
        Self { modules }
    }
}

impl TypeSupport for DecimalSupport
{
    fn wire_name(&self) -> &str
    {
        "decimal.Decimal"
    }

    fn matcher(&self) -> TypeMatch
    {
        let modules = self.modules.clone();
        TypeMatch::Lazy(Box::new(move || {
            modules.is_loaded("decimal").then(TypeId::of::<Decimal>)
        }))
    }

    fn dump(&self, obj: &ObjRef) -> Result<Dumped, NotImplemented>
    {
        let decimal = downcast::<Decimal>(obj).ok_or(NotImplemented)?;
        Ok(Dumped::leaf(EncodedRecord::scalar("decimal.Decimal", decimal.as_str())))
    }

    fn load(&self, record: &EncodedRecord, _graph: &PartialGraph<'_>) -> Result<Loaded, NotImplemented>
    {
        let text = record.str_value().ok_or(NotImplemented)?;
        let decimal = Decimal::parse(text).map_err(|_| NotImplemented)?;
        Ok(Loaded::Ready(Value::Native(Arc::new(decimal))))
    }
}

#[cfg(test)]
mod tests
{
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_check_follows_module_table()
    {
        let modules = ModuleTable::new();
        let support = DecimalSupport::new(modules.clone());
        let TypeMatch::Lazy(check) = support.matcher() else {
            panic!("decimal support must be lazy");
        };
        assert_eq!(check(), None);
        modules.import("decimal");
        assert_eq!(check(), Some(TypeId::of::<Decimal>()));
    }

    #[test]
    fn test_load_rebuilds_native_value()
    {
        let support = DecimalSupport::new(ModuleTable::new());
        let record = EncodedRecord::scalar("decimal.Decimal", "3.14");
        let empty = HashSet::new();
        let Loaded::Ready(value) = support.load(&record, &PartialGraph::new(&empty)).unwrap() else {
            panic!("expected a ready value");
        };
        assert_eq!(value.downcast_native::<Decimal>().map(Decimal::as_str), Some("3.14"));

        let garbage = EncodedRecord::scalar("decimal.Decimal", "pi");
        assert!(support.load(&garbage, &PartialGraph::new(&empty)).is_err());
    }
}
