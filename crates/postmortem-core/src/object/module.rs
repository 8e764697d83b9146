//! Loaded-module table.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Module, ObjRef};

/// The set of modules the captured program has imported.
///
/// Cloning shares the table. Lazy type supports query it to decide whether
/// the type they handle can exist yet.
#[derive(Clone, Default)]
pub struct ModuleTable
{
    modules: Arc<RwLock<HashMap<String, Arc<Module>>>>,
}

impl ModuleTable
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Import `name`, returning the module object.
    ///
    /// Importing the same name twice yields the same object.
    pub fn import(&self, name: &str) -> ObjRef
    {
        let mut modules = self.modules.write();
        modules
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Module::new(name)))
            .clone()
    }

    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool
    {
        self.modules.read().contains_key(name)
    }

    /// Names of every loaded module, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String>
    {
        let mut names: Vec<String> = self.modules.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::object::same;

    #[test]
    fn test_import_is_idempotent()
    {
        let table = ModuleTable::new();
        assert!(!table.is_loaded("decimal"));
        let first = table.import("decimal");
        let second = table.clone().import("decimal");
        assert!(same(&first, &second));
        assert!(table.is_loaded("decimal"));
        assert_eq!(table.names(), vec!["decimal".to_string()]);
    }
}
