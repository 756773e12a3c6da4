//! The database schema: object types, functions and nominal subtyping.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use setql_model::{ObjectTp, QualifiedName};

use super::function::FuncDef;
use crate::builtins;
use crate::error::ConfigError;

/// Object types, function overloads and the subtyping relation.
///
/// Type definitions and the subtyping relation are serializable so they can be
/// loaded from an external elaborator; function overloads hold host function
/// pointers and are attached after loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DBSchema {
    /// Object types by qualified name.
    pub types: BTreeMap<QualifiedName, ObjectTp>,

    /// Child type to its direct parents. Must be acyclic.
    #[serde(default)]
    pub subtyping: BTreeMap<QualifiedName, BTreeSet<QualifiedName>>,

    /// Overloads by qualified function name, in declaration order.
    #[serde(skip)]
    pub functions: BTreeMap<QualifiedName, Vec<FuncDef>>,
}

impl DBSchema {
    /// An empty schema with no types and no functions.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty schema with the standard library attached.
    pub fn with_std() -> Self {
        Self::new().attach_std()
    }

    /// Load type definitions from JSON and attach the standard library.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let schema: DBSchema = serde_json::from_str(text)?;
        for (child, parents) in &schema.subtyping {
            for name in std::iter::once(child).chain(parents) {
                if !schema.types.contains_key(name) {
                    return Err(ConfigError::Invalid(format!(
                        "subtyping relation mentions unknown type {}",
                        name
                    )));
                }
            }
        }
        Ok(schema.attach_std())
    }

    /// Register every builtin under `std::`.
    pub fn attach_std(mut self) -> Self {
        for (name, def) in builtins::std_functions() {
            self.functions.entry(name).or_default().push(def);
        }
        self
    }

    /// Add an object type.
    pub fn with_type(mut self, name: impl Into<QualifiedName>, tp: ObjectTp) -> Self {
        self.types.insert(name.into(), tp);
        self
    }

    /// Declare `child` a direct subtype of `parent`.
    pub fn with_subtype(
        mut self,
        child: impl Into<QualifiedName>,
        parent: impl Into<QualifiedName>,
    ) -> Self {
        self.subtyping
            .entry(child.into())
            .or_default()
            .insert(parent.into());
        self
    }

    /// Append an overload. Overloads keep their insertion order.
    pub fn with_function(mut self, name: impl Into<QualifiedName>, def: FuncDef) -> Self {
        self.add_function(name, def);
        self
    }

    /// Append an overload in place.
    pub fn add_function(&mut self, name: impl Into<QualifiedName>, def: FuncDef) {
        self.functions.entry(name.into()).or_default().push(def);
    }

    /// Resolve a possibly unqualified type name. Unqualified names are looked
    /// up in the `default` module.
    pub fn resolve_type_name(&self, name: &QualifiedName) -> Option<(QualifiedName, &ObjectTp)> {
        if let Some(tp) = self.types.get(name) {
            return Some((name.clone(), tp));
        }
        if name.is_qualified() {
            return None;
        }
        let qualified = QualifiedName::default_module(name.local_name());
        self.types.get(&qualified).map(|tp| (qualified, tp))
    }

    /// Resolve a possibly unqualified function name. Unqualified names fall
    /// back to the `std` module, then to `default`.
    pub fn resolve_func_name(&self, name: &QualifiedName) -> Option<(QualifiedName, &[FuncDef])> {
        if let Some(defs) = self.functions.get(name) {
            return Some((name.clone(), defs.as_slice()));
        }
        if name.is_qualified() {
            return None;
        }
        ["std", "default"].iter().find_map(|module| {
            let qualified = QualifiedName::new(module, name.local_name());
            self.functions
                .get(&qualified)
                .map(|defs| (qualified, defs.as_slice()))
        })
    }

    /// Every type that is `name` or a (transitive) subtype of it.
    ///
    /// Worklist over the child-to-parents relation with a seen-set, so
    /// diamonds are visited once.
    pub fn find_all_subtypes(&self, name: &QualifiedName) -> Vec<QualifiedName> {
        let mut seen: Vec<QualifiedName> = Vec::new();
        let mut frontier = vec![name.clone()];
        while let Some(next) = frontier.pop() {
            if seen.contains(&next) {
                continue;
            }
            frontier.extend(
                self.subtyping
                    .iter()
                    .filter(|(_, parents)| parents.contains(&next))
                    .map(|(child, _)| child.clone()),
            );
            seen.push(next);
        }
        seen
    }

    /// Whether `child` is `parent` or declared (transitively) below it.
    pub fn is_nominal_subtype(&self, child: &QualifiedName, parent: &QualifiedName) -> bool {
        if child == parent {
            return true;
        }
        let mut seen = BTreeSet::new();
        let mut frontier = vec![child];
        while let Some(next) = frontier.pop() {
            if !seen.insert(next) {
                continue;
            }
            if let Some(parents) = self.subtyping.get(next) {
                if parents.contains(parent) {
                    return true;
                }
                frontier.extend(parents.iter());
            }
        }
        false
    }

    /// Object types declaring a field named `label`.
    pub fn types_with_field(&self, label: &str) -> Vec<&QualifiedName> {
        self.types
            .iter()
            .filter(|(_, tp)| tp.get(label).is_some())
            .map(|(name, _)| name)
            .collect()
    }
}
