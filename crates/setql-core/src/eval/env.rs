//! Evaluation environment.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use setql_model::{BindingExpr, Expr, MultiSetVal};

/// Immutable map from variable name to its multiset.
///
/// Extending an environment returns a new one; the original is never
/// modified.
#[derive(Debug, Clone, Default)]
pub struct Env {
    vars: HashMap<String, Rc<MultiSetVal>>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&MultiSetVal> {
        self.vars.get(name).map(Rc::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// A copy of this environment with `name` bound to `val`.
    pub fn bind(&self, name: impl Into<String>, val: MultiSetVal) -> Env {
        let mut vars = self.vars.clone();
        vars.insert(name.into(), Rc::new(val));
        Env { vars }
    }

    /// Bind the binder's variable to `val`, returning the new environment and
    /// the body to evaluate in it.
    ///
    /// If the variable is already in scope it is renamed to a name that is
    /// neither bound here nor mentioned in the body.
    pub fn extend(&self, binding: &BindingExpr, val: MultiSetVal) -> (Env, Expr) {
        if !self.contains(&binding.var) {
            return (self.bind(binding.var.clone(), val), (*binding.body).clone());
        }
        let mut taken = HashSet::new();
        binding.body.collect_var_names(&mut taken);
        let fresh = (1..)
            .map(|n| format!("{}_{}", binding.var, n))
            .find(|name| !self.contains(name) && !taken.contains(name))
            .unwrap_or_else(|| binding.var.clone());
        let body = binding.body.rename_var(&binding.var, &fresh);
        (self.bind(fresh, val), body)
    }
}
