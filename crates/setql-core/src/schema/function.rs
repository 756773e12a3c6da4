//! Function definitions and signatures.

use std::collections::HashMap;
use std::fmt;

use setql_model::{Expr, ParamModifier, ResultTp, Tp, Val};

use crate::error::EvalError;

/// Host implementation of a builtin.
///
/// Receives one value list per parameter (a single value for Singleton, at
/// most one for Optional, the whole multiset for SetOf) and returns the
/// values produced for that row.
pub type BuiltinImpl = fn(&[Vec<Val>]) -> Result<Vec<Val>, EvalError>;

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncParam {
    pub label: String,
    pub modifier: ParamModifier,
    pub tp: Tp,
}

impl FuncParam {
    pub fn new(label: impl Into<String>, modifier: ParamModifier, tp: Tp) -> Self {
        Self {
            label: label.into(),
            modifier,
            tp,
        }
    }

    pub fn singleton(label: impl Into<String>, tp: Tp) -> Self {
        Self::new(label, ParamModifier::Singleton, tp)
    }

    pub fn optional(label: impl Into<String>, tp: Tp) -> Self {
        Self::new(label, ParamModifier::Optional, tp)
    }

    pub fn set_of(label: impl Into<String>, tp: Tp) -> Self {
        Self::new(label, ParamModifier::SetOf, tp)
    }
}

/// Parameter list plus declared result.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncSignature {
    pub params: Vec<FuncParam>,
    pub ret: ResultTp,
}

impl FuncSignature {
    pub fn new(params: Vec<FuncParam>, ret: ResultTp) -> Self {
        Self { params, ret }
    }

    /// Position of the parameter with the given label.
    pub fn position_of(&self, label: &str) -> Option<usize> {
        self.params.iter().position(|p| p.label == label)
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for FuncSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let modifier = match p.modifier {
                ParamModifier::Singleton => "",
                ParamModifier::Optional => "optional ",
                ParamModifier::SetOf => "set of ",
            };
            write!(f, "{}: {}{}", p.label, modifier, p.tp)?;
        }
        write!(f, ") -> {} {}", self.ret.tp, self.ret.mode)
    }
}

/// How a function computes its result.
#[derive(Debug, Clone)]
pub enum FuncImpl {
    Builtin(BuiltinImpl),
    /// Body expression over the parameter labels.
    Defined(Expr),
}

/// One overload of a named function.
#[derive(Debug, Clone)]
pub struct FuncDef {
    pub signature: FuncSignature,
    /// Default expressions for trailing parameters, keyed by label.
    pub defaults: HashMap<String, Expr>,
    pub implementation: FuncImpl,
}

impl FuncDef {
    /// A host-implemented overload.
    pub fn builtin(signature: FuncSignature, implementation: BuiltinImpl) -> Self {
        Self {
            signature,
            defaults: HashMap::new(),
            implementation: FuncImpl::Builtin(implementation),
        }
    }

    /// An overload whose body is a query expression.
    pub fn defined(signature: FuncSignature, body: Expr) -> Self {
        Self {
            signature,
            defaults: HashMap::new(),
            implementation: FuncImpl::Defined(body),
        }
    }

    /// Attach a default expression to a parameter.
    pub fn with_default(mut self, label: impl Into<String>, default: Expr) -> Self {
        self.defaults.insert(label.into(), default);
        self
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.implementation, FuncImpl::Builtin(_))
    }
}
