//! Type model shared by the resolver and the evaluator.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cardinality::CMMode;
use crate::expr::BindingExpr;

/// A module-qualified name such as `std::count` or `default::Person`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct QualifiedName(pub Vec<String>);

impl QualifiedName {
    /// Build a name from `::`-separated text.
    pub fn parse(text: &str) -> Self {
        QualifiedName(text.split("::").map(str::to_string).collect())
    }

    /// Build a name from a module and a local name.
    pub fn new(module: &str, name: &str) -> Self {
        QualifiedName(vec![module.to_string(), name.to_string()])
    }

    /// A name in the standard library module.
    pub fn std(name: &str) -> Self {
        Self::new("std", name)
    }

    /// A name in the default user module.
    pub fn default_module(name: &str) -> Self {
        Self::new("default", name)
    }

    /// Whether the name carries a module prefix.
    pub fn is_qualified(&self) -> bool {
        self.0.len() > 1
    }

    /// The last path segment.
    pub fn local_name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("::"))
    }
}

impl From<String> for QualifiedName {
    fn from(text: String) -> Self {
        QualifiedName::parse(&text)
    }
}

impl From<QualifiedName> for String {
    fn from(name: QualifiedName) -> Self {
        name.to_string()
    }
}

impl From<&str> for QualifiedName {
    fn from(text: &str) -> Self {
        QualifiedName::parse(text)
    }
}

/// Object type: field name to result type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectTp(pub BTreeMap<String, ResultTp>);

impl ObjectTp {
    /// An object type with no fields.
    pub fn empty() -> Self {
        ObjectTp(BTreeMap::new())
    }

    /// Add a field.
    pub fn with_field(mut self, name: impl Into<String>, tp: ResultTp) -> Self {
        self.0.insert(name.into(), tp);
        self
    }

    /// Look up a field's declared type.
    pub fn get(&self, name: &str) -> Option<&ResultTp> {
        self.0.get(name)
    }
}

/// A type paired with its cardinality mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTp {
    pub tp: Tp,
    pub mode: CMMode,
}

impl ResultTp {
    pub fn new(tp: Tp, mode: CMMode) -> Self {
        Self { tp, mode }
    }
}

/// The closed set of types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tp {
    /// A named scalar such as `std::int64`.
    Scalar(QualifiedName),
    /// Homogeneous array.
    Array(Box<Tp>),
    /// Positional tuple.
    UnnamedTuple(Vec<Tp>),
    /// Labelled tuple; label order is significant.
    NamedTuple(Vec<(String, Tp)>),
    /// Structural object type.
    Object(ObjectTp),
    /// Reference to a stored object type by name, with link-property types.
    NamedNominalLink { name: QualifiedName, linkprop: ObjectTp },
    /// Nominal link that also carries the shaped subject type.
    NominalLink {
        subject: ObjectTp,
        name: QualifiedName,
        linkprop: ObjectTp,
    },
    /// A link target annotated with link properties (schema-side).
    LinkProp { subject: Box<Tp>, linkprop: ObjectTp },
    /// Field with a default-value expression over the enclosing object.
    Default { tp: Box<Tp>, default: BindingExpr },
    /// Computed field whose expression has not been type checked.
    UncheckedComputable(BindingExpr),
    /// Computed field with a known type.
    ComputableTp { expr: BindingExpr, tp: Box<Tp> },
    /// Generic placeholder; only valid inside function signatures.
    SomeTp(usize),
    Union(Box<Tp>, Box<Tp>),
    Intersect(Box<Tp>, Box<Tp>),
    /// The gradual type (empty set, `count` argument).
    Any,
}

impl Tp {
    /// A scalar in the standard library module.
    pub fn std(name: &str) -> Tp {
        Tp::Scalar(QualifiedName::std(name))
    }

    pub fn int() -> Tp {
        Tp::std("int64")
    }

    pub fn float() -> Tp {
        Tp::std("float64")
    }

    pub fn str() -> Tp {
        Tp::std("str")
    }

    pub fn bool() -> Tp {
        Tp::std("bool")
    }

    pub fn json() -> Tp {
        Tp::std("json")
    }

    pub fn uuid() -> Tp {
        Tp::std("uuid")
    }

    pub fn datetime() -> Tp {
        Tp::std("datetime")
    }

    pub fn array(elem: Tp) -> Tp {
        Tp::Array(Box::new(elem))
    }

    /// Nominal link with no link properties.
    pub fn named(name: impl Into<QualifiedName>) -> Tp {
        Tp::NamedNominalLink {
            name: name.into(),
            linkprop: ObjectTp::empty(),
        }
    }

    /// Union of two types, collapsing identical operands.
    pub fn union(l: Tp, r: Tp) -> Tp {
        if l == r {
            l
        } else {
            Tp::Union(Box::new(l), Box::new(r))
        }
    }

    /// Whether any generic placeholder occurs in this type.
    pub fn has_placeholder(&self) -> bool {
        match self {
            Tp::SomeTp(_) => true,
            Tp::Array(t) => t.has_placeholder(),
            Tp::UnnamedTuple(ts) => ts.iter().any(Tp::has_placeholder),
            Tp::NamedTuple(ts) => ts.iter().any(|(_, t)| t.has_placeholder()),
            Tp::Object(o) => o.0.values().any(|r| r.tp.has_placeholder()),
            Tp::LinkProp { subject, .. } => subject.has_placeholder(),
            Tp::Default { tp, .. } | Tp::ComputableTp { tp, .. } => tp.has_placeholder(),
            Tp::Union(l, r) | Tp::Intersect(l, r) => l.has_placeholder() || r.has_placeholder(),
            Tp::Scalar(_)
            | Tp::NamedNominalLink { .. }
            | Tp::NominalLink { .. }
            | Tp::UncheckedComputable(_)
            | Tp::Any => false,
        }
    }

    /// Strip schema-side wrappers (defaults, computables, link-prop annotations).
    pub fn storage_tp(&self) -> &Tp {
        match self {
            Tp::Default { tp, .. } | Tp::ComputableTp { tp, .. } => tp.storage_tp(),
            Tp::LinkProp { subject, .. } => subject.storage_tp(),
            other => other,
        }
    }

    /// Whether values of this type are stored as object references.
    pub fn is_link(&self) -> bool {
        matches!(
            self.storage_tp(),
            Tp::NamedNominalLink { .. } | Tp::NominalLink { .. }
        )
    }

    /// Whether this field is computed rather than stored.
    pub fn is_computable(&self) -> bool {
        matches!(self, Tp::UncheckedComputable(_) | Tp::ComputableTp { .. })
    }
}

impl fmt::Display for Tp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tp::Scalar(name) => write!(f, "{}", name),
            Tp::Array(t) => write!(f, "array<{}>", t),
            Tp::UnnamedTuple(ts) => {
                write!(f, "tuple<")?;
                for (i, t) in ts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ">")
            }
            Tp::NamedTuple(ts) => {
                write!(f, "tuple<")?;
                for (i, (l, t)) in ts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", l, t)?;
                }
                write!(f, ">")
            }
            Tp::Object(o) => {
                write!(f, "{{")?;
                for (i, (l, t)) in o.0.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", l, t.tp)?;
                }
                write!(f, "}}")
            }
            Tp::NamedNominalLink { name, .. } | Tp::NominalLink { name, .. } => {
                write!(f, "{}", name)
            }
            Tp::LinkProp { subject, .. } => write!(f, "{}", subject),
            Tp::Default { tp, .. } => write!(f, "{}", tp),
            Tp::UncheckedComputable(_) => write!(f, "<computable>"),
            Tp::ComputableTp { tp, .. } => write!(f, "{}", tp),
            Tp::SomeTp(i) => write!(f, "anytype#{}", i),
            Tp::Union(l, r) => write!(f, "({} | {})", l, r),
            Tp::Intersect(l, r) => write!(f, "({} & {})", l, r),
            Tp::Any => write!(f, "anytype"),
        }
    }
}

/// How a function parameter consumes its argument multiset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamModifier {
    /// One call per value.
    Singleton,
    /// One call per value, or one call with no value when empty.
    Optional,
    /// The whole multiset in a single call.
    SetOf,
}
