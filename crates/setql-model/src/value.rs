//! Runtime values.
//!
//! Every expression evaluates to a [`MultiSetVal`] of these values. Object
//! references carry an opaque [`ObjectId`] plus the fields a query has
//! computed for them so far; equality of references for deduplication is by
//! identity only.

use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

use crate::multiset::MultiSetVal;
use crate::types::QualifiedName;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Allocate a new identity. Identities are never reused within a process.
    pub fn fresh() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "00000000-0000-0000-0000-{:012x}", self.0)
    }
}

/// Host-level payload of a scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Json(serde_json::Value),
    /// An object identity surfaced as a `std::uuid` scalar.
    Id(ObjectId),
}

/// A scalar value tagged with its scalar type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarVal {
    pub tp: QualifiedName,
    pub lit: Literal,
}

/// Field label inside an object value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    /// Ordinary field.
    Str(String),
    /// Link property (`@name`).
    LinkProp(String),
}

impl Label {
    pub fn str(name: impl Into<String>) -> Self {
        Label::Str(name.into())
    }

    pub fn link_prop(name: impl Into<String>) -> Self {
        Label::LinkProp(name.into())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Str(s) => write!(f, "{}", s),
            Label::LinkProp(s) => write!(f, "@{}", s),
        }
    }
}

/// Whether a field is surfaced by default projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Marker {
    Visible,
    Invisible,
}

/// Fields computed for an object reference, in the order they were added.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectVal(pub Vec<(Label, Marker, MultiSetVal)>);

impl ObjectVal {
    pub fn empty() -> Self {
        ObjectVal(Vec::new())
    }

    /// Add or replace a field. A replaced field keeps its position.
    pub fn with(mut self, label: Label, marker: Marker, vals: MultiSetVal) -> Self {
        self.insert(label, marker, vals);
        self
    }

    pub fn insert(&mut self, label: Label, marker: Marker, vals: MultiSetVal) {
        match self.0.iter_mut().find(|(l, _, _)| *l == label) {
            Some(entry) => {
                entry.1 = marker;
                entry.2 = vals;
            }
            None => self.0.push((label, marker, vals)),
        }
    }

    pub fn get(&self, label: &Label) -> Option<&MultiSetVal> {
        self.0.iter().find(|(l, _, _)| l == label).map(|(_, _, v)| v)
    }

    /// Labels of the visible fields, in insertion order.
    pub fn visible_labels(&self) -> impl Iterator<Item = &Label> {
        self.0
            .iter()
            .filter(|(_, m, _)| *m == Marker::Visible)
            .map(|(l, _, _)| l)
    }

    /// Copy of this object with every field marked invisible.
    pub fn into_invisible(self) -> Self {
        ObjectVal(
            self.0
                .into_iter()
                .map(|(l, _, v)| (l, Marker::Invisible, v))
                .collect(),
        )
    }
}

/// The closed set of runtime values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Val {
    Scalar(ScalarVal),
    Array(Vec<Val>),
    NamedTuple(Vec<(String, Val)>),
    UnnamedTuple(Vec<Val>),
    Ref { id: ObjectId, obj: ObjectVal },
}

impl Val {
    pub fn scalar(tp: QualifiedName, lit: Literal) -> Val {
        Val::Scalar(ScalarVal { tp, lit })
    }

    pub fn bool(b: bool) -> Val {
        Val::scalar(QualifiedName::std("bool"), Literal::Bool(b))
    }

    pub fn int(i: i64) -> Val {
        Val::scalar(QualifiedName::std("int64"), Literal::Int(i))
    }

    pub fn float(f: f64) -> Val {
        Val::scalar(QualifiedName::std("float64"), Literal::Float(f))
    }

    pub fn str(s: impl Into<String>) -> Val {
        Val::scalar(QualifiedName::std("str"), Literal::Str(s.into()))
    }

    pub fn json(v: serde_json::Value) -> Val {
        Val::scalar(QualifiedName::std("json"), Literal::Json(v))
    }

    pub fn uuid(id: ObjectId) -> Val {
        Val::scalar(QualifiedName::std("uuid"), Literal::Id(id))
    }

    /// A reference with no computed fields.
    pub fn bare_ref(id: ObjectId) -> Val {
        Val::Ref {
            id,
            obj: ObjectVal::empty(),
        }
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Val::Ref { .. })
    }

    pub fn ref_id(&self) -> Option<ObjectId> {
        match self {
            Val::Ref { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Val::Scalar(ScalarVal {
                lit: Literal::Bool(b),
                ..
            }) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Val::Scalar(ScalarVal {
                lit: Literal::Int(i),
                ..
            }) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Val::Scalar(ScalarVal {
                lit: Literal::Float(f),
                ..
            }) => Some(*f),
            Val::Scalar(ScalarVal {
                lit: Literal::Int(i),
                ..
            }) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::Scalar(ScalarVal {
                lit: Literal::Str(s),
                ..
            }) => Some(s),
            _ => None,
        }
    }

    /// Query-level equality: references by identity, numbers across int and
    /// float, everything else structurally.
    pub fn equivalent(&self, other: &Val) -> bool {
        self.total_cmp(other) == Ordering::Equal
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Val::Scalar(_) => 0,
            Val::Array(_) => 1,
            Val::NamedTuple(_) => 2,
            Val::UnnamedTuple(_) => 3,
            Val::Ref { .. } => 4,
        }
    }

    /// Total order used by ORDER BY and by comparison operators.
    pub fn total_cmp(&self, other: &Val) -> Ordering {
        match (self, other) {
            (Val::Scalar(a), Val::Scalar(b)) => compare_literals(&a.lit, &b.lit),
            (Val::Array(a), Val::Array(b)) | (Val::UnnamedTuple(a), Val::UnnamedTuple(b)) => {
                compare_seq(a.iter(), b.iter())
            }
            (Val::NamedTuple(a), Val::NamedTuple(b)) => {
                compare_seq(a.iter().map(|(_, v)| v), b.iter().map(|(_, v)| v))
            }
            (Val::Ref { id: a, .. }, Val::Ref { id: b, .. }) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }
}

fn literal_rank(lit: &Literal) -> u8 {
    match lit {
        Literal::Bool(_) => 0,
        Literal::Int(_) | Literal::Float(_) => 1,
        Literal::Str(_) => 2,
        Literal::Json(_) => 3,
        Literal::Id(_) => 4,
    }
}

fn compare_literals(a: &Literal, b: &Literal) -> Ordering {
    match (a, b) {
        (Literal::Bool(x), Literal::Bool(y)) => x.cmp(y),
        (Literal::Int(x), Literal::Int(y)) => x.cmp(y),
        (Literal::Int(x), Literal::Float(y)) => (*x as f64).total_cmp(y),
        (Literal::Float(x), Literal::Int(y)) => x.total_cmp(&(*y as f64)),
        (Literal::Float(x), Literal::Float(y)) => x.total_cmp(y),
        (Literal::Str(x), Literal::Str(y)) => x.cmp(y),
        (Literal::Json(x), Literal::Json(y)) => x.to_string().cmp(&y.to_string()),
        (Literal::Id(x), Literal::Id(y)) => x.cmp(y),
        _ => literal_rank(a).cmp(&literal_rank(b)),
    }
}

fn compare_seq<'a>(
    mut a: impl Iterator<Item = &'a Val>,
    mut b: impl Iterator<Item = &'a Val>,
) -> Ordering {
    loop {
        match (a.next(), b.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match x.total_cmp(y) {
                Ordering::Equal => continue,
                ord => return ord,
            },
        }
    }
}

impl From<bool> for ScalarVal {
    fn from(v: bool) -> Self {
        ScalarVal {
            tp: QualifiedName::std("bool"),
            lit: Literal::Bool(v),
        }
    }
}

impl From<i64> for ScalarVal {
    fn from(v: i64) -> Self {
        ScalarVal {
            tp: QualifiedName::std("int64"),
            lit: Literal::Int(v),
        }
    }
}

impl From<f64> for ScalarVal {
    fn from(v: f64) -> Self {
        ScalarVal {
            tp: QualifiedName::std("float64"),
            lit: Literal::Float(v),
        }
    }
}

impl From<&str> for ScalarVal {
    fn from(v: &str) -> Self {
        ScalarVal {
            tp: QualifiedName::std("str"),
            lit: Literal::Str(v.to_string()),
        }
    }
}

impl From<String> for ScalarVal {
    fn from(v: String) -> Self {
        ScalarVal {
            tp: QualifiedName::std("str"),
            lit: Literal::Str(v),
        }
    }
}

impl From<bool> for Val {
    fn from(v: bool) -> Self {
        Val::Scalar(v.into())
    }
}

impl From<i64> for Val {
    fn from(v: i64) -> Self {
        Val::Scalar(v.into())
    }
}

impl From<f64> for Val {
    fn from(v: f64) -> Self {
        Val::Scalar(v.into())
    }
}

impl From<&str> for Val {
    fn from(v: &str) -> Self {
        Val::Scalar(v.into())
    }
}

impl From<String> for Val {
    fn from(v: String) -> Self {
        Val::Scalar(v.into())
    }
}
