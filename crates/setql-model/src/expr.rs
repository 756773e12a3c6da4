//! Core expression tree produced by elaboration.
//!
//! Binders are explicit: every construct that introduces a variable carries a
//! [`BindingExpr`] whose body refers to the variable through
//! [`Expr::FreeVar`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{QualifiedName, Tp};
use crate::value::{Label, ScalarVal};

/// A variable bound over a body expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingExpr {
    pub var: String,
    pub body: Box<Expr>,
}

impl BindingExpr {
    pub fn new(var: impl Into<String>, body: Expr) -> Self {
        Self {
            var: var.into(),
            body: Box::new(body),
        }
    }

    /// Rename free occurrences of `from` in the body. A binder of the same
    /// name shadows the rename.
    pub fn rename_var(&self, from: &str, to: &str) -> BindingExpr {
        if self.var == from {
            self.clone()
        } else {
            BindingExpr {
                var: self.var.clone(),
                body: Box::new(self.body.rename_var(from, to)),
            }
        }
    }
}

/// Field computations applied to an object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Shape {
    pub fields: Vec<(Label, BindingExpr)>,
}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, label: Label, body: BindingExpr) -> Self {
        self.fields.push((label, body));
        self
    }

    pub fn get(&self, label: &Label) -> Option<&BindingExpr> {
        self.fields.iter().find(|(l, _)| l == label).map(|(_, b)| b)
    }

    fn rename_var(&self, from: &str, to: &str) -> Shape {
        Shape {
            fields: self
                .fields
                .iter()
                .map(|(l, b)| (l.clone(), b.rename_var(from, to)))
                .collect(),
        }
    }
}

/// Sort direction of an ORDER BY key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

/// Placement of rows whose ORDER BY key is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmptyOrder {
    EmptyFirst,
    EmptyLast,
}

/// One ORDER BY key, listed in priority order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub key: BindingExpr,
    pub direction: OrderDirection,
    pub empty: EmptyOrder,
}

impl OrderSpec {
    pub fn asc(key: BindingExpr) -> Self {
        Self {
            key,
            direction: OrderDirection::Ascending,
            empty: EmptyOrder::EmptyFirst,
        }
    }

    pub fn desc(key: BindingExpr) -> Self {
        Self {
            key,
            direction: OrderDirection::Descending,
            empty: EmptyOrder::EmptyFirst,
        }
    }

    pub fn empty_last(mut self) -> Self {
        self.empty = EmptyOrder::EmptyLast;
        self
    }
}

/// A cast chosen by the type checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastSpec {
    Identity,
    IntToFloat,
    FloatToInt,
    IntToStr,
    FloatToStr,
    BoolToStr,
    StrToInt,
    StrToFloat,
    StrToBool,
    StrToJson,
    JsonToStr,
    UuidToStr,
}

/// The closed expression grammar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A scalar literal.
    ScalarLit(ScalarVal),
    /// A fresh, unstored object.
    FreeObject,
    ConditionalDedup(Box<Expr>),
    Insert {
        tname: QualifiedName,
        fields: Vec<(String, Expr)>,
    },
    FilterOrder {
        subject: Box<Expr>,
        filter: BindingExpr,
        order: Vec<OrderSpec>,
    },
    Shaped {
        expr: Box<Expr>,
        shape: Shape,
    },
    FreeVar(String),
    /// Scan of every stored object of a type.
    TypeName(QualifiedName),
    FunApp {
        fun: QualifiedName,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
        overloading_index: Option<usize>,
    },
    ObjectProj {
        subject: Box<Expr>,
        label: String,
    },
    TupleProj {
        subject: Box<Expr>,
        label: String,
    },
    BackLink {
        subject: Box<Expr>,
        label: String,
    },
    TpIntersect {
        subject: Box<Expr>,
        tp: QualifiedName,
    },
    /// A cast not yet resolved by the type checker.
    TypeCast {
        tp: Tp,
        arg: Box<Expr>,
    },
    CheckedTypeCast {
        cast_tp: Tp,
        cast_spec: CastSpec,
        arg: Box<Expr>,
    },
    UnnamedTuple(Vec<Expr>),
    NamedTuple(Vec<(String, Expr)>),
    Union(Box<Expr>, Box<Expr>),
    Array(Vec<Expr>),
    Delete(Box<Expr>),
    Update {
        subject: Box<Expr>,
        shape: Shape,
    },
    /// Set literal `{e1, e2, ...}`.
    MultiSet(Vec<Expr>),
    With {
        bound: Box<Expr>,
        next: BindingExpr,
    },
    For {
        bound: Box<Expr>,
        next: BindingExpr,
    },
    OptionalFor {
        bound: Box<Expr>,
        next: BindingExpr,
    },
    IfElse {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    OffsetLimit {
        subject: Box<Expr>,
        offset: Option<Box<Expr>>,
        limit: Option<Box<Expr>>,
    },
    Subquery(Box<Expr>),
    Detached(Box<Expr>),
    LinkPropProj {
        subject: Box<Expr>,
        linkprop: String,
    },
}

fn bx(e: Expr) -> Box<Expr> {
    Box::new(e)
}

impl Expr {
    /// Literal expression for a scalar value.
    pub fn lit(v: impl Into<ScalarVal>) -> Expr {
        Expr::ScalarLit(v.into())
    }

    pub fn var(name: impl Into<String>) -> Expr {
        Expr::FreeVar(name.into())
    }

    pub fn empty_set() -> Expr {
        Expr::MultiSet(Vec::new())
    }

    pub fn type_name(name: impl Into<QualifiedName>) -> Expr {
        Expr::TypeName(name.into())
    }

    /// Unresolved call with positional arguments.
    pub fn call(fun: impl Into<QualifiedName>, args: Vec<Expr>) -> Expr {
        Expr::FunApp {
            fun: fun.into(),
            args,
            kwargs: Vec::new(),
            overloading_index: None,
        }
    }

    pub fn proj(subject: Expr, label: impl Into<String>) -> Expr {
        Expr::ObjectProj {
            subject: bx(subject),
            label: label.into(),
        }
    }

    pub fn tuple_proj(subject: Expr, label: impl Into<String>) -> Expr {
        Expr::TupleProj {
            subject: bx(subject),
            label: label.into(),
        }
    }

    pub fn union(l: Expr, r: Expr) -> Expr {
        Expr::Union(bx(l), bx(r))
    }

    pub fn with(bound: Expr, var: impl Into<String>, body: Expr) -> Expr {
        Expr::With {
            bound: bx(bound),
            next: BindingExpr::new(var, body),
        }
    }

    pub fn for_each(bound: Expr, var: impl Into<String>, body: Expr) -> Expr {
        Expr::For {
            bound: bx(bound),
            next: BindingExpr::new(var, body),
        }
    }

    pub fn if_else(condition: Expr, then_branch: Expr, else_branch: Expr) -> Expr {
        Expr::IfElse {
            condition: bx(condition),
            then_branch: bx(then_branch),
            else_branch: bx(else_branch),
        }
    }

    pub fn shaped(expr: Expr, shape: Shape) -> Expr {
        Expr::Shaped {
            expr: bx(expr),
            shape,
        }
    }

    pub fn filter(subject: Expr, filter: BindingExpr) -> Expr {
        Expr::FilterOrder {
            subject: bx(subject),
            filter,
            order: Vec::new(),
        }
    }

    pub fn offset_limit(subject: Expr, offset: Option<Expr>, limit: Option<Expr>) -> Expr {
        Expr::OffsetLimit {
            subject: bx(subject),
            offset: offset.map(bx),
            limit: limit.map(bx),
        }
    }

    /// Rename free occurrences of the variable `from` to `to`.
    pub fn rename_var(&self, from: &str, to: &str) -> Expr {
        let r = |e: &Expr| bx(e.rename_var(from, to));
        let rv = |es: &[Expr]| es.iter().map(|e| e.rename_var(from, to)).collect::<Vec<_>>();
        let rl = |es: &[(String, Expr)]| {
            es.iter()
                .map(|(l, e)| (l.clone(), e.rename_var(from, to)))
                .collect::<Vec<_>>()
        };
        match self {
            Expr::FreeVar(name) if name == from => Expr::FreeVar(to.to_string()),
            Expr::FreeVar(_) | Expr::ScalarLit(_) | Expr::FreeObject | Expr::TypeName(_) => {
                self.clone()
            }
            Expr::ConditionalDedup(e) => Expr::ConditionalDedup(r(e)),
            Expr::Insert { tname, fields } => Expr::Insert {
                tname: tname.clone(),
                fields: rl(fields),
            },
            Expr::FilterOrder {
                subject,
                filter,
                order,
            } => Expr::FilterOrder {
                subject: r(subject),
                filter: filter.rename_var(from, to),
                order: order
                    .iter()
                    .map(|o| OrderSpec {
                        key: o.key.rename_var(from, to),
                        ..o.clone()
                    })
                    .collect(),
            },
            Expr::Shaped { expr, shape } => Expr::Shaped {
                expr: r(expr),
                shape: shape.rename_var(from, to),
            },
            Expr::FunApp {
                fun,
                args,
                kwargs,
                overloading_index,
            } => Expr::FunApp {
                fun: fun.clone(),
                args: rv(args),
                kwargs: rl(kwargs),
                overloading_index: *overloading_index,
            },
            Expr::ObjectProj { subject, label } => Expr::ObjectProj {
                subject: r(subject),
                label: label.clone(),
            },
            Expr::TupleProj { subject, label } => Expr::TupleProj {
                subject: r(subject),
                label: label.clone(),
            },
            Expr::BackLink { subject, label } => Expr::BackLink {
                subject: r(subject),
                label: label.clone(),
            },
            Expr::TpIntersect { subject, tp } => Expr::TpIntersect {
                subject: r(subject),
                tp: tp.clone(),
            },
            Expr::TypeCast { tp, arg } => Expr::TypeCast {
                tp: tp.clone(),
                arg: r(arg),
            },
            Expr::CheckedTypeCast {
                cast_tp,
                cast_spec,
                arg,
            } => Expr::CheckedTypeCast {
                cast_tp: cast_tp.clone(),
                cast_spec: *cast_spec,
                arg: r(arg),
            },
            Expr::UnnamedTuple(es) => Expr::UnnamedTuple(rv(es)),
            Expr::NamedTuple(es) => Expr::NamedTuple(rl(es)),
            Expr::Union(a, b) => Expr::Union(r(a), r(b)),
            Expr::Array(es) => Expr::Array(rv(es)),
            Expr::Delete(e) => Expr::Delete(r(e)),
            Expr::Update { subject, shape } => Expr::Update {
                subject: r(subject),
                shape: shape.rename_var(from, to),
            },
            Expr::MultiSet(es) => Expr::MultiSet(rv(es)),
            Expr::With { bound, next } => Expr::With {
                bound: r(bound),
                next: next.rename_var(from, to),
            },
            Expr::For { bound, next } => Expr::For {
                bound: r(bound),
                next: next.rename_var(from, to),
            },
            Expr::OptionalFor { bound, next } => Expr::OptionalFor {
                bound: r(bound),
                next: next.rename_var(from, to),
            },
            Expr::IfElse {
                condition,
                then_branch,
                else_branch,
            } => Expr::IfElse {
                condition: r(condition),
                then_branch: r(then_branch),
                else_branch: r(else_branch),
            },
            Expr::OffsetLimit {
                subject,
                offset,
                limit,
            } => Expr::OffsetLimit {
                subject: r(subject),
                offset: offset.as_deref().map(r),
                limit: limit.as_deref().map(r),
            },
            Expr::Subquery(e) => Expr::Subquery(r(e)),
            Expr::Detached(e) => Expr::Detached(r(e)),
            Expr::LinkPropProj { subject, linkprop } => Expr::LinkPropProj {
                subject: r(subject),
                linkprop: linkprop.clone(),
            },
        }
    }

    /// Every variable name mentioned anywhere in the expression, free or
    /// bound.
    pub fn collect_var_names(&self, names: &mut HashSet<String>) {
        let binding = |b: &BindingExpr, names: &mut HashSet<String>| {
            names.insert(b.var.clone());
            b.body.collect_var_names(names);
        };
        match self {
            Expr::FreeVar(name) => {
                names.insert(name.clone());
            }
            Expr::ScalarLit(_) | Expr::FreeObject | Expr::TypeName(_) => {}
            Expr::ConditionalDedup(e)
            | Expr::Delete(e)
            | Expr::Subquery(e)
            | Expr::Detached(e)
            | Expr::ObjectProj { subject: e, .. }
            | Expr::TupleProj { subject: e, .. }
            | Expr::BackLink { subject: e, .. }
            | Expr::TpIntersect { subject: e, .. }
            | Expr::TypeCast { arg: e, .. }
            | Expr::CheckedTypeCast { arg: e, .. }
            | Expr::LinkPropProj { subject: e, .. } => e.collect_var_names(names),
            Expr::Insert { fields, .. } | Expr::NamedTuple(fields) => {
                for (_, e) in fields {
                    e.collect_var_names(names);
                }
            }
            Expr::FilterOrder {
                subject,
                filter,
                order,
            } => {
                subject.collect_var_names(names);
                binding(filter, names);
                for o in order {
                    binding(&o.key, names);
                }
            }
            Expr::Shaped { expr: e, shape } | Expr::Update { subject: e, shape } => {
                e.collect_var_names(names);
                for (_, b) in &shape.fields {
                    binding(b, names);
                }
            }
            Expr::FunApp { args, kwargs, .. } => {
                for e in args {
                    e.collect_var_names(names);
                }
                for (_, e) in kwargs {
                    e.collect_var_names(names);
                }
            }
            Expr::UnnamedTuple(es) | Expr::Array(es) | Expr::MultiSet(es) => {
                for e in es {
                    e.collect_var_names(names);
                }
            }
            Expr::Union(a, b) => {
                a.collect_var_names(names);
                b.collect_var_names(names);
            }
            Expr::With { bound, next }
            | Expr::For { bound, next }
            | Expr::OptionalFor { bound, next } => {
                bound.collect_var_names(names);
                binding(next, names);
            }
            Expr::IfElse {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.collect_var_names(names);
                then_branch.collect_var_names(names);
                else_branch.collect_var_names(names);
            }
            Expr::OffsetLimit {
                subject,
                offset,
                limit,
            } => {
                subject.collect_var_names(names);
                if let Some(o) = offset {
                    o.collect_var_names(names);
                }
                if let Some(l) = limit {
                    l.collect_var_names(names);
                }
            }
        }
    }

    /// Short node-kind name, used in diagnostics and traces.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::ScalarLit(_) => "ScalarLit",
            Expr::FreeObject => "FreeObject",
            Expr::ConditionalDedup(_) => "ConditionalDedup",
            Expr::Insert { .. } => "Insert",
            Expr::FilterOrder { .. } => "FilterOrder",
            Expr::Shaped { .. } => "Shaped",
            Expr::FreeVar(_) => "FreeVar",
            Expr::TypeName(_) => "TypeName",
            Expr::FunApp { .. } => "FunApp",
            Expr::ObjectProj { .. } => "ObjectProj",
            Expr::TupleProj { .. } => "TupleProj",
            Expr::BackLink { .. } => "BackLink",
            Expr::TpIntersect { .. } => "TpIntersect",
            Expr::TypeCast { .. } => "TypeCast",
            Expr::CheckedTypeCast { .. } => "CheckedTypeCast",
            Expr::UnnamedTuple(_) => "UnnamedTuple",
            Expr::NamedTuple(_) => "NamedTuple",
            Expr::Union(_, _) => "Union",
            Expr::Array(_) => "Array",
            Expr::Delete(_) => "Delete",
            Expr::Update { .. } => "Update",
            Expr::MultiSet(_) => "MultiSet",
            Expr::With { .. } => "With",
            Expr::For { .. } => "For",
            Expr::OptionalFor { .. } => "OptionalFor",
            Expr::IfElse { .. } => "IfElse",
            Expr::OffsetLimit { .. } => "OffsetLimit",
            Expr::Subquery(_) => "Subquery",
            Expr::Detached(_) => "Detached",
            Expr::LinkPropProj { .. } => "LinkPropProj",
        }
    }
}
