//! Type and cardinality synthesis over the core expression tree.
//!
//! Synthesis also rewrites the tree: calls get a qualified name and an
//! overload index, type names are qualified, and casts are resolved against
//! the cast table.

use std::collections::HashMap;

use setql_model::{
    BindingExpr, CMMode, Cardinal, Expr, Label, ObjectTp, OrderSpec, QualifiedName, ResultTp,
    Shape, Tp, CARD_ANY, CARD_AT_MOST_ONE, CARD_ONE, CARD_ZERO,
};

use super::cast::find_cast;
use super::subtype::{is_subtype, refine_link_props};
use crate::config::AmbiguityPolicy;
use crate::error::EvalError;
use crate::resolver;
use crate::schema::DBSchema;

/// Typing context: the schema plus the types of variables in scope.
#[derive(Debug, Clone)]
pub struct TcCtx<'s> {
    pub schema: &'s DBSchema,
    pub policy: AmbiguityPolicy,
    vars: HashMap<String, ResultTp>,
}

impl<'s> TcCtx<'s> {
    pub fn new(schema: &'s DBSchema, policy: AmbiguityPolicy) -> Self {
        Self {
            schema,
            policy,
            vars: HashMap::new(),
        }
    }

    /// A copy of this context with `var` bound. Inner bindings shadow outer.
    pub fn bind(&self, var: &str, tp: ResultTp) -> Self {
        let mut next = self.clone();
        next.vars.insert(var.to_string(), tp);
        next
    }

    pub fn lookup(&self, var: &str) -> Option<&ResultTp> {
        self.vars.get(var)
    }
}

/// Type check a closed statement.
pub fn check_expr(
    schema: &DBSchema,
    policy: AmbiguityPolicy,
    expr: &Expr,
) -> Result<(ResultTp, Expr), EvalError> {
    synthesize(&TcCtx::new(schema, policy), expr)
}

fn bx(e: Expr) -> Box<Expr> {
    Box::new(e)
}

fn synth_binding(
    ctx: &TcCtx<'_>,
    binding: &BindingExpr,
    var_tp: ResultTp,
) -> Result<(ResultTp, BindingExpr), EvalError> {
    let inner = ctx.bind(&binding.var, var_tp);
    let (rt, body) = synthesize(&inner, &binding.body)?;
    Ok((rt, BindingExpr::new(binding.var.clone(), body)))
}

fn synth_shape(
    ctx: &TcCtx<'_>,
    shape: &Shape,
    subject_tp: &Tp,
) -> Result<(ObjectTp, ObjectTp, Shape), EvalError> {
    let mut fields = ObjectTp::empty();
    let mut linkprops = ObjectTp::empty();
    let mut checked = Shape::new();
    for (label, binding) in &shape.fields {
        let (rt, binding) =
            synth_binding(ctx, binding, ResultTp::new(subject_tp.clone(), CARD_ONE))?;
        match label {
            Label::Str(name) => fields = fields.with_field(name.clone(), rt),
            Label::LinkProp(name) => linkprops = linkprops.with_field(name.clone(), rt),
        }
        checked = checked.with_field(label.clone(), binding);
    }
    Ok((fields, linkprops, checked))
}

fn merge(mut base: ObjectTp, extra: ObjectTp) -> ObjectTp {
    base.0.extend(extra.0);
    base
}

fn shaped_tp(tp: &Tp, fields: ObjectTp, linkprops: ObjectTp) -> Tp {
    match tp {
        Tp::NamedNominalLink { name, linkprop } => Tp::NominalLink {
            subject: fields,
            name: name.clone(),
            linkprop: merge(linkprop.clone(), linkprops),
        },
        Tp::NominalLink {
            subject,
            name,
            linkprop,
        } => Tp::NominalLink {
            subject: merge(subject.clone(), fields),
            name: name.clone(),
            linkprop: merge(linkprop.clone(), linkprops),
        },
        Tp::Object(o) => Tp::Object(merge(o.clone(), fields)),
        other => other.clone(),
    }
}

/// The result type a stored field exposes when projected.
fn field_result_tp(field: &ResultTp) -> ResultTp {
    let tp = match &field.tp {
        Tp::LinkProp { subject, linkprop } => match subject.as_ref() {
            Tp::NamedNominalLink { name, .. } => Tp::NamedNominalLink {
                name: name.clone(),
                linkprop: linkprop.clone(),
            },
            other => other.clone(),
        },
        Tp::Default { tp, .. } | Tp::ComputableTp { tp, .. } => {
            return field_result_tp(&ResultTp::new((**tp).clone(), field.mode))
        }
        Tp::UncheckedComputable(_) => Tp::Any,
        other => other.clone(),
    };
    ResultTp::new(tp, field.mode)
}

/// Type of `label` on values of type `tp`.
pub fn project_tp(schema: &DBSchema, tp: &Tp, label: &str) -> Option<ResultTp> {
    if label == "id" && tp.is_link() {
        return Some(ResultTp::new(Tp::uuid(), CARD_ONE));
    }
    match tp {
        Tp::Any => Some(ResultTp::new(Tp::Any, CARD_ANY)),
        Tp::NamedNominalLink { name, .. } => schema
            .types
            .get(name)
            .and_then(|o| o.get(label))
            .map(field_result_tp),
        Tp::NominalLink { subject, name, .. } => subject
            .get(label)
            .map(field_result_tp)
            .or_else(|| project_tp(schema, &Tp::named(name.clone()), label)),
        Tp::Object(o) => o.get(label).map(field_result_tp),
        Tp::UnnamedTuple(_) | Tp::NamedTuple(_) => {
            tuple_proj_tp(tp, label).map(|t| ResultTp::new(t, CARD_ONE))
        }
        Tp::Union(l, r) => match (project_tp(schema, l, label), project_tp(schema, r, label)) {
            (Some(a), Some(b)) => Some(ResultTp::new(Tp::union(a.tp, b.tp), a.mode.widen(b.mode))),
            (Some(a), None) | (None, Some(a)) => Some(a),
            (None, None) => None,
        },
        Tp::Intersect(l, r) => {
            project_tp(schema, l, label).or_else(|| project_tp(schema, r, label))
        }
        Tp::LinkProp { subject, .. }
        | Tp::Default { tp: subject, .. }
        | Tp::ComputableTp { tp: subject, .. } => project_tp(schema, subject, label),
        _ => None,
    }
}

fn tuple_proj_tp(tp: &Tp, label: &str) -> Option<Tp> {
    match tp {
        Tp::Any => Some(Tp::Any),
        Tp::UnnamedTuple(ts) => label.parse::<usize>().ok().and_then(|i| ts.get(i).cloned()),
        Tp::NamedTuple(ts) => ts
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, t)| t.clone())
            .or_else(|| {
                label
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| ts.get(i).map(|(_, t)| t.clone()))
            }),
        _ => None,
    }
}

fn linkprop_tp(tp: &Tp, name: &str) -> Option<ResultTp> {
    match tp {
        Tp::Any => Some(ResultTp::new(Tp::Any, CARD_ANY)),
        Tp::NamedNominalLink { linkprop, .. } | Tp::NominalLink { linkprop, .. } => {
            linkprop.get(name).cloned()
        }
        Tp::LinkProp { linkprop, .. } => linkprop.get(name).cloned(),
        Tp::Union(l, r) | Tp::Intersect(l, r) => {
            linkprop_tp(l, name).or_else(|| linkprop_tp(r, name))
        }
        _ => None,
    }
}

fn product<'a>(modes: impl Iterator<Item = &'a CMMode>) -> CMMode {
    modes.fold(CARD_ONE, |acc, m| acc * *m)
}

fn union_all(tps: impl Iterator<Item = Tp>) -> Tp {
    tps.reduce(Tp::union).unwrap_or(Tp::Any)
}

fn expect_subtype(ctx: &TcCtx<'_>, tp: &Tp, expected: &Tp, what: &str) -> Result<(), EvalError> {
    if is_subtype(ctx.schema, tp, expected) {
        Ok(())
    } else {
        Err(EvalError::usage(format!(
            "{} must be of type {}, found {}",
            what, expected, tp
        )))
    }
}

fn resolve_object_type(ctx: &TcCtx<'_>, name: &QualifiedName) -> Result<QualifiedName, EvalError> {
    ctx.schema
        .resolve_type_name(name)
        .map(|(q, _)| q)
        .ok_or_else(|| EvalError::usage(format!("{} is not an object type", name)))
}

/// Synthesize the type and cardinality of `expr`, returning the rewritten
/// expression.
pub fn synthesize(ctx: &TcCtx<'_>, expr: &Expr) -> Result<(ResultTp, Expr), EvalError> {
    let result = match expr {
        Expr::ScalarLit(s) => (ResultTp::new(Tp::Scalar(s.tp.clone()), CARD_ONE), expr.clone()),
        Expr::FreeObject => (
            ResultTp::new(Tp::Object(ObjectTp::empty()), CARD_ONE),
            expr.clone(),
        ),
        Expr::ConditionalDedup(inner) => {
            let (rt, inner) = synthesize(ctx, inner)?;
            (rt, Expr::ConditionalDedup(bx(inner)))
        }
        Expr::Insert { tname, fields } => {
            let (qname, obj_tp) = ctx
                .schema
                .resolve_type_name(tname)
                .ok_or_else(|| {
                    EvalError::usage(format!("cannot insert into {}: not an object type", tname))
                })?;
            let mut checked = Vec::with_capacity(fields.len());
            for (label, value) in fields {
                let declared = obj_tp.get(label).ok_or_else(|| {
                    EvalError::usage(format!("{} has no field '{}'", qname, label))
                })?;
                let (rt, value) = synthesize(ctx, value)?;
                let expected = field_result_tp(declared).tp;
                if !declared.tp.is_computable() {
                    expect_subtype(
                        ctx,
                        &refine_link_props(&rt.tp),
                        &refine_link_props(&expected),
                        &format!("field '{}'", label),
                    )?;
                }
                checked.push((label.clone(), value));
            }
            (
                ResultTp::new(Tp::named(qname.clone()), CARD_ONE),
                Expr::Insert {
                    tname: qname,
                    fields: checked,
                },
            )
        }
        Expr::FilterOrder {
            subject,
            filter,
            order,
        } => {
            let (subject_rt, subject) = synthesize(ctx, subject)?;
            let elem = ResultTp::new(subject_rt.tp.clone(), CARD_ONE);
            let (_, filter) = synth_binding(ctx, filter, elem.clone())?;
            let mut checked_order = Vec::with_capacity(order.len());
            for spec in order {
                let (_, key) = synth_binding(ctx, &spec.key, elem.clone())?;
                checked_order.push(OrderSpec { key, ..spec.clone() });
            }
            (
                ResultTp::new(subject_rt.tp, subject_rt.mode.make_optional()),
                Expr::FilterOrder {
                    subject: bx(subject),
                    filter,
                    order: checked_order,
                },
            )
        }
        Expr::Shaped { expr: subject, shape } => {
            let (subject_rt, subject) = synthesize(ctx, subject)?;
            let (fields, linkprops, shape) = synth_shape(ctx, shape, &subject_rt.tp)?;
            (
                ResultTp::new(shaped_tp(&subject_rt.tp, fields, linkprops), subject_rt.mode),
                Expr::Shaped {
                    expr: bx(subject),
                    shape,
                },
            )
        }
        Expr::FreeVar(name) => {
            let rt = ctx
                .lookup(name)
                .cloned()
                .ok_or_else(|| EvalError::usage(format!("unbound variable '{}'", name)))?;
            (rt, expr.clone())
        }
        Expr::TypeName(name) => {
            let qname = resolve_object_type(ctx, name)?;
            (
                ResultTp::new(Tp::named(qname.clone()), CARD_ANY),
                Expr::TypeName(qname),
            )
        }
        Expr::FunApp {
            fun,
            args,
            kwargs,
            overloading_index,
        } => resolver::resolve_call(ctx, fun, args, kwargs, *overloading_index)?,
        Expr::ObjectProj { subject, label } => {
            let (subject_rt, subject) = synthesize(ctx, subject)?;
            let field = project_tp(ctx.schema, &subject_rt.tp, label).ok_or_else(|| {
                EvalError::usage(format!("type {} has no field '{}'", subject_rt.tp, label))
            })?;
            (
                ResultTp::new(field.tp, subject_rt.mode * field.mode),
                Expr::ObjectProj {
                    subject: bx(subject),
                    label: label.clone(),
                },
            )
        }
        Expr::TupleProj { subject, label } => {
            let (subject_rt, subject) = synthesize(ctx, subject)?;
            let tp = tuple_proj_tp(&subject_rt.tp, label).ok_or_else(|| {
                EvalError::usage(format!("tuple type {} has no element '{}'", subject_rt.tp, label))
            })?;
            (
                ResultTp::new(tp, subject_rt.mode),
                Expr::TupleProj {
                    subject: bx(subject),
                    label: label.clone(),
                },
            )
        }
        Expr::BackLink { subject, label } => {
            let (_, subject) = synthesize(ctx, subject)?;
            let sources: Vec<&QualifiedName> = ctx
                .schema
                .types_with_field(label)
                .into_iter()
                .filter(|name| {
                    ctx.schema
                        .types
                        .get(*name)
                        .and_then(|o| o.get(label))
                        .map_or(false, |f| f.tp.is_link())
                })
                .collect();
            if sources.is_empty() {
                return Err(EvalError::usage(format!("no object type links via '{}'", label)));
            }
            (
                ResultTp::new(
                    union_all(sources.into_iter().map(|n| Tp::named(n.clone()))),
                    CARD_ANY,
                ),
                Expr::BackLink {
                    subject: bx(subject),
                    label: label.clone(),
                },
            )
        }
        Expr::TpIntersect { subject, tp } => {
            let (subject_rt, subject) = synthesize(ctx, subject)?;
            let qname = resolve_object_type(ctx, tp)?;
            (
                ResultTp::new(Tp::named(qname.clone()), subject_rt.mode.make_optional()),
                Expr::TpIntersect {
                    subject: bx(subject),
                    tp: qname,
                },
            )
        }
        Expr::TypeCast { tp, arg } => {
            let (arg_rt, arg) = synthesize(ctx, arg)?;
            let cast_spec = find_cast(ctx.schema, &arg_rt.tp, tp).ok_or_else(|| {
                EvalError::usage(format!("no cast from {} to {}", arg_rt.tp, tp))
            })?;
            (
                ResultTp::new(tp.clone(), arg_rt.mode),
                Expr::CheckedTypeCast {
                    cast_tp: tp.clone(),
                    cast_spec,
                    arg: bx(arg),
                },
            )
        }
        Expr::CheckedTypeCast {
            cast_tp,
            cast_spec,
            arg,
        } => {
            let (arg_rt, arg) = synthesize(ctx, arg)?;
            (
                ResultTp::new(cast_tp.clone(), arg_rt.mode),
                Expr::CheckedTypeCast {
                    cast_tp: cast_tp.clone(),
                    cast_spec: *cast_spec,
                    arg: bx(arg),
                },
            )
        }
        Expr::UnnamedTuple(elems) => {
            let (rts, elems) = synth_all(ctx, elems)?;
            (
                ResultTp::new(
                    Tp::UnnamedTuple(rts.iter().map(|r| r.tp.clone()).collect()),
                    product(rts.iter().map(|r| &r.mode)),
                ),
                Expr::UnnamedTuple(elems),
            )
        }
        Expr::NamedTuple(elems) => {
            let mut tps = Vec::with_capacity(elems.len());
            let mut modes = Vec::with_capacity(elems.len());
            let mut checked = Vec::with_capacity(elems.len());
            for (label, e) in elems {
                let (rt, e) = synthesize(ctx, e)?;
                tps.push((label.clone(), rt.tp));
                modes.push(rt.mode);
                checked.push((label.clone(), e));
            }
            (
                ResultTp::new(Tp::NamedTuple(tps), product(modes.iter())),
                Expr::NamedTuple(checked),
            )
        }
        Expr::Union(l, r) => {
            let (lrt, l) = synthesize(ctx, l)?;
            let (rrt, r) = synthesize(ctx, r)?;
            (
                ResultTp::new(Tp::union(lrt.tp, rrt.tp), lrt.mode + rrt.mode),
                Expr::Union(bx(l), bx(r)),
            )
        }
        Expr::Array(elems) => {
            let (rts, elems) = synth_all(ctx, elems)?;
            (
                ResultTp::new(
                    Tp::array(union_all(rts.iter().map(|r| r.tp.clone()))),
                    product(rts.iter().map(|r| &r.mode)),
                ),
                Expr::Array(elems),
            )
        }
        Expr::Delete(subject) => {
            let (rt, subject) = synthesize(ctx, subject)?;
            (rt, Expr::Delete(bx(subject)))
        }
        Expr::Update { subject, shape } => {
            let (subject_rt, subject) = synthesize(ctx, subject)?;
            let (_, _, shape) = synth_shape(ctx, shape, &subject_rt.tp)?;
            (
                subject_rt,
                Expr::Update {
                    subject: bx(subject),
                    shape,
                },
            )
        }
        Expr::MultiSet(elems) => {
            if elems.is_empty() {
                (ResultTp::new(Tp::Any, CARD_ZERO), expr.clone())
            } else {
                let (rts, elems) = synth_all(ctx, elems)?;
                let mode = rts.iter().map(|r| r.mode).reduce(|a, b| a + b).unwrap_or(CARD_ZERO);
                (
                    ResultTp::new(union_all(rts.into_iter().map(|r| r.tp)), mode),
                    Expr::MultiSet(elems),
                )
            }
        }
        Expr::With { bound, next } => {
            let (bound_rt, bound) = synthesize(ctx, bound)?;
            let (rt, next) = synth_binding(ctx, next, bound_rt)?;
            (rt, Expr::With { bound: bx(bound), next })
        }
        Expr::For { bound, next } => {
            let (bound_rt, bound) = synthesize(ctx, bound)?;
            let (body_rt, next) =
                synth_binding(ctx, next, ResultTp::new(bound_rt.tp, CARD_ONE))?;
            (
                ResultTp::new(body_rt.tp, bound_rt.mode * body_rt.mode),
                Expr::For { bound: bx(bound), next },
            )
        }
        Expr::OptionalFor { bound, next } => {
            let (bound_rt, bound) = synthesize(ctx, bound)?;
            let (body_rt, next) =
                synth_binding(ctx, next, ResultTp::new(bound_rt.tp, CARD_AT_MOST_ONE))?;
            let iterations = CMMode::new(Cardinal::One, bound_rt.mode.upper.max(Cardinal::One));
            (
                ResultTp::new(body_rt.tp, iterations * body_rt.mode),
                Expr::OptionalFor { bound: bx(bound), next },
            )
        }
        Expr::IfElse {
            condition,
            then_branch,
            else_branch,
        } => {
            let (cond_rt, condition) = synthesize(ctx, condition)?;
            expect_subtype(ctx, &cond_rt.tp, &Tp::bool(), "condition")?;
            let (then_rt, then_branch) = synthesize(ctx, then_branch)?;
            let (else_rt, else_branch) = synthesize(ctx, else_branch)?;
            (
                ResultTp::new(
                    Tp::union(then_rt.tp, else_rt.tp),
                    cond_rt.mode * then_rt.mode.widen(else_rt.mode),
                ),
                Expr::IfElse {
                    condition: bx(condition),
                    then_branch: bx(then_branch),
                    else_branch: bx(else_branch),
                },
            )
        }
        Expr::OffsetLimit {
            subject,
            offset,
            limit,
        } => {
            let (subject_rt, subject) = synthesize(ctx, subject)?;
            let check_bound =
                |e: &Option<Box<Expr>>, what: &str| -> Result<Option<Box<Expr>>, EvalError> {
                    match e {
                        Some(e) => {
                            let (rt, e) = synthesize(ctx, e)?;
                            expect_subtype(ctx, &rt.tp, &Tp::std("anyint"), what)?;
                            Ok(Some(bx(e)))
                        }
                        None => Ok(None),
                    }
                };
            let offset = check_bound(offset, "OFFSET")?;
            let limit = check_bound(limit, "LIMIT")?;
            (
                ResultTp::new(subject_rt.tp, subject_rt.mode.make_optional()),
                Expr::OffsetLimit {
                    subject: bx(subject),
                    offset,
                    limit,
                },
            )
        }
        Expr::Subquery(inner) => {
            let (rt, inner) = synthesize(ctx, inner)?;
            (rt, Expr::Subquery(bx(inner)))
        }
        Expr::Detached(inner) => {
            let (rt, inner) = synthesize(ctx, inner)?;
            (rt, Expr::Detached(bx(inner)))
        }
        Expr::LinkPropProj { subject, linkprop } => {
            let (subject_rt, subject) = synthesize(ctx, subject)?;
            let prop = linkprop_tp(&subject_rt.tp, linkprop).ok_or_else(|| {
                EvalError::usage(format!(
                    "type {} has no link property '@{}'",
                    subject_rt.tp, linkprop
                ))
            })?;
            (
                ResultTp::new(prop.tp, subject_rt.mode * prop.mode),
                Expr::LinkPropProj {
                    subject: bx(subject),
                    linkprop: linkprop.clone(),
                },
            )
        }
    };
    Ok(result)
}

fn synth_all(ctx: &TcCtx<'_>, exprs: &[Expr]) -> Result<(Vec<ResultTp>, Vec<Expr>), EvalError> {
    let mut rts = Vec::with_capacity(exprs.len());
    let mut checked = Vec::with_capacity(exprs.len());
    for e in exprs {
        let (rt, e) = synthesize(ctx, e)?;
        rts.push(rt);
        checked.push(e);
    }
    Ok((rts, checked))
}
