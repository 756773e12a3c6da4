//! Multiset evaluator.
//!
//! Every expression evaluates to a [`MultiSetVal`]. Mutations are applied to
//! the database as they are evaluated, so later reads in the same statement
//! observe them; committing is left to the caller.

mod call;
mod env;
mod order;

use std::collections::BTreeMap;

use setql_model::{
    cartesian_product, BindingExpr, Expr, Label, Marker, MultiSetVal, ObjectId, QualifiedName,
    Shape, Tp, Val,
};

use crate::config::AmbiguityPolicy;
use crate::error::EvalError;
use crate::storage::{coerce_to_storage, missing_defaults, Database};
use crate::trace::EvalTrace;
use crate::typing::cast::apply_cast;

pub use env::Env;

/// Recursive interpreter over the core expression tree.
pub struct Evaluator<'a, D: Database> {
    db: &'a mut D,
    trace: Option<&'a mut EvalTrace>,
    policy: AmbiguityPolicy,
}

fn singleton(v: Val) -> MultiSetVal {
    MultiSetVal::singleton(v)
}

fn ref_ids(vals: &[Val], what: &str) -> Result<Vec<ObjectId>, EvalError> {
    vals.iter()
        .map(|v| {
            v.ref_id()
                .ok_or_else(|| EvalError::usage(format!("{} expects objects, found {:?}", what, v)))
        })
        .collect()
}

fn tuple_element(v: &Val, label: &str) -> Option<Val> {
    match v {
        Val::UnnamedTuple(vs) => label.parse::<usize>().ok().and_then(|i| vs.get(i).cloned()),
        Val::NamedTuple(vs) => vs
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.clone())
            .or_else(|| {
                label
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| vs.get(i).map(|(_, v)| v.clone()))
            }),
        _ => None,
    }
}

/// Apply `f` to each raw value, keeping the multiset's strategy.
fn map_raw(
    m: MultiSetVal,
    mut f: impl FnMut(Val) -> Result<Val, EvalError>,
) -> Result<MultiSetVal, EvalError> {
    Ok(match m {
        MultiSetVal::Result(vals) => {
            MultiSetVal::Result(vals.into_iter().map(&mut f).collect::<Result<_, _>>()?)
        }
        MultiSetVal::ConditionalDedup(vals) => MultiSetVal::ConditionalDedup(
            vals.into_iter().map(&mut f).collect::<Result<_, _>>()?,
        ),
    })
}

impl<'a, D: Database> Evaluator<'a, D> {
    pub fn new(db: &'a mut D) -> Self {
        Self {
            db,
            trace: None,
            policy: AmbiguityPolicy::default(),
        }
    }

    /// Record every evaluated node into `trace`.
    pub fn with_trace(mut self, trace: &'a mut EvalTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Policy for calls resolved at run time.
    pub fn ambiguity(mut self, policy: AmbiguityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Evaluate `expr` in `env`.
    pub fn eval(&mut self, env: &Env, expr: &Expr) -> Result<MultiSetVal, EvalError> {
        if let Some(trace) = self.trace.as_deref_mut() {
            trace.enter(expr);
        }
        let result = self.eval_inner(env, expr);
        if let Some(trace) = self.trace.as_deref_mut() {
            trace.exit(result.as_ref().ok());
        }
        result
    }

    fn eval_binding(
        &mut self,
        env: &Env,
        binding: &BindingExpr,
        val: MultiSetVal,
    ) -> Result<MultiSetVal, EvalError> {
        let (inner, body) = env.extend(binding, val);
        self.eval(&inner, &body)
    }

    fn eval_all(&mut self, env: &Env, exprs: &[Expr]) -> Result<Vec<Vec<Val>>, EvalError> {
        let mut slots = Vec::with_capacity(exprs.len());
        for e in exprs {
            slots.push(self.eval(env, e)?.into_vals());
        }
        Ok(slots)
    }

    fn qualify_type(&self, name: &QualifiedName) -> Result<QualifiedName, EvalError> {
        self.db
            .schema()
            .resolve_type_name(name)
            .map(|(q, _)| q)
            .ok_or_else(|| EvalError::usage(format!("{} is not an object type", name)))
    }

    fn eval_inner(&mut self, env: &Env, expr: &Expr) -> Result<MultiSetVal, EvalError> {
        match expr {
            Expr::ScalarLit(s) => Ok(singleton(Val::Scalar(s.clone()))),
            Expr::FreeObject => Ok(singleton(Val::bare_ref(ObjectId::fresh()))),
            Expr::ConditionalDedup(inner) => {
                let vals = self.eval(env, inner)?;
                Ok(MultiSetVal::ConditionalDedup(vals.raw_vals().to_vec()))
            }
            Expr::Insert { tname, fields } => self.eval_insert(env, tname, fields),
            Expr::FilterOrder {
                subject,
                filter,
                order: specs,
            } => {
                let subject = self.eval(env, subject)?;
                let mut survivors = Vec::new();
                for v in subject.vals().iter() {
                    if self
                        .eval_binding(env, filter, singleton(v.clone()))?
                        .contains_true()
                    {
                        survivors.push(v.clone());
                    }
                }
                if specs.is_empty() {
                    return Ok(MultiSetVal::Result(survivors));
                }
                let mut keyed = Vec::with_capacity(survivors.len());
                for v in survivors {
                    let mut keys = Vec::with_capacity(specs.len());
                    for spec in specs {
                        let key = self.eval_binding(env, &spec.key, singleton(v.clone()))?;
                        keys.push(key.into_vals());
                    }
                    keyed.push((keys, v));
                }
                keyed.sort_by(|(a, _), (b, _)| order::compare_keys(specs, a, b));
                Ok(keyed.into_iter().map(|(_, v)| v).collect())
            }
            Expr::Shaped { expr: subject, shape } => {
                let subject = self.eval(env, subject)?;
                map_raw(subject, |v| self.apply_shape(env, shape, v))
            }
            Expr::FreeVar(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::usage(format!("unbound variable '{}'", name))),
            Expr::TypeName(name) => {
                let qname = self.qualify_type(name)?;
                let ids = self.db.query_ids_for_a_type(&qname)?;
                Ok(ids.into_iter().map(Val::bare_ref).collect())
            }
            Expr::FunApp {
                fun,
                args,
                kwargs,
                overloading_index,
            } => self.eval_call(env, fun, args, kwargs, *overloading_index),
            Expr::ObjectProj { subject, label } => {
                let subject = self.eval(env, subject)?;
                let mut out = Vec::new();
                for v in subject.vals().iter() {
                    out.extend(self.project(v, label)?.into_vals());
                }
                Ok(MultiSetVal::Result(out))
            }
            Expr::TupleProj { subject, label } => {
                let subject = self.eval(env, subject)?;
                subject
                    .vals()
                    .iter()
                    .map(|v| {
                        tuple_element(v, label).ok_or_else(|| {
                            EvalError::usage(format!("no element '{}' in {:?}", label, v))
                        })
                    })
                    .collect()
            }
            Expr::BackLink { subject, label } => {
                let subject = self.eval(env, subject)?;
                let ids = ref_ids(&subject.vals(), "backlink")?;
                Ok(self.db.reverse_project(&ids, label)?)
            }
            Expr::TpIntersect { subject, tp } => {
                let target = self.qualify_type(tp)?;
                let subject = self.eval(env, subject)?;
                let mut out = Vec::new();
                for v in subject.vals().iter() {
                    let id = v.ref_id().ok_or_else(|| {
                        EvalError::usage(format!(
                            "type intersection expects objects, found {:?}",
                            v
                        ))
                    })?;
                    let actual = self.db.type_of(id)?;
                    if self.db.schema().is_nominal_subtype(&actual, &target) {
                        out.push(v.clone());
                    }
                }
                Ok(MultiSetVal::Result(out))
            }
            Expr::TypeCast { tp, .. } => Err(EvalError::internal(format!(
                "cast to {} reached evaluation without being resolved",
                tp
            ))),
            Expr::CheckedTypeCast {
                cast_tp,
                cast_spec,
                arg,
            } => {
                let arg = self.eval(env, arg)?;
                arg.vals()
                    .iter()
                    .map(|v| apply_cast(*cast_spec, cast_tp, v))
                    .collect()
            }
            Expr::UnnamedTuple(elems) => {
                let slots = self.eval_all(env, elems)?;
                Ok(cartesian_product(&slots)
                    .into_iter()
                    .map(Val::UnnamedTuple)
                    .collect())
            }
            Expr::NamedTuple(elems) => {
                let mut slots = Vec::with_capacity(elems.len());
                for (_, e) in elems {
                    slots.push(self.eval(env, e)?.into_vals());
                }
                Ok(cartesian_product(&slots)
                    .into_iter()
                    .map(|row| {
                        Val::NamedTuple(
                            elems
                                .iter()
                                .map(|(l, _)| l.clone())
                                .zip(row)
                                .collect(),
                        )
                    })
                    .collect())
            }
            Expr::Union(l, r) => {
                let mut out = self.eval(env, l)?.into_vals();
                out.extend(self.eval(env, r)?.into_vals());
                Ok(MultiSetVal::Result(out))
            }
            Expr::Array(elems) => {
                let slots = self.eval_all(env, elems)?;
                Ok(cartesian_product(&slots)
                    .into_iter()
                    .map(Val::Array)
                    .collect())
            }
            Expr::Delete(subject) => {
                let subject = self.eval(env, subject)?;
                for id in ref_ids(&subject.vals(), "delete")? {
                    self.db.delete(id)?;
                }
                Ok(subject)
            }
            Expr::Update { subject, shape } => self.eval_update(env, subject, shape),
            Expr::MultiSet(elems) => Ok(self.eval_all(env, elems)?.into_iter().flatten().collect()),
            Expr::With { bound, next } => {
                let bound = self.eval(env, bound)?;
                self.eval_binding(env, next, bound)
            }
            Expr::For { bound, next } => {
                let bound = self.eval(env, bound)?;
                let mut out = Vec::new();
                for v in bound.vals().iter() {
                    out.extend(self.eval_binding(env, next, singleton(v.clone()))?.into_vals());
                }
                Ok(MultiSetVal::Result(out))
            }
            Expr::OptionalFor { bound, next } => {
                let bound = self.eval(env, bound)?;
                if bound.is_empty() {
                    return self.eval_binding(env, next, MultiSetVal::empty());
                }
                let mut out = Vec::new();
                for v in bound.vals().iter() {
                    out.extend(self.eval_binding(env, next, singleton(v.clone()))?.into_vals());
                }
                Ok(MultiSetVal::Result(out))
            }
            Expr::IfElse {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.eval(env, condition)?;
                let mut out = Vec::new();
                for c in condition.vals().iter() {
                    let branch = match c.as_bool() {
                        Some(true) => then_branch,
                        Some(false) => else_branch,
                        None => {
                            return Err(EvalError::usage(format!(
                                "condition must be a boolean, found {:?}",
                                c
                            )))
                        }
                    };
                    out.extend(self.eval(env, branch)?.into_vals());
                }
                Ok(MultiSetVal::Result(out))
            }
            Expr::OffsetLimit {
                subject,
                offset,
                limit,
            } => {
                let subject = self.eval(env, subject)?;
                let offset = match offset {
                    Some(e) => Some(self.eval(env, e)?),
                    None => None,
                };
                let limit = match limit {
                    Some(e) => Some(self.eval(env, e)?),
                    None => None,
                };
                let offset = order::slice_bound(offset, "OFFSET")?;
                let limit = order::slice_bound(limit, "LIMIT")?;
                Ok(MultiSetVal::Result(order::offset_limit(
                    subject.into_vals(),
                    offset,
                    limit,
                )))
            }
            Expr::Subquery(inner) | Expr::Detached(inner) => self.eval(env, inner),
            Expr::LinkPropProj { subject, linkprop } => {
                let subject = self.eval(env, subject)?;
                let label = Label::LinkProp(linkprop.clone());
                let mut out = Vec::new();
                for v in subject.raw_vals() {
                    let props = match v {
                        Val::Ref { obj, .. } => obj.get(&label),
                        _ => None,
                    };
                    let props = props.ok_or_else(|| {
                        EvalError::usage(format!("no link property '@{}' on {:?}", linkprop, v))
                    })?;
                    out.extend(props.vals().iter().cloned());
                }
                Ok(MultiSetVal::Result(out))
            }
        }
    }

    fn eval_insert(
        &mut self,
        env: &Env,
        tname: &QualifiedName,
        fields: &[(String, Expr)],
    ) -> Result<MultiSetVal, EvalError> {
        let (qname, obj_tp) = self
            .db
            .schema()
            .resolve_type_name(tname)
            .map(|(q, tp)| (q, tp.clone()))
            .ok_or_else(|| {
                EvalError::usage(format!("cannot insert into {}: not an object type", tname))
            })?;
        let id = self.db.insert(&qname)?;

        let mut values = BTreeMap::new();
        for (label, e) in fields {
            values.insert(label.clone(), self.eval(env, e)?);
        }
        let stored = coerce_to_storage(&qname, &obj_tp, values)?;
        let defaults = missing_defaults(&obj_tp, &stored);
        self.db.update(id, stored)?;

        let this = singleton(Val::bare_ref(id));
        for (name, default) in defaults {
            let v = self.eval_binding(&Env::new(), &default, this.clone())?;
            let stored = coerce_to_storage(&qname, &obj_tp, BTreeMap::from([(name, v)]))?;
            self.db.update(id, stored)?;
        }
        Ok(this)
    }

    fn eval_update(
        &mut self,
        env: &Env,
        subject: &Expr,
        shape: &Shape,
    ) -> Result<MultiSetVal, EvalError> {
        let subject = self.eval(env, subject)?;
        let mut out = Vec::new();
        for v in subject.vals().iter() {
            let id = v
                .ref_id()
                .ok_or_else(|| EvalError::usage(format!("update expects objects, found {:?}", v)))?;
            let updated = self.apply_shape(env, shape, v.clone())?;
            let mut fields = BTreeMap::new();
            if let Val::Ref { obj, .. } = &updated {
                for (label, _) in &shape.fields {
                    if let (Label::Str(name), Some(vals)) = (label, obj.get(label)) {
                        fields.insert(name.clone(), vals.clone());
                    }
                }
            }
            let tname = self.db.type_of(id)?;
            let obj_tp = self
                .db
                .schema()
                .types
                .get(&tname)
                .cloned()
                .ok_or_else(|| {
                    EvalError::internal(format!("stored type {} is not in the schema", tname))
                })?;
            let stored = coerce_to_storage(&tname, &obj_tp, fields)?;
            self.db.update(id, stored)?;
            out.push(updated);
        }
        Ok(MultiSetVal::Result(out))
    }

    fn apply_shape(&mut self, env: &Env, shape: &Shape, v: Val) -> Result<Val, EvalError> {
        let Val::Ref { id, obj } = v else {
            return Err(EvalError::usage(format!(
                "cannot apply a shape to non-object value {:?}",
                v
            )));
        };
        let current = singleton(Val::Ref {
            id,
            obj: obj.clone(),
        });
        let mut shaped = obj.into_invisible();
        for (label, binding) in &shape.fields {
            let vals = self.eval_binding(env, binding, current.clone())?;
            shaped.insert(label.clone(), Marker::Visible, vals);
        }
        Ok(Val::Ref { id, obj: shaped })
    }

    /// Project `label` from one value.
    fn project(&mut self, v: &Val, label: &str) -> Result<MultiSetVal, EvalError> {
        match v {
            Val::NamedTuple(_) | Val::UnnamedTuple(_) => tuple_element(v, label)
                .map(singleton)
                .ok_or_else(|| EvalError::usage(format!("no element '{}' in {:?}", label, v))),
            Val::Ref { id, obj } => {
                if let Some(vals) = obj.get(&Label::Str(label.to_string())) {
                    return Ok(vals.clone());
                }
                if label == "id" {
                    return Ok(singleton(Val::uuid(*id)));
                }
                let tname = self.db.type_of(*id)?;
                let computable = self
                    .db
                    .schema()
                    .types
                    .get(&tname)
                    .and_then(|tp| tp.get(label))
                    .and_then(|field| match &field.tp {
                        Tp::UncheckedComputable(expr) | Tp::ComputableTp { expr, .. } => {
                            Some(expr.clone())
                        }
                        _ => None,
                    });
                match computable {
                    Some(binding) => {
                        self.eval_binding(&Env::new(), &binding, singleton(Val::bare_ref(*id)))
                    }
                    None => Ok(self.db.project(*id, label)?),
                }
            }
            other => Err(EvalError::usage(format!(
                "cannot project '{}' from {:?}",
                label, other
            ))),
        }
    }
}
