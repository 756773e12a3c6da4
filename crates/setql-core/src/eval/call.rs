//! Function application.

use setql_model::{
    BindingExpr, Expr, MultiSetVal, ObjectTp, ParamModifier, QualifiedName, Tp, Val,
};
use tracing::debug;

use super::{Env, Evaluator};
use crate::error::{DatabaseError, EvalError};
use crate::resolver::{choose_overload, match_signature};
use crate::schema::{FuncDef, FuncImpl};
use crate::storage::Database;
use crate::typing::subtype::ground;

/// Cartesian product of per-parameter choices.
fn arg_rows(slots: Vec<Vec<Vec<Val>>>) -> Vec<Vec<Vec<Val>>> {
    let mut rows: Vec<Vec<Vec<Val>>> = vec![Vec::new()];
    for choices in slots {
        let mut next = Vec::with_capacity(rows.len() * choices.len());
        for row in &rows {
            for choice in &choices {
                let mut extended = row.clone();
                extended.push(choice.clone());
                next.push(extended);
            }
        }
        rows = next;
    }
    rows
}

/// Group each argument multiset according to its parameter's modifier.
fn param_choices(modifier: ParamModifier, arg: MultiSetVal) -> Vec<Vec<Val>> {
    let vals = arg.into_vals();
    match modifier {
        ParamModifier::Singleton => vals.into_iter().map(|v| vec![v]).collect(),
        ParamModifier::Optional if vals.is_empty() => vec![Vec::new()],
        ParamModifier::Optional => vals.into_iter().map(|v| vec![v]).collect(),
        ParamModifier::SetOf => vec![vals],
    }
}

fn union_all(tps: impl IntoIterator<Item = Tp>) -> Tp {
    tps.into_iter().reduce(Tp::union).unwrap_or(Tp::Any)
}

impl<'a, D: Database> Evaluator<'a, D> {
    pub(super) fn eval_call(
        &mut self,
        env: &Env,
        fun: &QualifiedName,
        args: &[Expr],
        kwargs: &[(String, Expr)],
        overloading_index: Option<usize>,
    ) -> Result<MultiSetVal, EvalError> {
        let (qname, defs) = self
            .db
            .schema()
            .resolve_func_name(fun)
            .map(|(q, defs)| (q, defs.to_vec()))
            .ok_or_else(|| EvalError::usage(format!("unknown function {}", fun)))?;

        let mut arg_vals = Vec::with_capacity(args.len());
        for arg in args {
            arg_vals.push(self.eval(env, arg)?);
        }

        let (def, aligned) = match overloading_index {
            Some(idx) => {
                let def = defs.get(idx).cloned().ok_or_else(|| {
                    EvalError::internal(format!("{} has no overload #{}", qname, idx))
                })?;
                if !kwargs.is_empty() || arg_vals.len() != def.signature.arity() {
                    return Err(EvalError::internal(format!(
                        "resolved call to {} is not aligned with its signature",
                        qname
                    )));
                }
                (def, arg_vals)
            }
            None => {
                let mut kw_vals = Vec::with_capacity(kwargs.len());
                for (label, arg) in kwargs {
                    kw_vals.push((label.clone(), self.eval(env, arg)?));
                }
                let (idx, aligned) = self.resolve_at_run_time(&qname, &defs, arg_vals, kw_vals)?;
                debug!(function = %qname, overload = idx, "resolved overload at run time");
                (defs[idx].clone(), aligned)
            }
        };
        self.apply(&def, aligned)
    }

    fn resolve_at_run_time(
        &mut self,
        qname: &QualifiedName,
        defs: &[FuncDef],
        positional: Vec<MultiSetVal>,
        keywords: Vec<(String, MultiSetVal)>,
    ) -> Result<(usize, Vec<MultiSetVal>), EvalError> {
        let mut shown = Vec::new();
        for arg in positional.iter().chain(keywords.iter().map(|(_, a)| a)) {
            shown.push(self.runtime_multiset_tp(arg)?);
        }

        let mut matches = Vec::new();
        for (idx, def) in defs.iter().enumerate() {
            let Some(aligned) = self.align_values(def, &positional, &keywords)? else {
                continue;
            };
            let mut tps = Vec::with_capacity(aligned.len());
            for (arg, declared) in &aligned {
                tps.push(match declared {
                    Some(tp) => tp.clone(),
                    None => self.runtime_multiset_tp(arg)?,
                });
            }
            if match_signature(self.db.schema(), &tps, &def.signature).is_some() {
                matches.push((idx, aligned.into_iter().map(|(v, _)| v).collect()));
            }
        }
        choose_overload(qname, defs, &shown, matches, self.policy)
    }

    /// Align values with one overload's parameters. Each entry carries the
    /// declared type when it came from an empty-set default.
    #[allow(clippy::type_complexity)]
    fn align_values(
        &mut self,
        def: &FuncDef,
        positional: &[MultiSetVal],
        keywords: &[(String, MultiSetVal)],
    ) -> Result<Option<Vec<(MultiSetVal, Option<Tp>)>>, EvalError> {
        let sig = &def.signature;
        if positional.len() > sig.arity() {
            return Ok(None);
        }
        if keywords
            .iter()
            .any(|(label, _)| sig.position_of(label).map_or(true, |p| p < positional.len()))
        {
            return Ok(None);
        }
        let mut aligned: Vec<(MultiSetVal, Option<Tp>)> =
            positional.iter().map(|v| (v.clone(), None)).collect();
        for param in &sig.params[positional.len()..] {
            if let Some((_, v)) = keywords.iter().find(|(l, _)| *l == param.label) {
                aligned.push((v.clone(), None));
            } else if let Some(default) = def.defaults.get(&param.label) {
                match default {
                    Expr::MultiSet(elems) if elems.is_empty() => {
                        aligned.push((MultiSetVal::empty(), Some(ground(&param.tp))))
                    }
                    _ => {
                        let v = self.eval(&Env::new(), default)?;
                        aligned.push((v, None));
                    }
                }
            } else {
                return Ok(None);
            }
        }
        Ok(Some(aligned))
    }

    fn runtime_multiset_tp(&self, m: &MultiSetVal) -> Result<Tp, EvalError> {
        let mut tps = Vec::new();
        for v in m.vals().iter() {
            tps.push(self.runtime_tp(v)?);
        }
        Ok(union_all(tps))
    }

    /// The type a value has at run time.
    fn runtime_tp(&self, v: &Val) -> Result<Tp, EvalError> {
        Ok(match v {
            Val::Scalar(s) => Tp::Scalar(s.tp.clone()),
            Val::Array(vs) => {
                let mut tps = Vec::with_capacity(vs.len());
                for v in vs {
                    tps.push(self.runtime_tp(v)?);
                }
                Tp::array(union_all(tps))
            }
            Val::UnnamedTuple(vs) => {
                let mut tps = Vec::with_capacity(vs.len());
                for v in vs {
                    tps.push(self.runtime_tp(v)?);
                }
                Tp::UnnamedTuple(tps)
            }
            Val::NamedTuple(vs) => {
                let mut tps = Vec::with_capacity(vs.len());
                for (l, v) in vs {
                    tps.push((l.clone(), self.runtime_tp(v)?));
                }
                Tp::NamedTuple(tps)
            }
            Val::Ref { id, .. } => match self.db.type_of(*id) {
                Ok(name) => Tp::named(name),
                // Free objects are never stored.
                Err(DatabaseError::UnknownObject(_)) => Tp::Object(ObjectTp::empty()),
                Err(e) => return Err(e.into()),
            },
        })
    }

    fn apply(&mut self, def: &FuncDef, args: Vec<MultiSetVal>) -> Result<MultiSetVal, EvalError> {
        let slots = def
            .signature
            .params
            .iter()
            .zip(args)
            .map(|(param, arg)| param_choices(param.modifier, arg))
            .collect();
        let rows = arg_rows(slots);

        let mut out = Vec::new();
        match &def.implementation {
            FuncImpl::Builtin(f) => {
                for row in rows {
                    out.extend(f(&row)?);
                }
            }
            FuncImpl::Defined(body) => {
                for row in rows {
                    let mut env = Env::new();
                    let mut body = body.clone();
                    for (param, vals) in def.signature.params.iter().zip(row) {
                        let binding = BindingExpr::new(param.label.clone(), body);
                        let (next_env, next_body) = env.extend(&binding, MultiSetVal::from(vals));
                        env = next_env;
                        body = next_body;
                    }
                    out.extend(self.eval(&env, &body)?.into_vals());
                }
            }
        }
        Ok(MultiSetVal::Result(out))
    }
}
