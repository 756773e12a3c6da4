//! Overload and cardinality resolution for function calls.
//!
//! A call is matched against every overload of its (resolved) name. Each
//! overload gets its own argument list: positional arguments, then keyword
//! arguments mapped by label, then declared defaults for the remaining
//! parameters. Placeholders are instantiated per overload; the first-found
//! rule applies when several overloads match.

use setql_model::{
    CMMode, Cardinal, Expr, ParamModifier, QualifiedName, ResultTp, Tp, CARD_ONE, CARD_ZERO,
};
use tracing::warn;

use crate::config::AmbiguityPolicy;
use crate::error::EvalError;
use crate::schema::{DBSchema, FuncDef, FuncSignature};
use crate::typing::check::{synthesize, TcCtx};
use crate::typing::subtype::{
    collect_is_subtype_with_instantiation, ground, instantiate, is_subtype, refine_link_props,
    Candidates, Instantiation,
};

/// Pick the binding for one placeholder slot: the first candidate that is a
/// supertype of every other candidate, preferring concrete types over `Any`.
fn choose_slot(schema: &DBSchema, tps: &[Tp]) -> Option<Tp> {
    let covers = |c: &Tp| tps.iter().all(|t| is_subtype(schema, t, c));
    tps.iter()
        .filter(|t| !matches!(t, Tp::Any))
        .find(|c| covers(c))
        .or_else(|| tps.iter().find(|c| covers(c)))
        .cloned()
}

fn instantiate_slots(schema: &DBSchema, candidates: &Candidates) -> Option<Instantiation> {
    let mut mapping = Instantiation::new();
    for (slot, tps) in candidates {
        let chosen = choose_slot(schema, tps).or_else(|| {
            let refined: Vec<Tp> = tps.iter().map(refine_link_props).collect();
            choose_slot(schema, &refined)
        })?;
        mapping.insert(*slot, chosen);
    }
    Some(mapping)
}

fn arg_fits(schema: &DBSchema, syn: &Tp, param: &Tp, mapping: &Instantiation) -> bool {
    let expected = ground(&instantiate(param, mapping));
    is_subtype(schema, syn, &expected)
        || is_subtype(schema, &refine_link_props(syn), &refine_link_props(&expected))
}

/// Match argument types against one signature.
///
/// Returns the instantiated return type on success. `arg_tps` must already
/// be aligned with the signature's parameters.
pub fn match_signature(schema: &DBSchema, arg_tps: &[Tp], sig: &FuncSignature) -> Option<Tp> {
    if arg_tps.len() != sig.arity() {
        return None;
    }
    let mut candidates = Candidates::new();
    for (syn, param) in arg_tps.iter().zip(&sig.params) {
        collect_is_subtype_with_instantiation(schema, syn, &param.tp, &mut candidates);
    }
    let mapping = instantiate_slots(schema, &candidates)?;
    if !arg_tps
        .iter()
        .zip(&sig.params)
        .all(|(syn, param)| arg_fits(schema, syn, &param.tp, &mapping))
    {
        return None;
    }
    Some(ground(&instantiate(&sig.ret.tp, &mapping)))
}

/// Settle the list of matching overloads into one choice.
///
/// `matches` holds `(overload index, payload)` in declaration order.
pub fn choose_overload<T>(
    function: &QualifiedName,
    defs: &[FuncDef],
    arg_tps: &[Tp],
    mut matches: Vec<(usize, T)>,
    policy: AmbiguityPolicy,
) -> Result<(usize, T), EvalError> {
    let overload_error = || EvalError::OverloadResolution {
        function: function.to_string(),
        arg_types: arg_tps.iter().map(Tp::to_string).collect(),
        candidates: defs.iter().map(|d| d.signature.to_string()).collect(),
    };
    match matches.len() {
        0 => Err(overload_error()),
        1 => Ok(matches.remove(0)),
        n => {
            let chosen = matches[0].0;
            warn!(
                function = %function,
                candidates = n,
                chosen,
                "ambiguous call, several overloads match"
            );
            match policy {
                AmbiguityPolicy::PickFirst => Ok(matches.remove(0)),
                AmbiguityPolicy::Reject => Err(overload_error()),
            }
        }
    }
}

/// Result cardinality of a call, given the mode of each aligned argument.
pub fn call_mode(function: &QualifiedName, sig: &FuncSignature, arg_modes: &[CMMode]) -> CMMode {
    if *function == QualifiedName::std("??") && arg_modes.len() == 2 {
        return arg_modes[0].max(arg_modes[1]);
    }
    let per_row = arg_modes
        .iter()
        .zip(&sig.params)
        .map(|(mode, param)| match param.modifier {
            ParamModifier::Singleton | ParamModifier::Optional => *mode,
            ParamModifier::SetOf => CARD_ONE,
        })
        .fold(CARD_ONE, |acc, m| acc * m);
    let mode = per_row * sig.ret.mode;
    if *function == QualifiedName::std("assert_exists") && mode.lower == Cardinal::Zero {
        if let Some(first) = arg_modes.first() {
            return CMMode::new(Cardinal::One, first.upper.max(Cardinal::One));
        }
    }
    mode
}

/// A synthesized call argument.
#[derive(Debug, Clone)]
struct TypedArg {
    rt: ResultTp,
    expr: Expr,
}

/// Align positional, keyword and default arguments with one overload.
///
/// Returns `None` when the call shape cannot fit the overload.
fn align_args(
    ctx: &TcCtx<'_>,
    def: &FuncDef,
    positional: &[TypedArg],
    keywords: &[(String, TypedArg)],
) -> Result<Option<Vec<TypedArg>>, EvalError> {
    let sig = &def.signature;
    if positional.len() > sig.arity() {
        return Ok(None);
    }
    for (label, _) in keywords {
        match sig.position_of(label) {
            Some(pos) if pos >= positional.len() => {}
            _ => return Ok(None),
        }
    }
    let mut aligned = positional.to_vec();
    for param in &sig.params[positional.len()..] {
        if let Some((_, arg)) = keywords.iter().find(|(l, _)| *l == param.label) {
            aligned.push(arg.clone());
        } else if let Some(default) = def.defaults.get(&param.label) {
            let arg = match default {
                Expr::MultiSet(elems) if elems.is_empty() => TypedArg {
                    rt: ResultTp::new(ground(&param.tp), CARD_ZERO),
                    expr: default.clone(),
                },
                _ => {
                    let (rt, expr) = synthesize(ctx, default)?;
                    TypedArg { rt, expr }
                }
            };
            aligned.push(arg);
        } else {
            return Ok(None);
        }
    }
    Ok(Some(aligned))
}

/// Type check a call, choosing an overload and recording it in the
/// rewritten expression.
pub fn resolve_call(
    ctx: &TcCtx<'_>,
    fun: &QualifiedName,
    args: &[Expr],
    kwargs: &[(String, Expr)],
    overloading_index: Option<usize>,
) -> Result<(ResultTp, Expr), EvalError> {
    let (qname, defs) = ctx
        .schema
        .resolve_func_name(fun)
        .ok_or_else(|| EvalError::usage(format!("unknown function {}", fun)))?;

    let mut positional = Vec::with_capacity(args.len());
    for arg in args {
        let (rt, expr) = synthesize(ctx, arg)?;
        positional.push(TypedArg { rt, expr });
    }
    let mut keywords = Vec::with_capacity(kwargs.len());
    for (label, arg) in kwargs {
        let (rt, expr) = synthesize(ctx, arg)?;
        keywords.push((label.clone(), TypedArg { rt, expr }));
    }

    let mut matches = Vec::new();
    for (idx, def) in defs.iter().enumerate() {
        if overloading_index.map_or(false, |fixed| fixed != idx) {
            continue;
        }
        let Some(aligned) = align_args(ctx, def, &positional, &keywords)? else {
            continue;
        };
        let tps: Vec<Tp> = aligned.iter().map(|a| a.rt.tp.clone()).collect();
        if let Some(ret) = match_signature(ctx.schema, &tps, &def.signature) {
            matches.push((idx, (ret, aligned)));
        }
    }

    let shown: Vec<Tp> = positional
        .iter()
        .chain(keywords.iter().map(|(_, a)| a))
        .map(|a| a.rt.tp.clone())
        .collect();
    let (idx, (ret, aligned)) = choose_overload(&qname, defs, &shown, matches, ctx.policy)?;

    let modes: Vec<CMMode> = aligned.iter().map(|a| a.rt.mode).collect();
    let mode = call_mode(&qname, &defs[idx].signature, &modes);
    Ok((
        ResultTp::new(ret, mode),
        Expr::FunApp {
            fun: qname,
            args: aligned.into_iter().map(|a| a.expr).collect(),
            kwargs: Vec::new(),
            overloading_index: Some(idx),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FuncParam;
    use pretty_assertions::assert_eq;
    use setql_model::{ObjectTp, CARD_ANY, CARD_AT_LEAST_ONE, CARD_AT_MOST_ONE};

    fn schema() -> DBSchema {
        DBSchema::with_std()
            .with_type(
                "default::Person",
                ObjectTp::empty().with_field("name", ResultTp::new(Tp::str(), CARD_ONE)),
            )
            .with_type("default::Student", ObjectTp::empty())
            .with_subtype("default::Student", "default::Person")
    }

    fn check(
        schema: &DBSchema,
        policy: AmbiguityPolicy,
        e: &Expr,
    ) -> Result<(ResultTp, Expr), EvalError> {
        synthesize(&TcCtx::new(schema, policy), e)
    }

    #[test]
    fn test_match_signature_instantiates_placeholders() {
        let schema = schema();
        let sig = FuncSignature::new(
            vec![FuncParam::set_of("s", Tp::SomeTp(0))],
            ResultTp::new(Tp::array(Tp::SomeTp(0)), CARD_ONE),
        );
        assert_eq!(
            match_signature(&schema, &[Tp::str()], &sig),
            Some(Tp::array(Tp::str()))
        );
        assert_eq!(
            match_signature(&schema, &[Tp::Any], &sig),
            Some(Tp::array(Tp::Any))
        );
    }

    #[test]
    fn test_placeholder_takes_common_supertype() {
        let schema = schema();
        let sig = FuncSignature::new(
            vec![
                FuncParam::singleton("l", Tp::SomeTp(0)),
                FuncParam::singleton("r", Tp::SomeTp(0)),
            ],
            ResultTp::new(Tp::SomeTp(0), CARD_ONE),
        );
        let ret = match_signature(
            &schema,
            &[Tp::named("default::Student"), Tp::named("default::Person")],
            &sig,
        );
        assert_eq!(ret, Some(Tp::named("default::Person")));
        assert_eq!(match_signature(&schema, &[Tp::int(), Tp::str()], &sig), None);
    }

    #[test]
    fn test_overloads_pick_by_argument_type() {
        let schema = schema();
        let e = Expr::call("+", vec![Expr::lit(1.5f64), Expr::lit(2.0f64)]);
        let (rt, checked) = check(&schema, AmbiguityPolicy::PickFirst, &e).unwrap();
        assert_eq!(rt, ResultTp::new(Tp::float(), CARD_ONE));
        match checked {
            Expr::FunApp {
                fun,
                overloading_index,
                ..
            } => {
                assert_eq!(fun, QualifiedName::std("+"));
                assert_eq!(overloading_index, Some(1));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_no_match_lists_candidates() {
        let schema = schema();
        let e = Expr::call("+", vec![Expr::lit("a"), Expr::lit(1i64)]);
        match check(&schema, AmbiguityPolicy::PickFirst, &e).unwrap_err() {
            EvalError::OverloadResolution {
                function,
                arg_types,
                candidates,
            } => {
                assert_eq!(function, "std::+");
                assert_eq!(arg_types, vec!["std::str".to_string(), "std::int64".to_string()]);
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ambiguity_policy() {
        let sig = || {
            FuncSignature::new(
                vec![FuncParam::singleton("x", Tp::Any)],
                ResultTp::new(Tp::int(), CARD_ONE),
            )
        };
        let schema = schema()
            .with_function("default::f", FuncDef::defined(sig(), Expr::lit(1i64)))
            .with_function("default::f", FuncDef::defined(sig(), Expr::lit(2i64)));
        let e = Expr::call("f", vec![Expr::lit(0i64)]);

        let (_, checked) = check(&schema, AmbiguityPolicy::PickFirst, &e).unwrap();
        assert!(matches!(checked, Expr::FunApp { overloading_index: Some(0), .. }));

        let err = check(&schema, AmbiguityPolicy::Reject, &e).unwrap_err();
        assert!(matches!(err, EvalError::OverloadResolution { .. }));
    }

    #[test]
    fn test_defaults_and_keywords_are_aligned() {
        let schema = schema();
        let e = Expr::call("assert_single", vec![Expr::lit(1i64)]);
        let (rt, checked) = check(&schema, AmbiguityPolicy::PickFirst, &e).unwrap();
        assert_eq!(rt, ResultTp::new(Tp::int(), CARD_AT_MOST_ONE));
        match checked {
            Expr::FunApp { args, kwargs, .. } => {
                assert_eq!(args.len(), 2);
                assert!(kwargs.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }

        let with_kw = Expr::FunApp {
            fun: "assert_single".into(),
            args: vec![Expr::lit(1i64)],
            kwargs: vec![("message".into(), Expr::lit("boom"))],
            overloading_index: None,
        };
        let (_, checked) = check(&schema, AmbiguityPolicy::PickFirst, &with_kw).unwrap();
        match checked {
            Expr::FunApp { args, .. } => assert_eq!(args[1], Expr::lit("boom")),
            other => panic!("unexpected {:?}", other),
        }

        let clash = Expr::FunApp {
            fun: "assert_single".into(),
            args: vec![Expr::lit(1i64)],
            kwargs: vec![("input".into(), Expr::lit(2i64))],
            overloading_index: None,
        };
        assert!(check(&schema, AmbiguityPolicy::PickFirst, &clash).is_err());
    }

    #[test]
    fn test_call_modes() {
        let schema = schema();
        let many = Expr::union(Expr::lit(1i64), Expr::lit(2i64));

        let count_many = Expr::call("count", vec![many.clone()]);
        let (rt, _) = check(&schema, AmbiguityPolicy::PickFirst, &count_many).unwrap();
        assert_eq!(rt.mode, CARD_ONE);

        let (rt, _) = check(
            &schema,
            AmbiguityPolicy::PickFirst,
            &Expr::call("+", vec![many.clone(), Expr::lit(1i64)]),
        )
        .unwrap();
        assert_eq!(rt.mode, CARD_AT_LEAST_ONE);

        let (rt, _) = check(
            &schema,
            AmbiguityPolicy::PickFirst,
            &Expr::call("??", vec![Expr::empty_set(), many.clone()]),
        )
        .unwrap();
        assert_eq!(rt.mode, CARD_AT_LEAST_ONE);

        let (rt, _) = check(
            &schema,
            AmbiguityPolicy::PickFirst,
            &Expr::call("assert_exists", vec![Expr::type_name("Person")]),
        )
        .unwrap();
        assert_eq!(rt.mode, CARD_AT_LEAST_ONE);

        let (rt, _) = check(
            &schema,
            AmbiguityPolicy::PickFirst,
            &Expr::call("array_unpack", vec![Expr::Array(vec![Expr::lit(1i64)])]),
        )
        .unwrap();
        assert_eq!(rt, ResultTp::new(Tp::int(), CARD_ANY));
    }

    #[test]
    fn test_unknown_function() {
        let schema = schema();
        let err =
            check(&schema, AmbiguityPolicy::PickFirst, &Expr::call("nope", vec![])).unwrap_err();
        assert!(err.is_usage());
    }
}
