//! Subtyping with generic instantiation.
//!
//! `Any` is gradual: it is compatible with every type in both directions.
//! Schema-side wrappers (defaults, computables, link-property annotations)
//! are transparent. Placeholders (`SomeTp`) are only bound through the
//! `*_with_instantiation` entry points.

use std::collections::BTreeMap;

use setql_model::{ObjectTp, QualifiedName, Tp};

use crate::schema::DBSchema;

/// Candidate bindings per placeholder slot, in discovery order.
pub type Candidates = BTreeMap<usize, Vec<Tp>>;

/// Chosen binding per placeholder slot.
pub type Instantiation = BTreeMap<usize, Tp>;

fn scalar_parent(name: &QualifiedName) -> Option<QualifiedName> {
    if name.0.first().map(String::as_str) != Some("std") {
        return None;
    }
    let parent = match name.local_name() {
        "int16" | "int32" | "int64" => "anyint",
        "float32" | "float64" => "anyfloat",
        "anyint" | "anyfloat" => "anyreal",
        _ => return None,
    };
    Some(QualifiedName::std(parent))
}

/// Whether `sub` sits below `sup` in the fixed scalar hierarchy.
pub fn is_scalar_subtype(sub: &QualifiedName, sup: &QualifiedName) -> bool {
    let mut current = Some(sub.clone());
    while let Some(name) = current {
        if &name == sup {
            return true;
        }
        current = scalar_parent(&name);
    }
    false
}

/// Whether `child` is `parent` or below it in the schema's nominal hierarchy.
pub fn is_nominal_subtype(
    schema: &DBSchema,
    child: &QualifiedName,
    parent: &QualifiedName,
) -> bool {
    schema.is_nominal_subtype(child, parent)
}

fn unwrap_schema_tp(tp: &Tp) -> Option<&Tp> {
    match tp {
        Tp::Default { tp, .. } | Tp::ComputableTp { tp, .. } => Some(tp),
        Tp::LinkProp { subject, .. } => Some(subject),
        _ => None,
    }
}

fn is_object_subtype(schema: &DBSchema, sub: &ObjectTp, sup: &ObjectTp) -> bool {
    sup.0.iter().all(|(label, sup_field)| match sub.get(label) {
        Some(sub_field) => is_subtype(schema, &sub_field.tp, &sup_field.tp),
        None => false,
    })
}

/// The nominal parts of a link type: name and link-property object.
fn link_parts(tp: &Tp) -> Option<(&QualifiedName, &ObjectTp)> {
    match tp {
        Tp::NamedNominalLink { name, linkprop } | Tp::NominalLink { name, linkprop, .. } => {
            Some((name, linkprop))
        }
        _ => None,
    }
}

/// Plain structural/nominal subtyping.
pub fn is_subtype(schema: &DBSchema, sub: &Tp, sup: &Tp) -> bool {
    if sub == sup {
        return true;
    }
    if let Some(inner) = unwrap_schema_tp(sub) {
        return is_subtype(schema, inner, sup);
    }
    if let Some(inner) = unwrap_schema_tp(sup) {
        return is_subtype(schema, sub, inner);
    }
    match (sub, sup) {
        (Tp::Any, _) | (_, Tp::Any) => true,
        (Tp::UncheckedComputable(_), _) | (_, Tp::UncheckedComputable(_)) => true,
        (Tp::Union(l, r), _) => is_subtype(schema, l, sup) && is_subtype(schema, r, sup),
        (_, Tp::Intersect(l, r)) => is_subtype(schema, sub, l) && is_subtype(schema, sub, r),
        (_, Tp::Union(l, r)) => is_subtype(schema, sub, l) || is_subtype(schema, sub, r),
        (Tp::Intersect(l, r), _) => is_subtype(schema, l, sup) || is_subtype(schema, r, sup),
        (Tp::Scalar(a), Tp::Scalar(b)) => is_scalar_subtype(a, b),
        (Tp::Array(a), Tp::Array(b)) => is_subtype(schema, a, b),
        (Tp::UnnamedTuple(a), Tp::UnnamedTuple(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| is_subtype(schema, x, y))
        }
        (Tp::NamedTuple(a), Tp::NamedTuple(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|((la, x), (lb, y))| la == lb && is_subtype(schema, x, y))
        }
        (Tp::Object(a), Tp::Object(b)) => is_object_subtype(schema, a, b),
        (Tp::SomeTp(a), Tp::SomeTp(b)) => a == b,
        _ => match (link_parts(sub), link_parts(sup)) {
            (Some((n1, lp1)), Some((n2, lp2))) => {
                is_nominal_subtype(schema, n1, n2) && is_object_subtype(schema, lp1, lp2)
            }
            _ => false,
        },
    }
}

/// Walk `ck` alongside `syn`, recording what each placeholder in `ck` is
/// matched against.
pub fn collect_is_subtype_with_instantiation(
    schema: &DBSchema,
    syn: &Tp,
    ck: &Tp,
    candidates: &mut Candidates,
) {
    if let Some(inner) = unwrap_schema_tp(syn) {
        return collect_is_subtype_with_instantiation(schema, inner, ck, candidates);
    }
    match (syn, ck) {
        (_, Tp::SomeTp(i)) => candidates.entry(*i).or_default().push(syn.clone()),
        (_, Tp::Default { tp, .. }) | (_, Tp::ComputableTp { tp, .. }) => {
            collect_is_subtype_with_instantiation(schema, syn, tp, candidates)
        }
        (_, Tp::LinkProp { subject, .. }) => {
            collect_is_subtype_with_instantiation(schema, syn, subject, candidates)
        }
        (Tp::Union(l, r), _) => {
            collect_is_subtype_with_instantiation(schema, l, ck, candidates);
            collect_is_subtype_with_instantiation(schema, r, ck, candidates);
        }
        (Tp::Array(a), Tp::Array(b)) => {
            collect_is_subtype_with_instantiation(schema, a, b, candidates)
        }
        (Tp::UnnamedTuple(a), Tp::UnnamedTuple(b)) if a.len() == b.len() => {
            for (x, y) in a.iter().zip(b) {
                collect_is_subtype_with_instantiation(schema, x, y, candidates);
            }
        }
        (Tp::NamedTuple(a), Tp::NamedTuple(b)) if a.len() == b.len() => {
            for ((_, x), (_, y)) in a.iter().zip(b) {
                collect_is_subtype_with_instantiation(schema, x, y, candidates);
            }
        }
        (Tp::Object(a), Tp::Object(b)) => {
            for (label, field) in &b.0 {
                if let Some(sub_field) = a.get(label) {
                    collect_is_subtype_with_instantiation(
                        schema,
                        &sub_field.tp,
                        &field.tp,
                        candidates,
                    );
                }
            }
        }
        _ => {}
    }
}

/// Substitute placeholders. Unbound placeholders are left in place.
pub fn instantiate(tp: &Tp, mapping: &Instantiation) -> Tp {
    let inst = |t: &Tp| Box::new(instantiate(t, mapping));
    let inst_obj = |o: &ObjectTp| {
        ObjectTp(
            o.0.iter()
                .map(|(l, r)| {
                    let mut r = r.clone();
                    r.tp = instantiate(&r.tp, mapping);
                    (l.clone(), r)
                })
                .collect(),
        )
    };
    match tp {
        Tp::SomeTp(i) => mapping.get(i).cloned().unwrap_or(Tp::SomeTp(*i)),
        Tp::Array(t) => Tp::Array(inst(t)),
        Tp::UnnamedTuple(ts) => {
            Tp::UnnamedTuple(ts.iter().map(|t| instantiate(t, mapping)).collect())
        }
        Tp::NamedTuple(ts) => Tp::NamedTuple(
            ts.iter()
                .map(|(l, t)| (l.clone(), instantiate(t, mapping)))
                .collect(),
        ),
        Tp::Object(o) => Tp::Object(inst_obj(o)),
        Tp::LinkProp { subject, linkprop } => Tp::LinkProp {
            subject: inst(subject),
            linkprop: linkprop.clone(),
        },
        Tp::Default { tp, default } => Tp::Default {
            tp: inst(tp),
            default: default.clone(),
        },
        Tp::ComputableTp { expr, tp } => Tp::ComputableTp {
            expr: expr.clone(),
            tp: inst(tp),
        },
        Tp::Union(l, r) => Tp::Union(inst(l), inst(r)),
        Tp::Intersect(l, r) => Tp::Intersect(inst(l), inst(r)),
        Tp::Scalar(_)
        | Tp::NamedNominalLink { .. }
        | Tp::NominalLink { .. }
        | Tp::UncheckedComputable(_)
        | Tp::Any => tp.clone(),
    }
}

/// Replace any placeholder left after instantiation with `Any`.
pub fn ground(tp: &Tp) -> Tp {
    let mut unbound = Instantiation::new();
    collect_placeholders(tp, &mut unbound);
    instantiate(tp, &unbound)
}

fn collect_placeholders(tp: &Tp, out: &mut Instantiation) {
    match tp {
        Tp::SomeTp(i) => {
            out.insert(*i, Tp::Any);
        }
        Tp::Array(t) => collect_placeholders(t, out),
        Tp::UnnamedTuple(ts) => ts.iter().for_each(|t| collect_placeholders(t, out)),
        Tp::NamedTuple(ts) => ts.iter().for_each(|(_, t)| collect_placeholders(t, out)),
        Tp::Object(o) => o.0.values().for_each(|r| collect_placeholders(&r.tp, out)),
        Tp::LinkProp { subject: t, .. }
        | Tp::Default { tp: t, .. }
        | Tp::ComputableTp { tp: t, .. } => collect_placeholders(t, out),
        Tp::Union(l, r) | Tp::Intersect(l, r) => {
            collect_placeholders(l, out);
            collect_placeholders(r, out);
        }
        Tp::Scalar(_)
        | Tp::NamedNominalLink { .. }
        | Tp::NominalLink { .. }
        | Tp::UncheckedComputable(_)
        | Tp::Any => {}
    }
}

/// Subtyping of `syn` against `ck` under a placeholder binding.
pub fn is_subtype_with_instantiation(
    schema: &DBSchema,
    syn: &Tp,
    ck: &Tp,
    mapping: &Instantiation,
) -> bool {
    is_subtype(schema, syn, &ground(&instantiate(ck, mapping)))
}

/// Drop link properties (and any shaped subject) from nominal link types.
pub fn refine_link_props(tp: &Tp) -> Tp {
    match tp {
        Tp::NamedNominalLink { name, .. } | Tp::NominalLink { name, .. } => Tp::named(name.clone()),
        Tp::Union(l, r) => Tp::Union(
            Box::new(refine_link_props(l)),
            Box::new(refine_link_props(r)),
        ),
        Tp::Intersect(l, r) => Tp::Intersect(
            Box::new(refine_link_props(l)),
            Box::new(refine_link_props(r)),
        ),
        other => other.clone(),
    }
}
