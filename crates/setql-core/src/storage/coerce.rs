//! Conversion of evaluated field values into their stored form.

use std::collections::BTreeMap;

use setql_model::{
    BindingExpr, Label, Marker, MultiSetVal, ObjectTp, ObjectVal, QualifiedName, Tp, Val,
};

use crate::error::EvalError;

/// Keep only the link properties of a link target, hidden from rendering.
fn strip_link_target(tname: &QualifiedName, field: &str, v: &Val) -> Result<Val, EvalError> {
    match v {
        Val::Ref { id, obj } => {
            let props = obj
                .0
                .iter()
                .filter(|(label, _, _)| matches!(label, Label::LinkProp(_)))
                .map(|(label, _, vals)| (label.clone(), Marker::Invisible, vals.clone()))
                .collect();
            Ok(Val::Ref {
                id: *id,
                obj: ObjectVal(props),
            })
        }
        other => Err(EvalError::usage(format!(
            "{}.{} is a link, cannot store {:?}",
            tname, field, other
        ))),
    }
}

/// Coerce field values to the storage representation of `tp`.
///
/// Unknown fields are rejected and computed fields are dropped.
pub fn coerce_to_storage(
    tname: &QualifiedName,
    tp: &ObjectTp,
    fields: BTreeMap<String, MultiSetVal>,
) -> Result<BTreeMap<String, MultiSetVal>, EvalError> {
    let mut stored = BTreeMap::new();
    for (name, vals) in fields {
        let declared = tp
            .get(&name)
            .ok_or_else(|| EvalError::usage(format!("{} has no field '{}'", tname, name)))?;
        if declared.tp.is_computable() {
            continue;
        }
        let vals = if declared.tp.is_link() {
            vals.vals()
                .iter()
                .map(|v| strip_link_target(tname, &name, v))
                .collect::<Result<MultiSetVal, EvalError>>()?
        } else {
            MultiSetVal::Result(vals.into_vals())
        };
        stored.insert(name, vals);
    }
    Ok(stored)
}

/// Declared fields with a default that are absent from `present`.
pub fn missing_defaults(
    tp: &ObjectTp,
    present: &BTreeMap<String, MultiSetVal>,
) -> Vec<(String, BindingExpr)> {
    tp.0.iter()
        .filter(|(name, _)| !present.contains_key(*name))
        .filter_map(|(name, field)| match &field.tp {
            Tp::Default { default, .. } => Some((name.clone(), default.clone())),
            _ => None,
        })
        .collect()
}
