//! Scalar cast table.

use setql_model::{CastSpec, Literal, QualifiedName, ScalarVal, Tp, Val};

use crate::error::EvalError;
use crate::schema::DBSchema;

use super::subtype::is_subtype;

fn scalar_kind(name: &QualifiedName) -> Option<&str> {
    if name.0.first().map(String::as_str) != Some("std") {
        return None;
    }
    Some(match name.local_name() {
        "int16" | "int32" | "int64" | "anyint" => "int",
        "float32" | "float64" | "anyfloat" | "anyreal" => "float",
        other => other,
    })
}

/// Choose the cast from `from` to `to`, if one exists.
pub fn find_cast(schema: &DBSchema, from: &Tp, to: &Tp) -> Option<CastSpec> {
    if matches!(from, Tp::Any) || is_subtype(schema, from, to) {
        return Some(CastSpec::Identity);
    }
    let (Tp::Scalar(from), Tp::Scalar(to)) = (from, to) else {
        return None;
    };
    let spec = match (scalar_kind(from)?, scalar_kind(to)?) {
        (a, b) if a == b => CastSpec::Identity,
        ("int", "float") => CastSpec::IntToFloat,
        ("float", "int") => CastSpec::FloatToInt,
        ("int", "str") => CastSpec::IntToStr,
        ("float", "str") => CastSpec::FloatToStr,
        ("bool", "str") => CastSpec::BoolToStr,
        ("str", "int") => CastSpec::StrToInt,
        ("str", "float") => CastSpec::StrToFloat,
        ("str", "bool") => CastSpec::StrToBool,
        ("str", "json") => CastSpec::StrToJson,
        ("json", "str") => CastSpec::JsonToStr,
        ("uuid", "str") => CastSpec::UuidToStr,
        _ => return None,
    };
    Some(spec)
}

fn bad_cast(v: &Val, target: &Tp) -> EvalError {
    EvalError::usage(format!("cannot cast {:?} to {}", v, target))
}

/// Apply a pre-resolved cast to one value.
pub fn apply_cast(spec: CastSpec, target: &Tp, v: &Val) -> Result<Val, EvalError> {
    let target_name = match target {
        Tp::Scalar(name) => Some(name.clone()),
        _ => None,
    };
    let Val::Scalar(ScalarVal { lit, .. }) = v else {
        return match spec {
            CastSpec::Identity => Ok(v.clone()),
            _ => Err(bad_cast(v, target)),
        };
    };
    let lit = match (spec, lit) {
        (CastSpec::Identity, lit) => lit.clone(),
        (CastSpec::IntToFloat, Literal::Int(i)) => Literal::Float(*i as f64),
        (CastSpec::FloatToInt, Literal::Float(f)) => {
            let rounded = f.round();
            if !rounded.is_finite() || rounded < i64::MIN as f64 || rounded > i64::MAX as f64 {
                return Err(bad_cast(v, target));
            }
            Literal::Int(rounded as i64)
        }
        (CastSpec::IntToStr, Literal::Int(i)) => Literal::Str(i.to_string()),
        (CastSpec::FloatToStr, Literal::Float(f)) => Literal::Str(f.to_string()),
        (CastSpec::BoolToStr, Literal::Bool(b)) => Literal::Str(b.to_string()),
        (CastSpec::StrToInt, Literal::Str(s)) => {
            Literal::Int(s.trim().parse().map_err(|_| bad_cast(v, target))?)
        }
        (CastSpec::StrToFloat, Literal::Str(s)) => {
            Literal::Float(s.trim().parse().map_err(|_| bad_cast(v, target))?)
        }
        (CastSpec::StrToBool, Literal::Str(s)) => match s.trim().to_lowercase().as_str() {
            "true" => Literal::Bool(true),
            "false" => Literal::Bool(false),
            _ => return Err(bad_cast(v, target)),
        },
        (CastSpec::StrToJson, Literal::Str(s)) => {
            Literal::Json(serde_json::from_str(s).map_err(|_| bad_cast(v, target))?)
        }
        (CastSpec::JsonToStr, Literal::Json(serde_json::Value::String(s))) => {
            Literal::Str(s.clone())
        }
        (CastSpec::JsonToStr, Literal::Json(doc)) => Literal::Str(doc.to_string()),
        (CastSpec::UuidToStr, Literal::Id(id)) => Literal::Str(id.to_string()),
        _ => return Err(bad_cast(v, target)),
    };
    let tp = match (target_name, v) {
        (Some(name), _) => name,
        (None, Val::Scalar(s)) => s.tp.clone(),
        (None, _) => return Err(bad_cast(v, target)),
    };
    Ok(Val::Scalar(ScalarVal { tp, lit }))
}
