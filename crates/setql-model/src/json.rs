//! JSON rendering of query results.
//!
//! Only visible object fields are rendered. Link properties appear with an
//! `@` prefix. Single-valued fields are rendered as the bare value; other
//! multisets as arrays.

use serde_json::{Map, Number, Value as Json};

use crate::multiset::MultiSetVal;
use crate::value::{Literal, ScalarVal, Val};

/// Render a whole result multiset as a JSON array.
pub fn multiset_to_json(m: &MultiSetVal) -> Json {
    Json::Array(m.vals().iter().map(val_to_json).collect())
}

/// Render a single value.
pub fn val_to_json(v: &Val) -> Json {
    match v {
        Val::Scalar(s) => scalar_to_json(s),
        Val::Array(vs) | Val::UnnamedTuple(vs) => Json::Array(vs.iter().map(val_to_json).collect()),
        Val::NamedTuple(vs) => {
            let mut map = Map::new();
            for (l, v) in vs {
                map.insert(l.clone(), val_to_json(v));
            }
            Json::Object(map)
        }
        Val::Ref { id, obj } => {
            let mut map = Map::new();
            for label in obj.visible_labels() {
                if let Some(field) = obj.get(label) {
                    map.insert(label.to_string(), field_to_json(field));
                }
            }
            if map.is_empty() {
                map.insert("id".to_string(), Json::String(id.to_string()));
            }
            Json::Object(map)
        }
    }
}

fn field_to_json(m: &MultiSetVal) -> Json {
    let vals = m.vals();
    match vals.len() {
        0 => Json::Null,
        1 => val_to_json(&vals[0]),
        _ => Json::Array(vals.iter().map(val_to_json).collect()),
    }
}

fn scalar_to_json(s: &ScalarVal) -> Json {
    match &s.lit {
        Literal::Bool(b) => Json::Bool(*b),
        Literal::Int(i) => Json::Number(Number::from(*i)),
        Literal::Float(f) => Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Literal::Str(s) => Json::String(s.clone()),
        Literal::Json(j) => j.clone(),
        Literal::Id(id) => Json::String(id.to_string()),
    }
}
