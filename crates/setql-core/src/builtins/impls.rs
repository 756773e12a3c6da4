//! Host implementations of the standard library.
//!
//! Each function receives one value list per parameter, shaped by the
//! parameter modifier, and returns the values for that row.

use std::cmp::Ordering;

use rand::Rng;
use setql_model::{Literal, QualifiedName, Val};

use crate::error::EvalError;

fn malformed(name: &str) -> EvalError {
    EvalError::internal(format!("malformed argument row for std::{}", name))
}

fn expect_bool(v: &Val) -> Result<bool, EvalError> {
    v.as_bool()
        .ok_or_else(|| EvalError::usage(format!("expected a boolean, got {:?}", v)))
}

fn expect_str<'a>(v: &'a Val, name: &str) -> Result<&'a str, EvalError> {
    v.as_str()
        .ok_or_else(|| EvalError::usage(format!("std::{} expects a string argument", name)))
}

/// Single value of a Singleton parameter.
fn single<'a>(arg: &'a [Val], name: &str) -> Result<&'a Val, EvalError> {
    match arg {
        [v] => Ok(v),
        _ => Err(malformed(name)),
    }
}

pub(crate) fn all(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [vals] => {
            let mut result = true;
            for v in vals {
                result &= expect_bool(v)?;
            }
            Ok(vec![Val::bool(result)])
        }
        _ => Err(malformed("all")),
    }
}

pub(crate) fn any(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [vals] => {
            let mut result = false;
            for v in vals {
                result |= expect_bool(v)?;
            }
            Ok(vec![Val::bool(result)])
        }
        _ => Err(malformed("any")),
    }
}

pub(crate) fn array_agg(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [vals] => Ok(vec![Val::Array(vals.clone())]),
        _ => Err(malformed("array_agg")),
    }
}

pub(crate) fn array_unpack(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [arg] => match single(arg, "array_unpack")? {
            Val::Array(elems) => Ok(elems.clone()),
            other => Err(EvalError::usage(format!(
                "std::array_unpack expects an array, got {:?}",
                other
            ))),
        },
        _ => Err(malformed("array_unpack")),
    }
}

pub(crate) fn count(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [vals] => Ok(vec![Val::int(vals.len() as i64)]),
        _ => Err(malformed("count")),
    }
}

pub(crate) fn enumerate(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [vals] => Ok(vals
            .iter()
            .enumerate()
            .map(|(i, v)| Val::UnnamedTuple(vec![Val::int(i as i64), v.clone()]))
            .collect()),
        _ => Err(malformed("enumerate")),
    }
}

pub(crate) fn len(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [arg] => match single(arg, "len")? {
            Val::Array(elems) => Ok(vec![Val::int(elems.len() as i64)]),
            v => {
                let s = expect_str(v, "len")?;
                Ok(vec![Val::int(s.chars().count() as i64)])
            }
        },
        _ => Err(malformed("len")),
    }
}

pub(crate) fn sum_int(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [vals] => {
            let mut total: i64 = 0;
            for v in vals {
                let i = v
                    .as_int()
                    .ok_or_else(|| EvalError::usage("std::sum expects integers"))?;
                total = total
                    .checked_add(i)
                    .ok_or_else(|| EvalError::usage("std::sum overflowed"))?;
            }
            Ok(vec![Val::int(total)])
        }
        _ => Err(malformed("sum")),
    }
}

pub(crate) fn sum_float(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [vals] => {
            let mut total = 0.0;
            for v in vals {
                total += v
                    .as_float()
                    .ok_or_else(|| EvalError::usage("std::sum expects numbers"))?;
            }
            Ok(vec![Val::float(total)])
        }
        _ => Err(malformed("sum")),
    }
}

pub(crate) fn assert_single(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [vals, msg] => {
            if vals.len() > 1 {
                let msg = expect_str(single(msg, "assert_single")?, "assert_single")?;
                return Err(EvalError::usage(msg));
            }
            Ok(vals.clone())
        }
        _ => Err(malformed("assert_single")),
    }
}

pub(crate) fn assert_exists(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [vals, msg] => {
            if vals.is_empty() {
                let msg = expect_str(single(msg, "assert_exists")?, "assert_exists")?;
                return Err(EvalError::usage(msg));
            }
            Ok(vals.clone())
        }
        _ => Err(malformed("assert_exists")),
    }
}

pub(crate) fn datetime_current(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    if !args.is_empty() {
        return Err(malformed("datetime_current"));
    }
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    Ok(vec![Val::scalar(
        QualifiedName::std("datetime"),
        Literal::Str(now),
    )])
}

pub(crate) fn str_split(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [s, delimiter] => {
            let s = expect_str(single(s, "str_split")?, "str_split")?;
            let delimiter = expect_str(single(delimiter, "str_split")?, "str_split")?;
            if delimiter.is_empty() {
                return Err(EvalError::usage("std::str_split delimiter must not be empty"));
            }
            Ok(vec![Val::Array(s.split(delimiter).map(Val::str).collect())])
        }
        _ => Err(malformed("str_split")),
    }
}

pub(crate) fn str_upper(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [s] => Ok(vec![Val::str(
            expect_str(single(s, "str_upper")?, "str_upper")?.to_uppercase(),
        )]),
        _ => Err(malformed("str_upper")),
    }
}

pub(crate) fn str_lower(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [s] => Ok(vec![Val::str(
            expect_str(single(s, "str_lower")?, "str_lower")?.to_lowercase(),
        )]),
        _ => Err(malformed("str_lower")),
    }
}

pub(crate) fn to_json(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [s] => {
            let text = expect_str(single(s, "to_json")?, "to_json")?;
            let doc = serde_json::from_str(text)
                .map_err(|e| EvalError::usage(format!("std::to_json: {}", e)))?;
            Ok(vec![Val::json(doc)])
        }
        _ => Err(malformed("to_json")),
    }
}

pub(crate) fn random(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    if !args.is_empty() {
        return Err(malformed("random"));
    }
    Ok(vec![Val::float(rand::thread_rng().gen::<f64>())])
}

pub(crate) fn exists(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [vals] => Ok(vec![Val::bool(!vals.is_empty())]),
        _ => Err(malformed("exists")),
    }
}

pub(crate) fn distinct(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [vals] => {
            let mut out: Vec<Val> = Vec::with_capacity(vals.len());
            for v in vals {
                if !out.iter().any(|seen| seen.equivalent(v)) {
                    out.push(v.clone());
                }
            }
            Ok(out)
        }
        _ => Err(malformed("distinct")),
    }
}

pub(crate) fn not(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [b] => Ok(vec![Val::bool(!expect_bool(single(b, "not")?)?)]),
        _ => Err(malformed("not")),
    }
}

pub(crate) fn and(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [l, r] => {
            let l = expect_bool(single(l, "and")?)?;
            let r = expect_bool(single(r, "and")?)?;
            Ok(vec![Val::bool(l && r)])
        }
        _ => Err(malformed("and")),
    }
}

pub(crate) fn or(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [l, r] => {
            let l = expect_bool(single(l, "or")?)?;
            let r = expect_bool(single(r, "or")?)?;
            Ok(vec![Val::bool(l || r)])
        }
        _ => Err(malformed("or")),
    }
}

fn compare(
    args: &[Vec<Val>],
    name: &str,
    accept: fn(Ordering) -> bool,
) -> Result<Vec<Val>, EvalError> {
    match args {
        [l, r] => {
            let ord = single(l, name)?.total_cmp(single(r, name)?);
            Ok(vec![Val::bool(accept(ord))])
        }
        _ => Err(malformed(name)),
    }
}

pub(crate) fn eq(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    compare(args, "=", |o| o == Ordering::Equal)
}

pub(crate) fn ne(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    compare(args, "!=", |o| o != Ordering::Equal)
}

pub(crate) fn lt(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    compare(args, "<", |o| o == Ordering::Less)
}

pub(crate) fn gt(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    compare(args, ">", |o| o == Ordering::Greater)
}

pub(crate) fn le(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    compare(args, "<=", |o| o != Ordering::Greater)
}

pub(crate) fn ge(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    compare(args, ">=", |o| o != Ordering::Less)
}

fn int_op(
    args: &[Vec<Val>],
    name: &str,
    op: fn(i64, i64) -> Option<i64>,
) -> Result<Vec<Val>, EvalError> {
    match args {
        [l, r] => {
            let l = single(l, name)?.as_int().ok_or_else(|| malformed(name))?;
            let r = single(r, name)?.as_int().ok_or_else(|| malformed(name))?;
            let v = op(l, r)
                .ok_or_else(|| EvalError::usage(format!("integer overflow in std::{}", name)))?;
            Ok(vec![Val::int(v)])
        }
        _ => Err(malformed(name)),
    }
}

fn float_op(args: &[Vec<Val>], name: &str, op: fn(f64, f64) -> f64) -> Result<Vec<Val>, EvalError> {
    match args {
        [l, r] => {
            let l = single(l, name)?.as_float().ok_or_else(|| malformed(name))?;
            let r = single(r, name)?.as_float().ok_or_else(|| malformed(name))?;
            Ok(vec![Val::float(op(l, r))])
        }
        _ => Err(malformed(name)),
    }
}

pub(crate) fn add_int(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    int_op(args, "+", i64::checked_add)
}

pub(crate) fn sub_int(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    int_op(args, "-", i64::checked_sub)
}

pub(crate) fn mul_int(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    int_op(args, "*", i64::checked_mul)
}

pub(crate) fn add_float(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    float_op(args, "+", |l, r| l + r)
}

pub(crate) fn sub_float(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    float_op(args, "-", |l, r| l - r)
}

pub(crate) fn mul_float(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    float_op(args, "*", |l, r| l * r)
}

pub(crate) fn concat(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [l, r] => {
            let l = expect_str(single(l, "++")?, "++")?;
            let r = expect_str(single(r, "++")?, "++")?;
            Ok(vec![Val::str(format!("{}{}", l, r))])
        }
        _ => Err(malformed("++")),
    }
}

/// `l ?? r`: the left value when present, otherwise the whole right set.
pub(crate) fn coalesce(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [l, r] => match l.as_slice() {
            [] => Ok(r.clone()),
            [v] => Ok(vec![v.clone()]),
            _ => Err(malformed("??")),
        },
        _ => Err(malformed("??")),
    }
}

pub(crate) fn member_of(args: &[Vec<Val>]) -> Result<Vec<Val>, EvalError> {
    match args {
        [elem, set] => {
            let elem = single(elem, "IN")?;
            Ok(vec![Val::bool(set.iter().any(|v| v.equivalent(elem)))])
        }
        _ => Err(malformed("IN")),
    }
}
