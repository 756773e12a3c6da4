//! ORDER BY comparison and OFFSET/LIMIT slicing.

use std::cmp::Ordering;

use setql_model::{EmptyOrder, MultiSetVal, OrderDirection, OrderSpec, Val};

use crate::error::EvalError;

fn compare_multisets(a: &[Val], b: &[Val]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match x.total_cmp(y) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    a.len().cmp(&b.len())
}

fn compare_key(spec: &OrderSpec, a: &[Val], b: &[Val]) -> Ordering {
    let directed = |ord: Ordering| match spec.direction {
        OrderDirection::Ascending => ord,
        OrderDirection::Descending => ord.reverse(),
    };
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (false, false) => directed(compare_multisets(a, b)),
        (a_empty, _) => {
            let empty_first = if a_empty {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            match spec.empty {
                EmptyOrder::EmptyFirst => directed(empty_first),
                EmptyOrder::EmptyLast => empty_first.reverse(),
            }
        }
    }
}

/// Compare two rows' evaluated keys, one entry per spec in priority order.
pub(crate) fn compare_keys(specs: &[OrderSpec], a: &[Vec<Val>], b: &[Vec<Val>]) -> Ordering {
    specs
        .iter()
        .zip(a.iter().zip(b))
        .map(|(spec, (ka, kb))| compare_key(spec, ka, kb))
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Read an OFFSET or LIMIT operand. An empty operand means "absent".
pub(crate) fn slice_bound(
    operand: Option<MultiSetVal>,
    what: &str,
) -> Result<Option<usize>, EvalError> {
    let Some(operand) = operand else {
        return Ok(None);
    };
    let vals = operand.into_vals();
    match vals.as_slice() {
        [] => Ok(None),
        [v] => {
            let n = v.as_int().ok_or_else(|| {
                EvalError::usage(format!("{} must be an integer, found {:?}", what, v))
            })?;
            usize::try_from(n).map(Some).map_err(|_| {
                EvalError::usage(format!("{} must not be negative, found {}", what, n))
            })
        }
        _ => Err(EvalError::usage(format!(
            "{} must be a single value, found {}",
            what,
            vals.len()
        ))),
    }
}

/// Skip `offset` values, then keep at most `limit`.
pub(crate) fn offset_limit(
    vals: Vec<Val>,
    offset: Option<usize>,
    limit: Option<usize>,
) -> Vec<Val> {
    vals.into_iter()
        .skip(offset.unwrap_or(0))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}
