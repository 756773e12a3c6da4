//! Multiset container.
//!
//! A [`MultiSetVal`] is an ordered sequence of values that denotes an
//! unordered bag. The order is evaluation order and only becomes meaningful
//! after an explicit ORDER BY.

use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::value::Val;

/// A multiset of values in one of two evaluation strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MultiSetVal {
    /// Fully materialized.
    Result(Vec<Val>),
    /// Object references are deduplicated by identity when read through
    /// [`MultiSetVal::vals`]; the raw sequence is kept for link-property
    /// access.
    ConditionalDedup(Vec<Val>),
}

impl MultiSetVal {
    pub fn empty() -> Self {
        MultiSetVal::Result(Vec::new())
    }

    pub fn singleton(v: Val) -> Self {
        MultiSetVal::Result(vec![v])
    }

    /// The values of this multiset, applying deferred deduplication.
    pub fn vals(&self) -> Cow<'_, [Val]> {
        match self {
            MultiSetVal::Result(vals) => Cow::Borrowed(vals),
            MultiSetVal::ConditionalDedup(vals) => {
                if vals.iter().all(Val::is_ref) {
                    Cow::Owned(object_dedup(vals))
                } else {
                    Cow::Borrowed(vals)
                }
            }
        }
    }

    /// The values exactly as produced, duplicates included.
    pub fn raw_vals(&self) -> &[Val] {
        match self {
            MultiSetVal::Result(vals) | MultiSetVal::ConditionalDedup(vals) => vals,
        }
    }

    /// Owned values, applying deferred deduplication.
    pub fn into_vals(self) -> Vec<Val> {
        match self {
            MultiSetVal::Result(vals) => vals,
            MultiSetVal::ConditionalDedup(vals) => conditional_dedup(vals),
        }
    }

    pub fn len(&self) -> usize {
        self.vals().len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_vals().is_empty()
    }

    /// Whether the multiset contains the boolean `true`.
    pub fn contains_true(&self) -> bool {
        self.raw_vals().iter().any(|v| v.as_bool() == Some(true))
    }
}

impl Default for MultiSetVal {
    fn default() -> Self {
        MultiSetVal::empty()
    }
}

impl From<Vec<Val>> for MultiSetVal {
    fn from(vals: Vec<Val>) -> Self {
        MultiSetVal::Result(vals)
    }
}

impl FromIterator<Val> for MultiSetVal {
    fn from_iter<I: IntoIterator<Item = Val>>(iter: I) -> Self {
        MultiSetVal::Result(iter.into_iter().collect())
    }
}

/// Deduplicate references by identity, keeping the first occurrence.
/// Non-reference values are kept as-is.
pub fn object_dedup(vals: &[Val]) -> Vec<Val> {
    let mut seen = HashSet::new();
    vals.iter()
        .filter(|v| match v.ref_id() {
            Some(id) => seen.insert(id),
            None => true,
        })
        .cloned()
        .collect()
}

/// Deduplicate only when every value is a reference; mixed or scalar
/// multisets are returned unchanged.
pub fn conditional_dedup(vals: Vec<Val>) -> Vec<Val> {
    if vals.iter().all(Val::is_ref) {
        object_dedup(&vals)
    } else {
        vals
    }
}

/// Cartesian product of per-slot value lists, preserving slot order.
///
/// `k1 x ... x kN` rows for slots of sizes `k1..kN`; the product of no slots
/// is a single empty row.
pub fn cartesian_product(slots: &[Vec<Val>]) -> Vec<Vec<Val>> {
    let mut rows: Vec<Vec<Val>> = vec![Vec::with_capacity(slots.len())];
    for slot in slots {
        let mut next = Vec::with_capacity(rows.len() * slot.len());
        for row in &rows {
            for v in slot {
                let mut extended = row.clone();
                extended.push(v.clone());
                next.push(extended);
            }
        }
        rows = next;
    }
    rows
}
