//! setql data model.
//!
//! This crate defines the pure-data side of the setql evaluator: values, types,
//! cardinality modes, the multiset container and the core expression tree
//! produced by elaboration.
//!
//! # Modules
//!
//! - [`cardinality`] - Cardinality modes and their combinators
//! - [`types`] - Types, qualified names and parameter modifiers
//! - [`value`] - Runtime values and object identities
//! - [`multiset`] - The multiset container
//! - [`expr`] - Core expression tree
//! - [`json`] - JSON rendering of results

pub mod cardinality;
pub mod expr;
pub mod json;
pub mod multiset;
pub mod types;
pub mod value;

pub use cardinality::{
    Cardinal, CMMode, CARD_ANY, CARD_AT_LEAST_ONE, CARD_AT_MOST_ONE, CARD_ONE, CARD_ZERO,
};
pub use expr::{BindingExpr, CastSpec, EmptyOrder, Expr, OrderDirection, OrderSpec, Shape};
pub use json::multiset_to_json;
pub use multiset::{cartesian_product, conditional_dedup, object_dedup, MultiSetVal};
pub use types::{ObjectTp, ParamModifier, QualifiedName, ResultTp, Tp};
pub use value::{Label, Literal, Marker, ObjectId, ObjectVal, ScalarVal, Val};
