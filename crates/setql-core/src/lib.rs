//! setql Core - Type checking, overload resolution and multiset evaluation.
//!
//! This crate evaluates core query expressions (see [`setql_model`]) against
//! an object store reached through the [`Database`] trait.
//!
//! # Modules
//!
//! - [`schema`] - Object types, subtyping and function overloads
//! - [`builtins`] - The `std` function library
//! - [`typing`] - Subtyping, casts and type synthesis
//! - [`resolver`] - Overload and cardinality resolution
//! - [`eval`] - The multiset evaluator
//! - [`storage`] - Database trait and the in-memory store
//! - [`engine`] - Statement driver

pub mod builtins;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod resolver;
pub mod schema;
pub mod storage;
pub mod trace;
pub mod typing;

pub use config::{AmbiguityPolicy, EngineConfig};
pub use engine::{BatchOutcome, Engine};
pub use error::{ConfigError, DatabaseError, EvalError};
pub use eval::{Env, Evaluator};
pub use schema::{BuiltinImpl, DBSchema, FuncDef, FuncImpl, FuncParam, FuncSignature};
pub use storage::{Database, MemoryDatabase};
pub use trace::{EvalTrace, TraceNode};

/// Re-export the data model.
pub use setql_model as model;
