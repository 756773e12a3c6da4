//! Schema model for setql.
//!
//! The schema holds object types, function overloads and the nominal
//! subtyping relation. It is built once per schema load and read-only during
//! evaluation.

mod db_schema;
mod function;

pub use db_schema::DBSchema;
pub use function::{BuiltinImpl, FuncDef, FuncImpl, FuncParam, FuncSignature};
