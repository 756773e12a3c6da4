//! Storage layer.
//!
//! The evaluator reaches object state only through the [`Database`] trait.
//! [`MemoryDatabase`] is the in-process implementation used by the engine
//! and the test suite.

mod coerce;
mod memory;

use std::collections::BTreeMap;

use setql_model::{MultiSetVal, ObjectId, QualifiedName};

use crate::error::DatabaseError;
use crate::schema::DBSchema;

pub use coerce::{coerce_to_storage, missing_defaults};
pub use memory::{MemoryDatabase, StoredObject};

/// The object store behind an evaluation.
///
/// Writes take effect immediately for reads in the same statement and become
/// durable on [`commit_dml`](Database::commit_dml).
pub trait Database {
    fn schema(&self) -> &DBSchema;

    /// Allocate a stored object of the given type with no fields set.
    fn insert(&mut self, tname: &QualifiedName) -> Result<ObjectId, DatabaseError>;

    /// Overwrite the named fields of a stored object.
    fn update(
        &mut self,
        id: ObjectId,
        fields: BTreeMap<String, MultiSetVal>,
    ) -> Result<(), DatabaseError>;

    /// Remove a stored object. Removing an object that is already gone is a
    /// no-op.
    fn delete(&mut self, id: ObjectId) -> Result<(), DatabaseError>;

    /// Publish every write made since the last commit.
    fn commit_dml(&mut self) -> Result<(), DatabaseError>;

    /// Discard every write made since the last commit.
    fn abort_dml(&mut self);

    /// Stored value of one field.
    fn project(&self, id: ObjectId, label: &str) -> Result<MultiSetVal, DatabaseError>;

    /// References to every object whose `label` link points at one of `ids`.
    /// Each reference carries the link properties of that link.
    fn reverse_project(&self, ids: &[ObjectId], label: &str)
        -> Result<MultiSetVal, DatabaseError>;

    /// Identities of every stored object of the type or one of its subtypes.
    fn query_ids_for_a_type(&self, tname: &QualifiedName) -> Result<Vec<ObjectId>, DatabaseError>;

    /// The stored type of an object.
    fn type_of(&self, id: ObjectId) -> Result<QualifiedName, DatabaseError>;
}
