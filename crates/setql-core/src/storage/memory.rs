//! In-memory [`Database`] implementation.

use std::collections::{BTreeMap, HashSet};

use setql_model::{MultiSetVal, ObjectId, QualifiedName, Val};
use tracing::{debug, info};

use super::Database;
use crate::error::DatabaseError;
use crate::schema::DBSchema;

/// One stored object: its type and its stored fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub tp: QualifiedName,
    pub fields: BTreeMap<String, MultiSetVal>,
}

/// Object store held in memory.
///
/// Writes go to a working copy; `commit_dml` publishes it and `abort_dml`
/// rolls it back to the last published state. Identities are allocated in
/// increasing order, so scans return objects in insertion order.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    schema: DBSchema,
    working: BTreeMap<ObjectId, StoredObject>,
    committed: BTreeMap<ObjectId, StoredObject>,
}

impl MemoryDatabase {
    /// Create an empty database over `schema`.
    pub fn new(schema: DBSchema) -> Self {
        Self {
            schema,
            working: BTreeMap::new(),
            committed: BTreeMap::new(),
        }
    }

    /// Number of objects visible to the current statement.
    pub fn len(&self) -> usize {
        self.working.len()
    }

    pub fn is_empty(&self) -> bool {
        self.working.is_empty()
    }

    /// Number of committed objects.
    pub fn committed_len(&self) -> usize {
        self.committed.len()
    }

    /// Look up a stored object, including uncommitted writes.
    pub fn get(&self, id: ObjectId) -> Option<&StoredObject> {
        self.working.get(&id)
    }

    fn object(&self, id: ObjectId) -> Result<&StoredObject, DatabaseError> {
        self.working
            .get(&id)
            .ok_or(DatabaseError::UnknownObject(id))
    }

    fn is_live_target(&self, v: &Val) -> bool {
        v.ref_id().map_or(true, |id| self.working.contains_key(&id))
    }
}

impl Database for MemoryDatabase {
    fn schema(&self) -> &DBSchema {
        &self.schema
    }

    fn insert(&mut self, tname: &QualifiedName) -> Result<ObjectId, DatabaseError> {
        if !self.schema.types.contains_key(tname) {
            return Err(DatabaseError::UnknownType(tname.clone()));
        }
        let id = ObjectId::fresh();
        self.working.insert(
            id,
            StoredObject {
                tp: tname.clone(),
                fields: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    fn update(
        &mut self,
        id: ObjectId,
        fields: BTreeMap<String, MultiSetVal>,
    ) -> Result<(), DatabaseError> {
        let obj = self
            .working
            .get_mut(&id)
            .ok_or(DatabaseError::UnknownObject(id))?;
        obj.fields.extend(fields);
        Ok(())
    }

    fn delete(&mut self, id: ObjectId) -> Result<(), DatabaseError> {
        if self.working.remove(&id).is_none() {
            debug!(id = id.0, "delete of an object that is already gone");
        }
        Ok(())
    }

    fn commit_dml(&mut self) -> Result<(), DatabaseError> {
        self.committed = self.working.clone();
        info!(objects = self.committed.len(), "committed writes");
        Ok(())
    }

    fn abort_dml(&mut self) {
        let discarded = self.working.len().abs_diff(self.committed.len());
        self.working = self.committed.clone();
        debug!(objects = self.working.len(), discarded, "discarded uncommitted writes");
    }

    fn project(&self, id: ObjectId, label: &str) -> Result<MultiSetVal, DatabaseError> {
        let obj = self.object(id)?;
        if let Some(vals) = obj.fields.get(label) {
            return Ok(vals
                .raw_vals()
                .iter()
                .filter(|v| self.is_live_target(v))
                .cloned()
                .collect());
        }
        let declared = self
            .schema
            .types
            .get(&obj.tp)
            .map_or(false, |tp| tp.get(label).is_some());
        if declared {
            Ok(MultiSetVal::empty())
        } else {
            Err(DatabaseError::UnknownField {
                id,
                field: label.to_string(),
            })
        }
    }

    fn reverse_project(
        &self,
        ids: &[ObjectId],
        label: &str,
    ) -> Result<MultiSetVal, DatabaseError> {
        let mut sources = Vec::new();
        for target in ids {
            for (source, obj) in &self.working {
                let Some(vals) = obj.fields.get(label) else {
                    continue;
                };
                for v in vals.raw_vals() {
                    if let Val::Ref { id, obj: props } = v {
                        if id == target {
                            sources.push(Val::Ref {
                                id: *source,
                                obj: props.clone(),
                            });
                        }
                    }
                }
            }
        }
        Ok(MultiSetVal::Result(sources))
    }

    fn query_ids_for_a_type(&self, tname: &QualifiedName) -> Result<Vec<ObjectId>, DatabaseError> {
        if !self.schema.types.contains_key(tname) {
            return Err(DatabaseError::UnknownType(tname.clone()));
        }
        let wanted: HashSet<QualifiedName> =
            self.schema.find_all_subtypes(tname).into_iter().collect();
        Ok(self
            .working
            .iter()
            .filter(|(_, obj)| wanted.contains(&obj.tp))
            .map(|(id, _)| *id)
            .collect())
    }

    fn type_of(&self, id: ObjectId) -> Result<QualifiedName, DatabaseError> {
        Ok(self.object(id)?.tp.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use setql_model::{Label, Marker, ObjectTp, ObjectVal, ResultTp, Tp, CARD_ANY, CARD_ONE};

    fn schema() -> DBSchema {
        let friends = Tp::LinkProp {
            subject: Box::new(Tp::named("default::Person")),
            linkprop: ObjectTp::empty().with_field("since", ResultTp::new(Tp::int(), CARD_ONE)),
        };
        DBSchema::with_std()
            .with_type(
                "default::Person",
                ObjectTp::empty()
                    .with_field("name", ResultTp::new(Tp::str(), CARD_ONE))
                    .with_field("friends", ResultTp::new(friends, CARD_ANY)),
            )
            .with_type("default::Student", ObjectTp::empty())
            .with_subtype("default::Student", "default::Person")
    }

    fn person() -> QualifiedName {
        "default::Person".into()
    }

    #[test]
    fn test_scan_includes_subtypes() {
        let mut db = MemoryDatabase::new(schema());
        let a = db.insert(&person()).unwrap();
        let b = db.insert(&"default::Student".into()).unwrap();
        assert_eq!(db.query_ids_for_a_type(&person()).unwrap(), vec![a, b]);
        assert_eq!(
            db.query_ids_for_a_type(&"default::Student".into()).unwrap(),
            vec![b]
        );
        assert_eq!(
            db.query_ids_for_a_type(&"default::Robot".into()),
            Err(DatabaseError::UnknownType("default::Robot".into()))
        );
    }

    #[test]
    fn test_commit_and_abort() {
        let mut db = MemoryDatabase::new(schema());
        let a = db.insert(&person()).unwrap();
        db.commit_dml().unwrap();
        let b = db.insert(&person()).unwrap();
        db.delete(a).unwrap();
        db.delete(a).unwrap();
        assert_eq!(db.len(), 1);
        db.abort_dml();
        assert!(db.get(a).is_some());
        assert!(db.get(b).is_none());
        assert_eq!(db.committed_len(), 1);
    }

    #[test]
    fn test_project_fields() {
        let mut db = MemoryDatabase::new(schema());
        let a = db.insert(&person()).unwrap();
        db.update(
            a,
            BTreeMap::from([("name".to_string(), MultiSetVal::singleton(Val::str("Ann")))]),
        )
        .unwrap();
        assert_eq!(db.project(a, "name").unwrap(), MultiSetVal::singleton(Val::str("Ann")));
        assert!(db.project(a, "friends").unwrap().is_empty());
        assert!(matches!(
            db.project(a, "age"),
            Err(DatabaseError::UnknownField { .. })
        ));
        let gone = ObjectId::fresh();
        assert_eq!(db.project(gone, "name"), Err(DatabaseError::UnknownObject(gone)));
    }

    #[test]
    fn test_links_and_backlinks() {
        let mut db = MemoryDatabase::new(schema());
        let a = db.insert(&person()).unwrap();
        let b = db.insert(&person()).unwrap();
        let since = ObjectVal::empty().with(
            Label::link_prop("since"),
            Marker::Visible,
            MultiSetVal::singleton(Val::int(2020)),
        );
        db.update(
            a,
            BTreeMap::from([(
                "friends".to_string(),
                MultiSetVal::singleton(Val::Ref { id: b, obj: since.clone() }),
            )]),
        )
        .unwrap();

        let back = db.reverse_project(&[b], "friends").unwrap();
        assert_eq!(back, MultiSetVal::singleton(Val::Ref { id: a, obj: since }));

        db.delete(b).unwrap();
        assert!(db.project(a, "friends").unwrap().is_empty());
    }
}
