use std::collections::BTreeMap;

use indexkeeper_core::{ids::*, PropertyList};

use crate::error::ModelError;
use crate::traits::{EntityTypeRecord, ForeignKeyRecord, IndexRecord, KeyRecord, SchemaGraph};

/// In-memory schema graph.
///
/// Ids are UUIDv7, so the maps iterate in creation order. Mutation happens
/// through [`crate::ModelBuilder`]; the primitives here only keep the
/// per-entity-type member lists in step with the maps and perform no checks.
#[derive(Debug, Clone, Default)]
pub struct Model {
    entity_types: BTreeMap<EntityTypeId, EntityTypeRecord>,
    keys: BTreeMap<KeyId, KeyRecord>,
    foreign_keys: BTreeMap<ForeignKeyId, ForeignKeyRecord>,
    indexes: BTreeMap<IndexId, IndexRecord>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Like [`SchemaGraph::find_entity_type`], but as a hard lookup for callers
    /// that have already built the model.
    pub fn require_entity_type(&self, name: &str) -> Result<&EntityTypeRecord, ModelError> {
        self.find_entity_type(name)
            .ok_or_else(|| ModelError::EntityTypeNotFound(name.to_string()))
    }

    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }

    pub(crate) fn entity_type_mut(&mut self, id: EntityTypeId) -> Option<&mut EntityTypeRecord> {
        self.entity_types.get_mut(&id)
    }

    pub(crate) fn key_mut(&mut self, id: KeyId) -> Option<&mut KeyRecord> {
        self.keys.get_mut(&id)
    }

    pub(crate) fn foreign_key_mut(&mut self, id: ForeignKeyId) -> Option<&mut ForeignKeyRecord> {
        self.foreign_keys.get_mut(&id)
    }

    pub(crate) fn index_mut(&mut self, id: IndexId) -> Option<&mut IndexRecord> {
        self.indexes.get_mut(&id)
    }

    pub(crate) fn insert_entity_type(&mut self, record: EntityTypeRecord) {
        self.entity_types.insert(record.id, record);
    }

    pub(crate) fn insert_key(&mut self, record: KeyRecord) {
        if let Some(et) = self.entity_types.get_mut(&record.declaring_type) {
            et.keys.push(record.id);
        }
        self.keys.insert(record.id, record);
    }

    pub(crate) fn detach_key(&mut self, id: KeyId) -> Option<KeyRecord> {
        let record = self.keys.remove(&id)?;
        if let Some(et) = self.entity_types.get_mut(&record.declaring_type) {
            et.keys.retain(|k| *k != id);
        }
        Some(record)
    }

    pub(crate) fn insert_foreign_key(&mut self, record: ForeignKeyRecord) {
        if let Some(et) = self.entity_types.get_mut(&record.declaring_type) {
            et.foreign_keys.push(record.id);
        }
        self.foreign_keys.insert(record.id, record);
    }

    pub(crate) fn detach_foreign_key(&mut self, id: ForeignKeyId) -> Option<ForeignKeyRecord> {
        let record = self.foreign_keys.remove(&id)?;
        if let Some(et) = self.entity_types.get_mut(&record.declaring_type) {
            et.foreign_keys.retain(|fk| *fk != id);
        }
        Some(record)
    }

    pub(crate) fn insert_index(&mut self, record: IndexRecord) {
        if let Some(et) = self.entity_types.get_mut(&record.declaring_type) {
            et.indexes.push(record.id);
        }
        self.indexes.insert(record.id, record);
    }

    pub(crate) fn detach_index(&mut self, id: IndexId) -> Option<IndexRecord> {
        let record = self.indexes.remove(&id)?;
        if let Some(et) = self.entity_types.get_mut(&record.declaring_type) {
            et.indexes.retain(|i| *i != id);
        }
        Some(record)
    }

    /// Re-parent `id` under `base`, keeping both derived-type lists in step.
    pub(crate) fn relink_base_type(&mut self, id: EntityTypeId, base: Option<EntityTypeId>) {
        let old_base = self.entity_types.get(&id).and_then(|et| et.base_type);
        if let Some(old) = old_base.and_then(|old| self.entity_types.get_mut(&old)) {
            old.derived_types.retain(|d| *d != id);
        }
        if let Some(new) = base.and_then(|new| self.entity_types.get_mut(&new)) {
            new.derived_types.push(id);
        }
        if let Some(et) = self.entity_types.get_mut(&id) {
            et.base_type = base;
        }
    }

    /// Drop property declarations in `id`'s subtree that an ancestor of `id`
    /// already declares under the same name.
    pub(crate) fn fold_inherited_properties(&mut self, id: EntityTypeId) {
        let inherited: Vec<String> = self
            .ancestors_inclusive(id)
            .into_iter()
            .skip(1)
            .filter_map(|et| self.entity_types.get(&et))
            .flat_map(|et| et.properties.iter().cloned())
            .collect();
        if inherited.is_empty() {
            return;
        }
        for et in self.derived_types_inclusive(id) {
            if let Some(record) = self.entity_types.get_mut(&et) {
                record.properties.retain(|p| !inherited.contains(p));
            }
        }
    }

    /// Declare on `id` every property its subtree's members still reference
    /// but can no longer resolve.
    pub(crate) fn redeclare_orphaned_properties(&mut self, id: EntityTypeId) {
        let mut orphaned: Vec<String> = Vec::new();
        for et in self.derived_types_inclusive(id) {
            let referenced = self
                .declared_keys(et)
                .into_iter()
                .map(|k| &k.properties)
                .chain(self.declared_foreign_keys(et).into_iter().map(|fk| &fk.properties))
                .chain(self.declared_indexes(et).into_iter().map(|i| &i.properties))
                .flat_map(|list| list.iter());
            for name in referenced {
                if !self.has_property(et, name) && !orphaned.iter().any(|o| o == name) {
                    orphaned.push(name.to_string());
                }
            }
        }
        if orphaned.is_empty() {
            return;
        }
        // A deeper type may still declare one of them itself.
        for et in self.derived_types_inclusive(id).into_iter().skip(1) {
            if let Some(record) = self.entity_types.get_mut(&et) {
                record.properties.retain(|p| !orphaned.contains(p));
            }
        }
        if let Some(record) = self.entity_types.get_mut(&id) {
            record.properties.extend(orphaned);
        }
    }

    /// Indexes in `id`'s subtree whose property list an ancestor of `id` already
    /// indexes, each paired with the nearest such ancestor index.
    pub(crate) fn shadowed_indexes(&self, id: EntityTypeId) -> Vec<(IndexId, IndexId)> {
        let Some(base) = self.base_type(id) else {
            return Vec::new();
        };
        self.derived_indexes_inclusive(id)
            .into_iter()
            .filter_map(|index| {
                self.find_index(base, &index.properties)
                    .map(|inherited| (index.id, inherited.id))
            })
            .collect()
    }

    /// Indexes declared strictly below `id` in the hierarchy with exactly `properties`.
    pub(crate) fn derived_duplicate_indexes(
        &self,
        id: EntityTypeId,
        properties: &PropertyList,
    ) -> Vec<IndexId> {
        self.derived_types_inclusive(id)
            .into_iter()
            .filter(|et| *et != id)
            .flat_map(|et| self.declared_indexes(et))
            .filter(|index| &index.properties == properties)
            .map(|index| index.id)
            .collect()
    }
}

impl SchemaGraph for Model {
    fn entity_type(&self, id: EntityTypeId) -> Option<&EntityTypeRecord> {
        self.entity_types.get(&id)
    }

    fn entity_types(&self) -> Vec<&EntityTypeRecord> {
        self.entity_types.values().collect()
    }

    fn key(&self, id: KeyId) -> Option<&KeyRecord> {
        self.keys.get(&id)
    }

    fn foreign_key(&self, id: ForeignKeyId) -> Option<&ForeignKeyRecord> {
        self.foreign_keys.get(&id)
    }

    fn index(&self, id: IndexId) -> Option<&IndexRecord> {
        self.indexes.get(&id)
    }
}
