use indexkeeper_core::{ids::*, ConfigurationSource, PropertyList};

#[derive(Debug, Clone)]
pub struct EntityTypeRecord {
    pub id: EntityTypeId,
    pub name: String,
    pub base_type: Option<EntityTypeId>,
    pub base_type_source: Option<ConfigurationSource>,
    pub derived_types: Vec<EntityTypeId>,
    pub properties: Vec<String>,
    pub keys: Vec<KeyId>,
    pub foreign_keys: Vec<ForeignKeyId>,
    pub indexes: Vec<IndexId>,
    pub source: ConfigurationSource,
}

#[derive(Debug, Clone)]
pub struct KeyRecord {
    pub id: KeyId,
    pub declaring_type: EntityTypeId,
    pub properties: PropertyList,
    pub source: ConfigurationSource,
}

#[derive(Debug, Clone)]
pub struct ForeignKeyRecord {
    pub id: ForeignKeyId,
    pub declaring_type: EntityTypeId,
    pub properties: PropertyList,
    pub principal_key: KeyId,
    pub unique: bool,
    pub source: ConfigurationSource,
    /// None until uniqueness has been configured by someone.
    pub unique_source: Option<ConfigurationSource>,
}

#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub id: IndexId,
    pub declaring_type: EntityTypeId,
    pub properties: PropertyList,
    pub unique: bool,
    pub source: ConfigurationSource,
    /// None until uniqueness has been configured by someone.
    pub unique_source: Option<ConfigurationSource>,
}

/// Read access to a schema graph.
///
/// Implementors supply the record lookups; the inheritance-aware queries are
/// derived from them. "Inherited" queries look at an entity type and its
/// ancestors, "derived inclusive" queries at an entity type and all of its
/// descendants.
pub trait SchemaGraph {
    fn entity_type(&self, id: EntityTypeId) -> Option<&EntityTypeRecord>;

    /// All entity types, in creation order.
    fn entity_types(&self) -> Vec<&EntityTypeRecord>;

    fn key(&self, id: KeyId) -> Option<&KeyRecord>;

    fn foreign_key(&self, id: ForeignKeyId) -> Option<&ForeignKeyRecord>;

    fn index(&self, id: IndexId) -> Option<&IndexRecord>;

    fn find_entity_type(&self, name: &str) -> Option<&EntityTypeRecord> {
        self.entity_types().into_iter().find(|et| et.name == name)
    }

    fn base_type(&self, id: EntityTypeId) -> Option<EntityTypeId> {
        self.entity_type(id).and_then(|et| et.base_type)
    }

    /// `id` followed by its base type, that type's base type, and so on.
    fn ancestors_inclusive(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        let mut chain = Vec::new();
        let mut current = self.entity_type(id).map(|et| et.id);
        while let Some(et) = current {
            chain.push(et);
            current = self.base_type(et);
        }
        chain
    }

    /// `id` and every transitive derived type, each exactly once.
    fn derived_types_inclusive(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        let mut visited = Vec::new();
        if self.entity_type(id).is_none() {
            return visited;
        }
        let mut stack = vec![id];
        while let Some(et) = stack.pop() {
            if visited.contains(&et) {
                continue;
            }
            visited.push(et);
            if let Some(record) = self.entity_type(et) {
                stack.extend(record.derived_types.iter().rev().copied());
            }
        }
        visited
    }

    fn declared_keys(&self, id: EntityTypeId) -> Vec<&KeyRecord> {
        self.entity_type(id)
            .map(|et| et.keys.iter().filter_map(|k| self.key(*k)).collect())
            .unwrap_or_default()
    }

    fn declared_foreign_keys(&self, id: EntityTypeId) -> Vec<&ForeignKeyRecord> {
        self.entity_type(id)
            .map(|et| et.foreign_keys.iter().filter_map(|fk| self.foreign_key(*fk)).collect())
            .unwrap_or_default()
    }

    fn declared_indexes(&self, id: EntityTypeId) -> Vec<&IndexRecord> {
        self.entity_type(id)
            .map(|et| et.indexes.iter().filter_map(|i| self.index(*i)).collect())
            .unwrap_or_default()
    }

    fn keys(&self, id: EntityTypeId) -> Vec<&KeyRecord> {
        self.ancestors_inclusive(id)
            .into_iter()
            .flat_map(|et| self.declared_keys(et))
            .collect()
    }

    fn foreign_keys(&self, id: EntityTypeId) -> Vec<&ForeignKeyRecord> {
        self.ancestors_inclusive(id)
            .into_iter()
            .flat_map(|et| self.declared_foreign_keys(et))
            .collect()
    }

    fn indexes(&self, id: EntityTypeId) -> Vec<&IndexRecord> {
        self.ancestors_inclusive(id)
            .into_iter()
            .flat_map(|et| self.declared_indexes(et))
            .collect()
    }

    fn derived_foreign_keys_inclusive(&self, id: EntityTypeId) -> Vec<&ForeignKeyRecord> {
        self.derived_types_inclusive(id)
            .into_iter()
            .flat_map(|et| self.declared_foreign_keys(et))
            .collect()
    }

    fn derived_indexes_inclusive(&self, id: EntityTypeId) -> Vec<&IndexRecord> {
        self.derived_types_inclusive(id)
            .into_iter()
            .flat_map(|et| self.declared_indexes(et))
            .collect()
    }

    /// The index on `id` or the nearest ancestor whose property list is exactly `properties`.
    fn find_index(&self, id: EntityTypeId, properties: &PropertyList) -> Option<&IndexRecord> {
        self.ancestors_inclusive(id)
            .into_iter()
            .find_map(|et| {
                self.declared_indexes(et)
                    .into_iter()
                    .find(|index| &index.properties == properties)
            })
    }

    /// Foreign keys on `id` or its ancestors whose property list is exactly `properties`.
    fn find_foreign_keys(
        &self,
        id: EntityTypeId,
        properties: &PropertyList,
    ) -> Vec<&ForeignKeyRecord> {
        self.foreign_keys(id)
            .into_iter()
            .filter(|fk| &fk.properties == properties)
            .collect()
    }

    fn find_key(&self, id: EntityTypeId, properties: &PropertyList) -> Option<&KeyRecord> {
        self.keys(id).into_iter().find(|key| &key.properties == properties)
    }

    /// Whether `name` is declared on `id` or one of its ancestors.
    fn has_property(&self, id: EntityTypeId, name: &str) -> bool {
        self.ancestors_inclusive(id).into_iter().any(|et| {
            self.entity_type(et)
                .is_some_and(|record| record.properties.iter().any(|p| p == name))
        })
    }
}
