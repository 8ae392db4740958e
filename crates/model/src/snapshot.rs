use serde::{Deserialize, Serialize};

use indexkeeper_core::{EntityTypeId, PropertyList};

use crate::error::ModelError;
use crate::memory::Model;
use crate::traits::SchemaGraph;

/// Id-free, canonically ordered picture of a model.
///
/// Two models built through different event orders have equal snapshots when
/// they ended up with the same structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub entity_types: Vec<EntityTypeSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeSnapshot {
    pub name: String,
    pub base_type: Option<String>,
    pub properties: Vec<String>,
    pub keys: Vec<PropertyList>,
    pub foreign_keys: Vec<ForeignKeySnapshot>,
    pub indexes: Vec<IndexSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForeignKeySnapshot {
    pub properties: PropertyList,
    pub unique: bool,
    pub principal_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub properties: PropertyList,
    pub unique: bool,
}

impl Model {
    pub fn snapshot(&self) -> ModelSnapshot {
        let name_of = |id: EntityTypeId| {
            self.entity_type(id)
                .map(|et| et.name.clone())
                .unwrap_or_default()
        };

        let mut entity_types: Vec<EntityTypeSnapshot> = self
            .entity_types()
            .into_iter()
            .map(|et| {
                let mut properties = et.properties.clone();
                properties.sort();

                let mut keys: Vec<PropertyList> = self
                    .declared_keys(et.id)
                    .into_iter()
                    .map(|k| k.properties.clone())
                    .collect();
                keys.sort();

                let mut foreign_keys: Vec<ForeignKeySnapshot> = self
                    .declared_foreign_keys(et.id)
                    .into_iter()
                    .map(|fk| ForeignKeySnapshot {
                        properties: fk.properties.clone(),
                        unique: fk.unique,
                        principal_type: self
                            .key(fk.principal_key)
                            .map(|k| name_of(k.declaring_type))
                            .unwrap_or_default(),
                    })
                    .collect();
                foreign_keys.sort();

                let mut indexes: Vec<IndexSnapshot> = self
                    .declared_indexes(et.id)
                    .into_iter()
                    .map(|i| IndexSnapshot {
                        properties: i.properties.clone(),
                        unique: i.unique,
                    })
                    .collect();
                indexes.sort();

                EntityTypeSnapshot {
                    name: et.name.clone(),
                    base_type: et.base_type.map(name_of),
                    properties,
                    keys,
                    foreign_keys,
                    indexes,
                }
            })
            .collect();
        entity_types.sort_by(|a, b| a.name.cmp(&b.name));

        ModelSnapshot { entity_types }
    }

    /// BLAKE3 hash of the MessagePack-encoded [`ModelSnapshot`].
    pub fn fingerprint(&self) -> Result<[u8; 32], ModelError> {
        let bytes = rmp_serde::to_vec(&self.snapshot())
            .map_err(|e| ModelError::Serialization(e.to_string()))?;
        Ok(*blake3::hash(&bytes).as_bytes())
    }
}
