use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::*;
use crate::property::PropertyList;

/// A structural change to the schema graph, raised after the graph reflects it.
///
/// Events about removed elements carry what the element looked like, since the
/// element itself can no longer be looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructuralEvent {
    ForeignKeyAdded {
        foreign_key: ForeignKeyId,
    },
    ForeignKeyRemoved {
        declaring_type: EntityTypeId,
        foreign_key: ForeignKeyId,
        properties: PropertyList,
    },
    ForeignKeyPropertiesChanged {
        declaring_type: EntityTypeId,
        foreign_key: ForeignKeyId,
        old_properties: PropertyList,
        old_principal_key: KeyId,
    },
    ForeignKeyUniquenessChanged {
        foreign_key: ForeignKeyId,
    },
    KeyAdded {
        key: KeyId,
    },
    KeyRemoved {
        declaring_type: EntityTypeId,
        key: KeyId,
        properties: PropertyList,
    },
    IndexAdded {
        index: IndexId,
    },
    IndexRemoved {
        declaring_type: EntityTypeId,
        index: IndexId,
        properties: PropertyList,
        unique: bool,
    },
    IndexUniquenessChanged {
        index: IndexId,
    },
    BaseTypeChanged {
        entity_type: EntityTypeId,
        old_base_type: Option<EntityTypeId>,
    },
    ModelBuilt,
}

impl StructuralEvent {
    /// The entity type named by the event itself, if any.
    pub fn entity_type(&self) -> Option<EntityTypeId> {
        match self {
            Self::ForeignKeyRemoved { declaring_type, .. }
            | Self::ForeignKeyPropertiesChanged { declaring_type, .. }
            | Self::KeyRemoved { declaring_type, .. }
            | Self::IndexRemoved { declaring_type, .. } => Some(*declaring_type),
            Self::BaseTypeChanged { entity_type, .. } => Some(*entity_type),
            Self::ForeignKeyAdded { .. }
            | Self::ForeignKeyUniquenessChanged { .. }
            | Self::KeyAdded { .. }
            | Self::IndexAdded { .. }
            | Self::IndexUniquenessChanged { .. }
            | Self::ModelBuilt => None,
        }
    }

    /// String name of the event kind for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ForeignKeyAdded { .. } => "ForeignKeyAdded",
            Self::ForeignKeyRemoved { .. } => "ForeignKeyRemoved",
            Self::ForeignKeyPropertiesChanged { .. } => "ForeignKeyPropertiesChanged",
            Self::ForeignKeyUniquenessChanged { .. } => "ForeignKeyUniquenessChanged",
            Self::KeyAdded { .. } => "KeyAdded",
            Self::KeyRemoved { .. } => "KeyRemoved",
            Self::IndexAdded { .. } => "IndexAdded",
            Self::IndexRemoved { .. } => "IndexRemoved",
            Self::IndexUniquenessChanged { .. } => "IndexUniquenessChanged",
            Self::BaseTypeChanged { .. } => "BaseTypeChanged",
            Self::ModelBuilt => "ModelBuilt",
        }
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_events_name_their_entity_type() {
        let declaring_type = EntityTypeId::new();
        let event = StructuralEvent::IndexRemoved {
            declaring_type,
            index: IndexId::new(),
            properties: PropertyList::new(["B_Id"]).unwrap(),
            unique: true,
        };
        assert_eq!(event.entity_type(), Some(declaring_type));
        assert_eq!(event.kind_name(), "IndexRemoved");
        assert_eq!(StructuralEvent::ModelBuilt.entity_type(), None);
    }

    #[test]
    fn journal_encoding_preserves_event() {
        let event = StructuralEvent::ForeignKeyPropertiesChanged {
            declaring_type: EntityTypeId::new(),
            foreign_key: ForeignKeyId::new(),
            old_properties: PropertyList::new(["A", "B"]).unwrap(),
            old_principal_key: KeyId::new(),
        };
        let bytes = event.to_msgpack().unwrap();
        assert_eq!(StructuralEvent::from_msgpack(&bytes).unwrap(), event);
    }

    #[test]
    fn garbage_journal_is_a_serialization_error() {
        let result = StructuralEvent::from_msgpack(&[0xc1]);
        assert!(matches!(result, Err(CoreError::Serialization(_))));
    }
}
