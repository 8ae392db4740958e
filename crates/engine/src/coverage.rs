use indexkeeper_core::PropertyList;
use indexkeeper_model::{ForeignKeyRecord, IndexRecord, KeyRecord};

/// The lookup shape of a key, index or foreign key: its ordered properties
/// and whether it guarantees (or needs) uniqueness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape<'a> {
    pub properties: &'a PropertyList,
    pub unique: bool,
}

impl<'a> Shape<'a> {
    pub fn new(properties: &'a PropertyList, unique: bool) -> Self {
        Self { properties, unique }
    }

    /// Keys are always unique.
    pub fn of_key(key: &'a KeyRecord) -> Self {
        Self::new(&key.properties, true)
    }

    pub fn of_index(index: &'a IndexRecord) -> Self {
        Self::new(&index.properties, index.unique)
    }

    pub fn of_foreign_key(foreign_key: &'a ForeignKeyRecord) -> Self {
        Self::new(&foreign_key.properties, foreign_key.unique)
    }
}

/// Whether `candidate` serves `requirement`.
///
/// A non-unique requirement is served by anything whose leading properties
/// match it. A unique requirement is only served by a unique candidate over
/// exactly the same properties.
pub fn covers(requirement: Shape<'_>, candidate: Shape<'_>) -> bool {
    debug_assert!(!requirement.properties.is_empty() && !candidate.properties.is_empty());
    if requirement.unique {
        candidate.unique && candidate.properties == requirement.properties
    } else {
        candidate.properties.starts_with(requirement.properties)
    }
}
