use indexkeeper_core::{ids::*, PropertyList, StructuralEvent};
use indexkeeper_model::{Convention, ForeignKeyRecord, ModelBuilder, SchemaGraph};
use tracing::trace;

use crate::config::EngineConfig;
use crate::coverage::{covers, Shape};
use crate::diagnostics::{sweep_redundant_indexes, Diagnostics};
use crate::synthesis::{downgrade, ensure_index, remove_if_conventional, set_uniqueness};

/// Keeps every foreign key served by exactly one index or key, and removes
/// convention-made indexes that something else already serves.
pub struct ForeignKeyIndexConvention {
    diagnostics: Diagnostics,
}

impl ForeignKeyIndexConvention {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_diagnostics(Diagnostics::new(&config.diagnostics))
    }

    pub fn with_diagnostics(diagnostics: Diagnostics) -> Self {
        Self { diagnostics }
    }

    /// A builder with this convention as its only convention.
    pub fn into_builder(self) -> ModelBuilder {
        let convention: Box<dyn Convention> = Box::new(self);
        ModelBuilder::new(vec![convention])
    }
}

impl Convention for ForeignKeyIndexConvention {
    fn name(&self) -> &'static str {
        "ForeignKeyIndexConvention"
    }

    fn apply(&self, builder: &mut ModelBuilder, event: &StructuralEvent) {
        trace!(event = event.kind_name(), "foreign key index convention");
        match event {
            StructuralEvent::ForeignKeyAdded { foreign_key } => {
                on_foreign_key_added(builder, *foreign_key);
            }
            StructuralEvent::ForeignKeyRemoved {
                declaring_type,
                properties,
                ..
            } => on_foreign_key_removed(builder, *declaring_type, properties),
            StructuralEvent::ForeignKeyPropertiesChanged {
                declaring_type,
                foreign_key,
                old_properties,
                ..
            } => on_foreign_key_properties_changed(builder, *declaring_type, *foreign_key, old_properties),
            StructuralEvent::ForeignKeyUniquenessChanged { foreign_key } => {
                on_foreign_key_uniqueness_changed(builder, *foreign_key);
            }
            StructuralEvent::KeyAdded { key } => on_key_added(builder, *key),
            StructuralEvent::KeyRemoved {
                declaring_type,
                properties,
                ..
            } => on_key_removed(builder, *declaring_type, properties),
            StructuralEvent::IndexAdded { index } => on_index_added(builder, *index),
            StructuralEvent::IndexRemoved {
                declaring_type,
                properties,
                unique,
                ..
            } => on_index_removed(builder, *declaring_type, Shape::new(properties, *unique)),
            StructuralEvent::IndexUniquenessChanged { index } => {
                on_index_uniqueness_changed(builder, *index);
            }
            StructuralEvent::BaseTypeChanged { entity_type, .. } => {
                on_base_type_changed(builder, *entity_type);
            }
            StructuralEvent::ModelBuilt => {
                sweep_redundant_indexes(builder.model(), &self.diagnostics);
            }
        }
    }
}

/// Owned copy of what `ensure_index` needs from a foreign key, so the builder
/// can be mutated while working through a list of them.
struct Requirement {
    properties: PropertyList,
    unique: bool,
    declaring_type: EntityTypeId,
}

impl Requirement {
    fn of(foreign_key: &ForeignKeyRecord) -> Self {
        Self {
            properties: foreign_key.properties.clone(),
            unique: foreign_key.unique,
            declaring_type: foreign_key.declaring_type,
        }
    }

    fn ensure(&self, builder: &mut ModelBuilder) -> Option<IndexId> {
        ensure_index(builder, &self.properties, self.unique, self.declaring_type)
    }
}

fn requirement_of(builder: &ModelBuilder, foreign_key: ForeignKeyId) -> Option<Requirement> {
    builder.model().foreign_key(foreign_key).map(Requirement::of)
}

/// Foreign keys over `entity_type` and its derived types that `removed` used to serve.
fn requirements_served_by(
    builder: &ModelBuilder,
    entity_type: EntityTypeId,
    removed: Shape<'_>,
    filter: impl Fn(&ForeignKeyRecord) -> bool,
) -> Vec<Requirement> {
    builder
        .model()
        .derived_foreign_keys_inclusive(entity_type)
        .into_iter()
        .filter(|fk| filter(fk) && covers(Shape::of_foreign_key(fk), removed))
        .map(Requirement::of)
        .collect()
}

/// Indexes over `entity_type` and its derived types, other than `except`,
/// that `shape` serves.
fn indexes_served_by(
    builder: &ModelBuilder,
    entity_type: EntityTypeId,
    shape: Shape<'_>,
    except: Option<IndexId>,
) -> Vec<IndexId> {
    builder
        .model()
        .derived_indexes_inclusive(entity_type)
        .into_iter()
        .filter(|index| Some(index.id) != except && covers(Shape::of_index(index), shape))
        .map(|index| index.id)
        .collect()
}

fn remove_all(builder: &mut ModelBuilder, indexes: Vec<IndexId>) {
    for index in indexes {
        remove_if_conventional(builder, index);
    }
}

fn ensure_all(builder: &mut ModelBuilder, requirements: Vec<Requirement>) {
    for requirement in requirements {
        requirement.ensure(builder);
    }
}

// ============================================================================
// Foreign keys
// ============================================================================

fn on_foreign_key_added(builder: &mut ModelBuilder, foreign_key: ForeignKeyId) {
    if let Some(requirement) = requirement_of(builder, foreign_key) {
        requirement.ensure(builder);
    }
}

fn on_foreign_key_removed(
    builder: &mut ModelBuilder,
    declaring_type: EntityTypeId,
    properties: &PropertyList,
) {
    let model = builder.model();
    let Some(index) = model.find_index(declaring_type, properties) else {
        return;
    };
    let (index, index_unique, owner) = (index.id, index.unique, index.declaring_type);

    // Only foreign keys that can see the index keep it alive.
    let others: Vec<_> = model
        .find_foreign_keys(declaring_type, properties)
        .into_iter()
        .filter(|fk| model.ancestors_inclusive(fk.declaring_type).contains(&owner))
        .collect();
    if others.is_empty() {
        remove_if_conventional(builder, index);
        return;
    }
    // The remaining foreign keys still need the index, but maybe not its uniqueness.
    if index_unique && others.iter().all(|fk| !fk.unique) {
        downgrade(builder, index);
    }
}

fn on_foreign_key_properties_changed(
    builder: &mut ModelBuilder,
    declaring_type: EntityTypeId,
    foreign_key: ForeignKeyId,
    old_properties: &PropertyList,
) {
    if builder
        .model()
        .foreign_key(foreign_key)
        .is_some_and(|fk| &fk.properties == old_properties)
    {
        return;
    }

    on_foreign_key_removed(builder, declaring_type, old_properties);
    // Cleaning up may have cascaded into removing the foreign key itself.
    if let Some(requirement) = requirement_of(builder, foreign_key) {
        requirement.ensure(builder);
    }
}

fn on_foreign_key_uniqueness_changed(builder: &mut ModelBuilder, foreign_key: ForeignKeyId) {
    let Some(requirement) = requirement_of(builder, foreign_key) else {
        return;
    };
    let model = builder.model();
    let Some(index) = model
        .find_index(requirement.declaring_type, &requirement.properties)
        .map(|index| index.id)
    else {
        if requirement.unique {
            requirement.ensure(builder);
        }
        return;
    };

    if !requirement.unique {
        let relaxed = Shape::new(&requirement.properties, false);
        let served_elsewhere = model
            .keys(requirement.declaring_type)
            .into_iter()
            .any(|key| covers(relaxed, Shape::of_key(key)))
            || model
                .indexes(requirement.declaring_type)
                .into_iter()
                .any(|other| other.id != index && covers(relaxed, Shape::of_index(other)));
        if served_elsewhere {
            remove_if_conventional(builder, index);
            return;
        }
    }
    set_uniqueness(builder, index, requirement.unique);
}

// ============================================================================
// Keys
// ============================================================================

fn on_key_added(builder: &mut ModelBuilder, key: KeyId) {
    let Some(record) = builder.model().key(key) else {
        return;
    };
    let redundant = indexes_served_by(builder, record.declaring_type, Shape::of_key(record), None);
    remove_all(builder, redundant);
}

fn on_key_removed(builder: &mut ModelBuilder, declaring_type: EntityTypeId, properties: &PropertyList) {
    let uncovered = requirements_served_by(builder, declaring_type, Shape::new(properties, true), |_| true);
    ensure_all(builder, uncovered);
}

// ============================================================================
// Indexes
// ============================================================================

fn on_index_added(builder: &mut ModelBuilder, index: IndexId) {
    let Some(record) = builder.model().index(index) else {
        return;
    };
    let redundant = indexes_served_by(builder, record.declaring_type, Shape::of_index(record), Some(index));
    remove_all(builder, redundant);
}

fn on_index_removed(builder: &mut ModelBuilder, declaring_type: EntityTypeId, removed: Shape<'_>) {
    let uncovered = requirements_served_by(builder, declaring_type, removed, |_| true);
    ensure_all(builder, uncovered);
}

fn on_index_uniqueness_changed(builder: &mut ModelBuilder, index: IndexId) {
    let Some(record) = builder.model().index(index) else {
        return;
    };
    let as_unique = Shape::new(&record.properties, true);
    if record.unique {
        let redundant = indexes_served_by(builder, record.declaring_type, as_unique, Some(index));
        remove_all(builder, redundant);
    } else {
        let uncovered = requirements_served_by(builder, record.declaring_type, as_unique, |fk| fk.unique);
        ensure_all(builder, uncovered);
    }
}

// ============================================================================
// Inheritance
// ============================================================================

fn on_base_type_changed(builder: &mut ModelBuilder, entity_type: EntityTypeId) {
    let model = builder.model();
    let base_type = model.base_type(entity_type);
    let subtree = model.derived_types_inclusive(entity_type);
    let requirements: Vec<Requirement> = model
        .derived_foreign_keys_inclusive(entity_type)
        .into_iter()
        .map(Requirement::of)
        .collect();

    for requirement in requirements {
        let model = builder.model();
        let Some(index) = model.find_index(requirement.declaring_type, &requirement.properties) else {
            requirement.ensure(builder);
            continue;
        };
        if let Some(base_type) = base_type.filter(|_| subtree.contains(&index.declaring_type)) {
            let needed = Shape::new(&requirement.properties, requirement.unique);
            let index = index.id;
            let served_by_base = model
                .keys(base_type)
                .into_iter()
                .any(|key| covers(needed, Shape::of_key(key)))
                || model
                    .indexes(base_type)
                    .into_iter()
                    .any(|other| covers(needed, Shape::of_index(other)));
            if served_by_base {
                remove_if_conventional(builder, index);
                continue;
            }
        }
        // An inherited index absorbed from the subtree may still lack the uniqueness needed.
        requirement.ensure(builder);
    }
}
