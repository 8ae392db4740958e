use std::rc::Rc;

use indexkeeper_core::{ids::*, ConfigurationSource, Outcome, PropertyList, StructuralEvent};
use tracing::{debug, trace};

use crate::memory::Model;
use crate::traits::{EntityTypeRecord, ForeignKeyRecord, IndexRecord, KeyRecord, SchemaGraph};

/// A rule that reacts to structural changes of the model being built.
///
/// Conventions run synchronously, in registration order, after the model
/// already reflects the change. They may mutate the model through the
/// builder, which raises further events before the call returns.
pub trait Convention {
    fn name(&self) -> &'static str;

    fn apply(&self, builder: &mut ModelBuilder, event: &StructuralEvent);
}

/// Single writer for a [`Model`] under construction.
///
/// Every mutation takes the [`ConfigurationSource`] of the request and
/// returns an [`Outcome`]; a request that would override configuration from a
/// higher source is rejected without touching the model.
pub struct ModelBuilder {
    model: Model,
    conventions: Rc<[Box<dyn Convention>]>,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ModelBuilder {
    pub fn new(conventions: Vec<Box<dyn Convention>>) -> Self {
        Self {
            model: Model::new(),
            conventions: conventions.into(),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Raise `ModelBuilt` and hand back the finished, read-only model.
    pub fn finish(mut self) -> Model {
        self.dispatch(StructuralEvent::ModelBuilt);
        self.model
    }

    fn dispatch(&mut self, event: StructuralEvent) {
        trace!(
            event = event.kind_name(),
            entity_type = ?event.entity_type().map(|et| self.type_name(et).to_string()),
            "dispatching structural event"
        );
        let conventions = Rc::clone(&self.conventions);
        for convention in conventions.iter() {
            if self.is_stale(&event) {
                debug!(
                    event = event.kind_name(),
                    convention = convention.name(),
                    "event subject no longer in model, skipping remaining conventions"
                );
                break;
            }
            convention.apply(self, &event);
        }
    }

    /// Whether an earlier convention already removed what the event is about.
    fn is_stale(&self, event: &StructuralEvent) -> bool {
        match event {
            StructuralEvent::ForeignKeyAdded { foreign_key }
            | StructuralEvent::ForeignKeyUniquenessChanged { foreign_key } => {
                self.model.foreign_key(*foreign_key).is_none()
            }
            StructuralEvent::KeyAdded { key } => self.model.key(*key).is_none(),
            StructuralEvent::IndexAdded { index }
            | StructuralEvent::IndexUniquenessChanged { index } => self.model.index(*index).is_none(),
            StructuralEvent::ForeignKeyRemoved { declaring_type, .. }
            | StructuralEvent::KeyRemoved { declaring_type, .. }
            | StructuralEvent::IndexRemoved { declaring_type, .. } => {
                self.model.entity_type(*declaring_type).is_none()
            }
            StructuralEvent::BaseTypeChanged { entity_type, .. } => {
                self.model.entity_type(*entity_type).is_none()
            }
            // Still carries the old property list that needs cleaning up.
            StructuralEvent::ForeignKeyPropertiesChanged { .. } | StructuralEvent::ModelBuilt => false,
        }
    }

    fn type_name(&self, id: EntityTypeId) -> &str {
        self.model.entity_type(id).map_or("?", |et| et.name.as_str())
    }

    fn resolves(&self, entity_type: EntityTypeId, properties: &PropertyList) -> bool {
        properties.iter().all(|name| self.model.has_property(entity_type, name))
    }

    // ========================================================================
    // Entity types and properties
    // ========================================================================

    /// Add an entity type, or return the existing one with the same name.
    pub fn add_entity_type(
        &mut self,
        name: &str,
        source: ConfigurationSource,
    ) -> Outcome<EntityTypeId> {
        if name.is_empty() {
            return Outcome::RejectedInvalid;
        }
        if let Some(id) = self.model.find_entity_type(name).map(|et| et.id) {
            if let Some(et) = self.model.entity_type_mut(id) {
                et.source = et.source.max(source);
            }
            return Outcome::Applied(id);
        }

        let id = EntityTypeId::new();
        self.model.insert_entity_type(EntityTypeRecord {
            id,
            name: name.to_string(),
            base_type: None,
            base_type_source: None,
            derived_types: Vec::new(),
            properties: Vec::new(),
            keys: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
            source,
        });
        debug!(entity_type = name, source = source.as_str(), "entity type added");
        Outcome::Applied(id)
    }

    /// Declare a property. Names must be unique across the whole hierarchy.
    pub fn add_property(&mut self, entity_type: EntityTypeId, name: &str) -> Outcome<()> {
        let Some(record) = self.model.entity_type(entity_type) else {
            return Outcome::RejectedInvalid;
        };
        if name.is_empty() {
            return Outcome::RejectedInvalid;
        }
        if record.properties.iter().any(|p| p == name) {
            return Outcome::Applied(());
        }
        let clash = self
            .model
            .ancestors_inclusive(entity_type)
            .into_iter()
            .chain(self.model.derived_types_inclusive(entity_type))
            .filter_map(|et| self.model.entity_type(et))
            .any(|et| et.properties.iter().any(|p| p == name));
        if clash {
            return Outcome::RejectedInvalid;
        }

        if let Some(et) = self.model.entity_type_mut(entity_type) {
            et.properties.push(name.to_string());
        }
        trace!(entity_type = self.type_name(entity_type), property = name, "property added");
        Outcome::Applied(())
    }

    /// Change (or clear) the base type of `entity_type`.
    ///
    /// Properties the subtree declares under a name the new ancestors already
    /// declare are folded into the ancestor's. Properties still referenced by
    /// the subtree's keys, foreign keys or indexes but no longer inherited are
    /// declared on `entity_type` itself.
    ///
    /// Subtree indexes whose properties the new ancestors already index are
    /// folded into the ancestor's index the way [`Self::add_index`] folds: after
    /// `BaseTypeChanged`, the ancestor raises `IndexUniquenessChanged` if the
    /// fold changed it, then each folded index raises `IndexRemoved`.
    pub fn set_base_type(
        &mut self,
        entity_type: EntityTypeId,
        base_type: Option<EntityTypeId>,
        source: ConfigurationSource,
    ) -> Outcome<()> {
        let Some(record) = self.model.entity_type(entity_type) else {
            return Outcome::RejectedInvalid;
        };
        let old_base_type = record.base_type;
        if old_base_type == base_type {
            if let Some(et) = self.model.entity_type_mut(entity_type) {
                et.base_type_source = et.base_type_source.max(Some(source));
            }
            return Outcome::Applied(());
        }
        if record.base_type_source.is_some_and(|existing| !source.overrides(existing)) {
            return Outcome::RejectedPrecedence;
        }

        if let Some(base) = base_type {
            if self.model.entity_type(base).is_none()
                || self.model.derived_types_inclusive(entity_type).contains(&base)
            {
                return Outcome::RejectedInvalid;
            }
        }

        self.model.relink_base_type(entity_type, base_type);
        self.model.fold_inherited_properties(entity_type);
        self.model.redeclare_orphaned_properties(entity_type);
        if let Some(et) = self.model.entity_type_mut(entity_type) {
            et.base_type_source = Some(source);
        }

        let mut folded = Vec::new();
        let mut reshaped = Vec::new();
        for (duplicate, inherited) in self.model.shadowed_indexes(entity_type) {
            let Some(old) = self.model.detach_index(duplicate) else {
                continue;
            };
            if let Some(target) = self.model.index_mut(inherited) {
                let was_unique = target.unique;
                absorb(target, &old);
                if target.unique != was_unique && !reshaped.contains(&inherited) {
                    reshaped.push(inherited);
                }
            }
            folded.push(old);
        }

        debug!(
            entity_type = self.type_name(entity_type),
            base_type = ?base_type.map(|b| self.type_name(b).to_string()),
            folded = folded.len(),
            "base type changed"
        );
        self.dispatch(StructuralEvent::BaseTypeChanged {
            entity_type,
            old_base_type,
        });
        for index in reshaped {
            self.dispatch(StructuralEvent::IndexUniquenessChanged { index });
        }
        self.dispatch_folded(folded);
        Outcome::Applied(())
    }

    // ========================================================================
    // Keys
    // ========================================================================

    /// Add a key, or return the one `entity_type` already has for `properties`.
    pub fn add_key(
        &mut self,
        entity_type: EntityTypeId,
        properties: PropertyList,
        source: ConfigurationSource,
    ) -> Outcome<KeyId> {
        if self.model.entity_type(entity_type).is_none() || !self.resolves(entity_type, &properties) {
            return Outcome::RejectedInvalid;
        }
        if let Some(existing) = self.model.find_key(entity_type, &properties).map(|k| k.id) {
            if let Some(key) = self.model.key_mut(existing) {
                key.source = key.source.max(source);
            }
            return Outcome::Applied(existing);
        }

        let id = KeyId::new();
        debug!(
            entity_type = self.type_name(entity_type),
            properties = %properties,
            source = source.as_str(),
            "key added"
        );
        self.model.insert_key(KeyRecord {
            id,
            declaring_type: entity_type,
            properties,
            source,
        });
        self.dispatch(StructuralEvent::KeyAdded { key: id });
        Outcome::Applied(id)
    }

    /// Remove a key. Keys still used as a principal key cannot be removed.
    pub fn remove_key(&mut self, key: KeyId, source: ConfigurationSource) -> Outcome<()> {
        let Some(record) = self.model.key(key) else {
            return Outcome::RejectedInvalid;
        };
        if !source.overrides(record.source) {
            return Outcome::RejectedPrecedence;
        }
        let referenced = self
            .model
            .entity_types()
            .into_iter()
            .flat_map(|et| self.model.declared_foreign_keys(et.id))
            .any(|fk| fk.principal_key == key);
        if referenced {
            return Outcome::RejectedInvalid;
        }

        let Some(removed) = self.model.detach_key(key) else {
            return Outcome::RejectedInvalid;
        };
        debug!(
            entity_type = self.type_name(removed.declaring_type),
            properties = %removed.properties,
            "key removed"
        );
        self.dispatch(StructuralEvent::KeyRemoved {
            declaring_type: removed.declaring_type,
            key: removed.id,
            properties: removed.properties,
        });
        Outcome::Applied(())
    }

    // ========================================================================
    // Foreign keys
    // ========================================================================

    pub fn add_foreign_key(
        &mut self,
        entity_type: EntityTypeId,
        properties: PropertyList,
        principal_key: KeyId,
        unique: bool,
        source: ConfigurationSource,
    ) -> Outcome<ForeignKeyId> {
        if self.model.entity_type(entity_type).is_none() || !self.resolves(entity_type, &properties) {
            return Outcome::RejectedInvalid;
        }
        match self.model.key(principal_key) {
            Some(key) if key.properties.len() == properties.len() => {}
            _ => return Outcome::RejectedInvalid,
        }

        let id = ForeignKeyId::new();
        debug!(
            entity_type = self.type_name(entity_type),
            properties = %properties,
            unique,
            source = source.as_str(),
            "foreign key added"
        );
        self.model.insert_foreign_key(ForeignKeyRecord {
            id,
            declaring_type: entity_type,
            properties,
            principal_key,
            unique,
            source,
            unique_source: unique.then_some(source),
        });
        self.dispatch(StructuralEvent::ForeignKeyAdded { foreign_key: id });
        Outcome::Applied(id)
    }

    pub fn remove_foreign_key(
        &mut self,
        foreign_key: ForeignKeyId,
        source: ConfigurationSource,
    ) -> Outcome<()> {
        let Some(record) = self.model.foreign_key(foreign_key) else {
            return Outcome::RejectedInvalid;
        };
        if !source.overrides(record.source) {
            return Outcome::RejectedPrecedence;
        }

        let Some(removed) = self.model.detach_foreign_key(foreign_key) else {
            return Outcome::RejectedInvalid;
        };
        debug!(
            entity_type = self.type_name(removed.declaring_type),
            properties = %removed.properties,
            "foreign key removed"
        );
        self.dispatch(StructuralEvent::ForeignKeyRemoved {
            declaring_type: removed.declaring_type,
            foreign_key: removed.id,
            properties: removed.properties,
        });
        Outcome::Applied(())
    }

    /// Point the foreign key at a different list of dependent properties.
    pub fn set_foreign_key_properties(
        &mut self,
        foreign_key: ForeignKeyId,
        properties: PropertyList,
        source: ConfigurationSource,
    ) -> Outcome<()> {
        let Some(record) = self.model.foreign_key(foreign_key) else {
            return Outcome::RejectedInvalid;
        };
        if record.properties == properties {
            return Outcome::Applied(());
        }
        if !source.overrides(record.source) {
            return Outcome::RejectedPrecedence;
        }
        let declaring_type = record.declaring_type;
        let principal_len = self.model.key(record.principal_key).map(|k| k.properties.len());
        if principal_len != Some(properties.len()) || !self.resolves(declaring_type, &properties) {
            return Outcome::RejectedInvalid;
        }

        let Some(fk) = self.model.foreign_key_mut(foreign_key) else {
            return Outcome::RejectedInvalid;
        };
        let old_properties = std::mem::replace(&mut fk.properties, properties);
        let old_principal_key = fk.principal_key;
        fk.source = fk.source.max(source);
        debug!(
            entity_type = self.type_name(declaring_type),
            old_properties = %old_properties,
            "foreign key properties changed"
        );
        self.dispatch(StructuralEvent::ForeignKeyPropertiesChanged {
            declaring_type,
            foreign_key,
            old_properties,
            old_principal_key,
        });
        Outcome::Applied(())
    }

    pub fn set_foreign_key_unique(
        &mut self,
        foreign_key: ForeignKeyId,
        unique: bool,
        source: ConfigurationSource,
    ) -> Outcome<()> {
        let Some(fk) = self.model.foreign_key_mut(foreign_key) else {
            return Outcome::RejectedInvalid;
        };
        if fk.unique == unique {
            fk.unique_source = fk.unique_source.max(Some(source));
            return Outcome::Applied(());
        }
        if fk.unique_source.is_some_and(|existing| !source.overrides(existing)) {
            return Outcome::RejectedPrecedence;
        }

        fk.unique = unique;
        fk.unique_source = Some(source);
        trace!(unique, "foreign key uniqueness changed");
        self.dispatch(StructuralEvent::ForeignKeyUniquenessChanged { foreign_key });
        Outcome::Applied(())
    }

    // ========================================================================
    // Indexes
    // ========================================================================

    /// Create-or-fetch the index for `properties`.
    ///
    /// If `entity_type` or one of its ancestors already declares an index with
    /// exactly these properties, that index is returned and no event is raised.
    /// Indexes with the same properties on derived types are folded into the
    /// new one: they raise `IndexRemoved` after the new index's `IndexAdded`.
    pub fn add_index(
        &mut self,
        entity_type: EntityTypeId,
        properties: PropertyList,
        source: ConfigurationSource,
    ) -> Outcome<IndexId> {
        if self.model.entity_type(entity_type).is_none() || !self.resolves(entity_type, &properties) {
            return Outcome::RejectedInvalid;
        }
        if let Some(existing) = self.model.find_index(entity_type, &properties).map(|i| i.id) {
            if let Some(index) = self.model.index_mut(existing) {
                index.source = index.source.max(source);
            }
            return Outcome::Applied(existing);
        }

        let duplicates = self.model.derived_duplicate_indexes(entity_type, &properties);
        let mut record = IndexRecord {
            id: IndexId::new(),
            declaring_type: entity_type,
            properties,
            unique: false,
            source,
            unique_source: None,
        };
        let mut folded = Vec::new();
        for duplicate in duplicates {
            if let Some(old) = self.model.detach_index(duplicate) {
                absorb(&mut record, &old);
                folded.push(old);
            }
        }

        let id = record.id;
        debug!(
            entity_type = self.type_name(entity_type),
            properties = %record.properties,
            source = source.as_str(),
            folded = folded.len(),
            "index added"
        );
        self.model.insert_index(record);
        self.dispatch(StructuralEvent::IndexAdded { index: id });
        self.dispatch_folded(folded);
        Outcome::Applied(id)
    }

    fn dispatch_folded(&mut self, folded: Vec<IndexRecord>) {
        for old in folded {
            self.dispatch(StructuralEvent::IndexRemoved {
                declaring_type: old.declaring_type,
                index: old.id,
                properties: old.properties,
                unique: old.unique,
            });
        }
    }

    pub fn set_index_unique(
        &mut self,
        index: IndexId,
        unique: bool,
        source: ConfigurationSource,
    ) -> Outcome<()> {
        let Some(record) = self.model.index_mut(index) else {
            return Outcome::RejectedInvalid;
        };
        if record.unique == unique {
            record.unique_source = record.unique_source.max(Some(source));
            return Outcome::Applied(());
        }
        if record.unique_source.is_some_and(|existing| !source.overrides(existing)) {
            return Outcome::RejectedPrecedence;
        }

        record.unique = unique;
        record.unique_source = Some(source);
        let declaring_type = record.declaring_type;
        debug!(
            entity_type = self.type_name(declaring_type),
            unique,
            source = source.as_str(),
            "index uniqueness changed"
        );
        self.dispatch(StructuralEvent::IndexUniquenessChanged { index });
        Outcome::Applied(())
    }

    pub fn remove_index(&mut self, index: IndexId, source: ConfigurationSource) -> Outcome<()> {
        let Some(record) = self.model.index(index) else {
            return Outcome::RejectedInvalid;
        };
        if !source.overrides(record.source) {
            return Outcome::RejectedPrecedence;
        }

        let Some(removed) = self.model.detach_index(index) else {
            return Outcome::RejectedInvalid;
        };
        debug!(
            entity_type = self.type_name(removed.declaring_type),
            properties = %removed.properties,
            "index removed"
        );
        self.dispatch(StructuralEvent::IndexRemoved {
            declaring_type: removed.declaring_type,
            index: removed.id,
            properties: removed.properties,
            unique: removed.unique,
        });
        Outcome::Applied(())
    }
}

/// Merge a duplicate index into `target`: the higher configuration source
/// wins, and so does the uniqueness configured at the higher source.
fn absorb(target: &mut IndexRecord, duplicate: &IndexRecord) {
    target.source = target.source.max(duplicate.source);
    if duplicate.unique_source > target.unique_source {
        target.unique = duplicate.unique;
        target.unique_source = duplicate.unique_source;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    const CONVENTION: ConfigurationSource = ConfigurationSource::Convention;
    const EXPLICIT: ConfigurationSource = ConfigurationSource::Explicit;

    fn list(names: &[&str]) -> PropertyList {
        PropertyList::new(names.iter().copied()).unwrap()
    }

    /// Records every event it sees.
    struct Journal(Rc<RefCell<Vec<StructuralEvent>>>);

    impl Convention for Journal {
        fn name(&self) -> &'static str {
            "journal"
        }

        fn apply(&self, _builder: &mut ModelBuilder, event: &StructuralEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    fn journaled() -> (ModelBuilder, Rc<RefCell<Vec<StructuralEvent>>>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let journal: Box<dyn Convention> = Box::new(Journal(Rc::clone(&events)));
        let builder = ModelBuilder::new(vec![journal]);
        (builder, events)
    }

    fn entity(builder: &mut ModelBuilder, name: &str, properties: &[&str]) -> EntityTypeId {
        let id = builder.add_entity_type(name, EXPLICIT).applied().unwrap();
        for property in properties {
            assert!(builder.add_property(id, property).is_applied());
        }
        id
    }

    #[test]
    fn add_index_returns_existing_for_same_properties() {
        let (mut builder, events) = journaled();
        let e = entity(&mut builder, "E", &["X", "Y"]);

        let first = builder.add_index(e, list(&["X"]), CONVENTION).applied().unwrap();
        let second = builder.add_index(e, list(&["X"]), EXPLICIT).applied().unwrap();

        assert_eq!(first, second);
        assert_eq!(builder.model().index_count(), 1);
        assert_eq!(builder.model().index(first).unwrap().source, EXPLICIT);
        assert_eq!(events.borrow().len(), 1);
    }

    #[test]
    fn add_index_on_derived_type_returns_inherited_index() {
        let (mut builder, _) = journaled();
        let base = entity(&mut builder, "Base", &["X"]);
        let derived = entity(&mut builder, "Derived", &[]);
        assert!(builder.set_base_type(derived, Some(base), EXPLICIT).is_applied());

        let on_base = builder.add_index(base, list(&["X"]), EXPLICIT).applied().unwrap();
        let on_derived = builder.add_index(derived, list(&["X"]), CONVENTION).applied().unwrap();
        assert_eq!(on_base, on_derived);
    }

    #[test]
    fn add_index_folds_derived_duplicates() {
        let (mut builder, events) = journaled();
        let base = entity(&mut builder, "Base", &["X"]);
        let derived = entity(&mut builder, "Derived", &[]);
        assert!(builder.set_base_type(derived, Some(base), EXPLICIT).is_applied());

        let old = builder.add_index(derived, list(&["X"]), EXPLICIT).applied().unwrap();
        assert!(builder.set_index_unique(old, true, EXPLICIT).is_applied());
        events.borrow_mut().clear();

        let new = builder.add_index(base, list(&["X"]), CONVENTION).applied().unwrap();
        let model = builder.model();
        assert!(model.index(old).is_none());
        let record = model.index(new).unwrap();
        assert_eq!(record.source, EXPLICIT);
        assert!(record.unique);
        assert_eq!(record.unique_source, Some(EXPLICIT));

        let kinds: Vec<_> = events.borrow().iter().map(|e| e.kind_name()).collect();
        assert_eq!(kinds, vec!["IndexAdded", "IndexRemoved"]);
    }

    #[test]
    fn set_base_type_folds_indexes_the_new_base_already_has() {
        let (mut builder, events) = journaled();
        let base = entity(&mut builder, "Base", &["X"]);
        let derived = entity(&mut builder, "Derived", &["X"]);
        let inherited = builder.add_index(base, list(&["X"]), CONVENTION).applied().unwrap();
        let own = builder.add_index(derived, list(&["X"]), EXPLICIT).applied().unwrap();
        assert!(builder.set_index_unique(own, true, CONVENTION).is_applied());
        events.borrow_mut().clear();

        assert!(builder.set_base_type(derived, Some(base), EXPLICIT).is_applied());

        let model = builder.model();
        assert!(model.index(own).is_none());
        assert_eq!(model.indexes(derived).len(), 1);
        let record = model.index(inherited).unwrap();
        assert_eq!(record.source, EXPLICIT);
        assert!(record.unique);
        assert_eq!(record.unique_source, Some(CONVENTION));

        let kinds: Vec<_> = events.borrow().iter().map(|e| e.kind_name()).collect();
        assert_eq!(kinds, vec!["BaseTypeChanged", "IndexUniquenessChanged", "IndexRemoved"]);
    }

    #[test]
    fn convention_cannot_remove_explicit_index() {
        let (mut builder, _) = journaled();
        let e = entity(&mut builder, "E", &["X"]);
        let index = builder.add_index(e, list(&["X"]), EXPLICIT).applied().unwrap();

        assert_eq!(builder.remove_index(index, CONVENTION), Outcome::RejectedPrecedence);
        assert!(builder.model().index(index).is_some());
        assert!(builder.remove_index(index, EXPLICIT).is_applied());
        assert!(builder.model().index(index).is_none());
    }

    #[test]
    fn uniqueness_respects_its_own_source() {
        let (mut builder, events) = journaled();
        let e = entity(&mut builder, "E", &["X"]);
        let index = builder.add_index(e, list(&["X"]), CONVENTION).applied().unwrap();
        assert!(builder.set_index_unique(index, true, EXPLICIT).is_applied());

        assert_eq!(
            builder.set_index_unique(index, false, CONVENTION),
            Outcome::RejectedPrecedence
        );
        assert!(builder.model().index(index).unwrap().unique);

        // Same value: accepted, no event.
        let before = events.borrow().len();
        assert!(builder.set_index_unique(index, true, CONVENTION).is_applied());
        assert_eq!(events.borrow().len(), before);
    }

    #[test]
    fn properties_must_resolve_through_hierarchy() {
        let (mut builder, _) = journaled();
        let base = entity(&mut builder, "Base", &["X"]);
        let derived = entity(&mut builder, "Derived", &["Y"]);

        assert_eq!(
            builder.add_index(derived, list(&["X"]), CONVENTION),
            Outcome::RejectedInvalid
        );
        assert!(builder.set_base_type(derived, Some(base), EXPLICIT).is_applied());
        assert!(builder.add_index(derived, list(&["X", "Y"]), CONVENTION).is_applied());
    }

    #[test]
    fn base_type_rejects_cycles() {
        let (mut builder, _) = journaled();
        let a = entity(&mut builder, "A", &["X"]);
        let b = entity(&mut builder, "B", &["Y"]);

        assert!(builder.set_base_type(b, Some(a), EXPLICIT).is_applied());
        assert_eq!(builder.set_base_type(a, Some(b), EXPLICIT), Outcome::RejectedInvalid);
        assert_eq!(builder.set_base_type(a, Some(a), EXPLICIT), Outcome::RejectedInvalid);
        assert_eq!(builder.set_base_type(b, None, CONVENTION), Outcome::RejectedPrecedence);
    }

    #[test]
    fn base_type_folds_same_named_properties() {
        let (mut builder, _) = journaled();
        let a = entity(&mut builder, "A", &["X"]);
        let c = entity(&mut builder, "C", &["X", "Z"]);

        assert!(builder.set_base_type(c, Some(a), EXPLICIT).is_applied());
        let model = builder.model();
        assert_eq!(model.entity_type(c).unwrap().properties, vec!["Z".to_string()]);
        assert!(model.has_property(c, "X"));
    }

    #[test]
    fn clearing_base_type_keeps_referenced_properties() {
        let (mut builder, _) = journaled();
        let a = entity(&mut builder, "A", &["X", "Unused"]);
        let c = entity(&mut builder, "C", &[]);
        assert!(builder.set_base_type(c, Some(a), EXPLICIT).is_applied());
        assert!(builder.add_index(c, list(&["X"]), EXPLICIT).is_applied());

        assert!(builder.set_base_type(c, None, EXPLICIT).is_applied());
        let model = builder.model();
        assert_eq!(model.entity_type(c).unwrap().properties, vec!["X".to_string()]);
        assert!(!model.has_property(c, "Unused"));
    }

    #[test]
    fn derived_traversal_visits_each_type_once() {
        let (mut builder, _) = journaled();
        let root = entity(&mut builder, "Root", &[]);
        let left = entity(&mut builder, "Left", &[]);
        let right = entity(&mut builder, "Right", &[]);
        let leaf = entity(&mut builder, "Leaf", &[]);
        assert!(builder.set_base_type(left, Some(root), EXPLICIT).is_applied());
        assert!(builder.set_base_type(right, Some(root), EXPLICIT).is_applied());
        assert!(builder.set_base_type(leaf, Some(left), EXPLICIT).is_applied());

        let model = builder.model();
        assert_eq!(model.derived_types_inclusive(root), vec![root, left, leaf, right]);
        assert_eq!(model.derived_types_inclusive(right), vec![right]);
        assert_eq!(model.ancestors_inclusive(leaf), vec![leaf, left, root]);
    }

    #[test]
    fn principal_key_cannot_be_removed_while_referenced() {
        let (mut builder, events) = journaled();
        let principal = entity(&mut builder, "Principal", &["Id"]);
        let dependent = entity(&mut builder, "Dependent", &["PrincipalId"]);
        let key = builder.add_key(principal, list(&["Id"]), EXPLICIT).applied().unwrap();
        let fk = builder
            .add_foreign_key(dependent, list(&["PrincipalId"]), key, false, CONVENTION)
            .applied()
            .unwrap();

        assert_eq!(builder.remove_key(key, EXPLICIT), Outcome::RejectedInvalid);
        assert!(builder.remove_foreign_key(fk, EXPLICIT).is_applied());
        assert!(builder.remove_key(key, EXPLICIT).is_applied());

        let last = events.borrow().last().cloned();
        assert!(matches!(last, Some(StructuralEvent::KeyRemoved { key: removed, .. }) if removed == key));
    }

    #[test]
    fn foreign_key_arity_must_match_principal_key() {
        let (mut builder, _) = journaled();
        let principal = entity(&mut builder, "Principal", &["A", "B"]);
        let dependent = entity(&mut builder, "Dependent", &["PA", "PB"]);
        let key = builder.add_key(principal, list(&["A", "B"]), EXPLICIT).applied().unwrap();

        assert_eq!(
            builder.add_foreign_key(dependent, list(&["PA"]), key, false, CONVENTION),
            Outcome::RejectedInvalid
        );
        let fk = builder
            .add_foreign_key(dependent, list(&["PA", "PB"]), key, false, CONVENTION)
            .applied()
            .unwrap();
        assert_eq!(
            builder.set_foreign_key_properties(fk, list(&["PB"]), CONVENTION),
            Outcome::RejectedInvalid
        );
        assert!(
            builder
                .set_foreign_key_properties(fk, list(&["PB", "PA"]), CONVENTION)
                .is_applied()
        );
    }
}
