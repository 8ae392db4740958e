use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::rc::Rc;

use indexkeeper_core::{ids::*, ConfigurationSource, Outcome, PropertyList};
use indexkeeper_engine::{
    covers, DiagnosticError, DiagnosticEvent, DiagnosticListener, Diagnostics, EngineConfig,
    ForeignKeyIndexConvention, Shape,
};
use indexkeeper_model::{ForeignKeyRecord, Model, ModelBuilder, SchemaGraph};

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Name of the entity type every test foreign key points at.
pub const PRINCIPAL: &str = "Principal";

pub fn list(names: &[&str]) -> TestResult<PropertyList> {
    Ok(PropertyList::new(names.iter().copied())?)
}

/// Unwrap an applied outcome, turning a rejection into a test failure.
pub fn applied<T: Debug>(outcome: Outcome<T>, request: &str) -> TestResult<T> {
    match outcome {
        Outcome::Applied(value) => Ok(value),
        rejected => Err(format!("{request} was not applied: {rejected:?}").into()),
    }
}

/// Collects every diagnostic event it is handed.
#[derive(Default)]
pub struct Recorder {
    events: RefCell<Vec<DiagnosticEvent>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.borrow().clone()
    }
}

impl DiagnosticListener for Recorder {
    fn on_event(&self, event: &DiagnosticEvent) -> Result<(), DiagnosticError> {
        self.events.borrow_mut().push(event.clone());
        Ok(())
    }
}

/// A model under construction with the foreign key index convention
/// installed and a recorder attached to its diagnostics.
pub struct TestModel {
    pub builder: ModelBuilder,
    pub recorder: Rc<Recorder>,
    principal: Option<EntityTypeId>,
    principal_keys: BTreeMap<usize, KeyId>,
}

impl Default for TestModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TestModel {
    /// Logging off; diagnostics still reach the recorder.
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::quiet())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        let recorder = Rc::new(Recorder::default());
        let diagnostics = Diagnostics::new(&config.diagnostics).with_listener(recorder.clone());
        Self {
            builder: ForeignKeyIndexConvention::with_diagnostics(diagnostics).into_builder(),
            recorder,
            principal: None,
            principal_keys: BTreeMap::new(),
        }
    }

    pub fn model(&self) -> &Model {
        self.builder.model()
    }

    /// Add an entity type declaring `properties`.
    pub fn entity(&mut self, name: &str, properties: &[&str]) -> TestResult<EntityTypeId> {
        let id = applied(
            self.builder.add_entity_type(name, ConfigurationSource::Explicit),
            "add entity type",
        )?;
        for property in properties {
            applied(self.builder.add_property(id, property), "add property")?;
        }
        Ok(id)
    }

    pub fn derive(&mut self, derived: EntityTypeId, base: EntityTypeId) -> TestResult {
        applied(
            self.builder.set_base_type(derived, Some(base), ConfigurationSource::Explicit),
            "set base type",
        )
    }

    pub fn key(&mut self, entity_type: EntityTypeId, properties: &[&str]) -> TestResult<KeyId> {
        applied(
            self.builder.add_key(entity_type, list(properties)?, ConfigurationSource::Explicit),
            "add key",
        )
    }

    /// A key on the shared principal type with `arity` properties, created on first use.
    pub fn principal_key(&mut self, arity: usize) -> TestResult<KeyId> {
        if let Some(key) = self.principal_keys.get(&arity) {
            return Ok(*key);
        }
        let principal = match self.principal {
            Some(principal) => principal,
            None => {
                let principal = self.entity(PRINCIPAL, &[])?;
                self.principal = Some(principal);
                principal
            }
        };
        let names: Vec<String> = (0..arity).map(|n| format!("Id{arity}_{n}")).collect();
        for name in &names {
            applied(self.builder.add_property(principal, name), "add principal property")?;
        }
        let key = applied(
            self.builder.add_key(
                principal,
                PropertyList::new(names)?,
                ConfigurationSource::Explicit,
            ),
            "add principal key",
        )?;
        self.principal_keys.insert(arity, key);
        Ok(key)
    }

    pub fn foreign_key(
        &mut self,
        entity_type: EntityTypeId,
        properties: &[&str],
        unique: bool,
    ) -> TestResult<ForeignKeyId> {
        let principal_key = self.principal_key(properties.len())?;
        applied(
            self.builder.add_foreign_key(
                entity_type,
                list(properties)?,
                principal_key,
                unique,
                ConfigurationSource::Explicit,
            ),
            "add foreign key",
        )
    }

    pub fn index(
        &mut self,
        entity_type: EntityTypeId,
        properties: &[&str],
        source: ConfigurationSource,
    ) -> TestResult<IndexId> {
        applied(self.builder.add_index(entity_type, list(properties)?, source), "add index")
    }

    /// Indexes declared on `entity_type`, as `(properties, unique)`.
    pub fn declared_indexes(&self, entity_type: EntityTypeId) -> Vec<(Vec<String>, bool)> {
        self.model()
            .declared_indexes(entity_type)
            .into_iter()
            .map(|index| (index.properties.names().to_vec(), index.unique))
            .collect()
    }

    pub fn finish(self) -> (Model, Vec<DiagnosticEvent>) {
        let model = self.builder.finish();
        (model, self.recorder.events())
    }
}

/// How many keys and indexes visible from the declaring type serve `foreign_key`.
pub fn coverage_count<G: SchemaGraph + ?Sized>(graph: &G, foreign_key: &ForeignKeyRecord) -> usize {
    let requirement = Shape::of_foreign_key(foreign_key);
    let keys = graph
        .keys(foreign_key.declaring_type)
        .into_iter()
        .filter(|key| covers(requirement, Shape::of_key(key)))
        .count();
    let indexes = graph
        .indexes(foreign_key.declaring_type)
        .into_iter()
        .filter(|index| covers(requirement, Shape::of_index(index)))
        .count();
    keys + indexes
}

/// Foreign keys without any key or index serving them, as readable descriptions.
pub fn uncovered_foreign_keys<G: SchemaGraph + ?Sized>(graph: &G) -> Vec<String> {
    let mut uncovered = Vec::new();
    for entity_type in graph.entity_types() {
        for foreign_key in graph.declared_foreign_keys(entity_type.id) {
            if coverage_count(graph, foreign_key) == 0 {
                uncovered.push(format!(
                    "{} {} unique={}",
                    entity_type.name, foreign_key.properties, foreign_key.unique
                ));
            }
        }
    }
    uncovered
}

/// Entity types that see two indexes over the same property list, inherited
/// indexes included.
pub fn duplicate_indexes<G: SchemaGraph + ?Sized>(graph: &G) -> Vec<String> {
    let mut duplicates = Vec::new();
    for entity_type in graph.entity_types() {
        let indexes = graph.indexes(entity_type.id);
        for (position, index) in indexes.iter().enumerate() {
            if indexes[..position].iter().any(|other| other.properties == index.properties) {
                duplicates.push(format!("{} {}", entity_type.name, index.properties));
            }
        }
    }
    duplicates
}

/// Convention-made indexes that no foreign key on their entity type or below
/// it is served by.
pub fn orphaned_convention_indexes<G: SchemaGraph + ?Sized>(graph: &G) -> Vec<String> {
    let mut orphans = Vec::new();
    for entity_type in graph.entity_types() {
        let foreign_keys = graph.derived_foreign_keys_inclusive(entity_type.id);
        for index in graph.declared_indexes(entity_type.id) {
            if index.source != ConfigurationSource::Convention {
                continue;
            }
            let candidate = Shape::of_index(index);
            if !foreign_keys
                .iter()
                .any(|fk| covers(Shape::of_foreign_key(fk), candidate))
            {
                orphans.push(format!(
                    "{} {} unique={}",
                    entity_type.name, index.properties, index.unique
                ));
            }
        }
    }
    orphans
}
