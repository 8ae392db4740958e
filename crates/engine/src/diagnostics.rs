use std::rc::Rc;

use indexkeeper_core::PropertyList;
use indexkeeper_model::SchemaGraph;
use tracing::{debug, info};

use crate::config::{DiagnosticsConfig, Severity};
use crate::coverage::{covers, Shape};
use crate::error::DiagnosticError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    /// A foreign key got no index of its own because a key or index over
    /// more properties already serves its lookups.
    RedundantForeignKeyIndex {
        entity_type: String,
        foreign_key: PropertyList,
        covering: PropertyList,
    },
}

impl DiagnosticEvent {
    pub const REDUNDANT_FOREIGN_KEY_INDEX: Severity = Severity::Info;

    pub fn severity(&self) -> Severity {
        match self {
            Self::RedundantForeignKeyIndex { .. } => Self::REDUNDANT_FOREIGN_KEY_INDEX,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RedundantForeignKeyIndex { .. } => "RedundantForeignKeyIndex",
        }
    }
}

pub trait DiagnosticListener {
    fn on_event(&self, event: &DiagnosticEvent) -> Result<(), DiagnosticError>;
}

/// Outbound diagnostics channel: the log plus any attached listeners.
#[derive(Clone)]
pub struct Diagnostics {
    min_severity: Severity,
    listeners: Vec<Rc<dyn DiagnosticListener>>,
}

impl Diagnostics {
    pub fn new(config: &DiagnosticsConfig) -> Self {
        Self {
            min_severity: config.min_severity,
            listeners: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: Rc<dyn DiagnosticListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    fn logs(&self, severity: Severity) -> bool {
        severity != Severity::Off && severity >= self.min_severity
    }

    /// Whether anything would observe an event of `severity`.
    pub fn is_enabled(&self, severity: Severity) -> bool {
        self.logs(severity) || !self.listeners.is_empty()
    }

    /// Best effort: listener failures are logged and otherwise ignored.
    pub fn emit(&self, event: &DiagnosticEvent) {
        if self.logs(event.severity()) {
            match event {
                DiagnosticEvent::RedundantForeignKeyIndex {
                    entity_type,
                    foreign_key,
                    covering,
                } => info!(
                    entity_type = entity_type.as_str(),
                    foreign_key = %foreign_key,
                    covering = %covering,
                    "foreign key {foreign_key} on '{entity_type}' is served by the broader {covering} and has no index of its own"
                ),
            }
        }
        for listener in &self.listeners {
            if let Err(err) = listener.on_event(event) {
                debug!(event = event.name(), error = %err, "diagnostic listener failed");
            }
        }
    }
}

/// Report every foreign key served by a strictly longer key or index of its
/// entity type. Returns the number of events emitted; never touches the graph.
pub fn sweep_redundant_indexes<G: SchemaGraph + ?Sized>(graph: &G, diagnostics: &Diagnostics) -> usize {
    if !diagnostics.is_enabled(DiagnosticEvent::REDUNDANT_FOREIGN_KEY_INDEX) {
        return 0;
    }

    let mut emitted = 0;
    for entity_type in graph.entity_types() {
        let keys = graph.keys(entity_type.id);
        let indexes = graph.indexes(entity_type.id);
        for foreign_key in graph.declared_foreign_keys(entity_type.id) {
            let requirement = Shape::of_foreign_key(foreign_key);
            let candidates = keys
                .iter()
                .copied()
                .map(Shape::of_key)
                .chain(indexes.iter().copied().map(Shape::of_index));
            for candidate in candidates {
                if covers(requirement, candidate)
                    && candidate.properties.len() != requirement.properties.len()
                {
                    diagnostics.emit(&DiagnosticEvent::RedundantForeignKeyIndex {
                        entity_type: entity_type.name.clone(),
                        foreign_key: foreign_key.properties.clone(),
                        covering: candidate.properties.clone(),
                    });
                    emitted += 1;
                }
            }
        }
    }
    emitted
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    struct Failing;

    impl DiagnosticListener for Failing {
        fn on_event(&self, _event: &DiagnosticEvent) -> Result<(), DiagnosticError> {
            Err(DiagnosticError::ListenerUnavailable("closed".into()))
        }
    }

    #[derive(Default)]
    struct Counting(RefCell<usize>);

    impl DiagnosticListener for Counting {
        fn on_event(&self, _event: &DiagnosticEvent) -> Result<(), DiagnosticError> {
            *self.0.borrow_mut() += 1;
            Ok(())
        }
    }

    fn quiet() -> DiagnosticsConfig {
        DiagnosticsConfig {
            min_severity: Severity::Off,
        }
    }

    fn event() -> DiagnosticEvent {
        DiagnosticEvent::RedundantForeignKeyIndex {
            entity_type: "E".into(),
            foreign_key: PropertyList::new(["X"]).unwrap(),
            covering: PropertyList::new(["X", "Y"]).unwrap(),
        }
    }

    #[test]
    fn disabled_without_log_level_or_listener() {
        let diagnostics = Diagnostics::new(&quiet());
        assert!(!diagnostics.is_enabled(Severity::Info));
        assert!(!diagnostics.is_enabled(Severity::Error));

        let warnings_only = Diagnostics::new(&DiagnosticsConfig {
            min_severity: Severity::Warning,
        });
        assert!(!warnings_only.is_enabled(Severity::Info));
        assert!(warnings_only.is_enabled(Severity::Error));
    }

    #[test]
    fn listener_enables_quiet_channel() {
        let counting = Rc::new(Counting::default());
        let diagnostics = Diagnostics::new(&quiet()).with_listener(counting.clone());
        assert!(diagnostics.is_enabled(Severity::Info));

        diagnostics.emit(&event());
        assert_eq!(*counting.0.borrow(), 1);
    }

    #[test]
    fn sweep_is_skipped_when_nobody_listens() {
        use indexkeeper_core::ConfigurationSource::Explicit;
        use indexkeeper_model::ModelBuilder;

        let list = |names: &[&str]| PropertyList::new(names.iter().copied()).unwrap();
        let mut builder = ModelBuilder::default();
        let principal = builder.add_entity_type("Principal", Explicit).applied().unwrap();
        assert!(builder.add_property(principal, "Id").is_applied());
        let key = builder.add_key(principal, list(&["Id"]), Explicit).applied().unwrap();
        let e = builder.add_entity_type("E", Explicit).applied().unwrap();
        assert!(builder.add_property(e, "X").is_applied());
        assert!(builder.add_property(e, "Y").is_applied());
        assert!(builder.add_index(e, list(&["X", "Y"]), Explicit).is_applied());
        assert!(builder
            .add_foreign_key(e, list(&["X"]), key, false, Explicit)
            .is_applied());
        let model = builder.finish();

        assert_eq!(sweep_redundant_indexes(&model, &Diagnostics::new(&quiet())), 0);

        let counting = Rc::new(Counting::default());
        let listening = Diagnostics::new(&quiet()).with_listener(counting.clone());
        assert_eq!(sweep_redundant_indexes(&model, &listening), 1);
        assert_eq!(*counting.0.borrow(), 1);
    }

    #[test]
    fn failing_listener_does_not_stop_others() {
        let counting = Rc::new(Counting::default());
        let diagnostics = Diagnostics::new(&DiagnosticsConfig::default())
            .with_listener(Rc::new(Failing))
            .with_listener(counting.clone());

        diagnostics.emit(&event());
        assert_eq!(*counting.0.borrow(), 1);
    }
}
