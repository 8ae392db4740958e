use indexkeeper_core::{ids::*, ConfigurationSource, Outcome, PropertyList};
use indexkeeper_model::{ModelBuilder, SchemaGraph};
use tracing::{debug, trace};

use crate::coverage::{covers, Shape};

/// Everything this engine asks of the builder is asked at this source.
const SOURCE: ConfigurationSource = ConfigurationSource::Convention;

/// Whether a key or index on `entity_type` (inherited ones included) already
/// serves `requirement`.
pub fn is_covered(builder: &ModelBuilder, entity_type: EntityTypeId, requirement: Shape<'_>) -> bool {
    let model = builder.model();
    model
        .keys(entity_type)
        .into_iter()
        .any(|key| covers(requirement, Shape::of_key(key)))
        || model
            .indexes(entity_type)
            .into_iter()
            .any(|index| covers(requirement, Shape::of_index(index)))
}

/// Make sure `(properties, unique)` is served on `entity_type`, creating an
/// index at convention level if nothing serves it yet.
///
/// Returns the index that was created or fetched, or `None` when the
/// requirement was already covered or the builder turned the request down.
pub fn ensure_index(
    builder: &mut ModelBuilder,
    properties: &PropertyList,
    unique: bool,
    entity_type: EntityTypeId,
) -> Option<IndexId> {
    if is_covered(builder, entity_type, Shape::new(properties, unique)) {
        trace!(properties = %properties, unique, "already covered");
        return None;
    }

    let index = builder
        .add_index(entity_type, properties.clone(), SOURCE)
        .applied()?;
    debug!(properties = %properties, unique, "index ensured for foreign key");
    if unique {
        set_uniqueness(builder, index, true);
    }
    Some(index)
}

/// Remove `index` unless it was configured above convention level.
pub fn remove_if_conventional(builder: &mut ModelBuilder, index: IndexId) -> bool {
    let outcome = builder.remove_index(index, SOURCE);
    log_outcome("remove index", &outcome);
    outcome.is_applied()
}

/// Make `index` non-unique unless its uniqueness was configured above
/// convention level.
pub fn downgrade(builder: &mut ModelBuilder, index: IndexId) -> bool {
    set_uniqueness(builder, index, false)
}

pub fn set_uniqueness(builder: &mut ModelBuilder, index: IndexId, unique: bool) -> bool {
    let outcome = builder.set_index_unique(index, unique, SOURCE);
    log_outcome("set index uniqueness", &outcome);
    outcome.is_applied()
}

fn log_outcome(request: &str, outcome: &Outcome<()>) {
    match outcome {
        Outcome::Applied(()) => {}
        Outcome::RejectedPrecedence => {
            trace!(request, "request yields to higher configuration source");
        }
        Outcome::RejectedInvalid => {
            trace!(request, "request target no longer exists");
        }
    }
}
