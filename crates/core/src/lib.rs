pub mod error;
pub mod events;
pub mod ids;
pub mod property;
pub mod source;

pub use error::CoreError;
pub use events::StructuralEvent;
pub use ids::*;
pub use property::PropertyList;
pub use source::{ConfigurationSource, Outcome};
