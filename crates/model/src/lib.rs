pub mod builder;
pub mod error;
pub mod memory;
pub mod snapshot;
pub mod traits;

pub use builder::{Convention, ModelBuilder};
pub use error::ModelError;
pub use memory::Model;
pub use snapshot::{EntityTypeSnapshot, ForeignKeySnapshot, IndexSnapshot, ModelSnapshot};
pub use traits::*;
