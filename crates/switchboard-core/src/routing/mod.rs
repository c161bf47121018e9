//! Provider registry and candidate selection.

pub mod registry;
pub mod selection;

pub use registry::{ProviderRegistry, RegistrySnapshot};
pub use selection::{Selection, SelectionPolicy};
