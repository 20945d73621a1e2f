//! Infrastructure layer: collaborator traits, in-memory sources and DI container

pub mod di;
pub mod error;
pub mod memory;
pub mod snapshot;
pub mod traits;

pub use error::{InfraError, InfraResult, IoResultExt, ProviderError, ProviderResult};
