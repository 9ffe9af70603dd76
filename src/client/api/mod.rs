//! API implementations.

mod core;
mod endpoints;
mod git;
mod graph;
mod identities;
mod operations;
mod security;
mod work;

pub use self::core::CoreApi;
pub use endpoints::EndpointsApi;
pub use git::GitApi;
pub use graph::GraphApi;
pub use identities::IdentitiesApi;
pub use operations::OperationsApi;
pub use security::SecurityApi;
pub use work::{StructureGroup, WorkApi};
