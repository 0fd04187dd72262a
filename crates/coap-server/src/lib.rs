//! CoAP Event Adapter - Resource Server
//!
//! Owns the shared resource tree that every adapter in the process
//! registers its endpoint into, and the bounded worker pool that inbound
//! events are dispatched to.
//!
//! - [`PathResolver`] maps `(tenant, adapter name)` to path segments
//! - [`ResourceTree`] is the arena of branch and leaf nodes
//! - [`EndpointRegistry`] registers/unregisters leaves, pruning empty branches
//! - [`WorkerPool`] runs listener callbacks with blocking admission
//! - [`ResourceServer`] routes requests from the listener endpoints to leaves

pub mod error;
pub mod path;
pub mod pool;
pub mod registry;
pub mod resource;
pub mod server;
pub mod tree;

pub use error::{RegistryError, SubmitError};
pub use path::PathResolver;
pub use pool::{WorkItem, WorkerPool};
pub use registry::{EndpointRegistry, RegisterOutcome, Target};
pub use resource::{handle_branch, LeafResource};
pub use server::ResourceServer;
pub use tree::{NodeId, NodeKind, ResourceNode, ResourceTree};
