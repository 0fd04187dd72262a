//! CoAP Event Adapter - Protocol Types
//!
//! Shared vocabulary for the adapter workspace: endpoint naming constants,
//! the tenant model and its scoped thread context, typed adapter
//! configuration and the event listener callback. Every other crate depends
//! on this one and nothing here depends on them.

pub mod config;
pub mod constants;
pub mod error;
pub mod listener;
pub mod tenant;

pub use config::{PoolConfig, TransportMode};
pub use constants::Constants;
pub use error::{ConfigError, ListenerError};
pub use listener::{EventListener, FnListener};
pub use tenant::{Tenant, TenantFlow};
