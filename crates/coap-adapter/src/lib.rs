//! CoAP Event Adapter - Adapter Layer
//!
//! One [`CoapEventAdapter`] per configured input adapter. Each adapter
//! exposes a single endpoint in the shared [`ResourceServer`] tree and hands
//! accepted events to the shared [`WorkerPool`]; both live in the
//! [`AdapterRuntime`].
//!
//! [`ResourceServer`]: coap_server::ResourceServer
//! [`WorkerPool`]: coap_server::WorkerPool

pub mod adapter;
pub mod error;
pub mod factory;
pub mod runtime;

pub use adapter::{AdapterConfiguration, CoapEventAdapter, ConnectionState};
pub use error::AdapterError;
pub use factory::{CoapEventAdapterFactory, Property};
pub use runtime::AdapterRuntime;
