//! Adapter lifecycle errors.

use coap_protocol::ConfigError;
use coap_server::RegistryError;
use coap_transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("test connection is not supported by the coap adapter")]
    TestConnectionNotSupported,

    #[error("adapter '{0}' has not been initialised")]
    NotInitialized(String),

    #[error("invalid adapter configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("transport unavailable: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
