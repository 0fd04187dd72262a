//! The per-adapter connection state machine.
//!
//! `init` prepares the shared pool and the listener endpoint for the
//! adapter's transport; `connect` registers the adapter's endpoint in the
//! shared tree and `disconnect` removes it again.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use coap_protocol::{EventListener, PoolConfig, Tenant, TransportMode};
use coap_server::{LeafResource, RegisterOutcome, RegistryError, WorkerPool};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AdapterError;
use crate::runtime::AdapterRuntime;

/// User-supplied configuration of one input adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfiguration {
    pub name: String,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl AdapterConfiguration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// State filled in by `init`.
struct Initialized {
    listener: Arc<dyn EventListener>,
    pool: Arc<WorkerPool>,
    transport: TransportMode,
}

pub struct CoapEventAdapter {
    id: Uuid,
    config: AdapterConfiguration,
    global_properties: HashMap<String, String>,
    tenant: Tenant,
    runtime: Arc<AdapterRuntime>,
    initialized: Option<Initialized>,
    state: ConnectionState,
}

impl CoapEventAdapter {
    pub fn new(
        config: AdapterConfiguration,
        global_properties: HashMap<String, String>,
        tenant: Tenant,
        runtime: Arc<AdapterRuntime>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            global_properties,
            tenant,
            runtime,
            initialized: None,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Endpoint path this adapter registers, e.g. `coap-endpoints/t/acme/sensorTemp`.
    pub fn endpoint_path(&self) -> String {
        self.runtime
            .server()
            .registry()
            .resolver()
            .endpoint_for(&self.tenant, &self.config.name)
    }

    /// Bind the listener, create the shared pool if this is the first
    /// adapter in the process, and start the endpoint for the configured
    /// transport.
    pub fn init(&mut self, listener: Arc<dyn EventListener>) -> Result<(), AdapterError> {
        let transport = TransportMode::from_properties(&self.config.properties)?;
        let pool_config = PoolConfig::from_properties(&self.global_properties)?;
        let pool = self.runtime.pool_or_init(&pool_config);

        let endpoint = self.runtime.server().ensure_endpoint(transport).inspect_err(|e| {
            warn!("Adapter '{}' cannot use {} transport: {}", self.config.name, transport, e);
        })?;
        debug!("Adapter '{}' bound to {} endpoint on port {}", self.config.name, transport, endpoint.port);

        self.initialized = Some(Initialized {
            listener,
            pool,
            transport,
        });
        Ok(())
    }

    pub fn test_connect(&self) -> Result<(), AdapterError> {
        Err(AdapterError::TestConnectionNotSupported)
    }

    /// Register the adapter's endpoint. Connecting twice is a no-op.
    pub fn connect(&mut self) -> Result<(), AdapterError> {
        if self.state == ConnectionState::Connected {
            debug!("Adapter '{}' is already connected", self.config.name);
            return Ok(());
        }
        let init = self
            .initialized
            .as_ref()
            .ok_or_else(|| AdapterError::NotInitialized(self.config.name.clone()))?;

        let leaf = LeafResource::new(
            self.config.name.clone(),
            self.tenant.id,
            init.transport,
            init.listener.clone(),
            init.pool.clone(),
        )
        .with_owner(self.id.to_string());
        let registry = self.runtime.server().registry();
        match registry.register(&self.tenant, &self.config.name, leaf) {
            Ok(RegisterOutcome::Created) => {
                info!("Adapter '{}' connected at {}", self.config.name, self.endpoint_path());
            }
            Ok(RegisterOutcome::AlreadyRegistered) => {
                warn!(
                    "Endpoint {} was already registered by another adapter, keeping it",
                    self.endpoint_path()
                );
            }
            Err(e) => {
                warn!("Adapter '{}' failed to connect: {}", self.config.name, e);
                return Err(e.into());
            }
        }
        self.state = ConnectionState::Connected;
        Ok(())
    }

    /// Remove the adapter's endpoint if it is connected. An endpoint this
    /// adapter found already registered belongs to the adapter that created
    /// it and stays in place.
    pub fn disconnect(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        let owner = self.id.to_string();
        match self
            .runtime
            .server()
            .registry()
            .unregister_owned(&self.tenant, &self.config.name, &owner)
        {
            Ok(()) => info!("Adapter '{}' disconnected", self.config.name),
            Err(RegistryError::NotOwner { path }) => {
                info!(
                    "Adapter '{}' disconnected; {} is kept for the adapter that registered it",
                    self.config.name, path
                );
            }
            // A missing resource is already logged by the registry.
            Err(_) => {}
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Release adapter-local state. The shared tree and pool are untouched,
    /// so a still-connected endpoint keeps serving until `disconnect`.
    pub fn destroy(&mut self) {
        self.initialized = None;
    }

    pub fn is_event_duplicated_in_cluster(&self) -> bool {
        false
    }

    pub fn is_polling(&self) -> bool {
        false
    }
}

impl PartialEq for CoapEventAdapter {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CoapEventAdapter {}

impl std::hash::Hash for CoapEventAdapter {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for CoapEventAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoapEventAdapter")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("tenant", &self.tenant)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
