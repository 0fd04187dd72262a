//! Resource server: listener endpoints plus request routing into the tree.

use std::collections::HashMap;

use coap_protocol::TransportMode;
use coap_transport::{
    Endpoint, EndpointFactory, Exchange, RequestHandler, Response, ResponseCode, TransportError,
};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::registry::{EndpointRegistry, Target};
use crate::resource::handle_branch;

/// The process-wide protocol server shared by every adapter.
pub struct ResourceServer {
    /// Resource tree and its registration logic
    registry: EndpointRegistry,
    /// Started listener endpoints, at most one per transport
    endpoints: RwLock<HashMap<TransportMode, Endpoint>>,
    /// Creates endpoints on first use
    factory: Box<dyn EndpointFactory>,
}

impl ResourceServer {
    pub fn new(registry: EndpointRegistry, factory: Box<dyn EndpointFactory>) -> Self {
        Self {
            registry,
            endpoints: RwLock::new(HashMap::new()),
            factory,
        }
    }

    pub fn with_factory(factory: impl EndpointFactory + 'static) -> Self {
        Self::new(EndpointRegistry::default(), Box::new(factory))
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// Start the endpoint for `mode` unless it is already running.
    pub fn ensure_endpoint(&self, mode: TransportMode) -> Result<Endpoint, TransportError> {
        if let Some(endpoint) = self.endpoints.read().get(&mode) {
            return Ok(endpoint.clone());
        }

        let mut endpoints = self.endpoints.write();
        if let Some(endpoint) = endpoints.get(&mode) {
            return Ok(endpoint.clone());
        }
        let endpoint = self.factory.create(mode)?;
        info!("Started {} endpoint on port {}", mode, endpoint.port);
        endpoints.insert(mode, endpoint.clone());
        Ok(endpoint)
    }

    pub fn endpoint(&self, mode: TransportMode) -> Option<Endpoint> {
        self.endpoints.read().get(&mode).cloned()
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints: Vec<Endpoint> = self.endpoints.read().values().cloned().collect();
        endpoints.sort_by_key(|e| e.port);
        endpoints
    }
}

impl RequestHandler for ResourceServer {
    fn handle_request(&self, transport: TransportMode, exchange: Exchange) -> Response {
        if !self.endpoints.read().contains_key(&transport) {
            debug!("Request on {} endpoint, which is not started", transport);
            return Response::new(ResponseCode::ServiceUnavailable);
        }

        let path = exchange.request().path.clone();
        // The tree lock is released before the leaf runs.
        match self.registry.lookup(&path) {
            Some(Target::Leaf(leaf)) => leaf.handle(transport, exchange),
            Some(Target::Branch(name)) => handle_branch(&name, &exchange),
            None => {
                debug!("No resource at {path}");
                Response::new(ResponseCode::NotFound)
            }
        }
    }
}
