//! Request handling for branch and leaf resources.

use std::fmt;
use std::sync::Arc;

use coap_protocol::{EventListener, TransportMode};
use coap_transport::{Exchange, Method, Response, ResponseCode};
use tracing::{debug, error, warn};

use crate::pool::{WorkItem, WorkerPool};

/// The request-handling half of a leaf node: which tenant and transport
/// it belongs to, who consumes its events and which pool runs them.
pub struct LeafResource {
    adapter_name: String,
    tenant_id: i32,
    transport: TransportMode,
    listener: Arc<dyn EventListener>,
    pool: Arc<WorkerPool>,
    /// Opaque id of whoever registered the leaf.
    owner: Option<String>,
}

impl LeafResource {
    pub fn new(
        adapter_name: impl Into<String>,
        tenant_id: i32,
        transport: TransportMode,
        listener: Arc<dyn EventListener>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            adapter_name: adapter_name.into(),
            tenant_id,
            transport,
            listener,
            pool,
            owner: None,
        }
    }

    /// Tag the leaf with its registrant so only that registrant can
    /// remove it through [`EndpointRegistry::unregister_owned`].
    ///
    /// [`EndpointRegistry::unregister_owned`]: crate::EndpointRegistry::unregister_owned
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn tenant_id(&self) -> i32 {
        self.tenant_id
    }

    pub fn transport(&self) -> TransportMode {
        self.transport
    }

    /// Handle a request that reached this leaf through the `via` endpoint.
    ///
    /// POSTs are acknowledged before the event is queued, so the transport
    /// response never waits for the listener. Submitting may still block
    /// the calling thread while the pool is saturated.
    pub fn handle(&self, via: TransportMode, mut exchange: Exchange) -> Response {
        match exchange.request().method {
            Method::Get => Response::with_payload(
                ResponseCode::Content,
                format!("{} event receiver ({})", self.adapter_name, self.transport),
            ),
            Method::Post => {
                if self.transport == TransportMode::Secure && via == TransportMode::Plain {
                    warn!("Rejected plain request for secure endpoint {}", self.adapter_name);
                    return Response::new(ResponseCode::Unauthorized);
                }

                exchange.accept();
                let payload = match exchange.into_request().payload {
                    Some(payload) if !payload.is_empty() => payload,
                    _ => {
                        warn!("Event object is empty/null, dropping request for {}", self.adapter_name);
                        return Response::new(ResponseCode::Changed);
                    }
                };

                debug!("Message for {} (tenant {}): {}", self.adapter_name, self.tenant_id, payload);
                let response = Response::with_payload(ResponseCode::Changed, format!("POST: {payload}"));

                let item = WorkItem::new(self.tenant_id, payload, self.listener.clone());
                if let Err(e) = self.pool.submit(item) {
                    error!("Exception while adding event to executor queue for {}: {e}", self.adapter_name);
                }
                response
            }
            Method::Put | Method::Delete => Response::new(ResponseCode::MethodNotAllowed),
        }
    }
}

impl fmt::Debug for LeafResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafResource")
            .field("adapter_name", &self.adapter_name)
            .field("tenant_id", &self.tenant_id)
            .field("transport", &self.transport)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Branches only route; they answer GET with their title.
pub fn handle_branch(name: &str, exchange: &Exchange) -> Response {
    match exchange.request().method {
        Method::Get => Response::with_payload(ResponseCode::Content, format!("resource path: {name}")),
        _ => Response::new(ResponseCode::MethodNotAllowed),
    }
}
