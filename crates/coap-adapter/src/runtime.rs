//! Process-wide server and worker pool shared by every adapter.

use std::sync::{Arc, OnceLock};

use coap_protocol::PoolConfig;
use coap_server::{ResourceServer, WorkerPool};
use coap_transport::{DefaultEndpointFactory, EndpointFactory, PortConfig};
use parking_lot::Mutex;
use tracing::{info, warn};

static GLOBAL: OnceLock<Arc<AdapterRuntime>> = OnceLock::new();

pub struct AdapterRuntime {
    server: Arc<ResourceServer>,
    pool: Mutex<Option<Arc<WorkerPool>>>,
}

impl AdapterRuntime {
    pub fn new(server: Arc<ResourceServer>) -> Self {
        Self {
            server,
            pool: Mutex::new(None),
        }
    }

    pub fn with_factory(factory: impl EndpointFactory + 'static) -> Self {
        Self::new(Arc::new(ResourceServer::with_factory(factory)))
    }

    /// Install the process-wide runtime. Returns the runtime that is in
    /// effect, which is the one passed in only if none was installed yet.
    pub fn install(runtime: AdapterRuntime) -> Arc<AdapterRuntime> {
        let mut runtime = Some(runtime);
        let installed = GLOBAL.get_or_init(|| Arc::new(runtime.take().unwrap_or_else(Self::plain)));
        if runtime.is_some() {
            warn!("Adapter runtime already installed, keeping the existing one");
        }
        installed.clone()
    }

    /// The process-wide runtime. Falls back to a plain-only server on the
    /// default ports when nothing was installed.
    pub fn global() -> Arc<AdapterRuntime> {
        GLOBAL.get_or_init(|| Arc::new(Self::plain())).clone()
    }

    fn plain() -> Self {
        Self::with_factory(DefaultEndpointFactory::plain_only(PortConfig::default()))
    }

    pub fn server(&self) -> &Arc<ResourceServer> {
        &self.server
    }

    /// The shared pool, created from `config` on first call. Later callers
    /// get the existing pool; differing settings are logged and ignored.
    pub fn pool_or_init(&self, config: &PoolConfig) -> Arc<WorkerPool> {
        let mut pool = self.pool.lock();
        match pool.as_ref() {
            Some(existing) => {
                if existing.config() != config {
                    warn!(
                        "Worker pool already created with {:?}; ignoring {:?}",
                        existing.config(),
                        config
                    );
                }
                existing.clone()
            }
            None => {
                let created = Arc::new(WorkerPool::new(config.clone()));
                *pool = Some(created.clone());
                created
            }
        }
    }

    pub fn pool(&self) -> Option<Arc<WorkerPool>> {
        self.pool.lock().clone()
    }

    /// Stop accepting events. Already queued events are still delivered.
    pub fn shutdown(&self) {
        if let Some(pool) = self.pool.lock().as_ref() {
            info!("Shutting down adapter runtime");
            pool.shutdown();
        }
    }
}
