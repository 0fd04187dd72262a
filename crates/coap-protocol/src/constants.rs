//! Adapter-wide constant values.
//!
//! Endpoint naming, configuration property keys and their defaults, and
//! the default listener ports.

/// All adapter constants, grouped by concern.
pub struct Constants;

impl Constants {
    // ── Adapter identity ────────────────────────────────────────────────
    pub const ADAPTER_TYPE: &str = "coap";

    // ── Endpoint naming ─────────────────────────────────────────────────
    pub const ENDPOINT_PREFIX: &str = "coap-endpoints";
    pub const ENDPOINT_URL_SEPARATOR: &str = "/";
    pub const ENDPOINT_TENANT_KEY: &str = "t";

    // ── Worker pool properties ──────────────────────────────────────────
    pub const MIN_THREAD_NAME: &str = "minThread";
    pub const MAX_THREAD_NAME: &str = "maxThread";
    pub const KEEP_ALIVE_TIME_NAME: &str = "keepAliveTimeInMillis";
    pub const JOB_QUEUE_SIZE_NAME: &str = "jobQueueSize";

    pub const DEFAULT_MIN_THREAD: usize = 8;
    pub const DEFAULT_MAX_THREAD: usize = 100;
    pub const DEFAULT_KEEP_ALIVE_MILLIS: u64 = 20_000;
    pub const DEFAULT_JOB_QUEUE_SIZE: usize = 10_000;

    // ── Transports ──────────────────────────────────────────────────────
    pub const EXPOSED_TRANSPORTS: &str = "transports";
    pub const TRANSPORT_COAP: &str = "coap";
    pub const TRANSPORT_COAPS: &str = "coaps";

    pub const DEFAULT_COAP_PORT: u16 = 5683;
    pub const DEFAULT_COAPS_PORT: u16 = 5684;

    // ── Message formats ─────────────────────────────────────────────────
    pub const FORMAT_XML: &str = "xml";
    pub const FORMAT_JSON: &str = "json";
    pub const FORMAT_TEXT: &str = "text";
}
