//! CoAP Event Adapter - multi-tenant CoAP input endpoints with bounded dispatch
//!
//! Registers one endpoint per `--adapter` in the shared resource tree and
//! feeds requests read from stdin through the resource server, one per
//! line: `[coap|coaps] METHOD path [payload]`. Accepted events are handed
//! to a logging listener on the shared worker pool.
//!
//! Usage:
//!   coap-event-adapter --adapter sensorTemp                     # coap-endpoints/sensorTemp
//!   coap-event-adapter --adapter sensorTemp@acme:coaps \
//!       --key-store ks.jks --key-store-password pw \
//!       --trust-store ts.jks --trust-store-password pw         # coap-endpoints/t/acme/sensorTemp
//!   coap-event-adapter --property maxThread=4 --adapter a       # pool sizing
//!   coap-event-adapter --stream streams/temp.json              # deploy a stream definition

use std::collections::HashMap;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use coap_adapter::{AdapterConfiguration, AdapterRuntime, CoapEventAdapter, CoapEventAdapterFactory};
use coap_protocol::{Constants, EventListener, ListenerError, Tenant, TenantFlow, TransportMode};
use coap_transport::{
    DefaultEndpointFactory, Exchange, Method, PortConfig, Request, RequestHandler, SecurityConfig,
};
use secrecy::SecretString;
use stream_deployer::{DeployableTemplate, StreamDeployer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "coap-event-adapter", about = "CoAP input event adapter")]
struct Cli {
    /// Adapter to expose, as `name[@tenant-domain][:coap|coaps]` (repeatable)
    #[arg(long = "adapter", value_name = "SPEC")]
    adapters: Vec<String>,

    /// Global adapter property, as `key=value` (repeatable)
    #[arg(long = "property", value_name = "KEY=VALUE")]
    properties: Vec<String>,

    /// Server port offset; listeners use 5683/5684 + offset + 1
    #[arg(long, default_value = "0")]
    port_offset: u16,

    /// Hostname shown in endpoint URIs
    #[arg(long, default_value = "localhost")]
    hostname: String,

    /// Key store for the secure endpoint
    #[arg(long)]
    key_store: Option<PathBuf>,

    #[arg(long)]
    key_store_password: Option<String>,

    /// Trust store for the secure endpoint
    #[arg(long)]
    trust_store: Option<PathBuf>,

    #[arg(long)]
    trust_store_password: Option<String>,

    /// Stream definition JSON to deploy at startup (repeatable)
    #[arg(long = "stream", value_name = "FILE")]
    streams: Vec<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Write logs to a file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// A parsed `--adapter` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AdapterSpec {
    name: String,
    domain: Option<String>,
    transport: TransportMode,
}

impl AdapterSpec {
    fn parse(spec: &str) -> Result<Self> {
        let (rest, transport) = match spec.rsplit_once(':') {
            Some((rest, transport)) => (rest, transport.parse::<TransportMode>()?),
            None => (spec, TransportMode::Plain),
        };
        let (name, domain) = match rest.split_once('@') {
            Some((name, domain)) if !domain.is_empty() => (name, Some(domain.to_string())),
            Some(_) => bail!("empty tenant domain in adapter spec '{spec}'"),
            None => (rest, None),
        };
        if name.is_empty() {
            bail!("empty adapter name in adapter spec '{spec}'");
        }
        Ok(Self {
            name: name.to_string(),
            domain,
            transport,
        })
    }
}

fn parse_properties(pairs: &[String]) -> Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("property '{pair}' is not in key=value form"))?;
            Ok((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Parse one stdin line: `[coap|coaps] METHOD path [payload]`.
fn parse_request_line(line: &str) -> Result<(TransportMode, Request)> {
    let line = line.trim();
    let (first, rest) = line.split_once(' ').unwrap_or((line, ""));
    let (transport, line) = match first.parse::<TransportMode>() {
        Ok(transport) => (transport, rest.trim_start()),
        Err(_) => (TransportMode::Plain, line),
    };

    let mut parts = line.splitn(3, ' ');
    let method: Method = parts
        .next()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| anyhow!("missing method"))?
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let payload = parts.next().map(str::to_string);
    Ok((transport, Request::new(method, path, payload)))
}

fn security_config(cli: &Cli) -> Option<SecurityConfig> {
    match (&cli.key_store, &cli.trust_store) {
        (Some(key_store), Some(trust_store)) => Some(SecurityConfig {
            key_store_path: key_store.clone(),
            key_store_password: SecretString::from(cli.key_store_password.clone().unwrap_or_default()),
            trust_store_path: trust_store.clone(),
            trust_store_password: SecretString::from(cli.trust_store_password.clone().unwrap_or_default()),
        }),
        (None, None) => None,
        _ => {
            warn!("Both --key-store and --trust-store are needed for the secure endpoint");
            None
        }
    }
}

/// Listener that logs every event it receives.
struct LogListener {
    adapter: String,
}

impl EventListener for LogListener {
    fn on_event(&self, payload: &str) -> Result<(), ListenerError> {
        let tenant = TenantFlow::current().unwrap_or(Tenant::SUPER_TENANT_ID);
        info!("[{}] event for tenant {}: {}", self.adapter, tenant, payload);
        Ok(())
    }
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    match (&cli.log_file, cli.json_logs) {
        (Some(log_path), json) => {
            if let Some(parent) = log_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
                .with_context(|| format!("failed to open log file {}", log_path.display()))?;
            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false);
            if json {
                builder.json().init();
            } else {
                builder.init();
            }
            eprintln!("Logging to {}", log_path.display());
        }
        (None, true) => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        (None, false) => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

fn deploy_streams(paths: &[PathBuf]) -> Result<StreamDeployer> {
    let deployer = StreamDeployer::new();
    for path in paths {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read stream definition {}", path.display()))?;
        let artifact_id = path.display().to_string();
        let template = DeployableTemplate::new(artifact_id, json, Tenant::SUPER_TENANT_DOMAIN);
        deployer
            .deploy_artifact(Some(&template))
            .with_context(|| format!("failed to deploy stream from {}", path.display()))?;
    }
    Ok(deployer)
}

fn start_adapters(
    cli: &Cli,
    factory: &CoapEventAdapterFactory,
    global_properties: &HashMap<String, String>,
) -> Result<Vec<CoapEventAdapter>> {
    let mut tenant_ids: HashMap<String, i32> = HashMap::new();
    let mut adapters = Vec::new();

    for raw in &cli.adapters {
        let spec = AdapterSpec::parse(raw)?;
        let tenant = match &spec.domain {
            None => Tenant::super_tenant(),
            Some(domain) if domain == Tenant::SUPER_TENANT_DOMAIN => Tenant::super_tenant(),
            Some(domain) => {
                let next = tenant_ids.len() as i32 + 1;
                let id = *tenant_ids.entry(domain.clone()).or_insert(next);
                Tenant::new(id, domain.clone())
            }
        };

        let config = AdapterConfiguration::new(&spec.name)
            .with_property(Constants::EXPOSED_TRANSPORTS, spec.transport.scheme());
        let mut adapter = factory.create_event_adapter(config, global_properties.clone(), tenant);
        let listener = Arc::new(LogListener {
            adapter: spec.name.clone(),
        });

        if let Err(e) = adapter.init(listener) {
            error!("Adapter '{}' failed to initialise: {e}", spec.name);
            continue;
        }
        if let Err(e) = adapter.connect() {
            error!("Adapter '{}' failed to connect: {e}", spec.name);
            continue;
        }
        adapters.push(adapter);
    }
    Ok(adapters)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let global_properties = parse_properties(&cli.properties)?;
    let ports = PortConfig::with_offset(cli.port_offset);
    let runtime = AdapterRuntime::install(AdapterRuntime::with_factory(DefaultEndpointFactory::new(
        ports,
        security_config(&cli),
    )));
    let factory = CoapEventAdapterFactory::new(runtime.clone(), ports);

    let deployer = deploy_streams(&cli.streams)?;
    let mut adapters = start_adapters(&cli, &factory, &global_properties)?;

    println!();
    println!("  CoAP event adapter ({})", factory.adapter_type());
    println!("  Formats:    {}", factory.supported_message_formats().join(", "));
    for endpoint in runtime.server().endpoints() {
        println!("  Listener:   {}", endpoint.uri(&cli.hostname));
    }
    for adapter in &adapters {
        println!("  Endpoint:   {}", adapter.endpoint_path());
    }
    if deployer.stream_count() > 0 {
        println!("  Streams:    {} deployed", deployer.stream_count());
    }
    println!();
    println!("  Requests on stdin: [coap|coaps] METHOD path [payload]");
    println!("  Press Ctrl+C or close stdin to stop.");
    println!();

    // Requests are handled on a plain thread: a saturated pool blocks the
    // submitting thread, which must not be a runtime worker.
    let shutdown_notify = Arc::new(tokio::sync::Notify::new());
    {
        let notify = shutdown_notify.clone();
        let server = runtime.server().clone();
        std::thread::Builder::new()
            .name("coap-stdin".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_request_line(&line) {
                        Ok((transport, request)) => {
                            let response = server.handle_request(transport, Exchange::new(request));
                            match response.payload {
                                Some(payload) => println!("{} {}", response.code, payload),
                                None => println!("{}", response.code),
                            }
                        }
                        Err(e) => eprintln!("bad request line: {e}"),
                    }
                }
                notify.notify_one();
            })
            .context("failed to start stdin reader")?;
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = shutdown_notify.notified() => {
            info!("stdin closed, shutting down");
        }
    }

    for adapter in &mut adapters {
        adapter.disconnect();
        adapter.destroy();
    }
    runtime.shutdown();
    if let Some(pool) = runtime.pool() {
        if !pool.await_termination(Duration::from_secs(5)) {
            warn!("Worker pool did not drain within 5s");
        }
    }
    info!("Stopped");
    Ok(())
}
