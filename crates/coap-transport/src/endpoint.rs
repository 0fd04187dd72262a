//! Listener endpoints and the factory that creates them.
//!
//! A plain endpoint needs nothing but a port. A secure endpoint needs key
//! and trust material; when it cannot be loaded the factory fails and the
//! adapter asking for it stays non-functional for that transport.

use std::fs;
use std::path::{Path, PathBuf};

use coap_protocol::{Constants, TransportMode};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while setting up a listener endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("secure transport is not configured (no key material supplied)")]
    SecureNotConfigured,

    #[error("unable to read {kind} at {path}: {source}")]
    KeyMaterial {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} at {path} is empty")]
    EmptyKeyMaterial { kind: &'static str, path: PathBuf },

    #[error("{0} password is empty")]
    EmptyPassword(&'static str),
}

/// Key and trust stores backing the secure endpoint.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub key_store_path: PathBuf,
    pub key_store_password: SecretString,
    pub trust_store_path: PathBuf,
    pub trust_store_password: SecretString,
}

/// Listener ports, shifted by the server's port offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfig {
    pub coap_port: u16,
    pub coaps_port: u16,
}

impl PortConfig {
    /// Default ports shifted by `configured_offset + 1`.
    pub fn with_offset(configured_offset: u16) -> Self {
        let offset = configured_offset.saturating_add(1);
        Self {
            coap_port: Constants::DEFAULT_COAP_PORT.saturating_add(offset),
            coaps_port: Constants::DEFAULT_COAPS_PORT.saturating_add(offset),
        }
    }

    pub fn port_for(&self, mode: TransportMode) -> u16 {
        match mode {
            TransportMode::Plain => self.coap_port,
            TransportMode::Secure => self.coaps_port,
        }
    }
}

impl Default for PortConfig {
    fn default() -> Self {
        Self::with_offset(0)
    }
}

/// A started listener endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub mode: TransportMode,
    pub port: u16,
}

impl Endpoint {
    pub fn uri(&self, hostname: &str) -> String {
        format!("{}://{}:{}", self.mode.scheme(), hostname, self.port)
    }
}

/// Creates listener endpoints. Implementations own whatever connector the
/// transport needs; callers only see success or a [`TransportError`].
pub trait EndpointFactory: Send + Sync {
    fn create(&self, mode: TransportMode) -> Result<Endpoint, TransportError>;
}

/// Factory that validates secure key material from the filesystem.
pub struct DefaultEndpointFactory {
    ports: PortConfig,
    security: Option<SecurityConfig>,
}

impl DefaultEndpointFactory {
    pub fn new(ports: PortConfig, security: Option<SecurityConfig>) -> Self {
        Self { ports, security }
    }

    pub fn plain_only(ports: PortConfig) -> Self {
        Self::new(ports, None)
    }

    pub fn ports(&self) -> PortConfig {
        self.ports
    }

    fn load_security(&self) -> Result<(), TransportError> {
        let security = self
            .security
            .as_ref()
            .ok_or(TransportError::SecureNotConfigured)?;

        check_store("trust store", &security.trust_store_path, &security.trust_store_password)?;
        check_store("key store", &security.key_store_path, &security.key_store_password)?;
        Ok(())
    }
}

impl EndpointFactory for DefaultEndpointFactory {
    fn create(&self, mode: TransportMode) -> Result<Endpoint, TransportError> {
        if mode == TransportMode::Secure {
            self.load_security()?;
        }
        let endpoint = Endpoint {
            mode,
            port: self.ports.port_for(mode),
        };
        info!("Created {} endpoint on port {}", mode, endpoint.port);
        Ok(endpoint)
    }
}

fn check_store(kind: &'static str, path: &Path, password: &SecretString) -> Result<(), TransportError> {
    if password.expose_secret().is_empty() {
        return Err(TransportError::EmptyPassword(kind));
    }
    let bytes = fs::read(path).map_err(|source| TransportError::KeyMaterial {
        kind,
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(TransportError::EmptyKeyMaterial {
            kind,
            path: path.to_path_buf(),
        });
    }
    debug!("Loaded {kind} from {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn store_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    fn security(key: &Path, trust: &Path) -> SecurityConfig {
        SecurityConfig {
            key_store_path: key.to_path_buf(),
            key_store_password: SecretString::from("sesame"),
            trust_store_path: trust.to_path_buf(),
            trust_store_password: SecretString::from("sesame"),
        }
    }

    #[test]
    fn ports_are_shifted_by_offset_plus_one() {
        let ports = PortConfig::with_offset(0);
        assert_eq!(ports.coap_port, 5684);
        assert_eq!(ports.coaps_port, 5685);

        let ports = PortConfig::with_offset(10);
        assert_eq!(ports.port_for(TransportMode::Plain), 5694);
        assert_eq!(ports.port_for(TransportMode::Secure), 5695);
    }

    #[test]
    fn plain_endpoint_needs_no_key_material() {
        let factory = DefaultEndpointFactory::plain_only(PortConfig::default());
        let endpoint = factory.create(TransportMode::Plain).unwrap();
        assert_eq!(endpoint.uri("localhost"), "coap://localhost:5684");
    }

    #[test]
    fn secure_endpoint_without_security_config_fails() {
        let factory = DefaultEndpointFactory::plain_only(PortConfig::default());
        assert!(matches!(
            factory.create(TransportMode::Secure),
            Err(TransportError::SecureNotConfigured)
        ));
    }

    #[test]
    fn secure_endpoint_with_missing_key_store_fails() {
        let trust = store_file(b"trust");
        let factory = DefaultEndpointFactory::new(
            PortConfig::default(),
            Some(security(Path::new("/nonexistent/keystore.jks"), trust.path())),
        );
        let err = factory.create(TransportMode::Secure).unwrap_err();
        assert!(matches!(err, TransportError::KeyMaterial { kind: "key store", .. }));
    }

    #[test]
    fn secure_endpoint_with_empty_trust_store_fails() {
        let key = store_file(b"key");
        let trust = store_file(b"");
        let factory = DefaultEndpointFactory::new(
            PortConfig::default(),
            Some(security(key.path(), trust.path())),
        );
        let err = factory.create(TransportMode::Secure).unwrap_err();
        assert!(matches!(err, TransportError::EmptyKeyMaterial { kind: "trust store", .. }));
    }

    #[test]
    fn secure_endpoint_with_key_material_succeeds() {
        let key = store_file(b"key");
        let trust = store_file(b"trust");
        let factory = DefaultEndpointFactory::new(
            PortConfig::with_offset(1),
            Some(security(key.path(), trust.path())),
        );
        let endpoint = factory.create(TransportMode::Secure).unwrap();
        assert_eq!(endpoint.port, 5686);
        assert_eq!(endpoint.uri("127.0.0.1"), "coaps://127.0.0.1:5686");
    }
}
