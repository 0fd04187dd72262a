//! Endpoint path resolution.
//!
//! `coap-endpoints/<adapter>` for the default tenant,
//! `coap-endpoints/t/<domain>/<adapter>` for everyone else. Segments come
//! from splitting the assembled string on `/` with empty segments kept in
//! place, so `resolve` is a fixed string transform rather than a path
//! normaliser.

use coap_protocol::{Constants, Tenant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    prefix: String,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(Constants::ENDPOINT_PREFIX)
    }
}

impl PathResolver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The endpoint path as registered on the server.
    pub fn endpoint(&self, tenant_is_default: bool, tenant_domain: &str, adapter_name: &str) -> String {
        let sep = Constants::ENDPOINT_URL_SEPARATOR;
        if tenant_is_default {
            format!("{}{sep}{adapter_name}", self.prefix)
        } else {
            format!(
                "{}{sep}{}{sep}{tenant_domain}{sep}{adapter_name}",
                self.prefix,
                Constants::ENDPOINT_TENANT_KEY
            )
        }
    }

    pub fn resolve(&self, tenant_is_default: bool, tenant_domain: &str, adapter_name: &str) -> Vec<String> {
        Self::split(&self.endpoint(tenant_is_default, tenant_domain, adapter_name))
    }

    pub fn resolve_for(&self, tenant: &Tenant, adapter_name: &str) -> Vec<String> {
        self.resolve(tenant.is_default(), &tenant.domain, adapter_name)
    }

    pub fn endpoint_for(&self, tenant: &Tenant, adapter_name: &str) -> String {
        self.endpoint(tenant.is_default(), &tenant.domain, adapter_name)
    }

    pub fn split(path: &str) -> Vec<String> {
        path.split(Constants::ENDPOINT_URL_SEPARATOR)
            .map(str::to_string)
            .collect()
    }
}
