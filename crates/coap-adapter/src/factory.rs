//! Adapter factory: type metadata and adapter construction.

use std::collections::HashMap;
use std::sync::Arc;

use coap_protocol::{Constants, Tenant};
use coap_transport::PortConfig;
use serde::{Deserialize, Serialize};

use crate::adapter::{AdapterConfiguration, CoapEventAdapter};
use crate::runtime::AdapterRuntime;

/// A configurable adapter property as presented to whoever sets adapters up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    pub display_name: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

pub struct CoapEventAdapterFactory {
    runtime: Arc<AdapterRuntime>,
    ports: PortConfig,
}

impl CoapEventAdapterFactory {
    pub fn new(runtime: Arc<AdapterRuntime>, ports: PortConfig) -> Self {
        Self { runtime, ports }
    }

    pub fn adapter_type(&self) -> &'static str {
        Constants::ADAPTER_TYPE
    }

    pub fn supported_message_formats(&self) -> Vec<&'static str> {
        vec![Constants::FORMAT_XML, Constants::FORMAT_JSON, Constants::FORMAT_TEXT]
    }

    pub fn property_list(&self) -> Vec<Property> {
        vec![Property {
            name: Constants::EXPOSED_TRANSPORTS.into(),
            display_name: "Transports Exposed".into(),
            required: true,
            options: vec![Constants::TRANSPORT_COAPS.into(), Constants::TRANSPORT_COAP.into()],
            default_value: Some(Constants::TRANSPORT_COAP.into()),
        }]
    }

    pub fn ports(&self) -> PortConfig {
        self.ports
    }

    pub fn create_event_adapter(
        &self,
        config: AdapterConfiguration,
        global_properties: HashMap<String, String>,
        tenant: Tenant,
    ) -> CoapEventAdapter {
        CoapEventAdapter::new(config, global_properties, tenant, self.runtime.clone())
    }
}
