//! Dashboard REST client implementing [`PortService`]
//!
//! Endpoints used:
//! - `GET  {base}/devices/{serial}/switch/ports`
//! - `GET  {base}/devices/{serial}/switch/ports/{portId}`
//! - `PUT  {base}/devices/{serial}/switch/ports/{portId}`
//! - `GET  {base}/organizations`
//! - `GET  {base}/organizations/{orgId}/devices`

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

use vlanbulk_common::{
    PortService, PortState, RemoteError, RemoteResult, SwitchDevice, VlanId,
};

/// Default dashboard API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.meraki.com/api/v1";

/// Port resource as returned by the dashboard
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchPort {
    port_id: String,
    #[serde(default)]
    vlan: Option<VlanId>,
    #[serde(default)]
    voice_vlan: Option<VlanId>,
}

impl SwitchPort {
    fn into_state(self, switch_serial: &str) -> PortState {
        PortState::new(switch_serial, self.port_id, self.vlan, self.voice_vlan)
    }
}

/// Organization as returned by the dashboard
#[derive(Debug, Clone, Deserialize)]
struct Organization {
    id: String,
}

/// Inventory device as returned by the dashboard
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Device {
    serial: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    product_type: Option<String>,
}

/// Keeps only switches ("switch", "switchStack", ...)
fn switches_from(devices: Vec<Device>) -> Vec<SwitchDevice> {
    devices
        .into_iter()
        .filter(|d| {
            d.product_type
                .as_deref()
                .is_some_and(|t| t.starts_with("switch"))
        })
        .map(|d| SwitchDevice::new(d.serial, d.name.unwrap_or_default(), d.model))
        .collect()
}

/// Update body
///
/// An absent data VLAN is left out, so the dashboard keeps the current one.
/// An absent voice VLAN is sent as `null` to clear it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PortUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    vlan: Option<VlanId>,
    voice_vlan: Option<VlanId>,
}

/// HTTP client for the dashboard switch-port API
pub struct DashboardClient {
    base_url: String,
    api_key: String,
    organization_id: Option<String>,
    client: Client,
}

impl DashboardClient {
    /// Creates a client with a per-request timeout
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            organization_id: None,
            client,
        })
    }

    /// Pins the organization used for switch inventory
    ///
    /// Without one, the first organization visible to the API key is used.
    pub fn with_organization(mut self, organization_id: Option<String>) -> Self {
        self.organization_id = organization_id;
        self
    }

    fn devices_url(&self, organization_id: &str) -> String {
        format!(
            "{}/organizations/{}/devices?perPage=1000",
            self.base_url, organization_id
        )
    }

    async fn organization_id(&self) -> RemoteResult<String> {
        if let Some(id) = &self.organization_id {
            return Ok(id.clone());
        }

        let response = self
            .client
            .get(format!("{}/organizations", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport)?;
        let orgs: Vec<Organization> = Self::check(response, "*", "*")
            .await?
            .json()
            .await
            .map_err(decode)?;

        orgs.into_iter()
            .next()
            .map(|org| org.id)
            .ok_or_else(|| RemoteError::Api {
                status: 404,
                message: "no organization visible to this API key".to_string(),
            })
    }

    fn ports_url(&self, switch_serial: &str) -> String {
        format!("{}/devices/{}/switch/ports", self.base_url, switch_serial)
    }

    fn port_url(&self, switch_serial: &str, port_id: &str) -> String {
        format!("{}/{}", self.ports_url(switch_serial), port_id)
    }

    async fn check(response: Response, switch_serial: &str, port_id: &str) -> RemoteResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        Err(classify(status, retry_after, body, switch_serial, port_id))
    }
}

/// Maps a non-success HTTP status onto a [`RemoteError`]
fn classify(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: String,
    switch_serial: &str,
    port_id: &str,
) -> RemoteError {
    match status {
        StatusCode::NOT_FOUND => RemoteError::not_found(switch_serial, port_id),
        StatusCode::TOO_MANY_REQUESTS => RemoteError::RateLimited { retry_after },
        _ => RemoteError::Api {
            status: status.as_u16(),
            message: body,
        },
    }
}

fn transport(e: reqwest::Error) -> RemoteError {
    RemoteError::transport(e.to_string())
}

fn decode(e: reqwest::Error) -> RemoteError {
    RemoteError::Decode {
        message: e.to_string(),
    }
}

#[async_trait]
impl PortService for DashboardClient {
    async fn get_port(&self, switch_serial: &str, port_id: &str) -> RemoteResult<PortState> {
        trace!(switch = switch_serial, port = port_id, "GET port");
        let response = self
            .client
            .get(self.port_url(switch_serial, port_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport)?;

        let port: SwitchPort = Self::check(response, switch_serial, port_id)
            .await?
            .json()
            .await
            .map_err(decode)?;
        Ok(port.into_state(switch_serial))
    }

    async fn set_port(
        &self,
        switch_serial: &str,
        port_id: &str,
        vlan: Option<VlanId>,
        voice_vlan: Option<VlanId>,
    ) -> RemoteResult<()> {
        debug!(switch = switch_serial, port = port_id, ?vlan, ?voice_vlan, "PUT port");
        let response = self
            .client
            .put(self.port_url(switch_serial, port_id))
            .bearer_auth(&self.api_key)
            .json(&PortUpdate { vlan, voice_vlan })
            .send()
            .await
            .map_err(transport)?;

        Self::check(response, switch_serial, port_id).await?;
        Ok(())
    }

    async fn list_ports(&self, switch_serial: &str) -> RemoteResult<Vec<PortState>> {
        trace!(switch = switch_serial, "GET ports");
        let response = self
            .client
            .get(self.ports_url(switch_serial))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport)?;

        let ports: Vec<SwitchPort> = Self::check(response, switch_serial, "*")
            .await?
            .json()
            .await
            .map_err(decode)?;
        Ok(ports
            .into_iter()
            .map(|p| p.into_state(switch_serial))
            .collect())
    }

    async fn list_switches(&self) -> RemoteResult<Vec<SwitchDevice>> {
        let organization_id = self.organization_id().await?;
        trace!(organization = %organization_id, "GET devices");
        let response = self
            .client
            .get(self.devices_url(&organization_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport)?;

        let devices: Vec<Device> = Self::check(response, "*", "*")
            .await?
            .json()
            .await
            .map_err(decode)?;
        let switches = switches_from(devices);
        debug!(organization = %organization_id, count = switches.len(), "Listed switches");
        Ok(switches)
    }
}
