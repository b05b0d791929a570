use log::debug;
use serde::Deserialize;

use crate::models::connection::Connection;
use crate::models::status::GeolocationStatus;
use crate::utils::error::AppResult;

#[derive(Debug, Deserialize)]
struct ConnectionsResponse {
    #[serde(default)]
    connections: Vec<Connection>,
}

#[derive(Debug, Deserialize)]
struct AllowedIpsResponse {
    #[serde(default)]
    allowed_ips: Vec<String>,
}

/// JSON client for the enforcement backend's RPC surface.
///
/// Timeouts are the transport defaults; per-tick failures are handled by the
/// poll loops, not here.
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Currently tracked connections with their classification flags
    pub async fn connections(&self) -> AppResult<Vec<Connection>> {
        let url = format!("{}/connections", self.base_url);
        let response: ConnectionsResponse = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("Fetched {} connections", response.connections.len());
        Ok(response.connections)
    }

    /// Currently allowed IPs across all filters
    pub async fn allowed_ips(&self) -> AppResult<Vec<String>> {
        let url = format!("{}/allowed_ips", self.base_url);
        let response: AllowedIpsResponse = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("Fetched {} allowed IPs", response.allowed_ips.len());
        Ok(response.allowed_ips)
    }

    /// Geolocation progress report; also serves as the service liveness probe
    pub async fn geolocation_status(&self) -> AppResult<GeolocationStatus> {
        let url = format!("{}/geolocation_status", self.base_url);
        let status = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let client = BackendClient::new("http://127.0.0.1:8090/");
        assert_eq!(client.base_url, "http://127.0.0.1:8090");
    }

    #[test]
    fn connections_payload_tolerates_sparse_entries() {
        let payload = serde_json::json!({
            "connections": [
                { "dst": "203.0.113.9", "filter_name": "EU", "allowed": true,
                  "is_allowed_ip": false, "geo": { "lat": 48.2, "lon": 16.4 } },
                { "dst": "198.51.100.7" }
            ]
        });
        let response: ConnectionsResponse = serde_json::from_value(payload).expect("deserialize");
        assert_eq!(response.connections.len(), 2);
        assert_eq!(response.connections[1].allowed, None);
        assert!(!response.connections[1].is_allowed_ip);
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let response: AllowedIpsResponse = serde_json::from_str("{}").expect("deserialize");
        assert!(response.allowed_ips.is_empty());
    }
}
