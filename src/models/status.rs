use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whether the enforcement backend answers its status RPC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Running,
    NotRunning,
}

impl Default for ServiceStatus {
    fn default() -> Self {
        ServiceStatus::NotRunning
    }
}

impl ServiceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceStatus::Running => "Running",
            ServiceStatus::NotRunning => "Not Running",
        }
    }
}

/// Geolocation progress of the current refresh cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeolocationCycle {
    /// Seconds since the last geolocation run
    #[serde(default)]
    pub last_run_ago: Option<i64>,

    /// IPs still waiting for a location
    #[serde(default)]
    pub pending_ips: u64,
}

/// Per-filter geolocation coverage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterGeoStats {
    #[serde(default)]
    pub total_ips: u64,

    #[serde(default)]
    pub geolocated: u64,
}

/// Status payload of the backend's geolocation RPC
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeolocationStatus {
    /// Backend clock at the time of the report (unix seconds)
    #[serde(default)]
    pub timestamp: Option<i64>,

    /// Seconds since the last successful list update
    #[serde(default)]
    pub last_update_ago: Option<i64>,

    /// Seconds until the next refresh cycle
    #[serde(default)]
    pub next_cycle_in: Option<i64>,

    #[serde(default)]
    pub geolocation: GeolocationCycle,

    /// Coverage per filter name
    #[serde(default)]
    pub filters: HashMap<String, FilterGeoStats>,

    /// Filters whose ruleset failed to apply
    #[serde(default)]
    pub nft_error_filters: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deserializes_a_backend_report() {
        let payload = serde_json::json!({
            "timestamp": 1754550000,
            "last_update_ago": 42,
            "next_cycle_in": 258,
            "geolocation": { "last_run_ago": 12, "pending_ips": 3 },
            "filters": { "EU": { "total_ips": 120, "geolocated": 117 } },
            "nft_error_filters": ["Broken"]
        });
        let status: GeolocationStatus = serde_json::from_value(payload).expect("deserialize");
        assert_eq!(status.geolocation.pending_ips, 3);
        assert_eq!(status.filters["EU"].geolocated, 117);
        assert_eq!(status.nft_error_filters, vec!["Broken".to_string()]);
    }

    #[test]
    fn tolerates_a_minimal_report() {
        let status: GeolocationStatus = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(status, GeolocationStatus::default());
    }
}
