use serde::{Deserialize, Serialize};

/// Geolocated coordinates of a connection endpoint. Either coordinate may be
/// missing while geolocation is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(default)]
    pub lat: Option<f64>,

    #[serde(default)]
    pub lon: Option<f64>,
}

/// One classified connection as reported by the enforcement backend.
/// Read-only to the panel; the whole list is replaced on every poll tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Destination IP
    #[serde(default)]
    pub dst: Option<String>,

    /// Name of the geo-filter that matched this connection, if any
    #[serde(default)]
    pub filter_name: Option<String>,

    /// Verdict of the last filter evaluation; absent while undecided
    #[serde(default)]
    pub allowed: Option<bool>,

    /// Destination is on a filter's explicit IP whitelist
    #[serde(default)]
    pub is_allowed_ip: bool,

    #[serde(default)]
    pub geo: Option<GeoPoint>,
}

impl Connection {
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::derive(self)
    }
}

/// Display classification of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// On an explicit IP whitelist; wins over everything else
    AllowedWhitelist,
    Allowed,
    /// No location yet and not explicitly allowed; the expected transient
    /// state before geolocation completes
    Untracked,
    Blocked,
    Unknown,
}

impl ConnectionStatus {
    /// Derive the display status. Evaluation order is fixed and matters: a
    /// whitelisted IP can carry `allowed=false` from a stale filter
    /// evaluation and must still report as whitelisted.
    pub fn derive(conn: &Connection) -> Self {
        let located = conn
            .geo
            .as_ref()
            .map_or(false, |g| g.lat.is_some() && g.lon.is_some());

        if conn.is_allowed_ip {
            ConnectionStatus::AllowedWhitelist
        } else if conn.allowed == Some(true) {
            ConnectionStatus::Allowed
        } else if !located {
            // allowed is false or undecided here
            ConnectionStatus::Untracked
        } else if conn.allowed == Some(false) {
            ConnectionStatus::Blocked
        } else {
            ConnectionStatus::Unknown
        }
    }

    /// Human-readable label used by the connections table
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::AllowedWhitelist => "Allowed (Whitelist)",
            ConnectionStatus::Allowed => "Allowed",
            ConnectionStatus::Untracked => "Untracked",
            ConnectionStatus::Blocked => "Blocked",
            ConnectionStatus::Unknown => "Unknown",
        }
    }
}

/// One row of the active connections table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionRow {
    pub dst: String,
    pub filter_name: String,
    pub status: &'static str,
}

impl ConnectionRow {
    pub fn from_connection(conn: &Connection) -> Self {
        Self {
            dst: conn.dst.clone().unwrap_or_else(|| "Unknown".to_string()),
            filter_name: conn
                .filter_name
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            status: conn.status().label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn conn() -> Connection {
        Connection {
            dst: Some("203.0.113.9".into()),
            filter_name: Some("EU".into()),
            allowed: None,
            is_allowed_ip: false,
            geo: None,
        }
    }

    fn located() -> Option<GeoPoint> {
        Some(GeoPoint {
            lat: Some(48.2),
            lon: Some(16.4),
        })
    }

    #[test]
    fn whitelist_wins_over_blocked() {
        let c = Connection {
            is_allowed_ip: true,
            allowed: Some(false),
            geo: located(),
            ..conn()
        };
        assert_eq!(c.status(), ConnectionStatus::AllowedWhitelist);
    }

    #[test]
    fn explicit_allow_without_geo_is_allowed() {
        let c = Connection {
            allowed: Some(true),
            ..conn()
        };
        assert_eq!(c.status(), ConnectionStatus::Allowed);
    }

    #[test]
    fn undecided_without_geo_is_untracked() {
        assert_eq!(conn().status(), ConnectionStatus::Untracked);
    }

    #[test]
    fn blocked_without_geo_is_untracked() {
        let c = Connection {
            allowed: Some(false),
            ..conn()
        };
        assert_eq!(c.status(), ConnectionStatus::Untracked);
    }

    #[test]
    fn partial_coordinates_count_as_unlocated() {
        let c = Connection {
            allowed: Some(false),
            geo: Some(GeoPoint {
                lat: Some(48.2),
                lon: None,
            }),
            ..conn()
        };
        assert_eq!(c.status(), ConnectionStatus::Untracked);
    }

    #[test]
    fn located_and_denied_is_blocked() {
        let c = Connection {
            allowed: Some(false),
            geo: located(),
            ..conn()
        };
        assert_eq!(c.status(), ConnectionStatus::Blocked);
    }

    #[test]
    fn located_but_undecided_is_unknown() {
        let c = Connection {
            geo: located(),
            ..conn()
        };
        assert_eq!(c.status(), ConnectionStatus::Unknown);
    }
}
