use serde::{Deserialize, Serialize};

use crate::engine::region::RegionToken;

/// Transport protocol a geo-filter matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tcp" => Some(Protocol::Tcp),
            "udp" => Some(Protocol::Udp),
            _ => None,
        }
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Udp
    }
}

/// A named access-control filter combining drawn regions with
/// protocol/port/IP constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFilter {
    /// Unique user-chosen name (case-sensitive)
    pub name: String,

    /// Drawn regions in display order
    pub regions: Vec<RegionToken>,

    /// Whether the filter is enforced; never true while `regions` is empty
    pub enabled: bool,

    pub protocol: Protocol,

    /// Source IP constraint (possibly-negated range expressions, kept verbatim)
    pub src_ip: Option<String>,

    /// Source port constraint
    pub src_port: Option<String>,

    /// Destination port constraint
    pub dest_port: Option<String>,

    /// Whitelisted IPs/CIDRs, possibly negated
    pub allowed_ip: Vec<String>,

    /// Path of the per-filter IP list file
    pub ip_list: Option<String>,
}

/// Partial per-filter settings update.
///
/// Absent or empty fields mean "no change", not "clear" — the engine merges
/// only what is present.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilterSettings {
    pub protocol: Option<Protocol>,

    #[serde(default)]
    pub src_ip: Option<String>,

    #[serde(default)]
    pub src_port: Option<String>,

    #[serde(default)]
    pub dest_port: Option<String>,

    #[serde(default)]
    pub allowed_ip: Vec<String>,

    #[serde(default)]
    pub ip_list: Option<String>,
}
