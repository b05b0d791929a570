use serde::{Deserialize, Serialize};
use std::fmt;

/// Delimiter between the stable shape id and the geometry payload
const SHAPE_ID_DELIMITER: char = ':';

/// Opaque token for one drawn shape within a filter.
///
/// The token is a stable shape-id prefix followed by a geometry payload the
/// panel never interprets. Two tokens describe the same drawn shape across an
/// edit iff their shape ids match; that prefix rule is the only identity the
/// map surface guarantees when it does not supply the prior token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionToken(String);

impl RegionToken {
    pub fn new(raw: impl Into<String>) -> Self {
        RegionToken(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shape id: the substring before the first delimiter. A token without a
    /// delimiter is its own id.
    pub fn shape_id(&self) -> &str {
        match self.0.find(SHAPE_ID_DELIMITER) {
            Some(pos) => &self.0[..pos],
            None => &self.0,
        }
    }

    /// Whether both tokens belong to the same drawn shape
    pub fn same_shape(&self, other: &RegionToken) -> bool {
        self.shape_id() == other.shape_id()
    }
}

impl fmt::Display for RegionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RegionToken {
    fn from(raw: String) -> Self {
        RegionToken(raw)
    }
}

impl From<&str> for RegionToken {
    fn from(raw: &str) -> Self {
        RegionToken(raw.to_string())
    }
}
