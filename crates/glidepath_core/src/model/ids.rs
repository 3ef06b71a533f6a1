//! Identifiers for model entities
//!
//! Asset classes are keyed by a stable string so allocations, correlation
//! estimates and instrument tables can be written by hand. Assumption sets are
//! keyed by name and version so past runs keep pointing at the snapshot they
//! used after the assumptions are updated.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an asset class (e.g. `us_equity`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetClassId(pub String);

impl AssetClassId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetClassId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AssetClassId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Versioned identifier of a market assumption set
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssumptionSetId {
    pub name: String,
    pub version: u32,
}

impl AssumptionSetId {
    #[must_use]
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for AssumptionSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.name, self.version)
    }
}
