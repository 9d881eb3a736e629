//! Upstream reference guard policies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing a reference guard policy
#[derive(Debug, Clone)]
pub struct ParseReferenceGuardError(String);

impl fmt::Display for ParseReferenceGuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid reference guard: {}", self.0)
    }
}

impl std::error::Error for ParseReferenceGuardError {}

/// Where the route reference check for upstream deletion runs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceGuard {
    /// Check in a read transaction of its own, then delete in a write transaction.
    /// A route inserted between the two can end up pointing at a deleted upstream.
    Snapshot,
    /// Check inside the write transaction that performs the delete
    #[default]
    InTransaction,
}

impl ReferenceGuard {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceGuard::Snapshot => "snapshot",
            ReferenceGuard::InTransaction => "in-transaction",
        }
    }
}

impl FromStr for ReferenceGuard {
    type Err = ParseReferenceGuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "snapshot" => Ok(ReferenceGuard::Snapshot),
            "in-transaction" | "in_transaction" => Ok(ReferenceGuard::InTransaction),
            _ => Err(ParseReferenceGuardError(s.to_string())),
        }
    }
}
