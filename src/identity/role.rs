use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability class carried by a session.
///
/// Roles are siblings, not levels: `Admin` does not imply `Ktv` and the
/// reverse. `Unknown` absorbs any role string outside the fixed set so a
/// drifted token or record still decodes, and is then denied everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    /// Technician / match analyst.
    Ktv,
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Ktv => "ktv",
            Role::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool { !matches!(self, Role::Unknown) }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn is_active(&self) -> bool { matches!(self, AccountStatus::Active) }
}
