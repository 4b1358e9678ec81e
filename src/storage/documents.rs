//! Document shapes for the four collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{AccountStatus, Role};

/// Stored user account. Never hard-deleted; `status` is the soft switch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub password_hash: String,
    pub role: Role,
    #[serde(default)]
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn new(username: &str, password_hash: String, role: Role, created_by: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            username: username.to_string(),
            display_name: None,
            password_hash,
            role,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
            created_by: created_by.map(|s| s.to_string()),
            last_login_at: None,
        }
    }

    pub fn view(&self) -> UserView {
        UserView {
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            created_by: self.created_by.clone(),
            last_login_at: self.last_login_at,
        }
    }
}

/// User record as returned over the API (no password hash).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserView {
    pub username: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Field-level update applied to one user record in a single atomic step.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub status: Option<AccountStatus>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserPatch {
    pub fn apply(&self, rec: &mut UserRecord, now: DateTime<Utc>) {
        if let Some(d) = &self.display_name { rec.display_name = Some(d.clone()); }
        if let Some(h) = &self.password_hash { rec.password_hash = h.clone(); }
        if let Some(r) = self.role { rec.role = r; }
        if let Some(s) = self.status { rec.status = s; }
        if let Some(t) = self.last_login_at { rec.last_login_at = Some(t); }
        // A login stamp alone is not an administrative change.
        let administrative = self.display_name.is_some() || self.password_hash.is_some() || self.role.is_some() || self.status.is_some();
        if administrative { rec.updated_at = now; }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct League {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    #[default]
    Scheduled,
    Live,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchRecord {
    pub id: String,
    pub league_id: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub kickoff_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub status: MatchStatus,
    #[serde(default)]
    pub analysis_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Workflow-generated analysis article attached to a match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub id: String,
    pub match_id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_stamp_does_not_touch_updated_at() {
        let mut rec = UserRecord::new("ana", "phc".into(), Role::Ktv, None);
        let before = rec.updated_at;
        let later = before + chrono::Duration::seconds(30);
        UserPatch { last_login_at: Some(later), ..Default::default() }.apply(&mut rec, later);
        assert_eq!(rec.updated_at, before);
        assert_eq!(rec.last_login_at, Some(later));

        UserPatch { status: Some(AccountStatus::Inactive), ..Default::default() }.apply(&mut rec, later);
        assert_eq!(rec.updated_at, later);
        assert_eq!(rec.status, AccountStatus::Inactive);
    }

    #[test]
    fn view_omits_hash() {
        let rec = UserRecord::new("ana", "secret-phc".into(), Role::Admin, Some("root"));
        let json = serde_json::to_string(&rec.view()).unwrap();
        assert!(!json.contains("secret-phc"));
        assert!(json.contains("\"role\":\"admin\""));
    }
}
