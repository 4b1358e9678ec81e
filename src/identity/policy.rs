//! Route access policy: one canonical zone table and one pure evaluator.
//!
//! Every guard (edge interceptor, page render, API handler) classifies the
//! request path through the same `RoutePolicy` and calls `evaluate` once.
//! Rules are matched by path segment, and the most specific matching rule
//! decides (longest match wins), so a nested exception such as
//! `/admin/users` overrides its parent `/admin` without any special-casing.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::role::Role;
use super::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    DenyUnauthenticated,
    DenyForbidden,
}

/// Who may enter a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Roles(BTreeSet<Role>),
}

impl Access {
    pub fn roles(roles: &[Role]) -> Self { Access::Roles(roles.iter().copied().collect()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRule {
    pub prefix: String,
    pub access: Access,
}

impl ZoneRule {
    pub fn new(prefix: &str, access: Access) -> Self { Self { prefix: prefix.to_string(), access } }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("zone prefix '{0}' must be an absolute path without query, fragment or dot segments")]
    InvalidPrefix(String),
    #[error("zone prefix '{0}' is declared more than once")]
    DuplicatePrefix(String),
    #[error("zone '{0}' names a role outside the fixed role set")]
    UnknownRole(String),
    #[error("policy file: {0}")]
    File(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path contains a dot segment")]
    DotSegment,
    #[error("path segment is not valid percent-encoded UTF-8")]
    Encoding,
}

/// Policy file layout: `{"extend_builtin": true, "zones": [...]}`.
#[derive(Debug, Clone, Deserialize)]
struct PolicyFile {
    #[serde(default = "default_true")]
    extend_builtin: bool,
    #[serde(default)]
    zones: Vec<ZoneRule>,
}

fn default_true() -> bool { true }

#[derive(Debug, Clone)]
struct CompiledRule {
    segments: Vec<String>,
    rule: ZoneRule,
}

impl CompiledRule {
    fn matches(&self, path: &[String]) -> bool {
        path.len() >= self.segments.len() && self.segments.iter().zip(path).all(|(a, b)| a == b)
    }
}

/// The canonical zone table.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    // Most specific (deepest) first.
    rules: Vec<CompiledRule>,
}

/// Zones used when no policy file is configured.
pub fn builtin_zones() -> Vec<ZoneRule> {
    use Role::{Admin, Ktv};
    vec![
        ZoneRule::new("/admin", Access::roles(&[Admin, Ktv])),
        ZoneRule::new("/admin/users", Access::roles(&[Admin])),
        ZoneRule::new("/ktv", Access::roles(&[Ktv])),
        ZoneRule::new("/api/auth", Access::Public),
        ZoneRule::new("/api/auth/me", Access::roles(&[Admin, Ktv])),
        ZoneRule::new("/api/users", Access::roles(&[Admin])),
        ZoneRule::new("/api/leagues", Access::roles(&[Admin, Ktv])),
        ZoneRule::new("/api/matches", Access::roles(&[Admin, Ktv])),
        ZoneRule::new("/api/articles", Access::roles(&[Admin, Ktv])),
        // Inbound workflow callbacks authenticate with a shared key instead.
        ZoneRule::new("/api/webhooks", Access::Public),
    ]
}

impl Default for RoutePolicy {
    fn default() -> Self { Self::builtin() }
}

impl RoutePolicy {
    pub fn builtin() -> Self {
        let mut rules: Vec<CompiledRule> = builtin_zones()
            .into_iter()
            .map(|r| CompiledRule { segments: prefix_segments(&r.prefix), rule: r })
            .collect();
        sort_most_specific_first(&mut rules);
        Self { rules }
    }

    /// Build a table from explicit rules, rejecting malformed prefixes,
    /// duplicates and roles outside the fixed set.
    pub fn new(zones: Vec<ZoneRule>) -> Result<Self, PolicyError> {
        let mut rules: Vec<CompiledRule> = Vec::with_capacity(zones.len());
        for z in zones {
            if !z.prefix.starts_with('/') || z.prefix.contains(['?', '#']) {
                return Err(PolicyError::InvalidPrefix(z.prefix));
            }
            let segments = split_segments(&z.prefix).map_err(|_| PolicyError::InvalidPrefix(z.prefix.clone()))?;
            if let Access::Roles(set) = &z.access {
                if set.iter().any(|r| !r.is_known()) { return Err(PolicyError::UnknownRole(z.prefix)); }
            }
            if rules.iter().any(|r| r.segments == segments) {
                return Err(PolicyError::DuplicatePrefix(z.prefix));
            }
            let prefix = join_segments(&segments);
            rules.push(CompiledRule { segments, rule: ZoneRule { prefix, access: z.access } });
        }
        sort_most_specific_first(&mut rules);
        Ok(Self { rules })
    }

    /// Parse a policy document. With `extend_builtin` (the default) its zones
    /// are layered over the built-in table, replacing rules with the same
    /// prefix; otherwise they replace the table outright.
    pub fn from_json(text: &str) -> Result<Self, PolicyError> {
        let file: PolicyFile = serde_json::from_str(text).map_err(|e| PolicyError::File(e.to_string()))?;
        if !file.extend_builtin { return Self::new(file.zones); }
        let overrides: BTreeSet<Vec<String>> = file.zones.iter().filter_map(|z| split_segments(&z.prefix).ok()).collect();
        let mut zones: Vec<ZoneRule> = builtin_zones()
            .into_iter()
            .filter(|b| !overrides.contains(&prefix_segments(&b.prefix)))
            .collect();
        zones.extend(file.zones);
        Self::new(zones)
    }

    pub fn load_file(path: &Path) -> Result<Self, PolicyError> {
        let text = std::fs::read_to_string(path).map_err(|e| PolicyError::File(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Rules in evaluation order (most specific first).
    pub fn zones(&self) -> impl Iterator<Item = &ZoneRule> { self.rules.iter().map(|r| &r.rule) }

    /// Zones whose prefix covers `path`, most specific first. An empty list
    /// means the path is public.
    pub fn classify(&self, path: &str) -> Result<Vec<&ZoneRule>, PathError> {
        let segs = split_segments(path)?;
        Ok(self.rules.iter().filter(|r| r.matches(&segs)).map(|r| &r.rule).collect())
    }

    /// Decide access for `path`. Pure: same inputs, same answer.
    pub fn evaluate(&self, path: &str, session: Option<&Session>) -> Decision {
        let zones = match self.classify(path) {
            Ok(z) => z,
            // Unclassifiable paths fail closed.
            Err(_) => return if session.is_some() { Decision::DenyForbidden } else { Decision::DenyUnauthenticated },
        };
        let Some(decisive) = zones.first() else { return Decision::Allow; };
        let allowed = match &decisive.access {
            Access::Public => return Decision::Allow,
            Access::Roles(set) => set,
        };
        let Some(session) = session else { return Decision::DenyUnauthenticated; };
        if !session.status.is_active() { return Decision::DenyForbidden; }
        if session.role.is_known() && allowed.contains(&session.role) {
            Decision::Allow
        } else {
            Decision::DenyForbidden
        }
    }
}

fn sort_most_specific_first(rules: &mut [CompiledRule]) {
    rules.sort_by(|a, b| b.segments.len().cmp(&a.segments.len()).then_with(|| a.segments.cmp(&b.segments)));
}

// Built-in prefixes are plain ASCII literals.
fn prefix_segments(prefix: &str) -> Vec<String> {
    prefix.split('/').filter(|s| !s.is_empty()).map(|s| s.to_string()).collect()
}

fn join_segments(segs: &[String]) -> String { format!("/{}", segs.join("/")) }

/// Split a request path into decoded segments.
///
/// Query and fragment are dropped and empty segments collapse. Each segment
/// is percent-decoded on its own, so an encoded `/` stays inside its
/// segment. `.` and `..` (literal or encoded) are rejected: the router does
/// not resolve them, so any interpretation the evaluator picked could
/// disagree with the handler that finally runs.
pub fn split_segments(path: &str) -> Result<Vec<String>, PathError> {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let mut out = Vec::new();
    for raw in path.split('/') {
        if raw.is_empty() { continue; }
        let seg = urlencoding::decode(raw).map_err(|_| PathError::Encoding)?.into_owned();
        if seg == "." || seg == ".." { return Err(PathError::DotSegment); }
        out.push(seg);
    }
    Ok(out)
}

/// Canonical form of a request path as the evaluator sees it.
pub fn normalize_path(path: &str) -> Result<String, PathError> { split_segments(path).map(|s| join_segments(&s)) }
