//!
//! matchdesk storage module
//! ------------------------
//! Document store holding four collections: users, leagues, matches and
//! articles. Collections live in memory behind one lock; when the store has a
//! root folder each mutation is flushed to `<root>/<collection>.json` before
//! the lock is released, and rolled back in memory if the flush fails.
//!
//! The public API centers on `SharedStore` (`Arc<Mutex<Store>>`). Every
//! mutation is one closure under the lock, which is what makes user
//! role/status/password changes atomic without any application-level locking.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

pub mod documents;
pub mod snapshot;

pub use documents::{Article, League, MatchRecord, MatchStatus, UserPatch, UserRecord, UserView};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

const USERS: &str = "users";
const LEAGUES: &str = "leagues";
const MATCHES: &str = "matches";
const ARTICLES: &str = "articles";

struct Collection<T> {
    name: &'static str,
    docs: BTreeMap<String, T>,
}

impl<T: Serialize + DeserializeOwned + Clone> Collection<T> {
    fn load(root: Option<&Path>, name: &'static str) -> StoreResult<Self> {
        let docs = match root {
            Some(r) => snapshot::read_collection(r, name)?,
            None => BTreeMap::new(),
        };
        Ok(Self { name, docs })
    }

    fn flush(&self, root: Option<&Path>) -> StoreResult<()> {
        match root {
            Some(r) => snapshot::write_collection(r, self.name, &self.docs),
            None => Ok(()),
        }
    }

    fn get(&self, key: &str) -> Option<&T> { self.docs.get(key) }

    fn contains(&self, key: &str) -> bool { self.docs.contains_key(key) }

    fn put(&mut self, root: Option<&Path>, key: String, doc: T) -> StoreResult<()> {
        let prev = self.docs.insert(key.clone(), doc);
        if let Err(e) = self.flush(root) {
            match prev {
                Some(p) => { self.docs.insert(key, p); }
                None => { self.docs.remove(&key); }
            }
            warn!(target: "store", collection = self.name, "flush failed, change rolled back: {}", e);
            return Err(e);
        }
        Ok(())
    }

    fn modify(&mut self, root: Option<&Path>, key: &str, apply: impl FnOnce(&mut T)) -> StoreResult<T> {
        let mut next = self.docs.get(key).cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{} '{}'", self.name, key)))?;
        apply(&mut next);
        self.put(root, key.to_string(), next.clone())?;
        Ok(next)
    }

    fn remove(&mut self, root: Option<&Path>, key: &str) -> StoreResult<T> {
        let prev = self.docs.remove(key)
            .ok_or_else(|| StoreError::NotFound(format!("{} '{}'", self.name, key)))?;
        if let Err(e) = self.flush(root) {
            self.docs.insert(key.to_string(), prev);
            return Err(e);
        }
        Ok(prev)
    }
}

/// In-memory collections plus the optional snapshot root.
pub struct Store {
    root: Option<PathBuf>,
    users: Collection<UserRecord>,
    leagues: Collection<League>,
    matches: Collection<MatchRecord>,
    articles: Collection<Article>,
}

impl Store {
    fn open(root: Option<PathBuf>) -> StoreResult<Self> {
        if let Some(r) = &root {
            std::fs::create_dir_all(r)
                .map_err(|e| StoreError::Unavailable(format!("create {}: {}", r.display(), e)))?;
        }
        let rp = root.as_deref();
        Ok(Self {
            users: Collection::load(rp, USERS)?,
            leagues: Collection::load(rp, LEAGUES)?,
            matches: Collection::load(rp, MATCHES)?,
            articles: Collection::load(rp, ARTICLES)?,
            root,
        })
    }
}

#[derive(Clone)]
pub struct SharedStore(pub Arc<Mutex<Store>>);

impl SharedStore {
    /// Open (or create) a store persisted under `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let store = Store::open(Some(root.as_ref().to_path_buf()))?;
        debug!(target: "store", root = %root.as_ref().display(), users = store.users.docs.len(), "store opened");
        Ok(Self(Arc::new(Mutex::new(store))))
    }

    /// Store with no snapshot files; used by tests and ephemeral runs.
    pub fn in_memory() -> Self {
        let store = Store {
            root: None,
            users: Collection { name: USERS, docs: BTreeMap::new() },
            leagues: Collection { name: LEAGUES, docs: BTreeMap::new() },
            matches: Collection { name: MATCHES, docs: BTreeMap::new() },
            articles: Collection { name: ARTICLES, docs: BTreeMap::new() },
        };
        Self(Arc::new(Mutex::new(store)))
    }

    // ---- users ----

    pub fn find_user(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.0.lock().users.get(username).cloned())
    }

    pub fn insert_user(&self, rec: UserRecord) -> StoreResult<UserRecord> {
        let mut g = self.0.lock();
        if g.users.contains(&rec.username) {
            return Err(StoreError::Conflict(format!("user '{}' already exists", rec.username)));
        }
        let root = g.root.clone();
        g.users.put(root.as_deref(), rec.username.clone(), rec.clone())?;
        Ok(rec)
    }

    pub fn update_user(&self, username: &str, patch: &UserPatch) -> StoreResult<UserRecord> {
        let mut g = self.0.lock();
        let root = g.root.clone();
        let now = Utc::now();
        g.users.modify(root.as_deref(), username, |rec| patch.apply(rec, now))
    }

    pub fn list_users(&self) -> Vec<UserRecord> { self.0.lock().users.docs.values().cloned().collect() }

    pub fn user_count(&self) -> usize { self.0.lock().users.docs.len() }

    // ---- leagues ----

    pub fn list_leagues(&self) -> Vec<League> { self.0.lock().leagues.docs.values().cloned().collect() }

    pub fn get_league(&self, id: &str) -> Option<League> { self.0.lock().leagues.get(id).cloned() }

    pub fn insert_league(&self, league: League) -> StoreResult<League> {
        let mut g = self.0.lock();
        if g.leagues.contains(&league.id) {
            return Err(StoreError::Conflict(format!("league '{}' already exists", league.id)));
        }
        let root = g.root.clone();
        g.leagues.put(root.as_deref(), league.id.clone(), league.clone())?;
        Ok(league)
    }

    pub fn update_league(&self, id: &str, apply: impl FnOnce(&mut League)) -> StoreResult<League> {
        let mut g = self.0.lock();
        let root = g.root.clone();
        g.leagues.modify(root.as_deref(), id, |l| { apply(l); l.updated_at = Utc::now(); })
    }

    /// Remove a league. Refused while matches still reference it.
    pub fn delete_league(&self, id: &str) -> StoreResult<League> {
        let mut g = self.0.lock();
        if g.matches.docs.values().any(|m| m.league_id == id) {
            return Err(StoreError::Conflict(format!("league '{}' still has matches", id)));
        }
        let root = g.root.clone();
        g.leagues.remove(root.as_deref(), id)
    }

    // ---- matches ----

    pub fn list_matches(&self, league_id: Option<&str>) -> Vec<MatchRecord> {
        let g = self.0.lock();
        g.matches.docs.values()
            .filter(|m| league_id.map(|l| m.league_id == l).unwrap_or(true))
            .cloned()
            .collect()
    }

    pub fn get_match(&self, id: &str) -> Option<MatchRecord> { self.0.lock().matches.get(id).cloned() }

    pub fn insert_match(&self, m: MatchRecord) -> StoreResult<MatchRecord> {
        let mut g = self.0.lock();
        if !g.leagues.contains(&m.league_id) {
            return Err(StoreError::Invalid(format!("unknown league '{}'", m.league_id)));
        }
        if g.matches.contains(&m.id) {
            return Err(StoreError::Conflict(format!("match '{}' already exists", m.id)));
        }
        let root = g.root.clone();
        g.matches.put(root.as_deref(), m.id.clone(), m.clone())?;
        Ok(m)
    }

    /// Patch a match. The league it ends up pointing at must exist; the check
    /// runs under the same lock as `delete_league`.
    pub fn update_match(&self, id: &str, apply: impl FnOnce(&mut MatchRecord)) -> StoreResult<MatchRecord> {
        let mut g = self.0.lock();
        let s = &mut *g;
        let mut next = s.matches.get(id).cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{} '{}'", MATCHES, id)))?;
        apply(&mut next);
        if !s.leagues.contains(&next.league_id) {
            return Err(StoreError::Invalid(format!("unknown league '{}'", next.league_id)));
        }
        next.updated_at = Utc::now();
        s.matches.put(s.root.as_deref(), id.to_string(), next.clone())?;
        Ok(next)
    }

    /// Remove a match; its articles go with it. Both collections are flushed
    /// before returning, and a failed flush restores both.
    pub fn delete_match(&self, id: &str) -> StoreResult<MatchRecord> {
        let mut g = self.0.lock();
        let s = &mut *g;
        let root = s.root.as_deref();
        let removed = s.matches.docs.remove(id)
            .ok_or_else(|| StoreError::NotFound(format!("{} '{}'", MATCHES, id)))?;
        let orphan_ids: Vec<String> = s.articles.docs.values().filter(|a| a.match_id == id).map(|a| a.id.clone()).collect();
        let orphans: Vec<Article> = orphan_ids.iter().filter_map(|aid| s.articles.docs.remove(aid)).collect();

        // Articles first: a match left without its articles on disk is still consistent.
        let articles = if orphans.is_empty() { Ok(()) } else { s.articles.flush(root) };
        let articles_written = !orphans.is_empty() && articles.is_ok();
        if let Err(e) = articles.and_then(|()| s.matches.flush(root)) {
            s.matches.docs.insert(id.to_string(), removed);
            for a in orphans {
                s.articles.docs.insert(a.id.clone(), a);
            }
            if articles_written && s.articles.flush(root).is_err() {
                warn!(target: "store", match_id = %id, "articles snapshot could not be restored after failed delete");
            }
            warn!(target: "store", match_id = %id, "flush failed, delete rolled back: {}", e);
            return Err(e);
        }
        Ok(removed)
    }

    // ---- articles ----

    pub fn list_articles(&self, match_id: Option<&str>) -> Vec<Article> {
        let g = self.0.lock();
        let mut out: Vec<Article> = g.articles.docs.values()
            .filter(|a| match_id.map(|m| a.match_id == m).unwrap_or(true))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    pub fn get_article(&self, id: &str) -> Option<Article> { self.0.lock().articles.get(id).cloned() }

    pub fn insert_article(&self, article: Article) -> StoreResult<Article> {
        let mut g = self.0.lock();
        if !g.matches.contains(&article.match_id) {
            return Err(StoreError::Invalid(format!("unknown match '{}'", article.match_id)));
        }
        let root = g.root.clone();
        g.articles.put(root.as_deref(), article.id.clone(), article.clone())?;
        Ok(article)
    }
}

impl crate::identity::CredentialStore for SharedStore {
    fn find_user(&self, username: &str) -> StoreResult<Option<UserRecord>> { SharedStore::find_user(self, username) }

    fn update_user(&self, username: &str, patch: &UserPatch) -> StoreResult<UserRecord> {
        SharedStore::update_user(self, username, patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{AccountStatus, Role};
    use chrono::Utc;
    use tempfile::tempdir;

    fn league(id: &str) -> League {
        let now = Utc::now();
        League { id: id.into(), name: format!("League {}", id), country: None, season: None, created_at: now, updated_at: now }
    }

    fn fixture(id: &str, league_id: &str) -> MatchRecord {
        let now = Utc::now();
        MatchRecord {
            id: id.into(), league_id: league_id.into(), home_team: "Home".into(), away_team: "Away".into(),
            kickoff_at: None, venue: None, status: MatchStatus::Scheduled, analysis_requested_at: None,
            created_at: now, updated_at: now,
        }
    }

    #[test]
    fn collections_survive_reopen() {
        let tmp = tempdir().unwrap();
        {
            let store = SharedStore::open(tmp.path()).unwrap();
            store.insert_user(UserRecord::new("ana", "phc".into(), Role::Ktv, None)).unwrap();
            store.insert_league(league("v1")).unwrap();
            store.insert_match(fixture("m1", "v1")).unwrap();
        }
        let reopened = SharedStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.find_user("ana").unwrap().unwrap().role, Role::Ktv);
        assert!(reopened.get_league("v1").is_some());
        assert_eq!(reopened.list_matches(Some("v1")).len(), 1);
        assert!(snapshot::collection_path(tmp.path(), "users").exists());
    }

    #[test]
    fn duplicate_username_conflicts() {
        let store = SharedStore::in_memory();
        store.insert_user(UserRecord::new("ana", "a".into(), Role::Ktv, None)).unwrap();
        let err = store.insert_user(UserRecord::new("ana", "b".into(), Role::Admin, None)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.find_user("ana").unwrap().unwrap().password_hash, "a");
    }

    #[test]
    fn username_lookup_is_case_sensitive() {
        let store = SharedStore::in_memory();
        store.insert_user(UserRecord::new("Ana", "a".into(), Role::Ktv, None)).unwrap();
        assert!(store.find_user("ana").unwrap().is_none());
        assert!(store.find_user("Ana").unwrap().is_some());
    }

    #[test]
    fn update_user_patches_fields_in_place() {
        let store = SharedStore::in_memory();
        store.insert_user(UserRecord::new("ana", "a".into(), Role::Ktv, None)).unwrap();
        let patch = UserPatch { status: Some(AccountStatus::Inactive), role: Some(Role::Admin), ..Default::default() };
        let rec = store.update_user("ana", &patch).unwrap();
        assert_eq!(rec.status, AccountStatus::Inactive);
        assert_eq!(rec.role, Role::Admin);
        assert_eq!(rec.password_hash, "a");
        assert!(matches!(store.update_user("nobody", &patch), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn failed_flush_rolls_back() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("db");
        let store = SharedStore::open(&root).unwrap();
        store.insert_user(UserRecord::new("ana", "a".into(), Role::Ktv, None)).unwrap();
        // Replace the root folder with a plain file so every flush fails.
        std::fs::remove_dir_all(&root).unwrap();
        std::fs::write(&root, b"not a dir").unwrap();
        let err = store.insert_user(UserRecord::new("bob", "b".into(), Role::Ktv, None)).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.find_user("bob").unwrap().is_none());
        let err = store.update_user("ana", &UserPatch { role: Some(Role::Admin), ..Default::default() }).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.find_user("ana").unwrap().unwrap().role, Role::Ktv);
    }

    #[test]
    fn match_cannot_move_to_a_missing_league() {
        let store = SharedStore::in_memory();
        store.insert_league(league("v1")).unwrap();
        store.insert_match(fixture("m1", "v1")).unwrap();
        let err = store.update_match("m1", |m| m.league_id = "gone".into()).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(store.get_match("m1").unwrap().league_id, "v1");
        assert!(matches!(store.update_match("m9", |_| {}), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn failed_match_delete_keeps_match_and_articles() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("db");
        let store = SharedStore::open(&root).unwrap();
        store.insert_league(league("v1")).unwrap();
        store.insert_match(fixture("m1", "v1")).unwrap();
        let now = Utc::now();
        for aid in ["a1", "a2"] {
            store.insert_article(Article { id: aid.into(), match_id: "m1".into(), title: "t".into(), body: "b".into(), source: None, created_at: now }).unwrap();
        }
        std::fs::remove_dir_all(&root).unwrap();
        std::fs::write(&root, b"not a dir").unwrap();
        let err = store.delete_match("m1").unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.get_match("m1").is_some());
        assert_eq!(store.list_articles(Some("m1")).len(), 2);
        assert!(matches!(store.delete_league("v1"), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn referential_rules() {
        let store = SharedStore::in_memory();
        assert!(matches!(store.insert_match(fixture("m1", "nope")), Err(StoreError::Invalid(_))));
        store.insert_league(league("v1")).unwrap();
        store.insert_match(fixture("m1", "v1")).unwrap();
        assert!(matches!(store.delete_league("v1"), Err(StoreError::Conflict(_))));

        let now = Utc::now();
        store.insert_article(Article { id: "a1".into(), match_id: "m1".into(), title: "t".into(), body: "b".into(), source: None, created_at: now }).unwrap();
        store.delete_match("m1").unwrap();
        assert!(store.get_article("a1").is_none());
        store.delete_league("v1").unwrap();
    }
}
