//! In-memory mock implementation of IdentityStore for tests.
//!
//! Behaves like a small Keycloak realm: groups form a forest whose paths are
//! recomputed on every listing, usernames are unique, and the same
//! idempotency exceptions as the REST client are applied (409 on group create
//! and 404 on user / membership delete are success).

use super::models::{GroupNode, UserRecord};
use super::traits::IdentityStore;
use crate::error::{Result, SyncError};
use crate::token::Token;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredGroup {
    id: String,
    name: String,
    parent: Option<String>,
}

#[derive(Default)]
struct Realm {
    /// Insertion order doubles as listing order
    groups: Vec<StoredGroup>,
    users: Vec<UserRecord>,
    memberships: HashMap<String, Vec<String>>,
    next_id: usize,
}

impl Realm {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn group(&self, id: &str) -> Option<&StoredGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    fn child_named(&self, parent: Option<&str>, name: &str) -> Option<&StoredGroup> {
        self.groups
            .iter()
            .find(|g| g.parent.as_deref() == parent && g.name == name)
    }

    fn path_of(&self, id: &str) -> String {
        let mut segments = Vec::new();
        let mut current = self.group(id);
        while let Some(group) = current {
            segments.push(group.name.clone());
            current = group.parent.as_deref().and_then(|p| self.group(p));
        }
        segments.iter().rev().fold(String::new(), |acc, s| acc + "/" + s)
    }

    fn node(&self, group: &StoredGroup) -> GroupNode {
        GroupNode {
            id: group.id.clone(),
            name: group.name.clone(),
            path: self.path_of(&group.id),
            sub_groups: self
                .groups
                .iter()
                .filter(|g| g.parent.as_deref() == Some(group.id.as_str()))
                .map(|g| self.node(g))
                .collect(),
            ..GroupNode::default()
        }
    }

    fn forest(&self) -> Vec<GroupNode> {
        self.groups
            .iter()
            .filter(|g| g.parent.is_none())
            .map(|g| self.node(g))
            .collect()
    }

    fn descendants_and_self(&self, id: &str) -> Vec<String> {
        let mut out = vec![id.to_string()];
        let mut i = 0;
        while i < out.len() {
            let current = out[i].clone();
            out.extend(
                self.groups
                    .iter()
                    .filter(|g| g.parent.as_deref() == Some(current.as_str()))
                    .map(|g| g.id.clone()),
            );
            i += 1;
        }
        out
    }

    fn insert_group(&mut self, parent: Option<&str>, name: &str) -> String {
        if let Some(existing) = self.child_named(parent, name) {
            return existing.id.clone();
        }
        let id = self.allocate_id("g");
        self.groups.push(StoredGroup {
            id: id.clone(),
            name: name.to_string(),
            parent: parent.map(str::to_string),
        });
        id
    }
}

fn not_found(context: String) -> SyncError {
    SyncError::remote(context, 404, "Could not find group by id")
}

pub struct MockIdentityStore {
    realm: RwLock<Realm>,
    token_requests: AtomicUsize,
    mutations: AtomicUsize,
}

impl MockIdentityStore {
    pub fn new() -> Self {
        Self {
            realm: RwLock::new(Realm::default()),
            token_requests: AtomicUsize::new(0),
            mutations: AtomicUsize::new(0),
        }
    }

    // ------------------------------------------------------------------
    // Seeding and inspection helpers
    // ------------------------------------------------------------------

    /// Create every group along `path` (e.g. `/Eng/Platform`), returning the leaf id.
    pub async fn seed_group(&self, path: &str) -> String {
        let mut realm = self.realm.write().await;
        let mut parent: Option<String> = None;
        for name in path.split('/').filter(|s| !s.is_empty()) {
            parent = Some(realm.insert_group(parent.as_deref(), name));
        }
        parent.unwrap_or_default()
    }

    pub async fn seed_user(&self, username: &str, mut user: UserRecord) -> String {
        let mut realm = self.realm.write().await;
        let id = realm.allocate_id("u");
        user.id = id.clone();
        user.username = username.to_string();
        realm.users.push(user);
        id
    }

    pub async fn group_id(&self, path: &str) -> Option<String> {
        let realm = self.realm.read().await;
        realm
            .groups
            .iter()
            .find(|g| realm.path_of(&g.id) == path)
            .map(|g| g.id.clone())
    }

    pub async fn group_count(&self) -> usize {
        self.realm.read().await.groups.len()
    }

    pub async fn user(&self, username: &str) -> Option<UserRecord> {
        self.realm
            .read()
            .await
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
    }

    /// Paths of the groups the user is a member of
    pub async fn membership_paths(&self, username: &str) -> Vec<String> {
        let realm = self.realm.read().await;
        let Some(user) = realm.users.iter().find(|u| u.username == username) else {
            return Vec::new();
        };
        realm
            .memberships
            .get(&user.id)
            .map(|ids| ids.iter().map(|id| realm.path_of(id)).collect())
            .unwrap_or_default()
    }

    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    /// Number of mutating calls received (creates, updates, moves, deletes)
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn count_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityStore for MockIdentityStore {
    async fn access_token(&self) -> Result<Token> {
        self.token_requests.fetch_add(1, Ordering::SeqCst);
        Ok(Token::new("mock-keycloak-token"))
    }

    async fn list_groups(&self, _token: &Token) -> Result<Vec<GroupNode>> {
        Ok(self.realm.read().await.forest())
    }

    async fn create_group(&self, _token: &Token, name: &str) -> Result<()> {
        self.count_mutation();
        self.realm.write().await.insert_group(None, name);
        Ok(())
    }

    async fn create_child_group(&self, _token: &Token, parent_id: &str, name: &str) -> Result<()> {
        self.count_mutation();
        let mut realm = self.realm.write().await;
        if realm.group(parent_id).is_none() {
            return Err(not_found(format!("create sub group {name} under {parent_id}")));
        }
        realm.insert_group(Some(parent_id), name);
        Ok(())
    }

    async fn update_group(&self, _token: &Token, group: &GroupNode) -> Result<()> {
        self.count_mutation();
        let mut realm = self.realm.write().await;
        match realm.groups.iter_mut().find(|g| g.id == group.id) {
            Some(stored) => {
                stored.name = group.name.clone();
                Ok(())
            }
            None => Err(not_found(format!("update group {}", group.id))),
        }
    }

    async fn move_group_to_top_level(&self, _token: &Token, group_id: &str) -> Result<()> {
        self.count_mutation();
        let mut realm = self.realm.write().await;
        match realm.groups.iter_mut().find(|g| g.id == group_id) {
            Some(stored) => {
                stored.parent = None;
                Ok(())
            }
            None => Err(not_found(format!("move group {group_id} to top level"))),
        }
    }

    async fn move_group_under(
        &self,
        _token: &Token,
        parent_id: &str,
        group_id: &str,
    ) -> Result<()> {
        self.count_mutation();
        let mut realm = self.realm.write().await;
        if realm.group(parent_id).is_none() {
            return Err(not_found(format!("move group {group_id} under {parent_id}")));
        }
        match realm.groups.iter_mut().find(|g| g.id == group_id) {
            Some(stored) => {
                stored.parent = Some(parent_id.to_string());
                Ok(())
            }
            None => Err(not_found(format!("move group {group_id} under {parent_id}"))),
        }
    }

    async fn delete_group(&self, _token: &Token, group_id: &str) -> Result<()> {
        self.count_mutation();
        let mut realm = self.realm.write().await;
        if realm.group(group_id).is_none() {
            return Err(not_found(format!("delete group {group_id}")));
        }
        let doomed = realm.descendants_and_self(group_id);
        realm.groups.retain(|g| !doomed.contains(&g.id));
        for ids in realm.memberships.values_mut() {
            ids.retain(|id| !doomed.contains(id));
        }
        Ok(())
    }

    async fn list_users(&self, _token: &Token) -> Result<Vec<UserRecord>> {
        Ok(self.realm.read().await.users.clone())
    }

    async fn create_user(&self, _token: &Token, user: &UserRecord) -> Result<()> {
        self.count_mutation();
        let mut realm = self.realm.write().await;
        if realm.users.iter().any(|u| u.username == user.username) {
            return Err(SyncError::remote(
                format!("create user {}", user.username),
                409,
                "User exists with same username",
            ));
        }
        let mut stored = user.clone();
        stored.id = realm.allocate_id("u");
        realm.users.push(stored);
        Ok(())
    }

    async fn update_user(&self, _token: &Token, user_id: &str, user: &UserRecord) -> Result<()> {
        self.count_mutation();
        let mut realm = self.realm.write().await;
        match realm.users.iter_mut().find(|u| u.id == user_id) {
            Some(stored) => {
                let username = std::mem::take(&mut stored.username);
                *stored = user.clone();
                stored.id = user_id.to_string();
                if stored.username.is_empty() {
                    stored.username = username;
                }
                Ok(())
            }
            None => Err(SyncError::remote(
                format!("update user {user_id}"),
                404,
                "User not found",
            )),
        }
    }

    async fn delete_user(&self, _token: &Token, user_id: &str) -> Result<()> {
        self.count_mutation();
        let mut realm = self.realm.write().await;
        realm.users.retain(|u| u.id != user_id);
        realm.memberships.remove(user_id);
        Ok(())
    }

    async fn user_groups(&self, _token: &Token, user_id: &str) -> Result<Vec<GroupNode>> {
        let realm = self.realm.read().await;
        Ok(realm
            .memberships
            .get(user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| realm.group(id))
                    .map(|g| GroupNode {
                        id: g.id.clone(),
                        name: g.name.clone(),
                        path: realm.path_of(&g.id),
                        ..GroupNode::default()
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_user_to_group(
        &self,
        _token: &Token,
        user_id: &str,
        group_id: &str,
    ) -> Result<()> {
        self.count_mutation();
        let mut realm = self.realm.write().await;
        if realm.group(group_id).is_none() {
            return Err(not_found(format!("assign group {group_id} to user {user_id}")));
        }
        let ids = realm.memberships.entry(user_id.to_string()).or_default();
        if !ids.iter().any(|id| id == group_id) {
            ids.push(group_id.to_string());
        }
        Ok(())
    }

    async fn remove_user_from_group(
        &self,
        _token: &Token,
        user_id: &str,
        group_id: &str,
    ) -> Result<()> {
        self.count_mutation();
        if let Some(ids) = self.realm.write().await.memberships.get_mut(user_id) {
            ids.retain(|id| id != group_id);
        }
        Ok(())
    }
}
