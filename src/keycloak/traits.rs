//! Trait abstraction over the Keycloak admin API

use super::models::{GroupNode, UserRecord};
use crate::error::Result;
use crate::token::Token;
use async_trait::async_trait;

/// Every target-side call the sync engines make.
///
/// Idempotency exceptions (409 on group create, 404 on user and membership
/// delete) are absorbed by implementations and reported as success.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fetch a fresh admin access token
    async fn access_token(&self) -> Result<Token>;

    // ========================================================================
    // Groups
    // ========================================================================

    /// Full group forest
    async fn list_groups(&self, token: &Token) -> Result<Vec<GroupNode>>;

    /// Create a top-level group
    async fn create_group(&self, token: &Token, name: &str) -> Result<()>;

    /// Create a group under `parent_id`
    async fn create_child_group(&self, token: &Token, parent_id: &str, name: &str) -> Result<()>;

    /// Replace a group's representation (used for renames)
    async fn update_group(&self, token: &Token, group: &GroupNode) -> Result<()>;

    /// Promote an existing group to the top level
    async fn move_group_to_top_level(&self, token: &Token, group_id: &str) -> Result<()>;

    /// Reparent an existing group under `parent_id`
    async fn move_group_under(&self, token: &Token, parent_id: &str, group_id: &str)
        -> Result<()>;

    async fn delete_group(&self, token: &Token, group_id: &str) -> Result<()>;

    // ========================================================================
    // Users
    // ========================================================================

    async fn list_users(&self, token: &Token) -> Result<Vec<UserRecord>>;

    async fn create_user(&self, token: &Token, user: &UserRecord) -> Result<()>;

    async fn update_user(&self, token: &Token, user_id: &str, user: &UserRecord) -> Result<()>;

    async fn delete_user(&self, token: &Token, user_id: &str) -> Result<()>;

    // ========================================================================
    // Memberships
    // ========================================================================

    async fn user_groups(&self, token: &Token, user_id: &str) -> Result<Vec<GroupNode>>;

    async fn add_user_to_group(&self, token: &Token, user_id: &str, group_id: &str)
        -> Result<()>;

    async fn remove_user_from_group(
        &self,
        token: &Token,
        user_id: &str,
        group_id: &str,
    ) -> Result<()>;

    /// Look a user up by username (the email). `None` when absent.
    async fn find_user(&self, token: &Token, username: &str) -> Result<Option<UserRecord>> {
        let users = self.list_users(token).await?;
        Ok(users
            .into_iter()
            .find(|u| u.username.eq_ignore_ascii_case(username)))
    }
}
