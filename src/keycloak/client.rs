//! Typed reqwest wrapper for the Keycloak admin REST API

use super::models::{GroupAssignment, GroupNode, TokenResponse, UserRecord};
use super::traits::IdentityStore;
use crate::error::{Result, SyncError};
use crate::token::Token;
use crate::KeycloakConfig;
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde_json::json;

/// Maximum number of users returned by one listing call
const USER_LIST_MAX: &str = "10000";

/// HTTP client for one Keycloak realm.
pub struct KeycloakClient {
    http: reqwest::Client,
    token_url: String,
    admin_url: String,
    realm: String,
    client_id: String,
    client_secret: String,
}

/// Pass 2xx and the listed statuses through, turn the rest into `SyncError::Remote`.
async fn ensure_success(resp: Response, context: &str, accepted: &[StatusCode]) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if accepted.contains(&status) {
        tracing::debug!(status = %status, "{} treated as success", context);
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SyncError::remote(context, status.as_u16(), body))
}

impl KeycloakClient {
    pub fn new(http: reqwest::Client, config: &KeycloakConfig) -> Self {
        let root = format!(
            "{}{}",
            config.host.trim_end_matches('/'),
            config.base_path.trim_end_matches('/')
        );
        Self {
            http,
            token_url: format!(
                "{}/realms/{}/protocol/openid-connect/token",
                root, config.realm
            ),
            admin_url: format!("{}/admin/realms/{}", root, config.realm),
            realm: config.realm.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}{}", self.admin_url, suffix)
    }
}

#[async_trait]
impl IdentityStore for KeycloakClient {
    async fn access_token(&self) -> Result<Token> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Auth(format!("keycloak token request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Auth(format!(
                "keycloak token request failed ({status}): {body}"
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("keycloak token parse failed: {e}")))?;
        if token.access_token.is_empty() {
            return Err(SyncError::Auth("keycloak returned an empty access token".into()));
        }
        Ok(Token::new(token.access_token))
    }

    // ========================================================================
    // Groups
    // ========================================================================

    async fn list_groups(&self, token: &Token) -> Result<Vec<GroupNode>> {
        let resp = self
            .http
            .get(self.url("/groups"))
            .bearer_auth(token.as_str())
            .send()
            .await?;
        let resp = ensure_success(resp, "list groups", &[]).await?;
        Ok(resp.json().await?)
    }

    async fn create_group(&self, token: &Token, name: &str) -> Result<()> {
        tracing::debug!(name = %name, "Creating top-level group");
        let resp = self
            .http
            .post(self.url("/groups"))
            .bearer_auth(token.as_str())
            .json(&json!({ "name": name }))
            .send()
            .await?;
        ensure_success(resp, &format!("create group {name}"), &[StatusCode::CONFLICT]).await?;
        Ok(())
    }

    async fn create_child_group(&self, token: &Token, parent_id: &str, name: &str) -> Result<()> {
        tracing::debug!(name = %name, parent_id = %parent_id, "Creating sub group");
        let resp = self
            .http
            .post(self.url(&format!("/groups/{parent_id}/children")))
            .bearer_auth(token.as_str())
            .json(&json!({ "name": name }))
            .send()
            .await?;
        ensure_success(
            resp,
            &format!("create sub group {name} under {parent_id}"),
            &[StatusCode::CONFLICT],
        )
        .await?;
        Ok(())
    }

    async fn update_group(&self, token: &Token, group: &GroupNode) -> Result<()> {
        let resp = self
            .http
            .put(self.url(&format!("/groups/{}", group.id)))
            .bearer_auth(token.as_str())
            .json(group)
            .send()
            .await?;
        ensure_success(resp, &format!("update group {}", group.id), &[]).await?;
        Ok(())
    }

    async fn move_group_to_top_level(&self, token: &Token, group_id: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.url("/groups"))
            .bearer_auth(token.as_str())
            .json(&json!({ "id": group_id }))
            .send()
            .await?;
        ensure_success(resp, &format!("move group {group_id} to top level"), &[]).await?;
        Ok(())
    }

    async fn move_group_under(
        &self,
        token: &Token,
        parent_id: &str,
        group_id: &str,
    ) -> Result<()> {
        let resp = self
            .http
            .post(self.url(&format!("/groups/{parent_id}/children")))
            .bearer_auth(token.as_str())
            .json(&json!({ "id": group_id }))
            .send()
            .await?;
        ensure_success(
            resp,
            &format!("move group {group_id} under {parent_id}"),
            &[],
        )
        .await?;
        Ok(())
    }

    async fn delete_group(&self, token: &Token, group_id: &str) -> Result<()> {
        tracing::debug!(group_id = %group_id, "Deleting group");
        let resp = self
            .http
            .delete(self.url(&format!("/groups/{group_id}")))
            .bearer_auth(token.as_str())
            .send()
            .await?;
        ensure_success(resp, &format!("delete group {group_id}"), &[]).await?;
        Ok(())
    }

    // ========================================================================
    // Users
    // ========================================================================

    async fn list_users(&self, token: &Token) -> Result<Vec<UserRecord>> {
        let resp = self
            .http
            .get(self.url("/users"))
            .query(&[("max", USER_LIST_MAX)])
            .bearer_auth(token.as_str())
            .send()
            .await?;
        let resp = ensure_success(resp, "list users", &[]).await?;
        Ok(resp.json().await?)
    }

    async fn create_user(&self, token: &Token, user: &UserRecord) -> Result<()> {
        let resp = self
            .http
            .post(self.url("/users"))
            .bearer_auth(token.as_str())
            .json(user)
            .send()
            .await?;
        ensure_success(resp, &format!("create user {}", user.username), &[]).await?;
        Ok(())
    }

    async fn update_user(&self, token: &Token, user_id: &str, user: &UserRecord) -> Result<()> {
        tracing::debug!(user_id = %user_id, body = ?user, "Updating user");
        let resp = self
            .http
            .put(self.url(&format!("/users/{user_id}")))
            .bearer_auth(token.as_str())
            .json(user)
            .send()
            .await?;
        ensure_success(resp, &format!("update user {user_id}"), &[]).await?;
        Ok(())
    }

    async fn delete_user(&self, token: &Token, user_id: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/users/{user_id}")))
            .bearer_auth(token.as_str())
            .send()
            .await?;
        ensure_success(
            resp,
            &format!("delete user {user_id}"),
            &[StatusCode::NOT_FOUND],
        )
        .await?;
        Ok(())
    }

    // ========================================================================
    // Memberships
    // ========================================================================

    async fn user_groups(&self, token: &Token, user_id: &str) -> Result<Vec<GroupNode>> {
        let resp = self
            .http
            .get(self.url(&format!("/users/{user_id}/groups")))
            .bearer_auth(token.as_str())
            .send()
            .await?;
        let resp = ensure_success(resp, &format!("list groups of user {user_id}"), &[]).await?;
        Ok(resp.json().await?)
    }

    async fn add_user_to_group(
        &self,
        token: &Token,
        user_id: &str,
        group_id: &str,
    ) -> Result<()> {
        let resp = self
            .http
            .put(self.url(&format!("/users/{user_id}/groups/{group_id}")))
            .bearer_auth(token.as_str())
            .json(&GroupAssignment {
                group_id,
                realm: &self.realm,
                user_id,
            })
            .send()
            .await?;
        ensure_success(
            resp,
            &format!("assign group {group_id} to user {user_id}"),
            &[],
        )
        .await?;
        Ok(())
    }

    async fn remove_user_from_group(
        &self,
        token: &Token,
        user_id: &str,
        group_id: &str,
    ) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/users/{user_id}/groups/{group_id}")))
            .bearer_auth(token.as_str())
            .send()
            .await?;
        ensure_success(
            resp,
            &format!("remove user {user_id} from group {group_id}"),
            &[StatusCode::NOT_FOUND],
        )
        .await?;
        Ok(())
    }
}
