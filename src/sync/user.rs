//! User events → Keycloak users and group memberships
//!
//! A Keycloak user is keyed by the Lark email, which doubles as username.
//! Updates are evaluated as an ordered list of rules; a rule may end the
//! evaluation for the event.

use super::ChangeHandler;
use crate::error::{Result, SyncError};
use crate::keycloak::models::{ATTRIBUTE_NICKNAME, ATTRIBUTE_PHONE_NUMBER, ATTRIBUTE_REAL_NAME};
use crate::keycloak::{locate_group_id, IdentityStore, UserRecord};
use crate::lark::models::event_types;
use crate::lark::{resolve_full_path, ChangeEvent, SourceDirectory, UserSnapshot};
use crate::token::Token;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Update rules in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRule {
    /// First activation of an account: nothing to mirror
    Activation,
    /// Email (the identity) changed: recreate the user
    EmailChange,
    /// Make sure the user exists and sits in exactly its department's group
    DepartmentChange,
    /// Merge mobile, name and status into the existing user
    FieldUpdate,
}

pub const UPDATE_RULES: [UpdateRule; 4] = [
    UpdateRule::Activation,
    UpdateRule::EmailChange,
    UpdateRule::DepartmentChange,
    UpdateRule::FieldUpdate,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

impl UpdateRule {
    pub fn applies(self, user: &UserSnapshot, old: &UserSnapshot) -> bool {
        match self {
            Self::Activation => {
                old.status.is_some_and(|before| !before.is_activated)
                    && user.status.is_some_and(|after| after.is_activated)
            }
            Self::EmailChange => !old.email.is_empty(),
            // Evaluated on every update so a missing user gets created and
            // memberships converge.
            Self::DepartmentChange => true,
            Self::FieldUpdate => true,
        }
    }
}

pub struct UserSync {
    source: Arc<dyn SourceDirectory>,
    target: Arc<dyn IdentityStore>,
}

impl UserSync {
    pub fn new(source: Arc<dyn SourceDirectory>, target: Arc<dyn IdentityStore>) -> Self {
        Self { source, target }
    }

    pub async fn handle(&self, event: &ChangeEvent<UserSnapshot>) -> Result<()> {
        let user = &event.object;
        match event.event_type.as_str() {
            event_types::USER_CREATED => {
                // A freshly created Lark user is inactive; it is mirrored on
                // the update that activates or assigns it.
                debug!(email = %user.email, "Ignoring user creation");
                Ok(())
            }
            event_types::USER_DELETED => {
                let token = self.target.access_token().await?;
                self.delete(&token, user).await
            }
            event_types::USER_UPDATED => {
                let token = self.target.access_token().await?;
                self.update(&token, user, &event.old_object).await
            }
            other => Err(SyncError::UnsupportedEvent(other.to_string())),
        }
    }

    /// Delete the user keyed by `user.email`. An unknown user is success.
    pub async fn delete(&self, token: &Token, user: &UserSnapshot) -> Result<()> {
        match self.target.find_user(token, &user.email).await? {
            Some(existing) => {
                self.target.delete_user(token, &existing.id).await?;
                info!(email = %user.email, "Deleted user");
            }
            None => info!(email = %user.email, "User already absent, nothing to delete"),
        }
        Ok(())
    }

    pub async fn update(
        &self,
        token: &Token,
        user: &UserSnapshot,
        old: &UserSnapshot,
    ) -> Result<()> {
        for rule in UPDATE_RULES {
            if !rule.applies(user, old) {
                continue;
            }
            debug!(email = %user.email, rule = ?rule, "Applying update rule");
            let flow = match rule {
                UpdateRule::Activation => {
                    info!(email = %user.email, "User activated, nothing to mirror");
                    Flow::Stop
                }
                UpdateRule::EmailChange => self.rekey(token, user, old).await?,
                UpdateRule::DepartmentChange => self.ensure_membership(token, user).await?,
                UpdateRule::FieldUpdate => self.apply_fields(token, user, old).await?,
            };
            if flow == Flow::Stop {
                break;
            }
        }
        Ok(())
    }

    /// Replace the user stored under the old email with one built from the
    /// current snapshot.
    async fn rekey(&self, token: &Token, user: &UserSnapshot, old: &UserSnapshot) -> Result<Flow> {
        let previous = self
            .target
            .find_user(token, &old.email)
            .await?
            .ok_or_else(|| SyncError::lookup(format!("cannot find user {} in keycloak", old.email)))?;
        self.target.delete_user(token, &previous.id).await?;
        self.target.create_user(token, &build_create(user)).await?;

        let created = self.find_existing(token, &user.email).await?;
        self.assign_single_group(token, &created.id, user).await?;
        info!(from = %old.email, to = %user.email, "Recreated user under new email");
        Ok(Flow::Stop)
    }

    async fn ensure_membership(&self, token: &Token, user: &UserSnapshot) -> Result<Flow> {
        if user.email.is_empty() {
            return Err(SyncError::Validation(format!(
                "user {} has no email; assign an email before assigning a department",
                user.name
            )));
        }

        let existing = match self.target.find_user(token, &user.email).await? {
            Some(existing) => existing,
            None => {
                self.target.create_user(token, &build_create(user)).await?;
                info!(email = %user.email, "Created user");
                self.find_existing(token, &user.email).await?
            }
        };
        self.assign_single_group(token, &existing.id, user).await?;
        Ok(Flow::Continue)
    }

    async fn apply_fields(
        &self,
        token: &Token,
        user: &UserSnapshot,
        old: &UserSnapshot,
    ) -> Result<Flow> {
        // Attributes are replaced wholesale on PUT, so start from a fresh read.
        let existing = self.find_existing(token, &user.email).await?;
        let merged = merge_update(&existing, user, old);
        if merged.enabled != existing.enabled {
            info!(email = %user.email, enabled = ?merged.enabled, "Changing user status");
        }
        self.target.update_user(token, &existing.id, &merged).await?;
        debug!(email = %user.email, "Updated user fields");
        Ok(Flow::Continue)
    }

    /// Make the group of the user's primary department its only membership.
    /// A user in the root department ends up with no group at all.
    pub async fn assign_single_group(
        &self,
        token: &Token,
        user_id: &str,
        user: &UserSnapshot,
    ) -> Result<()> {
        // Resolve before touching memberships so a failed lookup leaves them intact.
        let path = resolve_full_path(self.source.as_ref(), user.primary_department()).await?;
        let group_id = if path.is_empty() {
            None
        } else {
            Some(locate_group_id(self.target.as_ref(), token, &path).await?)
        };

        for group in self.target.user_groups(token, user_id).await? {
            self.target
                .remove_user_from_group(token, user_id, &group.id)
                .await?;
        }

        match group_id {
            Some(group_id) => {
                self.target
                    .add_user_to_group(token, user_id, &group_id)
                    .await?;
                info!(email = %user.email, group = %path, "Assigned user to group");
            }
            None => warn!(email = %user.email, "User belongs to the root department, removed all groups"),
        }
        Ok(())
    }

    async fn find_existing(&self, token: &Token, username: &str) -> Result<UserRecord> {
        self.target
            .find_user(token, username)
            .await?
            .ok_or_else(|| SyncError::lookup(format!("cannot find user {username} in keycloak")))
    }
}

#[async_trait]
impl ChangeHandler<UserSnapshot> for UserSync {
    async fn handle(&self, event: &ChangeEvent<UserSnapshot>) -> Result<()> {
        UserSync::handle(self, event).await
    }
}

/// Keycloak record for a user seen for the first time.
pub fn build_create(user: &UserSnapshot) -> UserRecord {
    let (real_name, nickname) = parse_name(&user.name);
    let mut record = UserRecord {
        username: user.email.clone(),
        email: user.email.clone(),
        first_name: real_name.clone(),
        last_name: real_name.clone(),
        enabled: Some(true),
        ..UserRecord::default()
    };
    record
        .attributes
        .insert(ATTRIBUTE_PHONE_NUMBER.to_string(), Value::String(user.mobile.clone()));
    record
        .attributes
        .insert(ATTRIBUTE_REAL_NAME.to_string(), Value::String(real_name));
    record
        .attributes
        .insert(ATTRIBUTE_NICKNAME.to_string(), Value::String(nickname));
    record
}

/// Merge the changed fields of `user` into `existing`.
///
/// Attributes not derived from Lark fields are carried over untouched.
pub fn merge_update(existing: &UserRecord, user: &UserSnapshot, old: &UserSnapshot) -> UserRecord {
    let mut record = existing.clone();

    if !old.mobile.is_empty() || !user.mobile.is_empty() {
        record
            .attributes
            .insert(ATTRIBUTE_PHONE_NUMBER.to_string(), Value::String(user.mobile.clone()));
    }

    if !old.name.is_empty() || !user.name.is_empty() {
        let (real_name, nickname) = parse_name(&user.name);
        record.first_name = real_name.clone();
        record.last_name = real_name.clone();
        record
            .attributes
            .insert(ATTRIBUTE_REAL_NAME.to_string(), Value::String(real_name));
        record
            .attributes
            .insert(ATTRIBUTE_NICKNAME.to_string(), Value::String(nickname));
    }

    if old.status.is_some() {
        let frozen = user.status.map(|s| s.is_frozen).unwrap_or(false);
        record.enabled = Some(!frozen);
    }

    record
}

/// Split a display name of the form `Nick(Real Name)` into `(real, nick)`.
///
/// Both ASCII and fullwidth parentheses are accepted. Without an opening
/// parenthesis the whole (trimmed) name is the real name and the nickname is
/// empty.
pub fn parse_name(name: &str) -> (String, String) {
    let Some(open) = name.find(['(', '（']) else {
        return (name.trim().to_string(), String::new());
    };
    let nickname = name[..open].trim();
    let rest = &name[open..];
    let rest = rest
        .strip_prefix('(')
        .or_else(|| rest.strip_prefix('（'))
        .unwrap_or(rest);
    let real_name = match rest.find([')', '）']) {
        Some(close) => &rest[..close],
        None => rest,
    };
    (real_name.trim().to_string(), nickname.to_string())
}
