//! Keycloak admin API representations

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// User attribute written from the Lark `mobile` field
pub const ATTRIBUTE_PHONE_NUMBER: &str = "phone_number";
/// User attribute holding the parsed real name
pub const ATTRIBUTE_REAL_NAME: &str = "fullname";
/// User attribute holding the parsed nickname
pub const ATTRIBUTE_NICKNAME: &str = "nickname";

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
}

/// A node of the group forest returned by `GET /groups`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupNode {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// `/`-joined chain of ancestor names, e.g. `/Eng/Platform`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_groups: Vec<GroupNode>,
    /// Everything else Keycloak sends back, replayed on full replace
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A user record. `attributes` is replaced wholesale on update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

/// Body of `PUT /users/{id}/groups/{groupId}`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAssignment<'a> {
    pub group_id: &'a str,
    pub realm: &'a str,
    pub user_id: &'a str,
}
