//! Lark contact event payloads and API response shapes

use serde::{Deserialize, Serialize};

/// Department id Lark uses for "no parent" / the company itself.
pub const ROOT_DEPARTMENT_ID: &str = "0";

pub mod event_types {
    pub const USER_CREATED: &str = "contact.user.created_v3";
    pub const USER_UPDATED: &str = "contact.user.updated_v3";
    pub const USER_DELETED: &str = "contact.user.deleted_v3";
    pub const DEPARTMENT_CREATED: &str = "contact.department.created_v3";
    pub const DEPARTMENT_UPDATED: &str = "contact.department.updated_v3";
    pub const DEPARTMENT_DELETED: &str = "contact.department.deleted_v3";

    /// Prefix shared by all user events
    pub const USER_PREFIX: &str = "contact.user";
    /// Prefix shared by all department events
    pub const DEPARTMENT_PREFIX: &str = "contact.department";
}

// ============================================================================
// Event envelope
// ============================================================================

/// Header of a v2 event envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventHeader {
    pub event_id: String,
    pub event_type: String,
    pub tenant_key: String,
    pub create_time: String,
    pub app_id: String,
    pub token: String,
}

/// The `event` section: current snapshot plus the changed fields before the change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBody<T> {
    #[serde(default)]
    pub object: Option<T>,
    #[serde(default)]
    pub old_object: Option<T>,
}

/// Raw envelope as delivered by the webhook and the socket adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub header: Option<EventHeader>,
    #[serde(default)]
    pub event: Option<EventBody<T>>,
}

/// A decoded change notification.
///
/// `old_object` fields are zero-valued when unchanged; a non-empty field there
/// means "this attribute changed".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeEvent<T> {
    pub event_id: String,
    pub event_type: String,
    pub object: T,
    pub old_object: T,
}

impl<T: Default> From<Envelope<T>> for ChangeEvent<T> {
    fn from(envelope: Envelope<T>) -> Self {
        let header = envelope.header.unwrap_or_default();
        let (object, old_object) = match envelope.event {
            Some(body) => (
                body.object.unwrap_or_default(),
                body.old_object.unwrap_or_default(),
            ),
            None => (T::default(), T::default()),
        };
        Self {
            event_id: header.event_id,
            event_type: header.event_type,
            object,
            old_object,
        }
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Department as carried in department events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepartmentSnapshot {
    #[serde(rename = "open_department_id")]
    pub id: String,
    #[serde(rename = "parent_department_id")]
    pub parent_id: String,
    pub name: String,
    pub order: i64,
}

impl DepartmentSnapshot {
    pub fn is_top_level(&self) -> bool {
        self.parent_id == ROOT_DEPARTMENT_ID
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStatus {
    pub is_activated: bool,
    pub is_frozen: bool,
    pub is_resigned: bool,
}

/// Employee as carried in user events. `email` is the identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSnapshot {
    pub open_id: String,
    pub email: String,
    pub name: String,
    pub mobile: String,
    /// Only the first entry is authoritative
    pub department_ids: Vec<String>,
    pub status: Option<UserStatus>,
}

impl UserSnapshot {
    /// The single department the user belongs to, root when none is listed.
    pub fn primary_department(&self) -> &str {
        self.department_ids
            .first()
            .map(String::as_str)
            .unwrap_or(ROOT_DEPARTMENT_ID)
    }
}

// ============================================================================
// Open API responses
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AppTokenResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub app_access_token: String,
    #[serde(default)]
    pub expire: i64,
}

/// Department detail returned by `GET /contact/v3/departments/{id}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DepartmentDetail {
    pub open_department_id: String,
    pub department_id: String,
    pub name: String,
    pub parent_department_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DepartmentData {
    pub department: Option<DepartmentDetail>,
}

#[derive(Debug, Deserialize)]
pub struct DepartmentResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<DepartmentData>,
}
