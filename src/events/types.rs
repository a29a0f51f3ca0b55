//! Decoded change events as they travel from the transports to the dispatcher

use crate::lark::{ChangeEvent, DepartmentSnapshot, UserSnapshot};

pub type UserEvent = ChangeEvent<UserSnapshot>;
pub type DepartmentEvent = ChangeEvent<DepartmentSnapshot>;

/// A classified event, ready to be queued.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncMessage {
    User(UserEvent),
    Department(DepartmentEvent),
}

impl SyncMessage {
    pub fn event_type(&self) -> &str {
        match self {
            Self::User(event) => &event.event_type,
            Self::Department(event) => &event.event_type,
        }
    }

    pub fn event_id(&self) -> &str {
        match self {
            Self::User(event) => &event.event_id,
            Self::Department(event) => &event.event_id,
        }
    }
}

