//! Bounded queues between the transports and the dispatcher

use super::types::{DepartmentEvent, SyncMessage, UserEvent};
use crate::error::{Result, SyncError};
use tokio::sync::mpsc;
use tracing::debug;

/// Capacity of each event queue
pub const EVENT_QUEUE_CAPACITY: usize = 10;

/// Sending half, cloned into every transport.
///
/// Pushing waits while a queue is full, so a slow target store slows
/// ingestion down instead of dropping events.
#[derive(Debug, Clone)]
pub struct EventQueues {
    users: mpsc::Sender<UserEvent>,
    departments: mpsc::Sender<DepartmentEvent>,
}

/// Receiving half, owned by the dispatcher.
#[derive(Debug)]
pub struct EventReceivers {
    pub users: mpsc::Receiver<UserEvent>,
    pub departments: mpsc::Receiver<DepartmentEvent>,
}

impl EventQueues {
    pub fn new(capacity: usize) -> (Self, EventReceivers) {
        let (users_tx, users_rx) = mpsc::channel(capacity);
        let (departments_tx, departments_rx) = mpsc::channel(capacity);
        (
            Self {
                users: users_tx,
                departments: departments_tx,
            },
            EventReceivers {
                users: users_rx,
                departments: departments_rx,
            },
        )
    }

    pub async fn push_user(&self, event: UserEvent) -> Result<()> {
        debug!(event_id = %event.event_id, event_type = %event.event_type, "Queueing user event");
        self.users
            .send(event)
            .await
            .map_err(|_| SyncError::Transport("user event queue closed".into()))
    }

    pub async fn push_department(&self, event: DepartmentEvent) -> Result<()> {
        debug!(event_id = %event.event_id, event_type = %event.event_type, "Queueing department event");
        self.departments
            .send(event)
            .await
            .map_err(|_| SyncError::Transport("department event queue closed".into()))
    }

    pub async fn push(&self, message: SyncMessage) -> Result<()> {
        match message {
            SyncMessage::User(event) => self.push_user(event).await,
            SyncMessage::Department(event) => self.push_department(event).await,
        }
    }
}
