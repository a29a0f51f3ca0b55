//! Single consumer draining both event queues
//!
//! Events are applied one at a time, so changes never race each other in the
//! target store. A failed event is logged and dropped; the loop only ends
//! once every transport has gone away.

use super::bus::EventReceivers;
use super::types::{DepartmentEvent, UserEvent};
use crate::lark::{DepartmentSnapshot, UserSnapshot};
use crate::sync::ChangeHandler;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct EventDispatcher {
    users: Arc<dyn ChangeHandler<UserSnapshot>>,
    departments: Arc<dyn ChangeHandler<DepartmentSnapshot>>,
}

impl EventDispatcher {
    pub fn new(
        users: Arc<dyn ChangeHandler<UserSnapshot>>,
        departments: Arc<dyn ChangeHandler<DepartmentSnapshot>>,
    ) -> Self {
        Self { users, departments }
    }

    /// Run the dispatch loop on a background task.
    pub fn spawn(self, receivers: EventReceivers) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(receivers).await })
    }

    pub async fn run(&self, mut receivers: EventReceivers) {
        let mut users_open = true;
        let mut departments_open = true;

        while users_open || departments_open {
            tokio::select! {
                event = receivers.users.recv(), if users_open => match event {
                    Some(event) => self.dispatch_user(event).await,
                    None => users_open = false,
                },
                event = receivers.departments.recv(), if departments_open => match event {
                    Some(event) => self.dispatch_department(event).await,
                    None => departments_open = false,
                },
            }
        }
        info!("Event queues closed, dispatcher stopped");
    }

    async fn dispatch_user(&self, event: UserEvent) {
        if event.event_type.is_empty() {
            warn!(event_id = %event.event_id, "Dropping user event without event type");
            return;
        }
        debug!(event_id = %event.event_id, event_type = %event.event_type, "Dispatching user event");
        if let Err(e) = self.users.handle(&event).await {
            error!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                email = %event.object.email,
                "Failed to sync user event: {}",
                e
            );
        }
    }

    async fn dispatch_department(&self, event: DepartmentEvent) {
        if event.event_type.is_empty() {
            warn!(event_id = %event.event_id, "Dropping department event without event type");
            return;
        }
        debug!(event_id = %event.event_id, event_type = %event.event_type, "Dispatching department event");
        if let Err(e) = self.departments.handle(&event).await {
            error!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                department = %event.object.id,
                "Failed to sync department event: {}",
                e
            );
        }
    }
}
