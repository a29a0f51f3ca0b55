//! Sync engines: translate Lark change events into Keycloak mutations

pub mod department;
pub mod user;

pub use department::DepartmentSync;
pub use user::{parse_name, UserSync};

use crate::error::Result;
use crate::lark::ChangeEvent;
use async_trait::async_trait;

/// Applies one change event to the target store.
#[async_trait]
pub trait ChangeHandler<T>: Send + Sync {
    async fn handle(&self, event: &ChangeEvent<T>) -> Result<()>;
}
