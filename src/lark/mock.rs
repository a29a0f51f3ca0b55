//! In-memory mock implementation of SourceDirectory for tests.

use super::models::DepartmentDetail;
use super::traits::SourceDirectory;
use crate::error::{Result, SyncError};
use crate::token::Token;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Department hierarchy held in a map keyed by open department id.
pub struct MockSourceDirectory {
    departments: RwLock<HashMap<String, DepartmentDetail>>,
    lookups: AtomicUsize,
}

impl MockSourceDirectory {
    pub fn new() -> Self {
        Self {
            departments: RwLock::new(HashMap::new()),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Builder-style seeding used by test fixtures
    pub fn with_department(mut self, id: &str, parent_id: &str, name: &str) -> Self {
        self.departments
            .get_mut()
            .insert(id.to_string(), detail(id, parent_id, name));
        self
    }

    /// Change a department in place, as Lark would before emitting an update event
    pub async fn put_department(&self, id: &str, parent_id: &str, name: &str) {
        self.departments
            .write()
            .await
            .insert(id.to_string(), detail(id, parent_id, name));
    }

    /// Number of department detail calls served
    pub async fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

fn detail(id: &str, parent_id: &str, name: &str) -> DepartmentDetail {
    DepartmentDetail {
        open_department_id: id.to_string(),
        department_id: id.to_string(),
        name: name.to_string(),
        parent_department_id: parent_id.to_string(),
    }
}

#[async_trait]
impl SourceDirectory for MockSourceDirectory {
    async fn app_access_token(&self) -> Result<Token> {
        Ok(Token::new("mock-lark-token"))
    }

    async fn get_department(
        &self,
        _token: &Token,
        department_id: &str,
    ) -> Result<DepartmentDetail> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.departments
            .read()
            .await
            .get(department_id)
            .cloned()
            .ok_or_else(|| SyncError::lookup(format!("lark department {department_id} not found")))
    }
}
