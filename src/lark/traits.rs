//! Trait abstraction over the Lark contact API

use super::models::DepartmentDetail;
use crate::error::Result;
use crate::token::Token;
use async_trait::async_trait;

/// Read access to the source directory.
///
/// Implemented by `LarkClient` over HTTPS and by an in-memory mock in tests.
#[async_trait]
pub trait SourceDirectory: Send + Sync {
    /// Fetch a fresh app access token
    async fn app_access_token(&self) -> Result<Token>;

    /// Fetch a department's detail by its open department id
    async fn get_department(&self, token: &Token, department_id: &str)
        -> Result<DepartmentDetail>;
}
