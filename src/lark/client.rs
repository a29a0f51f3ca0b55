//! Typed reqwest wrapper for the Lark open API

use super::models::{AppTokenResponse, DepartmentDetail, DepartmentResponse};
use super::traits::SourceDirectory;
use crate::error::{Result, SyncError};
use crate::token::Token;
use crate::LarkConfig;
use async_trait::async_trait;
use serde_json::json;

/// HTTP client for the Lark contact API.
pub struct LarkClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    app_secret: String,
}

impl LarkClient {
    pub fn new(http: reqwest::Client, config: &LarkConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
        }
    }

    fn token_url(&self) -> String {
        format!("{}/auth/v3/app_access_token/internal/", self.base_url)
    }

    fn department_url(&self, department_id: &str) -> String {
        format!(
            "{}/contact/v3/departments/{}",
            self.base_url,
            urlencoding::encode(department_id)
        )
    }
}

#[async_trait]
impl SourceDirectory for LarkClient {
    async fn app_access_token(&self) -> Result<Token> {
        let resp = self
            .http
            .post(self.token_url())
            .json(&json!({ "app_id": self.app_id, "app_secret": self.app_secret }))
            .send()
            .await
            .map_err(|e| SyncError::Auth(format!("lark token request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Auth(format!(
                "lark token request failed ({status}): {body}"
            )));
        }

        let token: AppTokenResponse = resp
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("lark token parse failed: {e}")))?;
        if token.code != 0 || token.app_access_token.is_empty() {
            return Err(SyncError::Auth(format!(
                "lark refused app token (code {}): {}",
                token.code, token.msg
            )));
        }

        tracing::debug!(expire = token.expire, "Fetched lark app access token");
        Ok(Token::new(token.app_access_token))
    }

    async fn get_department(
        &self,
        token: &Token,
        department_id: &str,
    ) -> Result<DepartmentDetail> {
        let resp = self
            .http
            .get(self.department_url(department_id))
            .bearer_auth(token.as_str())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::remote(
                format!("get lark department {department_id}"),
                status.as_u16(),
                body,
            ));
        }

        let detail: DepartmentResponse = resp.json().await?;
        if detail.code != 0 {
            return Err(SyncError::remote(
                format!("get lark department {department_id}"),
                status.as_u16(),
                format!("code {}: {}", detail.code, detail.msg),
            ));
        }

        detail
            .data
            .and_then(|d| d.department)
            .ok_or_else(|| SyncError::lookup(format!("lark department {department_id} not found")))
    }
}
