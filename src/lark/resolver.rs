//! Full-path resolution of Lark departments
//!
//! Lark only gives a department's direct parent. Keycloak addresses groups by
//! their full `/`-joined path, so every department id is turned into a path by
//! walking parents up to the root sentinel.

use super::models::ROOT_DEPARTMENT_ID;
use super::traits::SourceDirectory;
use crate::error::{Result, SyncError};

/// Resolve `department_id` into its full path, e.g. `/Eng/Platform/Core`.
///
/// The root department resolves to the empty path. A failed department fetch
/// is a `SyncError::Lookup`; a failed token request stays `SyncError::Auth`.
/// The hierarchy is trusted to be acyclic; there is no cycle detection.
pub async fn resolve_full_path(
    source: &dyn SourceDirectory,
    department_id: &str,
) -> Result<String> {
    if department_id == ROOT_DEPARTMENT_ID {
        return Ok(String::new());
    }

    let token = source.app_access_token().await?;
    let mut segments: Vec<String> = Vec::new();
    let mut current = department_id.to_string();

    loop {
        // Any failed fetch means the path cannot be resolved; the cause stays in the message
        let detail = source
            .get_department(&token, &current)
            .await
            .map_err(|e| match e {
                SyncError::Lookup(_) | SyncError::Auth(_) => e,
                other => SyncError::lookup(format!(
                    "cannot resolve lark department {current}: {other}"
                )),
            })?;
        tracing::debug!(
            department_id = %current,
            name = %detail.name,
            parent = %detail.parent_department_id,
            "Resolved department"
        );
        segments.push(detail.name);
        if detail.parent_department_id == ROOT_DEPARTMENT_ID {
            break;
        }
        current = detail.parent_department_id;
    }

    Ok(segments
        .iter()
        .rev()
        .fold(String::new(), |path, name| path + "/" + name))
}
