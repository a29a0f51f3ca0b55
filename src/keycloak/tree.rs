//! Path lookups in the Keycloak group forest
//!
//! The forest is fetched fresh on every lookup and searched depth-first in
//! pre-order with an explicit stack, so deep hierarchies never grow the call
//! stack. Paths are unique within the forest, so the first hit is the only hit.

use super::models::GroupNode;
use super::traits::IdentityStore;
use crate::error::{Result, SyncError};
use crate::token::Token;

/// Find the node whose `path` equals `path` exactly.
pub fn find_node_by_path<'a>(roots: &'a [GroupNode], path: &str) -> Option<&'a GroupNode> {
    let mut stack: Vec<&GroupNode> = roots.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if node.path == path {
            return Some(node);
        }
        stack.extend(node.sub_groups.iter().rev());
    }
    None
}

pub fn find_id_by_path(roots: &[GroupNode], path: &str) -> Option<String> {
    find_node_by_path(roots, path).map(|node| node.id.clone())
}

/// Fetch the forest and locate `path`. `Ok(None)` means "no such group",
/// distinct from a failed listing.
pub async fn locate_group(
    store: &dyn IdentityStore,
    token: &Token,
    path: &str,
) -> Result<Option<GroupNode>> {
    let forest = store.list_groups(token).await?;
    let found = find_node_by_path(&forest, path).cloned();
    tracing::debug!(path = %path, found = found.is_some(), "Located group by path");
    Ok(found)
}

/// Like [`locate_group`] but a missing group is a `SyncError::Lookup`.
pub async fn locate_group_id(store: &dyn IdentityStore, token: &Token, path: &str) -> Result<String> {
    locate_group(store, token, path)
        .await?
        .map(|node| node.id)
        .ok_or_else(|| SyncError::lookup(format!("cannot find group {path} in keycloak")))
}
