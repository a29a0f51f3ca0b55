//! Department events → Keycloak group mutations
//!
//! Groups are addressed by full path. The old path of a renamed or moved
//! department is reconstructed from the event's `old_object` because Lark has
//! already applied the change by the time the event arrives.

use super::ChangeHandler;
use crate::error::{Result, SyncError};
use crate::keycloak::{locate_group, locate_group_id, IdentityStore};
use crate::lark::models::event_types;
use crate::lark::{resolve_full_path, ChangeEvent, DepartmentSnapshot, SourceDirectory};
use crate::token::Token;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub struct DepartmentSync {
    source: Arc<dyn SourceDirectory>,
    target: Arc<dyn IdentityStore>,
}

impl DepartmentSync {
    pub fn new(source: Arc<dyn SourceDirectory>, target: Arc<dyn IdentityStore>) -> Self {
        Self { source, target }
    }

    /// Route one department event to create / update / delete.
    pub async fn handle(&self, event: &ChangeEvent<DepartmentSnapshot>) -> Result<()> {
        let department = &event.object;
        match event.event_type.as_str() {
            event_types::DEPARTMENT_CREATED => {
                let token = self.target.access_token().await?;
                self.create(&token, department).await
            }
            event_types::DEPARTMENT_UPDATED => {
                let token = self.target.access_token().await?;
                self.update(&token, department, &event.old_object).await
            }
            event_types::DEPARTMENT_DELETED => {
                let token = self.target.access_token().await?;
                self.delete(&token, department).await
            }
            other => Err(SyncError::UnsupportedEvent(other.to_string())),
        }
    }

    /// Create the group for `department`, top-level or under its parent's group.
    pub async fn create(&self, token: &Token, department: &DepartmentSnapshot) -> Result<()> {
        if department.is_top_level() {
            self.target.create_group(token, &department.name).await?;
            info!(name = %department.name, "Created top-level group");
            return Ok(());
        }

        let parent_path = resolve_full_path(self.source.as_ref(), &department.parent_id).await?;
        let parent_id = locate_group_id(self.target.as_ref(), token, &parent_path).await?;
        self.target
            .create_child_group(token, &parent_id, &department.name)
            .await?;
        info!(name = %department.name, parent = %parent_path, "Created sub group");
        Ok(())
    }

    /// A non-empty old name means rename; a non-empty old parent means move.
    /// Both may apply to the same event, rename first.
    async fn update(
        &self,
        token: &Token,
        department: &DepartmentSnapshot,
        old: &DepartmentSnapshot,
    ) -> Result<()> {
        if !old.name.is_empty() {
            self.rename(token, department, &old.name).await?;
        }
        if !old.parent_id.is_empty() {
            self.reparent(token, department, &old.parent_id).await?;
        }
        if old.name.is_empty() && old.parent_id.is_empty() {
            debug!(department = %department.id, "Department update touches nothing mirrored in keycloak");
        }
        Ok(())
    }

    /// Rename the group currently at the department's pre-rename path.
    pub async fn rename(
        &self,
        token: &Token,
        department: &DepartmentSnapshot,
        old_name: &str,
    ) -> Result<()> {
        let new_path = resolve_full_path(self.source.as_ref(), &department.id).await?;
        let old_path = pre_rename_path(&new_path, &department.name, old_name);

        let mut group = locate_group(self.target.as_ref(), token, &old_path)
            .await?
            .ok_or_else(|| SyncError::lookup(format!("cannot find group {old_path} in keycloak")))?;
        group.name = department.name.clone();
        // The PUT is a full replace; children are not part of it.
        group.sub_groups.clear();
        self.target.update_group(token, &group).await?;

        info!(from = %old_path, to = %new_path, "Renamed group");
        Ok(())
    }

    /// Move the group from under the old parent to under the new one (or to top level).
    pub async fn reparent(
        &self,
        token: &Token,
        department: &DepartmentSnapshot,
        old_parent_id: &str,
    ) -> Result<()> {
        let old_parent_path = resolve_full_path(self.source.as_ref(), old_parent_id).await?;
        let old_path = format!("{old_parent_path}/{}", department.name);
        let group_id = locate_group_id(self.target.as_ref(), token, &old_path).await?;

        if department.is_top_level() {
            self.target.move_group_to_top_level(token, &group_id).await?;
            info!(group = %old_path, "Moved group to top level");
            return Ok(());
        }

        let parent_path = resolve_full_path(self.source.as_ref(), &department.parent_id).await?;
        let parent_id = locate_group_id(self.target.as_ref(), token, &parent_path).await?;
        self.target
            .move_group_under(token, &parent_id, &group_id)
            .await?;
        info!(group = %old_path, parent = %parent_path, "Moved group");
        Ok(())
    }

    /// Delete the department's group. A group that is already gone is success.
    pub async fn delete(&self, token: &Token, department: &DepartmentSnapshot) -> Result<()> {
        let path = resolve_full_path(self.source.as_ref(), &department.id).await?;
        let Some(group) = locate_group(self.target.as_ref(), token, &path).await? else {
            info!(path = %path, "Group already absent, nothing to delete");
            return Ok(());
        };
        self.target.delete_group(token, &group.id).await?;
        info!(path = %path, "Deleted group");
        Ok(())
    }
}

#[async_trait]
impl ChangeHandler<DepartmentSnapshot> for DepartmentSync {
    async fn handle(&self, event: &ChangeEvent<DepartmentSnapshot>) -> Result<()> {
        DepartmentSync::handle(self, event).await
    }
}

/// Path the group had before a rename: the new path with its last segment
/// (the new name) swapped for `old_name`.
pub fn pre_rename_path(new_path: &str, new_name: &str, old_name: &str) -> String {
    // Names may themselves contain '/', so strip the known name first.
    let parent = new_path
        .strip_suffix(new_name)
        .and_then(|rest| rest.strip_suffix('/'))
        .unwrap_or_else(|| new_path.rfind('/').map_or("", |i| &new_path[..i]));
    format!("{parent}/{old_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycloak::mock::MockIdentityStore;
    use crate::lark::mock::MockSourceDirectory;

    struct Fixture {
        source: Arc<MockSourceDirectory>,
        target: Arc<MockIdentityStore>,
        sync: DepartmentSync,
    }

    fn fixture(source: MockSourceDirectory) -> Fixture {
        let source = Arc::new(source);
        let target = Arc::new(MockIdentityStore::new());
        let sync = DepartmentSync::new(source.clone(), target.clone());
        Fixture {
            source,
            target,
            sync,
        }
    }

    fn org() -> MockSourceDirectory {
        MockSourceDirectory::new()
            .with_department("od-eng", "0", "Eng")
            .with_department("od-plat", "od-eng", "Platform")
            .with_department("od-ops", "0", "Ops")
    }

    fn dept(id: &str, parent_id: &str, name: &str) -> DepartmentSnapshot {
        DepartmentSnapshot {
            id: id.to_string(),
            parent_id: parent_id.to_string(),
            name: name.to_string(),
            order: 0,
        }
    }

    fn event(
        event_type: &str,
        object: DepartmentSnapshot,
        old_object: DepartmentSnapshot,
    ) -> ChangeEvent<DepartmentSnapshot> {
        ChangeEvent {
            event_id: "ev-1".to_string(),
            event_type: event_type.to_string(),
            object,
            old_object,
        }
    }

    #[test]
    fn test_pre_rename_path() {
        assert_eq!(pre_rename_path("/P/B", "B", "A"), "/P/A");
        assert_eq!(pre_rename_path("/B", "B", "A"), "/A");
        assert_eq!(pre_rename_path("/P/R&D/QA", "R&D/QA", "QA"), "/P/QA");
        // Path resolved from a name that no longer matches: fall back to the last segment
        assert_eq!(pre_rename_path("/P/C", "B", "A"), "/P/A");
    }

    #[tokio::test]
    async fn test_create_top_level_is_idempotent() {
        let f = fixture(org());
        let created = event(
            event_types::DEPARTMENT_CREATED,
            dept("od-eng", "0", "Eng"),
            DepartmentSnapshot::default(),
        );

        f.sync.handle(&created).await.unwrap();
        f.sync.handle(&created).await.unwrap();

        assert_eq!(f.target.group_count().await, 1);
        assert!(f.target.group_id("/Eng").await.is_some());
    }

    #[tokio::test]
    async fn test_create_nested_under_parent_path() {
        let f = fixture(org().with_department("od-core", "od-plat", "Core"));
        f.target.seed_group("/Eng/Platform").await;

        let created = event(
            event_types::DEPARTMENT_CREATED,
            dept("od-core", "od-plat", "Core"),
            DepartmentSnapshot::default(),
        );
        f.sync.handle(&created).await.unwrap();

        assert!(f.target.group_id("/Eng/Platform/Core").await.is_some());
    }

    #[tokio::test]
    async fn test_create_under_missing_parent_group_fails() {
        let f = fixture(org());
        let created = event(
            event_types::DEPARTMENT_CREATED,
            dept("od-plat", "od-eng", "Platform"),
            DepartmentSnapshot::default(),
        );
        let err = f.sync.handle(&created).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(f.target.group_count().await, 0);
    }

    #[tokio::test]
    async fn test_rename_keeps_group_id() {
        let f = fixture(org());
        f.target.seed_group("/Eng/Platform").await;
        let original_id = f.target.group_id("/Eng/Platform").await.unwrap();

        // Lark already holds the new name when the event arrives
        f.source.put_department("od-plat", "od-eng", "Infra").await;
        let renamed = event(
            event_types::DEPARTMENT_UPDATED,
            dept("od-plat", "od-eng", "Infra"),
            DepartmentSnapshot {
                name: "Platform".to_string(),
                ..DepartmentSnapshot::default()
            },
        );
        f.sync.handle(&renamed).await.unwrap();

        assert!(f.target.group_id("/Eng/Platform").await.is_none());
        assert_eq!(f.target.group_id("/Eng/Infra").await, Some(original_id));
    }

    #[tokio::test]
    async fn test_rename_of_unknown_group_is_lookup_error() {
        let f = fixture(org());
        let renamed = event(
            event_types::DEPARTMENT_UPDATED,
            dept("od-ops", "0", "Operations"),
            DepartmentSnapshot {
                name: "Ops".to_string(),
                ..DepartmentSnapshot::default()
            },
        );
        f.source.put_department("od-ops", "0", "Operations").await;
        assert!(f.sync.handle(&renamed).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_move_keeps_id_and_name() {
        let f = fixture(org());
        f.target.seed_group("/Eng/Platform").await;
        f.target.seed_group("/Ops").await;
        let original_id = f.target.group_id("/Eng/Platform").await.unwrap();

        f.source.put_department("od-plat", "od-ops", "Platform").await;
        let moved = event(
            event_types::DEPARTMENT_UPDATED,
            dept("od-plat", "od-ops", "Platform"),
            DepartmentSnapshot {
                parent_id: "od-eng".to_string(),
                ..DepartmentSnapshot::default()
            },
        );
        f.sync.handle(&moved).await.unwrap();

        assert!(f.target.group_id("/Eng/Platform").await.is_none());
        assert_eq!(f.target.group_id("/Ops/Platform").await, Some(original_id));
    }

    #[tokio::test]
    async fn test_move_to_top_level() {
        let f = fixture(org());
        f.target.seed_group("/Eng/Platform").await;

        f.source.put_department("od-plat", "0", "Platform").await;
        let moved = event(
            event_types::DEPARTMENT_UPDATED,
            dept("od-plat", "0", "Platform"),
            DepartmentSnapshot {
                parent_id: "od-eng".to_string(),
                ..DepartmentSnapshot::default()
            },
        );
        f.sync.handle(&moved).await.unwrap();

        assert!(f.target.group_id("/Platform").await.is_some());
        assert!(f.target.group_id("/Eng").await.is_some());
    }

    #[tokio::test]
    async fn test_rename_then_move_in_one_event() {
        let f = fixture(org());
        f.target.seed_group("/Eng/Platform").await;
        f.target.seed_group("/Ops").await;

        f.source.put_department("od-plat", "od-ops", "Infra").await;
        let changed = event(
            event_types::DEPARTMENT_UPDATED,
            dept("od-plat", "od-ops", "Infra"),
            DepartmentSnapshot {
                name: "Platform".to_string(),
                parent_id: "od-eng".to_string(),
                ..DepartmentSnapshot::default()
            },
        );
        // Rename resolves the new path under the new parent; the group still
        // lives under the old one, so the rename cannot find it.
        let err = f.sync.handle(&changed).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(f.target.group_id("/Eng/Platform").await.is_some());
    }

    #[tokio::test]
    async fn test_update_without_mirrored_changes_is_noop() {
        let f = fixture(org());
        f.target.seed_group("/Ops").await;
        let reordered = event(
            event_types::DEPARTMENT_UPDATED,
            dept("od-ops", "0", "Ops"),
            DepartmentSnapshot {
                order: 7,
                ..DepartmentSnapshot::default()
            },
        );
        f.sync.handle(&reordered).await.unwrap();
        assert_eq!(f.target.mutations(), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_group_is_success() {
        let f = fixture(org());
        let deleted = event(
            event_types::DEPARTMENT_DELETED,
            dept("od-ops", "0", "Ops"),
            DepartmentSnapshot::default(),
        );
        f.sync.handle(&deleted).await.unwrap();
        assert_eq!(f.target.mutations(), 0);
    }

    #[tokio::test]
    async fn test_delete_removes_group() {
        let f = fixture(org());
        f.target.seed_group("/Eng/Platform").await;
        let deleted = event(
            event_types::DEPARTMENT_DELETED,
            dept("od-plat", "od-eng", "Platform"),
            DepartmentSnapshot::default(),
        );
        f.sync.handle(&deleted).await.unwrap();
        assert!(f.target.group_id("/Eng/Platform").await.is_none());
        assert!(f.target.group_id("/Eng").await.is_some());
    }

    #[tokio::test]
    async fn test_resolved_path_locates_created_group() {
        let f = fixture(org());
        for (id, parent, name) in [("od-eng", "0", "Eng"), ("od-plat", "od-eng", "Platform")] {
            let created = event(
                event_types::DEPARTMENT_CREATED,
                dept(id, parent, name),
                DepartmentSnapshot::default(),
            );
            f.sync.handle(&created).await.unwrap();
        }

        let path = resolve_full_path(f.source.as_ref(), "od-plat").await.unwrap();
        let token = f.target.access_token().await.unwrap();
        let group = locate_group(f.target.as_ref(), &token, &path)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(group.name, "Platform");
    }

    #[tokio::test]
    async fn test_unknown_subtype_is_rejected() {
        let f = fixture(org());
        let merged = event(
            "contact.department.merged_v3",
            dept("od-ops", "0", "Ops"),
            DepartmentSnapshot::default(),
        );
        let err = f.sync.handle(&merged).await.unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedEvent(_)));
        assert_eq!(f.target.token_requests(), 0);
    }
}
