//! Role grants, read from the `rbac` storage namespace.

use std::sync::Arc;

use machina_core::{StorageBackend, StorageResult};

use crate::matcher::RoleRequirement;
use crate::storage::PluginStorage;

/// Storage namespace holding role grants.
pub const RBAC_NAMESPACE: &str = "rbac";

/// Reads and writes role grants.
///
/// A grant is stored under `role:<role>:<user_id>`. The root user holds every
/// role.
#[derive(Debug, Clone)]
pub struct RoleStore {
    storage: PluginStorage,
    root_user: Option<String>,
}

impl RoleStore {
    pub fn new(backend: Arc<dyn StorageBackend>, root_user: Option<String>) -> Self {
        Self {
            storage: PluginStorage::new(RBAC_NAMESPACE, backend),
            root_user,
        }
    }

    fn key(role: &str, user_id: &str) -> String {
        format!("role:{role}:{user_id}")
    }

    pub fn root_user(&self) -> Option<&str> {
        self.root_user.as_deref()
    }

    pub fn is_root(&self, user_id: &str) -> bool {
        self.root_user.as_deref() == Some(user_id)
    }

    pub async fn has_role(&self, user_id: &str, role: &str) -> StorageResult<bool> {
        if self.is_root(user_id) {
            return Ok(true);
        }
        self.storage.has(&Self::key(role, user_id)).await
    }

    pub async fn grant(&self, user_id: &str, role: &str) -> StorageResult<()> {
        self.storage
            .set(&Self::key(role, user_id), b"1".to_vec(), None)
            .await
    }

    pub async fn revoke(&self, user_id: &str, role: &str) -> StorageResult<()> {
        self.storage.delete(&Self::key(role, user_id)).await
    }

    /// Whether the user meets the requirement.
    pub async fn satisfies(&self, user_id: &str, requirement: &RoleRequirement) -> StorageResult<bool> {
        if self.is_root(user_id) {
            return Ok(true);
        }
        match requirement {
            RoleRequirement::Any(roles) => {
                for role in roles {
                    if self.has_role(user_id, role).await? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            RoleRequirement::All(roles) => {
                for role in roles {
                    if !self.has_role(user_id, role).await? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store(root: Option<&str>) -> (RoleStore, Arc<MemoryStorage>) {
        let backend = Arc::new(MemoryStorage::new());
        (
            RoleStore::new(backend.clone(), root.map(str::to_owned)),
            backend,
        )
    }

    #[tokio::test]
    async fn test_grants_use_rbac_keys() {
        let (roles, backend) = store(None);
        roles.grant("U1", "admin").await.unwrap();
        assert!(backend.has("rbac:role:admin:U1").await.unwrap());
        assert!(roles.has_role("U1", "admin").await.unwrap());

        roles.revoke("U1", "admin").await.unwrap();
        assert!(!roles.has_role("U1", "admin").await.unwrap());
    }

    #[tokio::test]
    async fn test_any_and_all_requirements() {
        let (roles, _) = store(None);
        roles.grant("U1", "ops").await.unwrap();

        assert!(
            roles
                .satisfies("U1", &RoleRequirement::any(["admin", "ops"]))
                .await
                .unwrap()
        );
        assert!(
            !roles
                .satisfies("U1", &RoleRequirement::all(["admin", "ops"]))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_root_user_satisfies_everything() {
        let (roles, _) = store(Some("UROOT"));
        assert!(
            roles
                .satisfies("UROOT", &RoleRequirement::all(["admin", "ops"]))
                .await
                .unwrap()
        );
        assert!(!roles.satisfies("U2", &RoleRequirement::any(["admin"])).await.unwrap());
    }
}
