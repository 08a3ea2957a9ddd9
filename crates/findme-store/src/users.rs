//! Account repository

use async_trait::async_trait;
use chrono::Utc;
use findme_core::{AdminUserUpdate, FindmeError, FindmeResult, Role, User, UserSeed};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::submissions::Page;

/// Storage seam for accounts
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: i64) -> FindmeResult<Option<User>>;

    /// List accounts in id order
    async fn list(&self, page: Page) -> FindmeResult<Vec<User>>;

    /// Apply an admin update to activation status and role
    async fn update(&self, id: i64, update: AdminUserUpdate) -> FindmeResult<User>;

    /// Replace an account's role
    async fn set_role(&self, id: i64, role: Role) -> FindmeResult<User>;
}

/// In-process account store
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<BTreeMap<i64, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the configured accounts
    pub fn from_seeds(seeds: &[UserSeed]) -> Self {
        let now = Utc::now();
        let users: BTreeMap<i64, User> = seeds
            .iter()
            .map(|seed| (seed.id, User::from_seed(seed, now)))
            .collect();
        info!(count = users.len(), "Loaded user accounts");
        Self {
            users: RwLock::new(users),
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, id: i64) -> FindmeResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn list(&self, page: Page) -> FindmeResult<Vec<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect())
    }

    async fn update(&self, id: i64, update: AdminUserUpdate) -> FindmeResult<User> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(FindmeError::UserNotFound(id))?;
        update.apply(user, Utc::now());
        debug!(user_id = id, is_active = user.is_active, "Updated user");
        Ok(user.clone())
    }

    async fn set_role(&self, id: i64, role: Role) -> FindmeResult<User> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(FindmeError::UserNotFound(id))?;
        user.set_role(role, Utc::now());
        debug!(user_id = id, role = %role, "Assigned role");
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds() -> Vec<UserSeed> {
        (1..=3)
            .map(|id| UserSeed {
                id,
                email: format!("u{}@findme.example", id),
                first_name: None,
                last_name: None,
                role: if id == 1 { Role::Admin } else { Role::User },
                is_active: true,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_list_in_id_order() {
        let store = MemoryUserStore::from_seeds(&seeds());
        let ids: Vec<i64> = store
            .list(Page::default())
            .await
            .unwrap()
            .iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let second = store.list(Page::new(Some(2), Some(2))).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, 3);
    }

    #[tokio::test]
    async fn test_role_changes() {
        let store = MemoryUserStore::from_seeds(&seeds());

        let promoted = store.set_role(2, Role::Admin).await.unwrap();
        assert!(promoted.principal().is_admin());
        assert_eq!(promoted.roles.len(), 1);

        let demoted = store
            .update(
                1,
                AdminUserUpdate {
                    is_admin: Some(false),
                    is_active: Some(false),
                },
            )
            .await
            .unwrap();
        assert!(!demoted.principal().is_admin());
        assert!(!store.get(1).await.unwrap().unwrap().is_active);

        assert!(matches!(
            store.set_role(99, Role::User).await,
            Err(FindmeError::UserNotFound(99))
        ));
    }
}
