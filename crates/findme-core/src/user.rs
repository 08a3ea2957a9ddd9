//! Accounts and role assignment

use crate::{Principal, Role, UserSeed};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account; each account holds exactly one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub is_active: bool,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub roles: Vec<RoleInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn from_seed(seed: &UserSeed, now: DateTime<Utc>) -> Self {
        Self {
            id: seed.id,
            email: seed.email.clone(),
            is_active: seed.is_active,
            first_name: seed.first_name.clone(),
            last_name: seed.last_name.clone(),
            roles: vec![RoleInfo::from(seed.role)],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.id,
            roles: self.roles.iter().map(|r| r.name).collect(),
        }
    }

    /// Full name when known, otherwise the email address
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if full.trim().is_empty() {
            self.email.clone()
        } else {
            full.trim().to_string()
        }
    }

    /// Replace the role assignment
    pub fn set_role(&mut self, role: Role, now: DateTime<Utc>) {
        self.roles = vec![RoleInfo::from(role)];
        self.updated_at = now;
    }
}

/// A role as listed by the admin API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInfo {
    pub id: i64,
    pub name: Role,
}

impl From<Role> for RoleInfo {
    fn from(role: Role) -> Self {
        Self {
            id: role.id(),
            name: role,
        }
    }
}

/// Admin changes to an account; `None` fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminUserUpdate {
    pub is_active: Option<bool>,
    /// `true` assigns the admin role, `false` the user role
    pub is_admin: Option<bool>,
}

impl AdminUserUpdate {
    pub fn apply(self, user: &mut User, now: DateTime<Utc>) {
        if let Some(active) = self.is_active {
            user.is_active = active;
            user.updated_at = now;
        }
        if let Some(admin) = self.is_admin {
            user.set_role(if admin { Role::Admin } else { Role::User }, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(first: Option<&str>, last: Option<&str>) -> UserSeed {
        UserSeed {
            id: 3,
            email: "nomsa@findme.example".to_string(),
            first_name: first.map(str::to_string),
            last_name: last.map(str::to_string),
            role: Role::User,
            is_active: true,
        }
    }

    #[test]
    fn test_display_name() {
        let now = Utc::now();
        assert_eq!(
            User::from_seed(&seed(Some("Nomsa"), Some("Khumalo")), now).display_name(),
            "Nomsa Khumalo"
        );
        assert_eq!(
            User::from_seed(&seed(None, Some("Khumalo")), now).display_name(),
            "Khumalo"
        );
        assert_eq!(
            User::from_seed(&seed(None, None), now).display_name(),
            "nomsa@findme.example"
        );
    }

    #[test]
    fn test_admin_update_replaces_role() {
        let now = Utc::now();
        let mut user = User::from_seed(&seed(None, None), now);
        assert!(!user.principal().is_admin());

        AdminUserUpdate {
            is_admin: Some(true),
            ..Default::default()
        }
        .apply(&mut user, now);
        assert_eq!(user.roles, vec![RoleInfo::from(Role::Admin)]);
        assert!(user.principal().is_admin());

        AdminUserUpdate {
            is_active: Some(false),
            is_admin: Some(false),
        }
        .apply(&mut user, now);
        assert!(!user.is_active);
        assert_eq!(user.principal().roles, vec![Role::User]);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("owner".parse::<Role>().is_err());
    }
}
