//! `AuthManager`: user/token/org/team lifecycle plus permission resolution,
//! grounded on spec.md §4.3. Style grounded on the teacher's
//! `cc::permissions` module (one enum per axis, small `#[inline]`
//! predicate methods rather than a dynamic policy engine).

use crate::password::{hash_password, verify_password};
use crate::token::{expiry_from_now, generate_token};
use chrono::Utc;
use kernel_core::{KernelError, OrgId, OrgRole, Permission, Result, SystemRole, UserId};
use kernel_storage::{OrgMemberRow, OrgRow, Store, TeamRow, TokenRow, UserRow};

/// An authenticated user, stripped of its password hash.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub role: SystemRole,
}

impl User {
    fn from_row(row: UserRow) -> Result<Self> {
        let id = UserId::parse_str(&row.id)
            .map_err(|e| KernelError::Internal(format!("corrupt user id: {e}")))?;
        let role = match row.role.as_str() {
            "admin" => SystemRole::Admin,
            _ => SystemRole::User,
        };
        Ok(Self {
            id,
            username: row.username,
            display_name: row.display_name,
            role,
        })
    }
}

pub struct AuthManager {
    store: Store,
}

impl AuthManager {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        display_name: &str,
        role: SystemRole,
    ) -> Result<User> {
        if username.trim().is_empty() {
            return Err(KernelError::invalid_argument("username must not be empty"));
        }
        if password.is_empty() {
            return Err(KernelError::invalid_argument("password must not be empty"));
        }
        let id = UserId::new_v4();
        let password_hash = hash_password(password)?;
        let row = UserRow {
            id: id.to_string(),
            username: username.to_string(),
            password_hash,
            display_name: display_name.to_string(),
            role: role_to_str(role).to_string(),
            created_at: Utc::now(),
        };
        self.store.auth.insert_user(&row).await?;
        Ok(User {
            id,
            username: username.to_string(),
            display_name: display_name.to_string(),
            role,
        })
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(String, User)> {
        let row = self
            .store
            .auth
            .get_user_by_username(username)
            .await?
            .ok_or_else(|| KernelError::unauthorized("invalid username or password"))?;
        if !verify_password(password, &row.password_hash)? {
            return Err(KernelError::unauthorized("invalid username or password"));
        }
        let token = generate_token();
        self.store
            .auth
            .insert_token(&TokenRow {
                token: token.clone(),
                user_id: row.id.clone(),
                expires_at: expiry_from_now(),
            })
            .await?;
        let user = User::from_row(row)?;
        Ok((token, user))
    }

    pub async fn validate_token(&self, token: &str) -> Result<Option<User>> {
        let Some(token_row) = self.store.auth.get_token(token).await? else {
            return Ok(None);
        };
        if token_row.expires_at < Utc::now() {
            return Ok(None);
        }
        let Some(user_row) = self.store.auth.get_user_by_id(&token_row.user_id).await? else {
            return Ok(None);
        };
        Ok(Some(User::from_row(user_row)?))
    }

    pub async fn create_org(&self, owner: &User, name: &str, display_name: &str) -> Result<OrgId> {
        if name.trim().is_empty() {
            return Err(KernelError::invalid_argument("org name must not be empty"));
        }
        let id = OrgId::new_v4();
        let org = OrgRow {
            id: id.to_string(),
            name: name.to_string(),
            display_name: display_name.to_string(),
            owner_uid: owner.id.to_string(),
            created_at: Utc::now(),
        };
        let member = OrgMemberRow {
            org_id: id.to_string(),
            user_id: owner.id.to_string(),
            role: "owner".to_string(),
        };
        self.store.auth.insert_org(&org, &member).await?;
        Ok(id)
    }

    pub async fn delete_org(&self, org_id: OrgId) -> Result<()> {
        self.store.auth.delete_org(&org_id.to_string()).await
    }

    pub async fn add_member(&self, org_id: OrgId, user_id: UserId, role: OrgRole) -> Result<()> {
        self.store
            .auth
            .insert_member(&OrgMemberRow {
                org_id: org_id.to_string(),
                user_id: user_id.to_string(),
                role: org_role_to_str(role).to_string(),
            })
            .await
    }

    pub async fn remove_member(&self, org_id: OrgId, user_id: UserId) -> Result<()> {
        self.store
            .auth
            .remove_member(&org_id.to_string(), &user_id.to_string())
            .await
    }

    pub async fn create_team(&self, org_id: OrgId, name: &str) -> Result<TeamRow> {
        let row = TeamRow {
            id: uuid::Uuid::new_v4().to_string(),
            org_id: org_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.store.auth.insert_team(&row).await?;
        Ok(row)
    }

    /// Resolves a permission per spec.md §4.3: system `admin` bypasses
    /// everything; otherwise an `orgId` is resolved against the caller's
    /// `OrgMember.role`; with no `orgId` and zero orgs system-wide the
    /// check is permissive (any authenticated user passes).
    pub async fn has_permission(
        &self,
        user: &User,
        permission: Permission,
        org_id: Option<OrgId>,
    ) -> Result<bool> {
        if user.role == SystemRole::Admin {
            return Ok(true);
        }
        match org_id {
            Some(org_id) => {
                let member = self
                    .store
                    .auth
                    .get_member(&org_id.to_string(), &user.id.to_string())
                    .await?;
                match member {
                    Some(member) => {
                        let role = parse_org_role(&member.role)?;
                        Ok(role.allows(permission))
                    }
                    None => Ok(false),
                }
            }
            None => {
                let count = self.store.auth.org_count().await?;
                Ok(count == 0)
            }
        }
    }
}

fn role_to_str(role: SystemRole) -> &'static str {
    match role {
        SystemRole::Admin => "admin",
        SystemRole::User => "user",
    }
}

fn org_role_to_str(role: OrgRole) -> &'static str {
    match role {
        OrgRole::Owner => "owner",
        OrgRole::Admin => "admin",
        OrgRole::Manager => "manager",
        OrgRole::Member => "member",
        OrgRole::Viewer => "viewer",
    }
}

fn parse_org_role(s: &str) -> Result<OrgRole> {
    match s {
        "owner" => Ok(OrgRole::Owner),
        "admin" => Ok(OrgRole::Admin),
        "manager" => Ok(OrgRole::Manager),
        "member" => Ok(OrgRole::Member),
        "viewer" => Ok(OrgRole::Viewer),
        other => Err(KernelError::Internal(format!("unknown org role in storage: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_storage::StateStore;

    async fn store() -> Store {
        Store::new(StateStore::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn create_and_login() {
        let mgr = AuthManager::new(store().await);
        let user = mgr
            .create_user("alice", "hunter2", "Alice", SystemRole::User)
            .await
            .unwrap();
        let (token, logged_in) = mgr.login("alice", "hunter2").await.unwrap();
        assert_eq!(logged_in.id, user.id);
        let validated = mgr.validate_token(&token).await.unwrap().unwrap();
        assert_eq!(validated.id, user.id);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let mgr = AuthManager::new(store().await);
        mgr.create_user("bob", "correct", "Bob", SystemRole::User)
            .await
            .unwrap();
        let err = mgr.login("bob", "wrong").await.unwrap_err();
        assert_eq!(err.wire_code(), "unauthorized");
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let mgr = AuthManager::new(store().await);
        mgr.create_user("carol", "pw", "Carol", SystemRole::User)
            .await
            .unwrap();
        let err = mgr
            .create_user("carol", "pw2", "Carol2", SystemRole::User)
            .await
            .unwrap_err();
        assert_eq!(err.wire_code(), "conflict");
    }

    #[tokio::test]
    async fn admin_bypasses_all_checks() {
        let mgr = AuthManager::new(store().await);
        let admin = mgr
            .create_user("root", "pw", "Root", SystemRole::Admin)
            .await
            .unwrap();
        assert!(mgr
            .has_permission(&admin, Permission::OrgDelete, Some(OrgId::new_v4()))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn permissive_when_no_orgs_exist() {
        let mgr = AuthManager::new(store().await);
        let user = mgr
            .create_user("dave", "pw", "Dave", SystemRole::User)
            .await
            .unwrap();
        assert!(mgr
            .has_permission(&user, Permission::FsWrite, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn viewer_cannot_write_fs_but_can_view_org() {
        let mgr = AuthManager::new(store().await);
        let owner = mgr
            .create_user("owner", "pw", "Owner", SystemRole::User)
            .await
            .unwrap();
        let org_id = mgr.create_org(&owner, "acme", "Acme").await.unwrap();
        let viewer = mgr
            .create_user("viewer", "pw", "Viewer", SystemRole::User)
            .await
            .unwrap();
        mgr.add_member(org_id, viewer.id, OrgRole::Viewer)
            .await
            .unwrap();
        assert!(!mgr
            .has_permission(&viewer, Permission::FsWrite, Some(org_id))
            .await
            .unwrap());
        assert!(mgr
            .has_permission(&viewer, Permission::OrgView, Some(org_id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn non_member_is_denied() {
        let mgr = AuthManager::new(store().await);
        let owner = mgr
            .create_user("owner2", "pw", "Owner2", SystemRole::User)
            .await
            .unwrap();
        let org_id = mgr.create_org(&owner, "other-org", "Other").await.unwrap();
        let stranger = mgr
            .create_user("stranger", "pw", "Stranger", SystemRole::User)
            .await
            .unwrap();
        assert!(!mgr
            .has_permission(&stranger, Permission::OrgView, Some(org_id))
            .await
            .unwrap());
    }
}
