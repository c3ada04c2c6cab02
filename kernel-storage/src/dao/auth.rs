//! DAOs for users, tokens, orgs, teams, and memberships.

use crate::models::{OrgMemberRow, OrgRow, TeamRow, TokenRow, UserRow};
use crate::store::StateStore;
use chrono::{DateTime, Utc};
use kernel_core::KernelError;

#[derive(Clone)]
pub struct AuthDao {
    store: StateStore,
}

impl AuthDao {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub async fn insert_user(&self, row: &UserRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query(
            "INSERT INTO users (id, username, password_hash, display_name, role, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.username)
        .bind(&row.password_hash)
        .bind(&row.display_name)
        .bind(&row.role)
        .bind(row.created_at)
        .execute(&self.store.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                KernelError::conflict(format!("username {} already exists", row.username))
            }
            other => KernelError::Internal(other.to_string()),
        })?;
        Ok(())
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, KernelError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>, KernelError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }

    pub async fn delete_user(&self, id: &str) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        let mut tx = self.store.pool.begin().await.map_err(|e| KernelError::Internal(e.to_string()))?;
        sqlx::query("DELETE FROM tokens WHERE user_id = ?").bind(id).execute(&mut *tx).await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        sqlx::query("DELETE FROM org_members WHERE user_id = ?").bind(id).execute(&mut *tx).await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        sqlx::query("DELETE FROM team_members WHERE user_id = ?").bind(id).execute(&mut *tx).await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        sqlx::query("DELETE FROM users WHERE id = ?").bind(id).execute(&mut *tx).await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        tx.commit().await.map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn insert_token(&self, row: &TokenRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("INSERT INTO tokens (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&row.token)
            .bind(&row.user_id)
            .bind(row.expires_at)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    /// Invalidates every token issued to `user_id`; called when a user is removed.
    pub async fn delete_tokens_for_user(&self, user_id: &str) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("DELETE FROM tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn get_token(&self, token: &str) -> Result<Option<TokenRow>, KernelError> {
        sqlx::query_as::<_, TokenRow>("SELECT * FROM tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }

    pub async fn org_count(&self) -> Result<i64, KernelError> {
        let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM orgs")
            .fetch_one(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(count)
    }

    pub async fn insert_org(&self, row: &OrgRow, owner_member: &OrgMemberRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        let mut tx = self.store.pool.begin().await.map_err(|e| KernelError::Internal(e.to_string()))?;
        sqlx::query(
            "INSERT INTO orgs (id, name, display_name, owner_uid, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.name)
        .bind(&row.display_name)
        .bind(&row.owner_uid)
        .bind(row.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                KernelError::conflict(format!("org {} already exists", row.name))
            }
            other => KernelError::Internal(other.to_string()),
        })?;
        sqlx::query("INSERT INTO org_members (org_id, user_id, role) VALUES (?, ?, ?)")
            .bind(&owner_member.org_id)
            .bind(&owner_member.user_id)
            .bind(&owner_member.role)
            .execute(&mut *tx)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        tx.commit().await.map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn get_org(&self, id: &str) -> Result<Option<OrgRow>, KernelError> {
        sqlx::query_as::<_, OrgRow>("SELECT * FROM orgs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }

    /// Removes an org and cascades to members, teams, and team memberships
    /// in a single transaction (spec.md §3 invariant 5, §4.3).
    pub async fn delete_org(&self, id: &str) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        let mut tx = self.store.pool.begin().await.map_err(|e| KernelError::Internal(e.to_string()))?;
        sqlx::query(
            "DELETE FROM team_members WHERE team_id IN (SELECT id FROM teams WHERE org_id = ?)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        sqlx::query("DELETE FROM teams WHERE org_id = ?").bind(id).execute(&mut *tx).await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        sqlx::query("DELETE FROM org_members WHERE org_id = ?").bind(id).execute(&mut *tx).await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        sqlx::query("DELETE FROM orgs WHERE id = ?").bind(id).execute(&mut *tx).await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        tx.commit().await.map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    /// Fails if this would demote the org's existing owner (spec.md §3
    /// invariant 4: "owner cannot be removed nor demoted").
    pub async fn insert_member(&self, row: &OrgMemberRow) -> Result<(), KernelError> {
        if let Some(existing) = self.get_member(&row.org_id, &row.user_id).await? {
            if existing.role == "owner" && row.role != "owner" {
                return Err(KernelError::invalid_argument("cannot demote the org owner"));
            }
        }
        let _g = self.store.begin_write();
        sqlx::query(
            "INSERT INTO org_members (org_id, user_id, role) VALUES (?, ?, ?) \
             ON CONFLICT (org_id, user_id) DO UPDATE SET role = excluded.role",
        )
        .bind(&row.org_id)
        .bind(&row.user_id)
        .bind(&row.role)
        .execute(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn get_member(&self, org_id: &str, user_id: &str) -> Result<Option<OrgMemberRow>, KernelError> {
        sqlx::query_as::<_, OrgMemberRow>(
            "SELECT * FROM org_members WHERE org_id = ? AND user_id = ?",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))
    }

    pub async fn list_members(&self, org_id: &str) -> Result<Vec<OrgMemberRow>, KernelError> {
        sqlx::query_as::<_, OrgMemberRow>("SELECT * FROM org_members WHERE org_id = ?")
            .bind(org_id)
            .fetch_all(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }

    /// Fails if `user_id` is the org's owner (spec.md §3 invariant 4).
    pub async fn remove_member(&self, org_id: &str, user_id: &str) -> Result<(), KernelError> {
        let member = self.get_member(org_id, user_id).await?
            .ok_or_else(|| KernelError::not_found("org member"))?;
        if member.role == "owner" {
            return Err(KernelError::invalid_argument("cannot remove the org owner"));
        }
        let _g = self.store.begin_write();
        sqlx::query("DELETE FROM org_members WHERE org_id = ? AND user_id = ?")
            .bind(org_id)
            .bind(user_id)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn insert_team(&self, row: &TeamRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("INSERT INTO teams (id, org_id, name, created_at) VALUES (?, ?, ?, ?)")
            .bind(&row.id)
            .bind(&row.org_id)
            .bind(&row.name)
            .bind(row.created_at)
            .execute(&self.store.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    KernelError::conflict(format!("team {} already exists in org", row.name))
                }
                other => KernelError::Internal(other.to_string()),
            })?;
        Ok(())
    }

    pub async fn list_teams(&self, org_id: &str) -> Result<Vec<TeamRow>, KernelError> {
        sqlx::query_as::<_, TeamRow>("SELECT * FROM teams WHERE org_id = ?")
            .bind(org_id)
            .fetch_all(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }

    pub async fn add_team_member(&self, team_id: &str, user_id: &str) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query(
            "INSERT INTO team_members (team_id, user_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(team_id)
        .bind(user_id)
        .execute(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub fn now() -> DateTime<Utc> {
        Utc::now()
    }
}
