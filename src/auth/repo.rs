use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{
    catalog::RoleName,
    repo_types::{NewUser, Permission, PermissionSpec, Role, RoleSpec, User, UserRow},
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistence boundary for users, roles and permissions.
///
/// Every `find_*` returns the user with roles and their permissions loaded.
/// The `consume_*` methods are single conditional updates: they succeed only
/// if the stored token still matches, and report `false` otherwise.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_verification_token(&self, token: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_reset_token(&self, token: &str) -> anyhow::Result<Option<User>>;
    async fn find_role(&self, name: RoleName) -> anyhow::Result<Option<Role>>;

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError>;

    /// Marks the user verified, clears both verification fields and stamps
    /// the last login, provided `token` is still stored and unexpired at `at`.
    async fn consume_verification_token(
        &self,
        user_id: Uuid,
        token: &str,
        at: OffsetDateTime,
    ) -> anyhow::Result<bool>;

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expiry: OffsetDateTime,
    ) -> anyhow::Result<()>;

    /// Replaces the password hash and clears both reset fields, provided
    /// `token` is still stored and unexpired at `at`.
    async fn consume_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        password_hash: &str,
        at: OffsetDateTime,
    ) -> anyhow::Result<bool>;

    async fn touch_last_login(&self, user_id: Uuid, at: OffsetDateTime) -> anyhow::Result<()>;

    async fn ensure_permission(&self, spec: &PermissionSpec) -> anyhow::Result<()>;

    /// Creates the role if missing and grants any listed permissions it lacks.
    async fn ensure_role(&self, spec: &RoleSpec) -> anyhow::Result<()>;
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone, \
     email_verified, verification_token, verification_expiry, reset_token, reset_expiry, \
     is_active, last_login_at, organization_id, created_at";

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    display_name: String,
    description: String,
}

#[derive(Debug, FromRow)]
struct RolePermissionRow {
    role_id: Uuid,
    id: Uuid,
    name: String,
    resource: String,
    action: String,
    description: String,
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgIdentityStore {
    db: PgPool,
}

impl PgIdentityStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one(&self, column: &str, value: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        self.hydrate(row).await
    }

    async fn hydrate(&self, row: Option<UserRow>) -> anyhow::Result<Option<User>> {
        match row {
            Some(row) => {
                let roles = self.roles_for(row.id).await?;
                Ok(Some(row.with_roles(roles)))
            }
            None => Ok(None),
        }
    }

    async fn roles_for(&self, user_id: Uuid) -> anyhow::Result<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT r.id, r.name, r.display_name, r.description
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        self.with_permissions(rows).await
    }

    async fn with_permissions(&self, rows: Vec<RoleRow>) -> anyhow::Result<Vec<Role>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let perms = sqlx::query_as::<_, RolePermissionRow>(
            r#"
            SELECT rp.role_id, p.id, p.name, p.resource, p.action, p.description
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = ANY($1)
            ORDER BY p.name
            "#,
        )
        .bind(&ids[..])
        .fetch_all(&self.db)
        .await?;

        let mut by_role: HashMap<Uuid, Vec<Permission>> = HashMap::new();
        for p in perms {
            by_role.entry(p.role_id).or_default().push(Permission {
                id: p.id,
                name: p.name,
                resource: p.resource,
                action: p.action,
                description: p.description,
            });
        }

        Ok(rows
            .into_iter()
            .map(|r| Role {
                permissions: by_role.remove(&r.id).unwrap_or_default(),
                id: r.id,
                name: r.name,
                display_name: r.display_name,
                description: r.description,
            })
            .collect())
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_one("email", email).await
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        self.hydrate(row).await
    }

    async fn find_by_verification_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        self.find_one("verification_token", token).await
    }

    async fn find_by_reset_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        self.find_one("reset_token", token).await
    }

    async fn find_role(&self, name: RoleName) -> anyhow::Result<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"SELECT id, name, display_name, description FROM roles WHERE name = $1"#,
        )
        .bind(name.as_str())
        .fetch_optional(&self.db)
        .await?;
        match row {
            Some(row) => Ok(self.with_permissions(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut tx = self.db.begin().await.map_err(anyhow::Error::from)?;

        let sql = format!(
            "INSERT INTO users (email, password_hash, first_name, last_name, phone, \
             email_verified, verification_token, verification_expiry, organization_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.phone)
            .bind(new.email_verified)
            .bind(&new.verification_token)
            .bind(new.verification_expiry)
            .bind(new.organization_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db) = &e {
                    if db.is_unique_violation() {
                        return StoreError::DuplicateEmail;
                    }
                }
                StoreError::Other(e.into())
            })?;

        for role_id in &new.role_ids {
            sqlx::query(r#"INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)"#)
                .bind(row.id)
                .bind(role_id)
                .execute(&mut *tx)
                .await
                .map_err(anyhow::Error::from)?;
        }
        tx.commit().await.map_err(anyhow::Error::from)?;

        let roles = self.roles_for(row.id).await?;
        debug!(user_id = %row.id, "user row created");
        Ok(row.with_roles(roles))
    }

    async fn consume_verification_token(
        &self,
        user_id: Uuid,
        token: &str,
        at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE,
                verification_token = NULL,
                verification_expiry = NULL,
                last_login_at = $3,
                updated_at = $3
            WHERE id = $1
              AND verification_token = $2
              AND verification_expiry IS NOT NULL
              AND verification_expiry >= $3
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(at)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expiry: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token = $2, reset_expiry = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expiry)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        password_hash: &str,
        at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $3,
                reset_token = NULL,
                reset_expiry = NULL,
                updated_at = $4
            WHERE id = $1
              AND reset_token = $2
              AND reset_expiry IS NOT NULL
              AND reset_expiry >= $4
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(password_hash)
        .bind(at)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn touch_last_login(&self, user_id: Uuid, at: OffsetDateTime) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE users SET last_login_at = $2, updated_at = $2 WHERE id = $1"#)
            .bind(user_id)
            .bind(at)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn ensure_permission(&self, spec: &PermissionSpec) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO permissions (name, resource, action, description)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&spec.name)
        .bind(&spec.resource)
        .bind(&spec.action)
        .bind(&spec.description)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn ensure_role(&self, spec: &RoleSpec) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO roles (name, display_name, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&spec.name)
        .bind(&spec.display_name)
        .bind(&spec.description)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            SELECT r.id, p.id
            FROM roles r
            JOIN permissions p ON p.name = ANY($2)
            WHERE r.name = $1
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&spec.name)
        .bind(&spec.permission_names[..])
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}
