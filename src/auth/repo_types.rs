use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Permission record; `name` is the authorization key, `resource`/`action`
/// are descriptive only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub resource: String,
    pub action: String,
    pub description: String,
}

/// Role with its permissions already loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub permissions: Vec<Permission>,
}

/// User record with roles eagerly loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never exposed
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email_verified: bool,
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub verification_expiry: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_expiry: Option<OffsetDateTime>,
    pub is_active: bool,
    pub last_login_at: Option<OffsetDateTime>,
    pub organization_id: Option<Uuid>,
    pub roles: Vec<Role>,
    pub created_at: OffsetDateTime,
}

/// Flat `users` row; roles are attached afterwards.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub verification_expiry: Option<OffsetDateTime>,
    pub reset_token: Option<String>,
    pub reset_expiry: Option<OffsetDateTime>,
    pub is_active: bool,
    pub last_login_at: Option<OffsetDateTime>,
    pub organization_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

impl UserRow {
    pub(crate) fn with_roles(self, roles: Vec<Role>) -> User {
        User {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            email_verified: self.email_verified,
            verification_token: self.verification_token,
            verification_expiry: self.verification_expiry,
            reset_token: self.reset_token,
            reset_expiry: self.reset_expiry,
            is_active: self.is_active,
            last_login_at: self.last_login_at,
            organization_id: self.organization_id,
            roles,
            created_at: self.created_at,
        }
    }
}

/// Everything needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub verification_expiry: Option<OffsetDateTime>,
    pub organization_id: Option<Uuid>,
    pub role_ids: Vec<Uuid>,
}

/// Seed definition of a permission.
#[derive(Debug, Clone)]
pub struct PermissionSpec {
    pub name: String,
    pub resource: String,
    pub action: String,
    pub description: String,
}

/// Seed definition of a role and the permission names it grants.
#[derive(Debug, Clone)]
pub struct RoleSpec {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub permission_names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.io".into(),
            password_hash: "$argon2id$secret".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            phone: String::new(),
            email_verified: false,
            verification_token: Some("vtok".into()),
            verification_expiry: Some(OffsetDateTime::now_utc()),
            reset_token: Some("rtok".into()),
            reset_expiry: Some(OffsetDateTime::now_utc()),
            is_active: true,
            last_login_at: None,
            organization_id: None,
            roles: vec![],
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("vtok"));
        assert!(!json.contains("rtok"));
        assert!(!json.contains("password_hash"));
    }
}
