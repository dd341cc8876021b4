use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{rbac::ResolvedAccess, repo_types::User};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub organization_id: Option<Uuid>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: Uuid,
}

/// Returned by login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// Returned by email verification, which also logs the user in.
#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub message: String,
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Public view of a user. Holds no secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email_verified: bool,
    pub is_active: bool,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub organization_id: Option<Uuid>,
}

impl UserProfile {
    pub fn build(user: &User, access: &ResolvedAccess) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone: user.phone.clone(),
            email_verified: user.email_verified,
            is_active: user.is_active,
            roles: access.roles.clone(),
            permissions: access.permissions.iter().cloned().collect(),
            organization_id: user.organization_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_serializes_expected_shape() {
        let profile = UserProfile {
            id: Uuid::new_v4(),
            email: "test@example.com".into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            phone: String::new(),
            email_verified: true,
            is_active: true,
            roles: vec!["customer".into()],
            permissions: vec!["vehicles.read".into()],
            organization_id: None,
        };
        let json = serde_json::to_value(&profile).unwrap();
        for key in [
            "id",
            "email",
            "first_name",
            "last_name",
            "phone",
            "email_verified",
            "is_active",
            "roles",
            "permissions",
            "organization_id",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json.as_object().unwrap().len(), 10);
        assert!(json["organization_id"].is_null());
    }

    #[test]
    fn register_request_optional_fields() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"email":"a@b.io","password":"x","first_name":"A","last_name":"B"}"#,
        )
        .unwrap();
        assert!(req.phone.is_none());
        assert!(req.organization_id.is_none());
    }
}
