use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::PermissionName;

/// Payload carried by a session token. Role and permission names are a
/// snapshot taken at issue time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub organization_id: Option<Uuid>,
    pub iss: String,
    pub iat: usize, // issued at (unix timestamp)
    pub exp: usize, // expires at (unix timestamp)
}

impl SessionClaims {
    pub fn has_permission(&self, name: PermissionName) -> bool {
        self.permissions.iter().any(|p| p == name.as_str())
    }
}
