use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    catalog::RoleName,
    repo::{IdentityStore, StoreError},
    repo_types::{NewUser, Permission, PermissionSpec, Role, RoleSpec, User, UserRow},
};

#[derive(Debug, Clone)]
struct StoredRole {
    id: Uuid,
    name: String,
    display_name: String,
    description: String,
    permission_ids: Vec<Uuid>,
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, UserRow>,
    user_roles: HashMap<Uuid, Vec<Uuid>>,
    roles: HashMap<Uuid, StoredRole>,
    permissions: HashMap<Uuid, Permission>,
}

impl Tables {
    fn role(&self, stored: &StoredRole) -> Role {
        Role {
            id: stored.id,
            name: stored.name.clone(),
            display_name: stored.display_name.clone(),
            description: stored.description.clone(),
            permissions: stored
                .permission_ids
                .iter()
                .filter_map(|id| self.permissions.get(id).cloned())
                .collect(),
        }
    }

    /// Joins roles at read time so membership changes are seen immediately.
    fn user(&self, row: &UserRow) -> User {
        let roles = self
            .user_roles
            .get(&row.id)
            .into_iter()
            .flatten()
            .filter_map(|rid| self.roles.get(rid))
            .map(|r| self.role(r))
            .collect();
        row.clone().with_roles(roles)
    }

    fn find(&self, pred: impl Fn(&UserRow) -> bool) -> Option<User> {
        self.users.values().find(|u| pred(u)).map(|u| self.user(u))
    }
}

/// Store kept in process memory. Writes serialize on one lock, which makes
/// each conditional update atomic.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    tables: RwLock<Tables>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    #[cfg(test)]
    pub async fn update_user<F>(&self, id: Uuid, f: F) -> bool
    where
        F: FnOnce(&mut UserRow),
    {
        match self.tables.write().await.users.get_mut(&id) {
            Some(row) => {
                f(row);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.tables.read().await.find(|u| u.email == email))
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).map(|u| tables.user(u)))
    }

    async fn find_by_verification_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .tables
            .read()
            .await
            .find(|u| u.verification_token.as_deref() == Some(token)))
    }

    async fn find_by_reset_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .tables
            .read()
            .await
            .find(|u| u.reset_token.as_deref() == Some(token)))
    }

    async fn find_role(&self, name: RoleName) -> anyhow::Result<Option<Role>> {
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .values()
            .find(|r| r.name == name.as_str())
            .map(|r| tables.role(r)))
    }

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let row = UserRow {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            phone: new.phone,
            email_verified: new.email_verified,
            verification_token: new.verification_token,
            verification_expiry: new.verification_expiry,
            reset_token: None,
            reset_expiry: None,
            is_active: true,
            last_login_at: None,
            organization_id: new.organization_id,
            created_at: OffsetDateTime::now_utc(),
        };
        let id = row.id;
        tables.users.insert(id, row);
        tables.user_roles.insert(id, new.role_ids);
        let user = tables.user(&tables.users[&id]);
        Ok(user)
    }

    async fn consume_verification_token(
        &self,
        user_id: Uuid,
        token: &str,
        at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(row) = tables.users.get_mut(&user_id) else {
            return Ok(false);
        };
        let live = row.verification_token.as_deref() == Some(token)
            && row.verification_expiry.is_some_and(|exp| exp >= at);
        if !live {
            return Ok(false);
        }
        row.email_verified = true;
        row.verification_token = None;
        row.verification_expiry = None;
        row.last_login_at = Some(at);
        Ok(true)
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expiry: OffsetDateTime,
    ) -> anyhow::Result<()> {
        if let Some(row) = self.tables.write().await.users.get_mut(&user_id) {
            row.reset_token = Some(token.to_string());
            row.reset_expiry = Some(expiry);
        }
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        password_hash: &str,
        at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(row) = tables.users.get_mut(&user_id) else {
            return Ok(false);
        };
        let live = row.reset_token.as_deref() == Some(token)
            && row.reset_expiry.is_some_and(|exp| exp >= at);
        if !live {
            return Ok(false);
        }
        row.password_hash = password_hash.to_string();
        row.reset_token = None;
        row.reset_expiry = None;
        Ok(true)
    }

    async fn touch_last_login(&self, user_id: Uuid, at: OffsetDateTime) -> anyhow::Result<()> {
        if let Some(row) = self.tables.write().await.users.get_mut(&user_id) {
            row.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn ensure_permission(&self, spec: &PermissionSpec) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        if tables.permissions.values().any(|p| p.name == spec.name) {
            return Ok(());
        }
        let id = Uuid::new_v4();
        tables.permissions.insert(
            id,
            Permission {
                id,
                name: spec.name.clone(),
                resource: spec.resource.clone(),
                action: spec.action.clone(),
                description: spec.description.clone(),
            },
        );
        Ok(())
    }

    async fn ensure_role(&self, spec: &RoleSpec) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        let wanted: Vec<Uuid> = tables
            .permissions
            .values()
            .filter(|p| spec.permission_names.contains(&p.name))
            .map(|p| p.id)
            .collect();

        if let Some(role) = tables.roles.values_mut().find(|r| r.name == spec.name) {
            for id in wanted {
                if !role.permission_ids.contains(&id) {
                    role.permission_ids.push(id);
                }
            }
            return Ok(());
        }

        let id = Uuid::new_v4();
        tables.roles.insert(
            id,
            StoredRole {
                id,
                name: spec.name.clone(),
                display_name: spec.display_name.clone(),
                description: spec.description.clone(),
                permission_ids: wanted,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;

    fn new_user(email: &str, token: Option<(&str, OffsetDateTime)>) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: "hash".into(),
            first_name: "F".into(),
            last_name: "L".into(),
            phone: String::new(),
            email_verified: false,
            verification_token: token.map(|(t, _)| t.to_string()),
            verification_expiry: token.map(|(_, e)| e),
            organization_id: None,
            role_ids: vec![],
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = InMemoryIdentityStore::new();
        store.create_user(new_user("a@x.io", None)).await.unwrap();
        let err = store.create_user(new_user("a@x.io", None)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn verification_token_redeems_once() {
        let store = InMemoryIdentityStore::new();
        let now = OffsetDateTime::now_utc();
        let user = store
            .create_user(new_user("a@x.io", Some(("tok", now + Duration::hours(1)))))
            .await
            .unwrap();

        assert!(store.consume_verification_token(user.id, "tok", now).await.unwrap());
        assert!(!store.consume_verification_token(user.id, "tok", now).await.unwrap());

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.email_verified);
        assert!(stored.verification_token.is_none());
        assert!(stored.verification_expiry.is_none());
        assert_eq!(stored.last_login_at, Some(now));
    }

    #[tokio::test]
    async fn expired_verification_token_is_not_consumed() {
        let store = InMemoryIdentityStore::new();
        let now = OffsetDateTime::now_utc();
        let user = store
            .create_user(new_user("a@x.io", Some(("tok", now - Duration::seconds(1)))))
            .await
            .unwrap();
        assert!(!store.consume_verification_token(user.id, "tok", now).await.unwrap());
        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(!stored.email_verified);
    }

    #[tokio::test]
    async fn role_grants_are_merged_idempotently() {
        let store = InMemoryIdentityStore::new();
        for name in ["a.read", "a.write"] {
            let (resource, action) = name.split_once('.').unwrap();
            store
                .ensure_permission(&PermissionSpec {
                    name: name.into(),
                    resource: resource.into(),
                    action: action.into(),
                    description: String::new(),
                })
                .await
                .unwrap();
        }
        let spec = RoleSpec {
            name: "customer".into(),
            display_name: "Customer".into(),
            description: String::new(),
            permission_names: vec!["a.read".into()],
        };
        store.ensure_role(&spec).await.unwrap();
        store.ensure_role(&spec).await.unwrap();
        store
            .ensure_role(&RoleSpec {
                permission_names: vec!["a.read".into(), "a.write".into()],
                ..spec
            })
            .await
            .unwrap();

        let role = store.find_role(RoleName::Customer).await.unwrap().unwrap();
        assert_eq!(role.permissions.len(), 2);
    }
}
