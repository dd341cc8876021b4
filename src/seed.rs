use anyhow::Context;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        catalog::{PermissionName, RoleName},
        password::hash_password,
        repo::{IdentityStore, StoreError},
        repo_types::{NewUser, PermissionSpec, RoleSpec},
    },
    config::AdminSeed,
};

/// Ensures every known permission and role exists, then the bootstrap admin
/// if one is configured. Safe to run on every start.
#[instrument(skip_all)]
pub async fn seed_identity(
    store: &dyn IdentityStore,
    admin: Option<&AdminSeed>,
) -> anyhow::Result<()> {
    for p in PermissionName::ALL {
        store
            .ensure_permission(&PermissionSpec {
                name: p.as_str().into(),
                resource: p.resource().into(),
                action: p.action().into(),
                description: p.description().into(),
            })
            .await
            .with_context(|| format!("seed permission {p}"))?;
    }
    info!(count = PermissionName::ALL.len(), "permissions seeded");

    for r in RoleName::ALL {
        store
            .ensure_role(&RoleSpec {
                name: r.as_str().into(),
                display_name: r.display_name().into(),
                description: r.description().into(),
                permission_names: r.grants().iter().map(|p| p.as_str().to_string()).collect(),
            })
            .await
            .with_context(|| format!("seed role {r}"))?;
    }
    info!(count = RoleName::ALL.len(), "roles seeded");

    if let Some(admin) = admin {
        seed_admin(store, admin).await?;
    }
    Ok(())
}

async fn seed_admin(store: &dyn IdentityStore, admin: &AdminSeed) -> anyhow::Result<()> {
    if store.find_by_email(&admin.email).await?.is_some() {
        info!(email = %admin.email, "super admin already exists");
        return Ok(());
    }
    let role = store
        .find_role(RoleName::SuperAdmin)
        .await?
        .context("super_admin role missing after seeding")?;

    let new = NewUser {
        email: admin.email.clone(),
        password_hash: hash_password(&admin.password)?,
        first_name: "System".into(),
        last_name: "Administrator".into(),
        phone: String::new(),
        email_verified: true,
        verification_token: None,
        verification_expiry: None,
        organization_id: None,
        role_ids: vec![role.id],
    };
    match store.create_user(new).await {
        Ok(user) => info!(user_id = %user.id, email = %user.email, "super admin created"),
        Err(StoreError::DuplicateEmail) => {
            warn!(email = %admin.email, "super admin created concurrently")
        }
        Err(StoreError::Other(e)) => return Err(e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{memory::InMemoryIdentityStore, password::verify_password, rbac};

    #[tokio::test]
    async fn seeds_vocabulary_and_admin_idempotently() {
        let store = InMemoryIdentityStore::new();
        let admin = AdminSeed {
            email: "admin@fleetpass.io".into(),
            password: "Admin123!".into(),
        };
        seed_identity(&store, Some(&admin)).await.unwrap();
        seed_identity(&store, Some(&admin)).await.unwrap();
        assert_eq!(store.user_count().await, 1);

        let customer = store.find_role(RoleName::Customer).await.unwrap().unwrap();
        let names = rbac::permission_names(std::slice::from_ref(&customer));
        assert_eq!(names.len(), RoleName::Customer.grants().len());

        let user = store.find_by_email("admin@fleetpass.io").await.unwrap().unwrap();
        assert!(user.email_verified);
        assert!(verify_password("Admin123!", &user.password_hash));
        assert!(rbac::has_role(&user.roles, RoleName::SuperAdmin));
        assert_eq!(
            rbac::permission_names(&user.roles).len(),
            PermissionName::ALL.len()
        );
    }

    #[tokio::test]
    async fn admin_is_optional() {
        let store = InMemoryIdentityStore::new();
        seed_identity(&store, None).await.unwrap();
        assert_eq!(store.user_count().await, 0);
        assert!(store.find_role(RoleName::Admin).await.unwrap().is_some());
    }
}
