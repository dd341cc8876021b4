//! Permission aggregation over roles that are already loaded.
//!
//! Nothing here touches storage; the identity store joins roles and
//! permissions before handing them over.

use std::collections::BTreeSet;

use super::{
    catalog::{PermissionName, RoleName},
    repo_types::Role,
};

/// Union of permission names across all roles, without duplicates.
pub fn permission_names(roles: &[Role]) -> BTreeSet<String> {
    roles
        .iter()
        .flat_map(|r| r.permissions.iter().map(|p| p.name.clone()))
        .collect()
}

pub fn role_names(roles: &[Role]) -> Vec<String> {
    roles.iter().map(|r| r.name.clone()).collect()
}

pub fn has_role(roles: &[Role], name: RoleName) -> bool {
    roles.iter().any(|r| r.name == name.as_str())
}

pub fn has_permission(roles: &[Role], name: PermissionName) -> bool {
    roles
        .iter()
        .flat_map(|r| r.permissions.iter())
        .any(|p| p.name == name.as_str())
}

/// Role and permission names resolved for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAccess {
    pub roles: Vec<String>,
    pub permissions: BTreeSet<String>,
}

impl ResolvedAccess {
    pub fn resolve(roles: &[Role]) -> Self {
        Self {
            roles: role_names(roles),
            permissions: permission_names(roles),
        }
    }

    pub fn has_role(&self, name: RoleName) -> bool {
        self.roles.iter().any(|r| r == name.as_str())
    }

    pub fn has_permission(&self, name: PermissionName) -> bool {
        self.permissions.contains(name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::auth::repo_types::Permission;

    fn perm(p: PermissionName) -> Permission {
        Permission {
            id: Uuid::new_v4(),
            name: p.as_str().into(),
            resource: p.resource().into(),
            action: p.action().into(),
            description: p.description().into(),
        }
    }

    fn role(name: RoleName, perms: &[PermissionName]) -> Role {
        Role {
            id: Uuid::new_v4(),
            name: name.as_str().into(),
            display_name: name.display_name().into(),
            description: name.description().into(),
            permissions: perms.iter().copied().map(perm).collect(),
        }
    }

    #[test]
    fn union_across_roles_has_no_duplicates() {
        use PermissionName::*;
        let roles = vec![
            role(RoleName::Staff, &[VehiclesRead, RentalsRead]),
            role(RoleName::Customer, &[RentalsRead, RentalsCreate]),
        ];
        let names = permission_names(&roles);
        let expected: BTreeSet<String> = ["vehicles.read", "rentals.read", "rentals.create"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn empty_inputs_resolve_to_empty_results() {
        assert!(permission_names(&[]).is_empty());
        assert!(!has_role(&[], RoleName::Admin));
        assert!(!has_permission(&[], PermissionName::UsersRead));

        let hollow = vec![role(RoleName::Customer, &[])];
        let access = ResolvedAccess::resolve(&hollow);
        assert_eq!(access.roles, vec!["customer".to_string()]);
        assert!(access.permissions.is_empty());
    }

    #[test]
    fn membership_predicates() {
        let roles = vec![role(RoleName::Manager, &[PermissionName::ReportsView])];
        assert!(has_role(&roles, RoleName::Manager));
        assert!(!has_role(&roles, RoleName::Admin));
        assert!(has_permission(&roles, PermissionName::ReportsView));
        assert!(!has_permission(&roles, PermissionName::SystemManage));

        let access = ResolvedAccess::resolve(&roles);
        assert!(access.has_role(RoleName::Manager));
        assert!(access.has_permission(PermissionName::ReportsView));
        assert!(!access.has_permission(PermissionName::UsersManage));
    }
}
