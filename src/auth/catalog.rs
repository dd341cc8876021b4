//! Closed vocabulary of role and permission names.
//!
//! Seeding, the resolver and authorization checks all go through these enums,
//! so a misspelled name is a compile error rather than a silent privilege gap.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleName {
    SuperAdmin,
    Admin,
    Manager,
    Staff,
    Customer,
}

impl RoleName {
    pub const ALL: [RoleName; 5] = [
        RoleName::SuperAdmin,
        RoleName::Admin,
        RoleName::Manager,
        RoleName::Staff,
        RoleName::Customer,
    ];

    /// Role assigned to every self-registered user.
    pub const DEFAULT: RoleName = RoleName::Customer;

    pub fn as_str(self) -> &'static str {
        match self {
            RoleName::SuperAdmin => "super_admin",
            RoleName::Admin => "admin",
            RoleName::Manager => "manager",
            RoleName::Staff => "staff",
            RoleName::Customer => "customer",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            RoleName::SuperAdmin => "Super Administrator",
            RoleName::Admin => "Administrator",
            RoleName::Manager => "Manager",
            RoleName::Staff => "Staff",
            RoleName::Customer => "Customer",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RoleName::SuperAdmin => "Full system access - can manage everything",
            RoleName::Admin => {
                "Organization administrator - can manage organization, locations, vehicles, and users"
            }
            RoleName::Manager => "Location manager - can manage vehicles and rentals",
            RoleName::Staff => "Staff member - can create and manage rentals",
            RoleName::Customer => "Customer - can view vehicles and create own rentals",
        }
    }

    /// Permissions granted to this role when the vocabulary is seeded.
    pub fn grants(self) -> Vec<PermissionName> {
        use PermissionName::*;
        match self {
            RoleName::SuperAdmin => PermissionName::ALL.to_vec(),
            RoleName::Admin => vec![
                VehiclesCreate,
                VehiclesRead,
                VehiclesUpdate,
                VehiclesDelete,
                RentalsCreate,
                RentalsRead,
                RentalsUpdate,
                RentalsDelete,
                RentalsApprove,
                UsersManage,
                UsersRead,
                OrganizationsRead,
                LocationsCreate,
                LocationsRead,
                LocationsUpdate,
                LocationsDelete,
                ReportsView,
            ],
            RoleName::Manager => vec![
                VehiclesCreate,
                VehiclesRead,
                VehiclesUpdate,
                VehiclesDelete,
                RentalsCreate,
                RentalsRead,
                RentalsUpdate,
                RentalsApprove,
                UsersRead,
                LocationsRead,
                ReportsView,
            ],
            RoleName::Staff => vec![
                VehiclesRead,
                RentalsCreate,
                RentalsRead,
                RentalsUpdate,
                LocationsRead,
            ],
            RoleName::Customer => vec![VehiclesRead, RentalsCreate, RentalsRead],
        }
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionName {
    VehiclesCreate,
    VehiclesRead,
    VehiclesUpdate,
    VehiclesDelete,
    RentalsCreate,
    RentalsRead,
    RentalsUpdate,
    RentalsDelete,
    RentalsApprove,
    UsersManage,
    UsersRead,
    OrganizationsManage,
    OrganizationsRead,
    LocationsCreate,
    LocationsRead,
    LocationsUpdate,
    LocationsDelete,
    ReportsView,
    SystemManage,
}

impl PermissionName {
    pub const ALL: [PermissionName; 19] = [
        PermissionName::VehiclesCreate,
        PermissionName::VehiclesRead,
        PermissionName::VehiclesUpdate,
        PermissionName::VehiclesDelete,
        PermissionName::RentalsCreate,
        PermissionName::RentalsRead,
        PermissionName::RentalsUpdate,
        PermissionName::RentalsDelete,
        PermissionName::RentalsApprove,
        PermissionName::UsersManage,
        PermissionName::UsersRead,
        PermissionName::OrganizationsManage,
        PermissionName::OrganizationsRead,
        PermissionName::LocationsCreate,
        PermissionName::LocationsRead,
        PermissionName::LocationsUpdate,
        PermissionName::LocationsDelete,
        PermissionName::ReportsView,
        PermissionName::SystemManage,
    ];

    /// Wire name, formatted `<resource>.<action>`.
    pub fn as_str(self) -> &'static str {
        use PermissionName::*;
        match self {
            VehiclesCreate => "vehicles.create",
            VehiclesRead => "vehicles.read",
            VehiclesUpdate => "vehicles.update",
            VehiclesDelete => "vehicles.delete",
            RentalsCreate => "rentals.create",
            RentalsRead => "rentals.read",
            RentalsUpdate => "rentals.update",
            RentalsDelete => "rentals.delete",
            RentalsApprove => "rentals.approve",
            UsersManage => "users.manage",
            UsersRead => "users.read",
            OrganizationsManage => "organizations.manage",
            OrganizationsRead => "organizations.read",
            LocationsCreate => "locations.create",
            LocationsRead => "locations.read",
            LocationsUpdate => "locations.update",
            LocationsDelete => "locations.delete",
            ReportsView => "reports.view",
            SystemManage => "system.manage",
        }
    }

    pub fn resource(self) -> &'static str {
        self.split().0
    }

    pub fn action(self) -> &'static str {
        self.split().1
    }

    fn split(self) -> (&'static str, &'static str) {
        let name = self.as_str();
        name.split_once('.').unwrap_or((name, ""))
    }

    pub fn description(self) -> &'static str {
        use PermissionName::*;
        match self {
            VehiclesCreate => "Create new vehicles",
            VehiclesRead => "View vehicles",
            VehiclesUpdate => "Update vehicles",
            VehiclesDelete => "Delete vehicles",
            RentalsCreate => "Create rentals",
            RentalsRead => "View rentals",
            RentalsUpdate => "Update rentals",
            RentalsDelete => "Delete rentals",
            RentalsApprove => "Approve rentals",
            UsersManage => "Manage users",
            UsersRead => "View users",
            OrganizationsManage => "Manage organizations",
            OrganizationsRead => "View organizations",
            LocationsCreate => "Create locations",
            LocationsRead => "View locations",
            LocationsUpdate => "Update locations",
            LocationsDelete => "Delete locations",
            ReportsView => "View reports",
            SystemManage => "Manage system settings",
        }
    }
}

impl fmt::Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn permission_names_are_unique_and_well_formed() {
        let names: HashSet<&str> = PermissionName::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(names.len(), PermissionName::ALL.len());
        for p in PermissionName::ALL {
            assert!(!p.resource().is_empty());
            assert!(!p.action().is_empty());
            assert_eq!(format!("{}.{}", p.resource(), p.action()), p.as_str());
        }
    }

    #[test]
    fn super_admin_is_granted_everything() {
        assert_eq!(RoleName::SuperAdmin.grants().len(), PermissionName::ALL.len());
        assert!(!RoleName::Customer
            .grants()
            .contains(&PermissionName::SystemManage));
    }
}
