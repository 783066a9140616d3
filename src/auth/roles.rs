use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role. Each role maps to a fixed permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Administrator,
    Manager,
    Viewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Administrator => write!(f, "administrator"),
            Role::Manager => write!(f, "manager"),
            Role::Viewer => write!(f, "viewer"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "administrator" | "admin" => Ok(Role::Administrator),
            "manager" => Ok(Role::Manager),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!(
                "unknown role '{}' (expected administrator, manager or viewer)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    RegisterEquipment,
    ViewInventory,
    ManageEquipment,
    ViewHistory,
    GenerateReport,
    ManageUsers,
    DeleteEquipment,
    ReturnToVendor,
    ApproveReturns,
    ManagePending,
    ConfigureSystem,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::RegisterEquipment => "register_equipment",
            Permission::ViewInventory => "view_inventory",
            Permission::ManageEquipment => "manage_equipment",
            Permission::ViewHistory => "view_history",
            Permission::GenerateReport => "generate_report",
            Permission::ManageUsers => "manage_users",
            Permission::DeleteEquipment => "delete_equipment",
            Permission::ReturnToVendor => "return_to_vendor",
            Permission::ApproveReturns => "approve_returns",
            Permission::ManagePending => "manage_pending",
            Permission::ConfigureSystem => "configure_system",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const ADMINISTRATOR: &[Permission] = &[
    Permission::RegisterEquipment,
    Permission::ViewInventory,
    Permission::ManageEquipment,
    Permission::ViewHistory,
    Permission::GenerateReport,
    Permission::ManageUsers,
    Permission::DeleteEquipment,
    Permission::ReturnToVendor,
    Permission::ApproveReturns,
    Permission::ManagePending,
    Permission::ConfigureSystem,
];

const MANAGER: &[Permission] = &[
    Permission::RegisterEquipment,
    Permission::ViewInventory,
    Permission::ManageEquipment,
    Permission::ViewHistory,
    Permission::GenerateReport,
    Permission::ReturnToVendor,
];

const VIEWER: &[Permission] = &[
    Permission::ViewInventory,
    Permission::ViewHistory,
    Permission::GenerateReport,
];

/// Static permission table.
pub fn permissions(role: Role) -> &'static [Permission] {
    match role {
        Role::Administrator => ADMINISTRATOR,
        Role::Manager => MANAGER,
        Role::Viewer => VIEWER,
    }
}

pub fn has_permission(role: Role, perm: Permission) -> bool {
    permissions(role).contains(&perm)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("role {role} lacks permission {permission}")]
pub struct PermissionDenied {
    pub role: Role,
    pub permission: Permission,
}

/// Guard called at the top of every gated handler.
pub fn require(role: Role, perm: Permission) -> Result<(), PermissionDenied> {
    if has_permission(role, perm) {
        Ok(())
    } else {
        Err(PermissionDenied {
            role,
            permission: perm,
        })
    }
}
