use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::auth::roles::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    Available,
    Assigned,
    OnLoan,
    InMaintenance,
    PendingVendorReturn,
    ReturnedToVendor,
    Renewal,
}

impl EquipmentStatus {
    pub const ALL: [EquipmentStatus; 7] = [
        EquipmentStatus::Available,
        EquipmentStatus::Assigned,
        EquipmentStatus::OnLoan,
        EquipmentStatus::InMaintenance,
        EquipmentStatus::PendingVendorReturn,
        EquipmentStatus::ReturnedToVendor,
        EquipmentStatus::Renewal,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EquipmentStatus::Available => "Available",
            EquipmentStatus::Assigned => "Assigned",
            EquipmentStatus::OnLoan => "On loan",
            EquipmentStatus::InMaintenance => "In maintenance",
            EquipmentStatus::PendingVendorReturn => "Pending vendor return",
            EquipmentStatus::ReturnedToVendor => "Returned to vendor",
            EquipmentStatus::Renewal => "Renewal",
        }
    }

    /// Statuses this one may move to.
    pub fn allowed_next(&self) -> &'static [EquipmentStatus] {
        use EquipmentStatus::*;
        match self {
            Available => &[Assigned, OnLoan, InMaintenance, PendingVendorReturn],
            Assigned | OnLoan => &[Available, InMaintenance, Renewal],
            InMaintenance => &[Available],
            PendingVendorReturn => &[ReturnedToVendor, Available],
            Renewal => &[Available, ReturnedToVendor],
            ReturnedToVendor => &[],
        }
    }

    pub fn can_move_to(&self, next: EquipmentStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Statuses that need an assignee and email.
    pub fn requires_assignee(&self) -> bool {
        matches!(self, EquipmentStatus::Assigned | EquipmentStatus::OnLoan)
    }

    /// Equipment still held by the organization.
    pub fn is_active(&self) -> bool {
        !matches!(self, EquipmentStatus::ReturnedToVendor)
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            EquipmentStatus::InMaintenance
                | EquipmentStatus::PendingVendorReturn
                | EquipmentStatus::Renewal
        )
    }
}

impl fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EquipmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_lowercase().replace([' ', '-'], "_");
        match norm.as_str() {
            "available" => Ok(EquipmentStatus::Available),
            "assigned" => Ok(EquipmentStatus::Assigned),
            "on_loan" => Ok(EquipmentStatus::OnLoan),
            "in_maintenance" | "maintenance" => Ok(EquipmentStatus::InMaintenance),
            "pending_vendor_return" => Ok(EquipmentStatus::PendingVendorReturn),
            "returned_to_vendor" => Ok(EquipmentStatus::ReturnedToVendor),
            "renewal" => Ok(EquipmentStatus::Renewal),
            _ => Err(format!("unknown equipment status '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    pub tag: String,
    pub kind: String,
    pub brand: String,
    pub model: String,
    pub serial: String,
    pub status: EquipmentStatus,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub assignee_email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub registered_at: DateTime<Local>,
    #[serde(default)]
    pub loan_return_date: Option<NaiveDate>,
    #[serde(default)]
    pub vendor_return_date: Option<NaiveDate>,
    #[serde(default)]
    pub return_reason: Option<String>,
    #[serde(default)]
    pub previous_status: Option<EquipmentStatus>,
}

/// Input for [`super::InventoryStore::register_equipment`].
#[derive(Debug, Clone)]
pub struct NewEquipment {
    pub tag: String,
    pub kind: String,
    pub brand: String,
    pub model: String,
    pub serial: String,
    pub notes: Option<String>,
}

/// Input for [`super::InventoryStore::move_equipment`].
#[derive(Debug, Clone)]
pub struct MoveRequest {
    pub to: EquipmentStatus,
    pub assignee: Option<String>,
    pub email: Option<String>,
    pub note: Option<String>,
    pub loan_return_date: Option<NaiveDate>,
}

impl MoveRequest {
    pub fn to(status: EquipmentStatus) -> Self {
        Self {
            to: status,
            assignee: None,
            email: None,
            note: None,
            loan_return_date: None,
        }
    }

    pub fn with_assignee(mut self, name: &str, email: &str) -> Self {
        self.assignee = Some(name.to_string());
        self.email = Some(email.to_string());
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub tag: String,
    pub action: String,
    pub details: String,
    pub user: String,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemLogEntry {
    pub action: String,
    pub details: String,
    pub user: String,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default = "default_true")]
    pub must_change_password: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    EquipmentType,
    Brand,
    EmailDomain,
}

impl ParameterKind {
    pub const ALL: [ParameterKind; 3] = [
        ParameterKind::EquipmentType,
        ParameterKind::Brand,
        ParameterKind::EmailDomain,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ParameterKind::EquipmentType => "Equipment types",
            ParameterKind::Brand => "Brands",
            ParameterKind::EmailDomain => "Email domains",
        }
    }
}

impl FromStr for ParameterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "equipment_type" | "type" => Ok(ParameterKind::EquipmentType),
            "brand" => Ok(ParameterKind::Brand),
            "email_domain" | "domain" => Ok(ParameterKind::EmailDomain),
            _ => Err(format!(
                "unknown parameter kind '{}' (expected equipment_type, brand or email_domain)",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub kind: ParameterKind,
    pub value: String,
    #[serde(default = "default_true")]
    pub active: bool,
}
