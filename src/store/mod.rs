pub mod models;
pub mod snapshot;

use chrono::Local;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info};

use crate::auth::roles::Role;
use models::{
    Equipment, EquipmentStatus, MoveRequest, Movement, NewEquipment, Parameter, ParameterKind,
    SystemLogEntry, User,
};
use snapshot::{Snapshot, SnapshotFile};

/// File name of the snapshot inside `storage.data_dir`.
pub const SNAPSHOT_FILE: &str = "inventory.json";

/// Minimum tag length.
pub const MIN_TAG_LENGTH: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },
    #[error("{entity} '{key}' already exists")]
    Duplicate { entity: &'static str, key: String },
    #[error("equipment {tag} cannot move from {from} to {to}")]
    InvalidTransition {
        tag: String,
        from: EquipmentStatus,
        to: EquipmentStatus,
    },
    #[error("{0}")]
    InvalidInput(String),
    #[error("{kind:?} '{value}' is still used by equipment")]
    InUse { kind: ParameterKind, value: String },
    #[error("inventory snapshot: {0}")]
    Persistence(#[from] std::io::Error),
}

/// Shared inventory tables, guarded by one lock. Every mutating call
/// commits on its own and rewrites the snapshot when a data dir is set.
#[derive(Debug)]
pub struct InventoryStore {
    tables: RwLock<Snapshot>,
    file: Option<SnapshotFile>,
    /// System log entries added since the last save.
    unsaved_log: AtomicBool,
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("email pattern is valid")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

pub fn is_valid_tag(tag: &str) -> bool {
    tag.chars().count() >= MIN_TAG_LENGTH && tag.chars().all(|c| c.is_ascii_alphanumeric())
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_uppercase()
}

fn email_domain(email: &str) -> Option<&str> {
    email.rsplit_once('@').map(|(_, d)| d)
}

impl InventoryStore {
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Snapshot::default()),
            file: None,
            unsaved_log: AtomicBool::new(false),
        }
    }

    /// Open the store backed by `<data_dir>/inventory.json`, creating the
    /// directory when missing.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;
        let file = SnapshotFile::new(data_dir.join(SNAPSHOT_FILE));
        let tables = file.load()?;
        info!(
            path = %file.path().display(),
            equipment = tables.equipment.len(),
            users = tables.users.len(),
            "Inventory store opened"
        );
        Ok(Self {
            tables: RwLock::new(tables),
            file: Some(file),
            unsaved_log: AtomicBool::new(false),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.file.as_ref().map(SnapshotFile::path)
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, tables: &Snapshot) -> Result<(), StoreError> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        file.save(tables).map_err(|e| {
            error!(path = %file.path().display(), error = %e, "Failed to save inventory snapshot");
            StoreError::Persistence(e)
        })
    }

    /// Apply `change` to a copy of the tables and install the copy only
    /// once it is on disk. A failed change or save leaves the tables as
    /// they were.
    fn commit<T>(
        &self,
        change: impl FnOnce(&mut Snapshot) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self.write();
        let mut next = tables.clone();
        let out = change(&mut next)?;
        self.persist(&next)?;
        *tables = next;
        self.unsaved_log.store(false, Ordering::Relaxed);
        Ok(out)
    }

    /// Write system log entries that are only held in memory.
    pub fn flush(&self) -> Result<(), StoreError> {
        let tables = self.write();
        if !self.unsaved_log.swap(false, Ordering::Relaxed) {
            return Ok(());
        }
        self.persist(&tables).inspect_err(|_| {
            self.unsaved_log.store(true, Ordering::Relaxed);
        })
    }

    /// Whether system log entries are waiting for the next save.
    pub fn has_unsaved_log(&self) -> bool {
        self.unsaved_log.load(Ordering::Relaxed)
    }

    // --- users ---

    pub fn add_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
        full_name: Option<&str>,
        must_change_password: bool,
    ) -> Result<(), StoreError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(StoreError::InvalidInput(
                "username must not be empty".to_string(),
            ));
        }
        self.commit(|tables| {
            if tables.users.iter().any(|u| u.username == username) {
                return Err(StoreError::Duplicate {
                    entity: "user",
                    key: username.to_string(),
                });
            }
            tables.users.push(User {
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                role,
                full_name: full_name.map(str::to_string),
                must_change_password,
                active: true,
            });
            Ok(())
        })
    }

    pub fn get_user(&self, username: &str) -> Option<User> {
        self.read()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
    }

    pub fn users(&self) -> Vec<User> {
        let mut users = self.read().users.clone();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    pub fn user_count(&self) -> usize {
        self.read().users.len()
    }

    pub fn set_user_active(&self, username: &str, active: bool) -> Result<(), StoreError> {
        self.commit(|tables| {
            find_user(tables, username)?.active = active;
            Ok(())
        })
    }

    pub fn set_password_hash(
        &self,
        username: &str,
        password_hash: &str,
        must_change_password: bool,
    ) -> Result<(), StoreError> {
        self.commit(|tables| {
            let user = find_user(tables, username)?;
            user.password_hash = password_hash.to_string();
            user.must_change_password = must_change_password;
            Ok(())
        })
    }

    // --- parameters ---

    pub fn add_parameter(&self, kind: ParameterKind, value: &str) -> Result<(), StoreError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(StoreError::InvalidInput(
                "parameter value must not be empty".to_string(),
            ));
        }
        self.commit(|tables| {
            if tables
                .parameters
                .iter()
                .any(|p| p.kind == kind && p.value.eq_ignore_ascii_case(value))
            {
                return Err(StoreError::Duplicate {
                    entity: "parameter",
                    key: value.to_string(),
                });
            }
            tables.parameters.push(Parameter {
                kind,
                value: value.to_string(),
                active: true,
            });
            Ok(())
        })
    }

    pub fn set_parameter_active(
        &self,
        kind: ParameterKind,
        value: &str,
        active: bool,
    ) -> Result<(), StoreError> {
        self.commit(|tables| {
            let param = tables
                .parameters
                .iter_mut()
                .find(|p| p.kind == kind && p.value == value)
                .ok_or_else(|| StoreError::NotFound {
                    entity: "parameter",
                    key: value.to_string(),
                })?;
            param.active = active;
            Ok(())
        })
    }

    /// Delete a parameter. Refused while any equipment uses the value.
    pub fn remove_parameter(&self, kind: ParameterKind, value: &str) -> Result<(), StoreError> {
        self.commit(|tables| {
            if parameter_in_use(tables, kind, value) {
                return Err(StoreError::InUse {
                    kind,
                    value: value.to_string(),
                });
            }
            let before = tables.parameters.len();
            tables
                .parameters
                .retain(|p| !(p.kind == kind && p.value == value));
            if tables.parameters.len() == before {
                return Err(StoreError::NotFound {
                    entity: "parameter",
                    key: value.to_string(),
                });
            }
            Ok(())
        })
    }

    /// Parameters of one kind, sorted by value.
    pub fn parameters(&self, kind: ParameterKind) -> Vec<Parameter> {
        let mut params: Vec<Parameter> = self
            .read()
            .parameters
            .iter()
            .filter(|p| p.kind == kind)
            .cloned()
            .collect();
        params.sort_by(|a, b| a.value.cmp(&b.value));
        params
    }

    // --- equipment ---

    pub fn register_equipment(&self, new: NewEquipment, user: &str) -> Result<Equipment, StoreError> {
        let tag = normalize_tag(&new.tag);
        if !is_valid_tag(&tag) {
            return Err(StoreError::InvalidInput(format!(
                "tag '{}' must be at least {} alphanumeric characters",
                new.tag, MIN_TAG_LENGTH
            )));
        }
        for (label, value) in [
            ("kind", &new.kind),
            ("brand", &new.brand),
            ("model", &new.model),
            ("serial", &new.serial),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::InvalidInput(format!("{} must not be empty", label)));
            }
        }

        let equipment = self.commit(|tables| {
            if tables.equipment.iter().any(|e| e.tag == tag) {
                return Err(StoreError::Duplicate {
                    entity: "equipment",
                    key: tag.clone(),
                });
            }
            check_parameter_value(tables, ParameterKind::EquipmentType, new.kind.trim())?;
            check_parameter_value(tables, ParameterKind::Brand, new.brand.trim())?;

            let equipment = Equipment {
                tag: tag.clone(),
                kind: new.kind.trim().to_string(),
                brand: new.brand.trim().to_string(),
                model: new.model.trim().to_string(),
                serial: new.serial.trim().to_string(),
                status: EquipmentStatus::Available,
                assignee: None,
                assignee_email: None,
                notes: new.notes.clone(),
                registered_at: Local::now(),
                loan_return_date: None,
                vendor_return_date: None,
                return_reason: None,
                previous_status: None,
            };
            tables.equipment.push(equipment.clone());
            tables.movements.push(Movement {
                tag: tag.clone(),
                action: "Registration".to_string(),
                details: format!(
                    "{} {} {} (serial {})",
                    equipment.kind, equipment.brand, equipment.model, equipment.serial
                ),
                user: user.to_string(),
                timestamp: Local::now(),
            });
            Ok(equipment)
        })?;
        debug!(tag = %tag, user = %user, "Equipment registered");
        Ok(equipment)
    }

    pub fn get_equipment(&self, tag: &str) -> Option<Equipment> {
        let tag = normalize_tag(tag);
        self.read().equipment.iter().find(|e| e.tag == tag).cloned()
    }

    /// Apply one lifecycle transition and log it as a movement.
    pub fn move_equipment(
        &self,
        tag: &str,
        req: MoveRequest,
        user: &str,
    ) -> Result<Equipment, StoreError> {
        let tag = normalize_tag(tag);
        let (updated, from) = self.commit(|tables| apply_move(tables, &tag, &req, user))?;
        debug!(tag = %tag, from = %from, to = %updated.status, user = %user, "Equipment moved");
        Ok(updated)
    }

    pub fn all_equipment(&self) -> Vec<Equipment> {
        self.read().equipment.clone()
    }

    pub fn active_equipment(&self) -> Vec<Equipment> {
        self.filter_equipment(|e| e.status.is_active())
    }

    pub fn returned_equipment(&self) -> Vec<Equipment> {
        self.filter_equipment(|e| e.status == EquipmentStatus::ReturnedToVendor)
    }

    /// Available equipment with only its registration movement.
    pub fn new_equipment(&self) -> Vec<Equipment> {
        self.available_by_history(|n| n == 1)
    }

    /// Available equipment that has moved at least once.
    pub fn available_with_history(&self) -> Vec<Equipment> {
        self.available_by_history(|n| n > 1)
    }

    fn available_by_history(&self, keep: impl Fn(usize) -> bool) -> Vec<Equipment> {
        let tables = self.read();
        tables
            .equipment
            .iter()
            .filter(|e| e.status == EquipmentStatus::Available)
            .filter(|e| keep(tables.movements.iter().filter(|m| m.tag == e.tag).count()))
            .cloned()
            .collect()
    }

    fn filter_equipment(&self, keep: impl Fn(&Equipment) -> bool) -> Vec<Equipment> {
        self.read()
            .equipment
            .iter()
            .filter(|e| keep(e))
            .cloned()
            .collect()
    }

    /// One page (1-based) of active equipment, Assigned rows last, and the
    /// total number of active rows.
    pub fn active_page(&self, page: usize, page_size: usize) -> (Vec<Equipment>, usize) {
        let mut active = self.active_equipment();
        active.sort_by(|a, b| {
            let rank = |e: &Equipment| e.status == EquipmentStatus::Assigned;
            rank(a)
                .cmp(&rank(b))
                .then_with(|| a.status.label().cmp(b.status.label()))
                .then_with(|| a.tag.cmp(&b.tag))
        });
        let total = active.len();
        let offset = page.saturating_sub(1).saturating_mul(page_size);
        let rows = active.into_iter().skip(offset).take(page_size).collect();
        (rows, total)
    }

    pub fn status_counts(&self) -> BTreeMap<EquipmentStatus, usize> {
        let mut counts: BTreeMap<EquipmentStatus, usize> =
            EquipmentStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for e in self.read().equipment.iter() {
            *counts.entry(e.status).or_insert(0) += 1;
        }
        counts
    }

    // --- logs ---

    /// Every movement, newest first.
    pub fn movements(&self) -> Vec<Movement> {
        self.read().movements.iter().rev().cloned().collect()
    }

    pub fn recent_movements(&self, limit: usize) -> Vec<Movement> {
        self.read().movements.iter().rev().take(limit).cloned().collect()
    }

    pub fn movements_for_tag(&self, tag: &str) -> Vec<Movement> {
        let tag = normalize_tag(tag);
        self.read()
            .movements
            .iter()
            .rev()
            .filter(|m| m.tag == tag)
            .cloned()
            .collect()
    }

    pub fn movements_by_user(&self, user: &str, limit: usize) -> Vec<Movement> {
        self.read()
            .movements
            .iter()
            .rev()
            .filter(|m| m.user == user)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Append to the system log. The entry is kept in memory and reaches
    /// disk with the next committed change or [`InventoryStore::flush`].
    pub fn log_system(&self, action: &str, details: &str, user: &str) {
        let mut tables = self.write();
        tables.system_log.push(SystemLogEntry {
            action: action.to_string(),
            details: details.to_string(),
            user: user.to_string(),
            timestamp: Local::now(),
        });
        if self.file.is_some() {
            self.unsaved_log.store(true, Ordering::Relaxed);
        }
    }

    /// System log, newest first.
    pub fn system_log(&self) -> Vec<SystemLogEntry> {
        self.read().system_log.iter().rev().cloned().collect()
    }
}

/// Move one piece of equipment inside `tables`. Returns the updated row
/// and the status it left.
fn apply_move(
    tables: &mut Snapshot,
    tag: &str,
    req: &MoveRequest,
    user: &str,
) -> Result<(Equipment, EquipmentStatus), StoreError> {
    let active_domains: Vec<String> = tables
        .parameters
        .iter()
        .filter(|p| p.kind == ParameterKind::EmailDomain && p.active)
        .map(|p| p.value.to_lowercase())
        .collect();
    let any_domains = tables
        .parameters
        .iter()
        .any(|p| p.kind == ParameterKind::EmailDomain);

    let equipment = tables
        .equipment
        .iter_mut()
        .find(|e| e.tag == tag)
        .ok_or_else(|| StoreError::NotFound {
            entity: "equipment",
            key: tag.to_string(),
        })?;
    let from = equipment.status;
    if !from.can_move_to(req.to) {
        return Err(StoreError::InvalidTransition {
            tag: tag.to_string(),
            from,
            to: req.to,
        });
    }

    if req.to.requires_assignee() {
        let assignee = req
            .assignee
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| {
                StoreError::InvalidInput(format!("{} requires an assignee", req.to))
            })?;
        let email = req.email.as_deref().map(str::trim).unwrap_or_default();
        if !is_valid_email(email) {
            return Err(StoreError::InvalidInput(format!(
                "'{}' is not a valid email address",
                email
            )));
        }
        if any_domains {
            let domain = email_domain(email).unwrap_or_default().to_lowercase();
            if !active_domains.contains(&domain) {
                return Err(StoreError::InvalidInput(format!(
                    "email domain '{}' is not an active domain",
                    domain
                )));
            }
        }
        equipment.assignee = Some(assignee.to_string());
        equipment.assignee_email = Some(email.to_string());
    }

    let mut to = req.to;
    let action = match req.to {
        EquipmentStatus::Available
            if from == EquipmentStatus::InMaintenance
                && equipment.previous_status == Some(EquipmentStatus::Assigned) =>
        {
            to = EquipmentStatus::Assigned;
            "Maintenance completed"
        }
        EquipmentStatus::Available => {
            equipment.assignee = None;
            equipment.assignee_email = None;
            equipment.loan_return_date = None;
            "Returned to stock"
        }
        EquipmentStatus::Assigned => "Assignment",
        EquipmentStatus::OnLoan => {
            equipment.loan_return_date = req.loan_return_date;
            "Loan"
        }
        EquipmentStatus::InMaintenance => "Maintenance",
        EquipmentStatus::PendingVendorReturn => {
            equipment.return_reason = req.note.clone();
            "Vendor return requested"
        }
        EquipmentStatus::ReturnedToVendor => {
            equipment.vendor_return_date = Some(Local::now().date_naive());
            "Returned to vendor"
        }
        EquipmentStatus::Renewal => "Renewal",
    };

    equipment.previous_status = Some(from);
    equipment.status = to;
    if let Some(note) = req.note.as_deref().filter(|n| !n.trim().is_empty()) {
        equipment.notes = Some(note.trim().to_string());
    }

    let mut details = format!("{} -> {}", from, to);
    if let Some(assignee) = equipment.assignee.as_deref().filter(|_| to.requires_assignee()) {
        details.push_str(&format!(" ({})", assignee));
    }
    if let Some(note) = req.note.as_deref().filter(|n| !n.trim().is_empty()) {
        details.push_str(&format!(": {}", note.trim()));
    }
    let updated = equipment.clone();

    tables.movements.push(Movement {
        tag: tag.to_string(),
        action: action.to_string(),
        details,
        user: user.to_string(),
        timestamp: Local::now(),
    });
    Ok((updated, from))
}

fn find_user<'a>(tables: &'a mut Snapshot, username: &str) -> Result<&'a mut User, StoreError> {
    tables
        .users
        .iter_mut()
        .find(|u| u.username == username)
        .ok_or_else(|| StoreError::NotFound {
            entity: "user",
            key: username.to_string(),
        })
}

/// When any parameter of `kind` exists, `value` must match an active one.
fn check_parameter_value(
    tables: &Snapshot,
    kind: ParameterKind,
    value: &str,
) -> Result<(), StoreError> {
    let mut of_kind = tables.parameters.iter().filter(|p| p.kind == kind).peekable();
    if of_kind.peek().is_none() {
        return Ok(());
    }
    if of_kind.any(|p| p.active && p.value.eq_ignore_ascii_case(value)) {
        Ok(())
    } else {
        Err(StoreError::InvalidInput(format!(
            "'{}' is not an active {} value",
            value,
            kind.label().to_lowercase()
        )))
    }
}

fn parameter_in_use(tables: &Snapshot, kind: ParameterKind, value: &str) -> bool {
    tables.equipment.iter().any(|e| match kind {
        ParameterKind::EquipmentType => e.kind.eq_ignore_ascii_case(value),
        ParameterKind::Brand => e.brand.eq_ignore_ascii_case(value),
        ParameterKind::EmailDomain => e
            .assignee_email
            .as_deref()
            .and_then(email_domain)
            .is_some_and(|d| d.eq_ignore_ascii_case(value)),
    })
}
