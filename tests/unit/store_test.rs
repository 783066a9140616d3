use invterm::auth::roles::Role;
use invterm::store::models::{EquipmentStatus, MoveRequest, NewEquipment, ParameterKind};
use invterm::store::{InventoryStore, StoreError, SNAPSHOT_FILE};

fn laptop(tag: &str) -> NewEquipment {
    NewEquipment {
        tag: tag.to_string(),
        kind: "Laptop".to_string(),
        brand: "Lenovo".to_string(),
        model: "ThinkPad T14".to_string(),
        serial: format!("SN-{}", tag),
        notes: None,
    }
}

fn assign(store: &InventoryStore, tag: &str) {
    store
        .move_equipment(
            tag,
            MoveRequest::to(EquipmentStatus::Assigned).with_assignee("Ana Diaz", "ana@corp.example"),
            "admin",
        )
        .unwrap();
}

// ---------------------------------------------------------------------------
// Lifecycle transitions
// ---------------------------------------------------------------------------
#[test]
fn test_assignment_and_return_to_stock() {
    let store = InventoryStore::in_memory();
    store.register_equipment(laptop("NB1001"), "admin").unwrap();
    assign(&store, "NB1001");

    let eq = store.get_equipment("nb1001").unwrap();
    assert_eq!(eq.status, EquipmentStatus::Assigned);
    assert_eq!(eq.assignee_email.as_deref(), Some("ana@corp.example"));

    let eq = store
        .move_equipment("NB1001", MoveRequest::to(EquipmentStatus::Available), "admin")
        .unwrap();
    assert_eq!(eq.status, EquipmentStatus::Available);
    assert!(eq.assignee.is_none());

    let history = store.movements_for_tag("NB1001");
    assert_eq!(history.len(), 3);
    assert_eq!(store.available_with_history().len(), 1);
    assert!(store.new_equipment().is_empty());
}

#[test]
fn test_maintenance_returns_to_previous_assignee() {
    let store = InventoryStore::in_memory();
    store.register_equipment(laptop("NB1002"), "admin").unwrap();
    assign(&store, "NB1002");
    store
        .move_equipment(
            "NB1002",
            MoveRequest::to(EquipmentStatus::InMaintenance).with_note("keyboard"),
            "admin",
        )
        .unwrap();

    let eq = store
        .move_equipment("NB1002", MoveRequest::to(EquipmentStatus::Available), "admin")
        .unwrap();
    assert_eq!(eq.status, EquipmentStatus::Assigned);
    assert_eq!(eq.assignee.as_deref(), Some("Ana Diaz"));
    assert_eq!(
        store.movements_for_tag("NB1002")[0].action,
        "Maintenance completed"
    );
}

#[test]
fn test_vendor_return_path() {
    let store = InventoryStore::in_memory();
    store.register_equipment(laptop("NB1003"), "admin").unwrap();
    store
        .move_equipment(
            "NB1003",
            MoveRequest::to(EquipmentStatus::PendingVendorReturn).with_note("dead on arrival"),
            "manager1",
        )
        .unwrap();
    let eq = store
        .move_equipment("NB1003", MoveRequest::to(EquipmentStatus::ReturnedToVendor), "admin")
        .unwrap();
    assert_eq!(eq.return_reason.as_deref(), Some("dead on arrival"));
    assert!(eq.vendor_return_date.is_some());
    assert_eq!(store.returned_equipment().len(), 1);
    assert!(store.active_equipment().is_empty());

    let err = store
        .move_equipment("NB1003", MoveRequest::to(EquipmentStatus::Available), "admin")
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition { .. }));
}

#[test]
fn test_disallowed_transitions_from_available_are_rejected() {
    let from = EquipmentStatus::Available;
    for to in EquipmentStatus::ALL {
        if from.can_move_to(to) {
            continue;
        }
        let store = InventoryStore::in_memory();
        store.register_equipment(laptop("NB2000"), "admin").unwrap();
        let err = store
            .move_equipment("NB2000", MoveRequest::to(to), "admin")
            .unwrap_err();
        assert!(
            matches!(err, StoreError::InvalidTransition { .. }),
            "{:?} -> {:?}",
            from,
            to
        );
        assert_eq!(store.movements_for_tag("NB2000").len(), 1);
    }
}

#[test]
fn test_assignment_requires_valid_email() {
    let store = InventoryStore::in_memory();
    store.register_equipment(laptop("NB1004"), "admin").unwrap();
    let err = store
        .move_equipment(
            "NB1004",
            MoveRequest::to(EquipmentStatus::OnLoan).with_assignee("Ana", "not-an-email"),
            "admin",
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));
    assert_eq!(
        store.get_equipment("NB1004").unwrap().status,
        EquipmentStatus::Available
    );
}

#[test]
fn test_assignment_checks_active_domains() {
    let store = InventoryStore::in_memory();
    store.add_parameter(ParameterKind::EmailDomain, "corp.example").unwrap();
    store.register_equipment(laptop("NB1005"), "admin").unwrap();

    let err = store
        .move_equipment(
            "NB1005",
            MoveRequest::to(EquipmentStatus::Assigned).with_assignee("Eve", "eve@other.example"),
            "admin",
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));
    assign(&store, "NB1005");
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------
#[test]
fn test_registration_respects_brand_list() {
    let store = InventoryStore::in_memory();
    store.add_parameter(ParameterKind::Brand, "Dell").unwrap();
    let err = store.register_equipment(laptop("NB1006"), "admin").unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));

    store.add_parameter(ParameterKind::Brand, "Lenovo").unwrap();
    store.register_equipment(laptop("NB1006"), "admin").unwrap();
}

#[test]
fn test_parameter_in_use_cannot_be_removed() {
    let store = InventoryStore::in_memory();
    store.add_parameter(ParameterKind::EquipmentType, "Laptop").unwrap();
    store.register_equipment(laptop("NB1007"), "admin").unwrap();
    let err = store
        .remove_parameter(ParameterKind::EquipmentType, "Laptop")
        .unwrap_err();
    assert!(matches!(err, StoreError::InUse { .. }));
}

#[test]
fn test_duplicate_tag_rejected() {
    let store = InventoryStore::in_memory();
    store.register_equipment(laptop("NB1008"), "admin").unwrap();
    let err = store.register_equipment(laptop("nb1008"), "admin").unwrap_err();
    assert!(matches!(err, StoreError::Duplicate { .. }));
}

// ---------------------------------------------------------------------------
// Paging and counts
// ---------------------------------------------------------------------------
#[test]
fn test_active_page_puts_assigned_last() {
    let store = InventoryStore::in_memory();
    for i in 0..5 {
        store
            .register_equipment(laptop(&format!("NB30{:02}", i)), "admin")
            .unwrap();
    }
    assign(&store, "NB3000");

    let (first, total) = store.active_page(1, 3);
    assert_eq!(total, 5);
    assert_eq!(first.len(), 3);
    assert!(first.iter().all(|e| e.status == EquipmentStatus::Available));

    let (last, _) = store.active_page(2, 3);
    assert_eq!(last.len(), 2);
    assert_eq!(last.last().unwrap().tag, "NB3000");

    let counts = store.status_counts();
    assert_eq!(counts[&EquipmentStatus::Available], 4);
    assert_eq!(counts[&EquipmentStatus::Assigned], 1);
    assert_eq!(counts[&EquipmentStatus::Renewal], 0);
}

// ---------------------------------------------------------------------------
// Snapshot persistence
// ---------------------------------------------------------------------------
#[test]
fn test_snapshot_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    {
        let store = InventoryStore::open(dir.path()).unwrap();
        store
            .add_user("ana", "$argon2id$fake", Role::Manager, Some("Ana Diaz"), true)
            .unwrap();
        store.register_equipment(laptop("NB4000"), "ana").unwrap();
        assign(&store, "NB4000");
        store.log_system("Login", "terminal session", "ana");
        store.flush().unwrap();
    }
    assert!(dir.path().join(SNAPSHOT_FILE).exists());

    let store = InventoryStore::open(dir.path()).unwrap();
    let user = store.get_user("ana").unwrap();
    assert_eq!(user.role, Role::Manager);
    assert!(user.must_change_password);
    assert_eq!(
        store.get_equipment("NB4000").unwrap().status,
        EquipmentStatus::Assigned
    );
    assert_eq!(store.movements_for_tag("NB4000").len(), 2);
    assert_eq!(store.system_log().len(), 1);
}

#[test]
fn test_corrupt_snapshot_is_kept_aside() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join(SNAPSHOT_FILE), "{ not json").unwrap();
    let store = InventoryStore::open(dir.path()).unwrap();
    assert_eq!(store.user_count(), 0);
    assert!(store.all_equipment().is_empty());

    // The first save writes a fresh file next to the preserved one.
    store
        .add_parameter(ParameterKind::Brand, "Lenovo")
        .unwrap();
    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n == SNAPSHOT_FILE));
    assert!(names.iter().any(|n| n.starts_with("inventory.json.corrupt-")));
}

#[test]
fn test_failed_save_leaves_tables_unchanged() {
    let dir = tempfile::TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let store = InventoryStore::open(&data_dir).unwrap();
    store.register_equipment(laptop("LAP1"), "admin").unwrap();
    std::fs::remove_dir_all(&data_dir).unwrap();

    let err = store.register_equipment(laptop("LAP9"), "admin").unwrap_err();
    assert!(matches!(err, StoreError::Persistence(_)));
    assert!(store.get_equipment("LAP9").is_none());
    assert!(store.movements_for_tag("LAP9").is_empty());

    let err = store
        .move_equipment(
            "LAP1",
            MoveRequest::to(EquipmentStatus::Assigned).with_assignee("Ana Diaz", "ana@corp.example"),
            "admin",
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Persistence(_)));
    let eq = store.get_equipment("LAP1").unwrap();
    assert_eq!(eq.status, EquipmentStatus::Available);
    assert!(eq.assignee.is_none());
    assert_eq!(store.movements_for_tag("LAP1").len(), 1);

    assert!(store.add_parameter(ParameterKind::Brand, "HP").is_err());
    assert!(store.parameters(ParameterKind::Brand).is_empty());

    // Once the directory is back the same change goes through.
    std::fs::create_dir_all(&data_dir).unwrap();
    store.register_equipment(laptop("LAP9"), "admin").unwrap();
    assert!(store.get_equipment("LAP9").is_some());
}

#[test]
fn test_system_log_reaches_disk_on_flush() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = InventoryStore::open(dir.path()).unwrap();
    store.log_system("Login", "terminal session", "ana");
    assert!(store.has_unsaved_log());
    assert!(!dir.path().join(SNAPSHOT_FILE).exists());

    store.flush().unwrap();
    assert!(!store.has_unsaved_log());
    let reopened = InventoryStore::open(dir.path()).unwrap();
    assert_eq!(reopened.system_log().len(), 1);
}

#[test]
fn test_system_log_rides_along_with_next_change() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = InventoryStore::open(dir.path()).unwrap();
    store.log_system("Report export", "System log report", "ana");
    store.register_equipment(laptop("NB5000"), "ana").unwrap();
    assert!(!store.has_unsaved_log());

    let reopened = InventoryStore::open(dir.path()).unwrap();
    assert_eq!(reopened.system_log().len(), 1);
    assert!(reopened.get_equipment("NB5000").is_some());
}

#[test]
fn test_in_memory_store_never_has_unsaved_log() {
    let store = InventoryStore::in_memory();
    store.log_system("Login", "terminal session", "ana");
    assert!(!store.has_unsaved_log());
    store.flush().unwrap();
    assert_eq!(store.system_log().len(), 1);
}
