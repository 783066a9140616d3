use crate::auth::roles::{has_permission, Permission};
use crate::store::models::{Equipment, EquipmentStatus};
use crate::terminal::session::Identity;
use crate::terminal::sink::Console;

use super::{render_table, FeatureContext, FeatureResult};

/// Inventory management overview: the actions the role holds, the
/// equipment waiting for a first assignment and, for roles that manage
/// pending work, the pending-process breakdown.
pub fn show(ctx: &FeatureContext, identity: &Identity, console: &mut dyn Console) -> FeatureResult {
    let role = identity.role;
    let counts = ctx.store.status_counts();
    let count = |s: EquipmentStatus| counts.get(&s).copied().unwrap_or(0);
    let pending: usize = counts
        .iter()
        .filter(|(status, _)| status.is_pending())
        .map(|(_, n)| n)
        .sum();

    console.blank();
    console.line("--- Inventory management ---");
    let mut any = false;
    if has_permission(role, Permission::RegisterEquipment) {
        console.line("  - Register new equipment       (invterm register-equipment)");
        any = true;
    }
    if has_permission(role, Permission::ManageEquipment) {
        console.line("  - Assign, lend or move equipment (invterm move-equipment)");
        any = true;
    }
    if has_permission(role, Permission::ManagePending) {
        console.line(&format!(
            "  - Maintenance and vendor returns ({} pending)",
            pending
        ));
        any = true;
    }
    if !any {
        console.line("  Your role has read-only access to the inventory.");
    }

    let new = ctx.store.new_equipment();
    console.blank();
    console.line(&format!("--- New equipment ({}) ---", new.len()));
    render_equipment(console, &new);

    let reused = ctx.store.available_with_history();
    console.blank();
    console.line(&format!(
        "--- Available equipment with history ({}) ---",
        reused.len()
    ));
    render_equipment(console, &reused);

    if has_permission(role, Permission::ManagePending) {
        console.blank();
        console.line("--- Pending processes ---");
        console.line(&format!(
            "  1. In maintenance ({})",
            count(EquipmentStatus::InMaintenance)
        ));
        console.line(&format!(
            "  2. Pending vendor return ({})",
            count(EquipmentStatus::PendingVendorReturn)
        ));
        console.line(&format!(
            "  3. Pending renewal ({})",
            count(EquipmentStatus::Renewal)
        ));
    }
    Ok(())
}

fn render_equipment(console: &mut dyn Console, list: &[Equipment]) {
    if list.is_empty() {
        console.line("  None.");
        return;
    }
    let rows: Vec<Vec<String>> = list
        .iter()
        .map(|e| {
            vec![
                e.tag.clone(),
                e.kind.clone(),
                e.brand.clone(),
                e.model.clone(),
            ]
        })
        .collect();
    render_table(console, &[12, 15, 15, 20], &["TAG", "TYPE", "BRAND", "MODEL"], &rows);
}
