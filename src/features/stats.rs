use crate::store::models::EquipmentStatus;
use crate::terminal::session::Identity;
use crate::terminal::sink::Console;
use crate::utils::truncate_chars;

use super::{render_table, FeatureContext, FeatureResult};

const RECENT_MOVEMENTS: usize = 10;
const ACTION_WIDTH: usize = 28;

/// Inventory dashboard. Available to every role.
pub fn show(ctx: &FeatureContext, _identity: &Identity, console: &mut dyn Console) -> FeatureResult {
    let counts = ctx.store.status_counts();
    let count = |s: EquipmentStatus| counts.get(&s).copied().unwrap_or(0);

    let active: usize = counts
        .iter()
        .filter(|(s, _)| {
            !matches!(
                s,
                EquipmentStatus::ReturnedToVendor | EquipmentStatus::Renewal
            )
        })
        .map(|(_, n)| n)
        .sum();

    console.blank();
    console.line("--- Inventory statistics ---");
    console.line(&format!("  Active equipment: ............. {}", active));
    console.line(&format!(
        "  In renewal: ................... {}",
        count(EquipmentStatus::Renewal)
    ));
    console.line(&format!(
        "  Returned to vendor: ........... {}",
        count(EquipmentStatus::ReturnedToVendor)
    ));

    console.blank();
    console.line("--- Active equipment by status ---");
    for status in [
        EquipmentStatus::Available,
        EquipmentStatus::Assigned,
        EquipmentStatus::OnLoan,
    ] {
        console.line(&format!("  {:<30} {}", format!("{}:", status), count(status)));
    }

    console.blank();
    console.line("--- Pending processes ---");
    for status in [
        EquipmentStatus::InMaintenance,
        EquipmentStatus::PendingVendorReturn,
        EquipmentStatus::Renewal,
    ] {
        console.line(&format!("  {:<30} {}", format!("{}:", status), count(status)));
    }

    let recent = ctx.store.recent_movements(RECENT_MOVEMENTS);
    console.blank();
    console.line(&format!("--- Last {} inventory movements ---", recent.len()));
    if recent.is_empty() {
        console.line("  No movements recorded yet.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = recent
        .into_iter()
        .map(|m| {
            vec![
                m.timestamp.format("%d/%m/%Y %H:%M").to_string(),
                m.tag,
                truncate_chars(&m.action, ACTION_WIDTH),
                m.user,
            ]
        })
        .collect();
    render_table(console, &[18, 13, ACTION_WIDTH, 15], &["DATE", "TAG", "ACTION", "USER"], &rows);
    Ok(())
}
