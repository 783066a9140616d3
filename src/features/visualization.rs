use crate::auth::roles::{has_permission, require, Permission};
use crate::terminal::session::Identity;
use crate::terminal::sink::Console;

use super::{render_export, render_table, FeatureContext, FeatureResult};

pub const PAGE_SIZE: usize = 20;
const USER_MOVEMENTS: usize = 20;

/// Inventory listing, the user's own recent movements and, with
/// `generate_report`, the standard exports.
pub fn show(ctx: &FeatureContext, identity: &Identity, console: &mut dyn Console) -> FeatureResult {
    require(identity.role, Permission::ViewInventory)?;

    let (page, total) = ctx.store.active_page(1, PAGE_SIZE);
    let pages = total.div_ceil(PAGE_SIZE).max(1);
    console.blank();
    console.line(&format!(
        "--- Active inventory (page 1 of {}, {} items) ---",
        pages, total
    ));
    if page.is_empty() {
        console.line("  No active equipment.");
    } else {
        let rows: Vec<Vec<String>> = page
            .into_iter()
            .map(|e| {
                vec![
                    e.tag,
                    e.kind,
                    e.status.label().to_string(),
                    e.assignee.unwrap_or_else(|| "-".to_string()),
                ]
            })
            .collect();
        render_table(console, &[12, 15, 22, 25], &["TAG", "TYPE", "STATUS", "ASSIGNEE"], &rows);
    }

    let mine = ctx.store.movements_by_user(&identity.username, USER_MOVEMENTS);
    console.blank();
    console.line(&format!("--- Your last {} movements ---", mine.len()));
    if mine.is_empty() {
        console.line("  You have not recorded any movements.");
    } else {
        let rows: Vec<Vec<String>> = mine
            .into_iter()
            .map(|m| {
                vec![
                    m.timestamp.format("%d/%m/%Y %H:%M").to_string(),
                    m.tag,
                    m.action,
                    m.details,
                ]
            })
            .collect();
        render_table(console, &[18, 12, 24, 40], &["DATE", "TAG", "ACTION", "DETAILS"], &rows);
    }

    if !has_permission(identity.role, Permission::GenerateReport) {
        return Ok(());
    }

    console.blank();
    console.line("--- Reports ---");
    let exports = [
        ("Active inventory report", ctx.reports.active_inventory(&ctx.store)),
        ("Returned-to-vendor report", ctx.reports.returned_to_vendor(&ctx.store)),
        ("Full history report", ctx.reports.full_history(&ctx.store)),
    ];
    for (label, result) in exports {
        if render_export(console, label, result) {
            ctx.store
                .log_system("Report export", label, &identity.username);
        }
    }
    Ok(())
}
