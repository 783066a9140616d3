//! Business screens reached from the terminal menus. Each handler renders
//! into the session console and never touches session state.

pub mod access;
pub mod inventory;
pub mod stats;
pub mod visualization;

use std::sync::Arc;

use crate::auth::roles::PermissionDenied;
use crate::reports::ReportWriter;
use crate::store::InventoryStore;
use crate::terminal::session::Identity;
use crate::terminal::sink::Console;

/// What feature handlers may use.
#[derive(Debug, Clone)]
pub struct FeatureContext {
    pub store: Arc<InventoryStore>,
    pub reports: ReportWriter,
}

impl FeatureContext {
    pub fn new(store: Arc<InventoryStore>, reports: ReportWriter) -> Self {
        Self { store, reports }
    }
}

/// Gated handlers return `Err` before rendering anything when the role
/// lacks the permission.
pub type FeatureResult = Result<(), PermissionDenied>;

pub type FeatureHandler = fn(&FeatureContext, &Identity, &mut dyn Console) -> FeatureResult;

/// Render a fixed-width table with a dashed rule under the header.
pub(crate) fn render_table(
    console: &mut dyn Console,
    widths: &[usize],
    header: &[&str],
    rows: &[Vec<String>],
) {
    console.line(&table_row(widths, header.iter().copied()));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    console.line(&table_row(widths, rule.iter().map(String::as_str)));
    for row in rows {
        console.line(&table_row(widths, row.iter().map(String::as_str)));
    }
}

fn table_row<'a>(widths: &[usize], cells: impl Iterator<Item = &'a str>) -> String {
    let mut line = String::from(" ");
    for (cell, width) in cells.zip(widths.iter()) {
        line.push_str(&format!(" {:<width$}", cell, width = *width));
    }
    line.trim_end().to_string()
}

/// Render an export result: the file path, the empty-data notice or the error.
pub(crate) fn render_export(
    console: &mut dyn Console,
    label: &str,
    result: Result<std::path::PathBuf, crate::reports::ReportError>,
) -> bool {
    match result {
        Ok(path) => {
            console.line(&format!("✅ {} exported to {}", label, path.display()));
            true
        }
        Err(crate::reports::ReportError::NoData(_)) => {
            console.line(&format!("ℹ️  {}: no data to export.", label));
            false
        }
        Err(e) => {
            tracing::error!(error = %e, "Report export failed");
            console.line(&format!("❌ {} could not be exported: {}", label, e));
            false
        }
    }
}
