use crate::auth::password::MIN_PASSWORD_LENGTH;
use crate::auth::roles::{require, Permission};
use crate::store::models::ParameterKind;
use crate::terminal::session::Identity;
use crate::terminal::sink::Console;

use super::{render_export, render_table, FeatureContext, FeatureResult};

pub fn show_users(ctx: &FeatureContext, identity: &Identity, console: &mut dyn Console) -> FeatureResult {
    require(identity.role, Permission::ManageUsers)?;

    let users = ctx.store.users();
    console.blank();
    console.line(&format!("--- Users ({}) ---", users.len()));
    let rows: Vec<Vec<String>> = users
        .into_iter()
        .map(|u| {
            vec![
                u.username,
                u.full_name.unwrap_or_else(|| "-".to_string()),
                u.role.to_string(),
                if u.active { "Active" } else { "Locked" }.to_string(),
            ]
        })
        .collect();
    render_table(console, &[16, 28, 14, 8], &["USER", "FULL NAME", "ROLE", "STATUS"], &rows);
    console.line("  Accounts are created and locked with `invterm add-user` / `invterm set-user-active`.");
    Ok(())
}

pub fn show_configuration(
    ctx: &FeatureContext,
    identity: &Identity,
    console: &mut dyn Console,
) -> FeatureResult {
    require(identity.role, Permission::ConfigureSystem)?;

    console.blank();
    console.line("--- System configuration ---");
    for kind in ParameterKind::ALL {
        let params = ctx.store.parameters(kind);
        console.line(&format!("  {} ({}):", kind.label(), params.len()));
        if params.is_empty() {
            console.line("    (none, any value accepted)");
        }
        for p in params {
            let marker = if p.active { "[x]" } else { "[ ]" };
            console.line(&format!("    {} {}", marker, p.value));
        }
    }
    console.line("  Values are added with `invterm add-parameter`.");
    Ok(())
}

pub fn export_system_log(
    ctx: &FeatureContext,
    identity: &Identity,
    console: &mut dyn Console,
) -> FeatureResult {
    require(identity.role, Permission::ViewHistory)?;

    console.blank();
    console.line("--- System activity log ---");
    let result = ctx.reports.system_log(&ctx.store);
    if render_export(console, "System log report", result) {
        ctx.store
            .log_system("Report export", "System log report", &identity.username);
    }
    Ok(())
}

/// Password rules and how to get a new one. Open to every role.
pub fn change_password_help(
    _ctx: &FeatureContext,
    identity: &Identity,
    console: &mut dyn Console,
) -> FeatureResult {
    console.blank();
    console.line("--- Change password ---");
    console.line("  A new password must:");
    console.line(&format!("    - be at least {} characters long", MIN_PASSWORD_LENGTH));
    console.line("    - contain at least one letter");
    console.line("    - contain at least one digit");
    console.line(&format!(
        "  Ask an administrator to run `invterm set-password --username {}`.",
        identity.username
    ));
    Ok(())
}
