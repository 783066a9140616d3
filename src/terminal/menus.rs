use crate::auth::roles::{has_permission, Permission};

use super::session::{Identity, State};
use super::sink::Console;

pub const USERNAME_PROMPT: &str = "Username: ";
pub const PASSWORD_PROMPT: &str = "Password: ";
pub const MENU_PROMPT: &str = "Select an option: ";

const RULE: &str = "==================================================";

/// Prompt of the single pending input request for a state.
pub fn prompt(state: &State) -> &'static str {
    match state {
        State::AwaitingUsername | State::Unrecognized(_) => USERNAME_PROMPT,
        State::AwaitingPassword => PASSWORD_PROMPT,
        State::MainMenu | State::AccessSubmenu => MENU_PROMPT,
    }
}

pub fn render_banner(banner: &str, console: &mut dyn Console) {
    console.line(RULE);
    console.line(&format!("  {}", banner));
    console.line(RULE);
    console.line("Log in to continue.");
}

/// Menu text of `state`. Login states have no menu beyond their prompt.
pub fn render(state: &State, identity: Option<&Identity>, console: &mut dyn Console) {
    match (state, identity) {
        (State::MainMenu, Some(id)) => render_main_menu(id, console),
        (State::AccessSubmenu, Some(id)) => render_access_submenu(id, console),
        _ => {}
    }
}

/// (option, label, required permission)
type MenuEntry = (&'static str, &'static str, Option<Permission>);

const MAIN_MENU: &[MenuEntry] = &[
    ("1", "Statistics", None),
    ("2", "Inventory management", None),
    ("3", "Inventory view and reports", Some(Permission::ViewInventory)),
    ("4", "Access and system", None),
    ("5", "Log out", None),
];

const ACCESS_SUBMENU: &[MenuEntry] = &[
    ("1", "User management", Some(Permission::ManageUsers)),
    ("2", "System configuration", Some(Permission::ConfigureSystem)),
    ("3", "Export system activity log", Some(Permission::ViewHistory)),
    ("4", "Change password", None),
    ("5", "Back to main menu", None),
];

fn render_entries(title: &str, id: &Identity, entries: &[MenuEntry], console: &mut dyn Console) {
    console.blank();
    console.line(&format!("--- {} --- [{} | {}]", title, id.username, id.role));
    for (option, label, perm) in entries {
        if perm.map_or(true, |p| has_permission(id.role, p)) {
            console.line(&format!("  {}. {}", option, label));
        }
    }
}

fn render_main_menu(id: &Identity, console: &mut dyn Console) {
    render_entries("MAIN MENU", id, MAIN_MENU, console);
}

fn render_access_submenu(id: &Identity, console: &mut dyn Console) {
    render_entries("ACCESS AND SYSTEM", id, ACCESS_SUBMENU, console);
}
