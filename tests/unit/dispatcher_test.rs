mod test_support;

use invterm::auth::roles::Role;
use invterm::store::models::{EquipmentStatus, MoveRequest, NewEquipment};
use invterm::terminal::dispatcher::{dispatch, REASON_LOCKOUT};
use invterm::terminal::menus::{MENU_PROMPT, PASSWORD_PROMPT, USERNAME_PROMPT};
use invterm::terminal::{Identity, OutputSink, Outcome, Session, State};
use proptest::prelude::*;
use test_support::*;

fn new_session() -> Session {
    let (sink, _rx) = OutputSink::channel();
    Session::new("test0001".to_string(), sink, None)
}

fn logged_in(username: &str, role: Role) -> Session {
    let mut session = new_session();
    session.identity = Some(Identity {
        username: username.to_string(),
        role,
    });
    session.state = State::MainMenu;
    session
}

fn register(ctx: &invterm::context::AppContext, tag: &str) {
    ctx.store
        .register_equipment(
            NewEquipment {
                tag: tag.to_string(),
                kind: "Laptop".to_string(),
                brand: "Dell".to_string(),
                model: "Latitude 5440".to_string(),
                serial: format!("SN-{}", tag),
                notes: None,
            },
            "admin",
        )
        .unwrap();
}

#[test]
fn test_empty_username_reprompts() {
    let dir = tempfile::TempDir::new().unwrap();
    let ctx = test_context(dir.path());
    let mut session = new_session();
    let mut out: Vec<String> = Vec::new();

    let outcome = dispatch(&ctx, &mut session, "", &mut out);
    assert_eq!(outcome, Outcome::Prompt(USERNAME_PROMPT.to_string()));
    assert_eq!(session.state, State::AwaitingUsername);
    assert!(session.pending_username.is_none());
}

#[test]
fn test_username_moves_to_password() {
    let dir = tempfile::TempDir::new().unwrap();
    let ctx = test_context(dir.path());
    let mut session = new_session();
    let mut out: Vec<String> = Vec::new();

    let outcome = dispatch(&ctx, &mut session, "admin", &mut out);
    assert_eq!(outcome, Outcome::Prompt(PASSWORD_PROMPT.to_string()));
    assert_eq!(session.pending_username.as_deref(), Some("admin"));
}

#[test]
fn test_login_records_system_log() {
    let dir = tempfile::TempDir::new().unwrap();
    let ctx = test_context(dir.path());
    let mut session = new_session();
    let mut out: Vec<String> = Vec::new();

    dispatch(&ctx, &mut session, "manager1", &mut out);
    let outcome = dispatch(&ctx, &mut session, MANAGER_PASS, &mut out);
    assert_eq!(outcome, Outcome::Prompt(MENU_PROMPT.to_string()));
    assert_eq!(
        session.identity,
        Some(Identity {
            username: "manager1".to_string(),
            role: Role::Manager
        })
    );
    let log = ctx.store.system_log();
    assert_eq!(log[0].action, "Login");
    assert_eq!(log[0].user, "manager1");
}

#[test]
fn test_must_change_password_warning() {
    let dir = tempfile::TempDir::new().unwrap();
    let ctx = test_context(dir.path());
    ctx.store
        .set_password_hash("viewer1", &fast_hash(VIEWER_PASS), true)
        .unwrap();
    let mut session = new_session();
    let mut out: Vec<String> = Vec::new();

    dispatch(&ctx, &mut session, "viewer1", &mut out);
    dispatch(&ctx, &mut session, VIEWER_PASS, &mut out);
    assert!(out.iter().any(|l| l.contains("must be changed")));
}

#[test]
fn test_lockout_threshold_follows_config() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.limits.max_login_attempts = 1;
    let ctx = test_context_with(config);
    let mut session = new_session();
    let mut out: Vec<String> = Vec::new();

    dispatch(&ctx, &mut session, "admin", &mut out);
    let outcome = dispatch(&ctx, &mut session, "bad", &mut out);
    assert_eq!(outcome, Outcome::Close(REASON_LOCKOUT.to_string()));
    assert_eq!(session.state, State::AwaitingUsername);
}

#[test]
fn test_invalid_main_menu_option() {
    let dir = tempfile::TempDir::new().unwrap();
    let ctx = test_context(dir.path());
    let mut session = logged_in("admin", Role::Administrator);
    let mut out: Vec<String> = Vec::new();

    let outcome = dispatch(&ctx, &mut session, "42", &mut out);
    assert_eq!(outcome, Outcome::Prompt(MENU_PROMPT.to_string()));
    assert_eq!(session.state, State::MainMenu);
    assert!(out.iter().any(|l| l.contains("Invalid option")));
    assert!(out.iter().any(|l| l.contains("MAIN MENU")));
}

#[test]
fn test_statistics_reflect_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let ctx = test_context(dir.path());
    register(&ctx, "PC0001");
    register(&ctx, "PC0002");
    ctx.store
        .move_equipment(
            "PC0002",
            MoveRequest::to(EquipmentStatus::Assigned).with_assignee("Ana", "ana@example.com"),
            "admin",
        )
        .unwrap();
    let mut session = logged_in("viewer1", Role::Viewer);
    let mut out: Vec<String> = Vec::new();

    dispatch(&ctx, &mut session, "1", &mut out);
    let text = out.join("\n");
    assert!(text.contains("Active equipment: ............. 2"));
    assert!(text.contains("PC0002"));
    assert_eq!(session.state, State::MainMenu);
}

#[test]
fn test_visualization_exports_reports() {
    let dir = tempfile::TempDir::new().unwrap();
    let ctx = test_context(dir.path());
    register(&ctx, "PC0001");
    let mut session = logged_in("manager1", Role::Manager);
    let mut out: Vec<String> = Vec::new();

    dispatch(&ctx, &mut session, "3", &mut out);
    let xlsx_count = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "xlsx"))
        .count();
    assert!(xlsx_count >= 1);
    assert!(ctx
        .store
        .system_log()
        .iter()
        .any(|e| e.action == "Report export"));
}

#[test]
fn test_access_submenu_back_renders_main_menu() {
    let dir = tempfile::TempDir::new().unwrap();
    let ctx = test_context(dir.path());
    let mut session = logged_in("admin", Role::Administrator);
    session.state = State::AccessSubmenu;
    let mut out: Vec<String> = Vec::new();

    dispatch(&ctx, &mut session, "5", &mut out);
    assert_eq!(session.state, State::MainMenu);
    assert!(out.iter().any(|l| l.contains("MAIN MENU")));
}

#[test]
fn test_menu_state_without_identity_resets() {
    let dir = tempfile::TempDir::new().unwrap();
    let ctx = test_context(dir.path());
    let mut session = new_session();
    session.state = State::AccessSubmenu;
    let mut out: Vec<String> = Vec::new();

    let outcome = dispatch(&ctx, &mut session, "1", &mut out);
    assert_eq!(outcome, Outcome::Prompt(USERNAME_PROMPT.to_string()));
    assert_eq!(session.state, State::AwaitingUsername);
}

fn any_state() -> impl Strategy<Value = State> {
    prop_oneof![
        Just(State::MainMenu),
        Just(State::AccessSubmenu),
        Just(State::AwaitingUsername),
        "[a-z_]{1,12}".prop_map(|s| State::from_name(&s)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn dispatch_is_total(state in any_state(), line in "[0-9a-z ]{0,6}") {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = test_context(dir.path());
        let mut session = logged_in("admin", Role::Administrator);
        session.state = state;
        let mut out: Vec<String> = Vec::new();

        match dispatch(&ctx, &mut session, &line, &mut out) {
            Outcome::Prompt(p) => {
                prop_assert!([USERNAME_PROMPT, PASSWORD_PROMPT, MENU_PROMPT].contains(&p.as_str()));
                prop_assert!(!matches!(session.state, State::Unrecognized(_)));
            }
            Outcome::Close(_) => prop_assert_eq!(session.state, State::AwaitingUsername),
        }
    }
}
