use tracing::{debug, info, warn};

use crate::context::AppContext;
use crate::features::{access, inventory, stats, visualization, FeatureHandler};
use crate::utils::format_duration;

use super::menus;
use super::session::{Identity, Session, State};
use super::sink::Console;

/// What the connection does after one line was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Ask for the next line with this prompt.
    Prompt(String),
    /// Close the connection.
    Close(String),
}

pub const REASON_LOGOUT: &str = "logout";
pub const REASON_LOCKOUT: &str = "too many failed login attempts";

/// Run the handler for the session's current state with `line`, move the
/// session to its next state and render that state's menu.
pub fn dispatch(
    ctx: &AppContext,
    session: &mut Session,
    line: &str,
    console: &mut dyn Console,
) -> Outcome {
    let next = match session.state.clone() {
        State::AwaitingUsername => on_username(session, line),
        State::AwaitingPassword => on_password(ctx, session, line, console),
        State::MainMenu => on_main_menu(ctx, session, line, console),
        State::AccessSubmenu => on_access_submenu(ctx, session, line, console),
        State::Unrecognized(name) => {
            warn!(
                session_id = %session.id,
                state = %name,
                "Unrecognized session state, resetting to login"
            );
            session.reset_to_login();
            Step::Stay
        }
    };

    if let Step::Close(reason) = next {
        return Outcome::Close(reason.to_string());
    }
    menus::render(&session.state, session.identity.as_ref(), console);
    Outcome::Prompt(menus::prompt(&session.state).to_string())
}

enum Step {
    Stay,
    Close(&'static str),
}

fn on_username(session: &mut Session, line: &str) -> Step {
    if !line.is_empty() {
        session.pending_username = Some(line.to_string());
        session.state = State::AwaitingPassword;
    }
    Step::Stay
}

fn on_password(ctx: &AppContext, session: &mut Session, line: &str, console: &mut dyn Console) -> Step {
    let username = session.pending_username.take().unwrap_or_default();
    let verified = ctx.auth.verify(&username, line);
    let active = verified.is_some() && ctx.auth.is_account_active(&username);
    let role = ctx.auth.get_role(&username);

    if let (Some(name), true, Some(role)) = (verified.clone(), active, role) {
        session.failed_logins = 0;
        session.identity = Some(Identity {
            username: name.clone(),
            role,
        });
        session.state = State::MainMenu;
        info!(session_id = %session.id, user = %name, role = %role, "Login success");
        ctx.audit.log_auth_success(&session.id, &name, &role.to_string());
        ctx.store.log_system("Login", "terminal session", &name);
        console.line(&format!("✅ Welcome, {} ({}).", name, role));
        if ctx.auth.must_change_password(&name) {
            console.line("⚠️  Your password must be changed. See option 4 > 4.");
        }
        return Step::Stay;
    }

    session.failed_logins += 1;
    let attempt = session.failed_logins;
    let max = ctx.config.limits.max_login_attempts;
    let reason = if verified.is_some() {
        console.line("❌ This account is locked. Contact an administrator.");
        "inactive_account"
    } else {
        console.line("❌ Invalid username or password.");
        "invalid_credentials"
    };
    warn!(
        session_id = %session.id,
        user = %username,
        attempt,
        reason,
        "Login failed"
    );
    ctx.metrics.record_login_failure(reason);
    ctx.audit
        .log_auth_failure(&session.id, &username, attempt, reason);

    if attempt >= max {
        warn!(
            session_id = %session.id,
            attempt,
            "Connection locked out after repeated failures"
        );
        ctx.metrics.record_lockout();
        ctx.audit.log_auth_lockout(&session.id, attempt);
        console.line("⛔ Too many failed attempts. Closing the connection.");
        session.reset_to_login();
        return Step::Close(REASON_LOCKOUT);
    }

    console.line(&format!("Attempt {} of {}.", attempt, max));
    session.reset_to_login();
    Step::Stay
}

fn on_main_menu(ctx: &AppContext, session: &mut Session, line: &str, console: &mut dyn Console) -> Step {
    let Some(identity) = session.identity.clone() else {
        return lost_identity(session);
    };
    match line {
        "1" => run(ctx, session, &identity, stats::show, console),
        "2" => run(ctx, session, &identity, inventory::show, console),
        "3" => run(ctx, session, &identity, visualization::show, console),
        "4" => session.state = State::AccessSubmenu,
        "5" => {
            console.line(&format!(
                "👋 Goodbye, {}! Session time: {}.",
                identity.username,
                format_duration(session.connected_at.elapsed().as_secs())
            ));
            info!(session_id = %session.id, user = %identity.username, "Logout");
            session.reset_to_login();
            return Step::Close(REASON_LOGOUT);
        }
        _ => console.line("❌ Invalid option."),
    }
    Step::Stay
}

fn on_access_submenu(
    ctx: &AppContext,
    session: &mut Session,
    line: &str,
    console: &mut dyn Console,
) -> Step {
    let Some(identity) = session.identity.clone() else {
        return lost_identity(session);
    };
    match line {
        "1" => run(ctx, session, &identity, access::show_users, console),
        "2" => run(ctx, session, &identity, access::show_configuration, console),
        "3" => run(ctx, session, &identity, access::export_system_log, console),
        "4" => run(ctx, session, &identity, access::change_password_help, console),
        "5" => session.state = State::MainMenu,
        _ => console.line("❌ Invalid option."),
    }
    Step::Stay
}

/// Invoke a feature handler. A permission denial is rendered and leaves
/// the state unchanged.
fn run(
    ctx: &AppContext,
    session: &Session,
    identity: &Identity,
    handler: FeatureHandler,
    console: &mut dyn Console,
) {
    if let Err(denied) = handler(&ctx.features, identity, console) {
        debug!(
            session_id = %session.id,
            user = %identity.username,
            role = %denied.role,
            permission = %denied.permission,
            "Permission denied"
        );
        ctx.metrics
            .record_permission_denied(&denied.role.to_string(), denied.permission.as_str());
        console.line("⛔ Permission denied: your role cannot use this option.");
    }
}

/// A menu state without an identity cannot be served; start over.
fn lost_identity(session: &mut Session) -> Step {
    warn!(
        session_id = %session.id,
        state = %session.state,
        "Menu state without identity, resetting to login"
    );
    session.reset_to_login();
    Step::Stay
}
