use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use crate::auth::roles::Role;

use super::sink::OutputSink;

/// Position of a session in the menu flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    AwaitingUsername,
    AwaitingPassword,
    MainMenu,
    AccessSubmenu,
    /// A state name this build cannot route. Reset to login on the next line.
    Unrecognized(String),
}

impl State {
    pub fn name(&self) -> &str {
        match self {
            State::AwaitingUsername => "awaiting_username",
            State::AwaitingPassword => "awaiting_password",
            State::MainMenu => "main_menu",
            State::AccessSubmenu => "access_submenu",
            State::Unrecognized(name) => name,
        }
    }

    pub fn from_name(name: &str) -> State {
        match name {
            "awaiting_username" => State::AwaitingUsername,
            "awaiting_password" => State::AwaitingPassword,
            "main_menu" => State::MainMenu,
            "access_submenu" => State::AccessSubmenu,
            other => State::Unrecognized(other.to_string()),
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Authenticated user of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub role: Role,
}

/// Per-connection state. Never persisted.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub state: State,
    pub pending_username: Option<String>,
    pub identity: Option<Identity>,
    pub failed_logins: u32,
    pub connected_at: Instant,
    pub peer: Option<SocketAddr>,
    sink: OutputSink,
}

impl Session {
    pub fn new(id: String, sink: OutputSink, peer: Option<SocketAddr>) -> Self {
        Self {
            id,
            state: State::AwaitingUsername,
            pending_username: None,
            identity: None,
            failed_logins: 0,
            connected_at: Instant::now(),
            peer,
            sink,
        }
    }

    pub fn sink(&self) -> &OutputSink {
        &self.sink
    }

    pub fn username(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.username.as_str())
    }

    /// Forget who is logged in and go back to the username prompt.
    /// The failed-login counter is left alone.
    pub fn reset_to_login(&mut self) {
        self.state = State::AwaitingUsername;
        self.pending_username = None;
        self.identity = None;
    }
}
