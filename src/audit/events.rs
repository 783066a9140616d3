use chrono::{DateTime, Utc};
use serde::Serialize;

/// One line of the audit trail: when, which terminal session, what happened.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub at: DateTime<Utc>,
    pub session_id: String,
    #[serde(flatten)]
    pub event: AuditEvent,
}

impl AuditRecord {
    pub fn now(session_id: &str, event: AuditEvent) -> Self {
        Self {
            at: Utc::now(),
            session_id: session_id.to_string(),
            event,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    TerminalConnected {
        #[serde(skip_serializing_if = "Option::is_none")]
        peer_ip: Option<String>,
    },
    LoginAccepted {
        user: String,
        role: String,
    },
    LoginRefused {
        user: String,
        attempt: u32,
        reason: String,
    },
    LockedOut {
        attempts: u32,
    },
    TerminalClosed {
        #[serde(skip_serializing_if = "Option::is_none")]
        user: Option<String>,
        duration_secs: u64,
        reason: String,
    },
}

impl AuditEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuditEvent::TerminalConnected { .. } => "terminal_connected",
            AuditEvent::LoginAccepted { .. } => "login_accepted",
            AuditEvent::LoginRefused { .. } => "login_refused",
            AuditEvent::LockedOut { .. } => "locked_out",
            AuditEvent::TerminalClosed { .. } => "terminal_closed",
        }
    }

    /// Login outcomes get a second try when the writer queue is full.
    pub fn concerns_login(&self) -> bool {
        matches!(
            self,
            AuditEvent::LoginAccepted { .. }
                | AuditEvent::LoginRefused { .. }
                | AuditEvent::LockedOut { .. }
        )
    }
}
