use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::context::AppContext;
use crate::utils::{clamp_line, new_session_id};

use super::dispatcher::{self, Outcome};
use super::menus;
use super::session::{Session, State};
use super::sink::OutputSink;

pub const REASON_CLIENT_GONE: &str = "client disconnected";

/// One live session. `closed` is set when the session leaves the map so a
/// message already waiting on the lock runs no handler.
struct SessionSlot {
    closed: AtomicBool,
    session: Mutex<Session>,
}

/// Owns every live terminal session and serializes the messages of each one.
pub struct SessionManager {
    ctx: Arc<AppContext>,
    sessions: DashMap<String, Arc<SessionSlot>>,
}

impl SessionManager {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            sessions: DashMap::new(),
        }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Open a session on `sink`, greet the client and ask for the username.
    pub fn connect(&self, sink: OutputSink, peer: Option<SocketAddr>) -> String {
        let id = loop {
            let candidate = new_session_id();
            if !self.sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        {
            let mut console = sink.bind();
            menus::render_banner(&self.ctx.config.server.banner, &mut console);
        }
        sink.request_input(menus::prompt(&State::AwaitingUsername));

        let session = Session::new(id.clone(), sink, peer);
        self.sessions.insert(
            id.clone(),
            Arc::new(SessionSlot {
                closed: AtomicBool::new(false),
                session: Mutex::new(session),
            }),
        );

        self.ctx.metrics.record_session_opened();
        self.ctx
            .audit
            .log_session_opened(&id, peer.map(|p| p.ip().to_string()));
        info!(session_id = %id, peer = ?peer, "Terminal session opened");
        id
    }

    /// Process one input line. Returns `None` when the session is gone.
    pub async fn handle_line(&self, id: &str, line: &str) -> Option<Outcome> {
        let Some(slot) = self.sessions.get(id).map(|entry| entry.value().clone()) else {
            debug!(session_id = %id, "Input for unknown session ignored");
            return None;
        };
        let mut session = slot.session.lock().await;
        if slot.closed.load(Ordering::Acquire) {
            debug!(session_id = %id, "Input raced session teardown, ignored");
            return None;
        }

        let line = clamp_line(line.trim(), self.ctx.config.limits.max_line_length);
        self.ctx.metrics.record_message(session.state.name());

        let sink = session.sink().clone();
        let user = session.username().map(str::to_string);
        let outcome = {
            let mut console = sink.bind();
            dispatcher::dispatch(&self.ctx, &mut session, line, &mut console)
        };

        match &outcome {
            Outcome::Prompt(prompt) => sink.request_input(prompt),
            Outcome::Close(reason) => {
                sink.close(reason);
                if self.sessions.remove(id).is_some() {
                    slot.closed.store(true, Ordering::Release);
                    self.finish(&session, user, reason);
                }
            }
        }
        Some(outcome)
    }

    /// Drop the session of a connection that went away.
    pub async fn disconnect(&self, id: &str) {
        let Some((_, slot)) = self.sessions.remove(id) else {
            return;
        };
        slot.closed.store(true, Ordering::Release);
        let session = slot.session.lock().await;
        let user = session.username().map(str::to_string);
        self.finish(&session, user, REASON_CLIENT_GONE);
    }

    /// Run `f` on a live session. Used by the HTTP layer and tests.
    pub async fn with_session<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let slot = self.sessions.get(id).map(|entry| entry.value().clone())?;
        let mut session = slot.session.lock().await;
        if slot.closed.load(Ordering::Acquire) {
            return None;
        }
        Some(f(&mut session))
    }

    fn finish(&self, session: &Session, user: Option<String>, reason: &str) {
        let duration = session.connected_at.elapsed();
        self.ctx
            .metrics
            .record_session_closed(session.state.name(), duration.as_secs_f64());
        self.ctx.audit.log_session_closed(
            &session.id,
            user,
            duration.as_secs(),
            reason,
        );
        info!(
            session_id = %session.id,
            reason,
            duration_ms = duration.as_millis() as u64,
            "Terminal session closed"
        );
    }
}
