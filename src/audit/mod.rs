//! Append-only JSON-lines trail of terminal connections and login outcomes.
//!
//! Records are queued to a background task so a slow disk never holds up a
//! terminal session. When the queue is full the record is dropped and
//! counted; login outcomes get one retry first.

pub mod events;

use events::{AuditEvent, AuditRecord};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, trace, warn};

const QUEUE_DEPTH: usize = 4096;

pub struct AuditLogger {
    queue: Option<mpsc::Sender<AuditRecord>>,
    dropped: AtomicU64,
}

impl AuditLogger {
    /// Start writing to `path`. Without a path the logger is disabled.
    /// Must be called inside a tokio runtime when a path is given.
    pub fn new(path: Option<PathBuf>) -> Self {
        let queue = path.map(|path| {
            let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
            tokio::spawn(write_trail(rx, path));
            tx
        });
        Self {
            queue,
            dropped: AtomicU64::new(0),
        }
    }

    /// A logger that discards everything.
    pub fn new_noop() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn log_session_opened(&self, session_id: &str, peer_ip: Option<String>) {
        self.record(session_id, AuditEvent::TerminalConnected { peer_ip });
    }

    pub fn log_auth_success(&self, session_id: &str, user: &str, role: &str) {
        self.record(
            session_id,
            AuditEvent::LoginAccepted {
                user: user.to_string(),
                role: role.to_string(),
            },
        );
    }

    pub fn log_auth_failure(&self, session_id: &str, user: &str, attempt: u32, reason: &str) {
        self.record(
            session_id,
            AuditEvent::LoginRefused {
                user: user.to_string(),
                attempt,
                reason: reason.to_string(),
            },
        );
    }

    pub fn log_auth_lockout(&self, session_id: &str, attempts: u32) {
        self.record(session_id, AuditEvent::LockedOut { attempts });
    }

    pub fn log_session_closed(
        &self,
        session_id: &str,
        user: Option<String>,
        duration_secs: u64,
        reason: &str,
    ) {
        self.record(
            session_id,
            AuditEvent::TerminalClosed {
                user,
                duration_secs,
                reason: reason.to_string(),
            },
        );
    }

    fn record(&self, session_id: &str, event: AuditEvent) {
        let Some(queue) = &self.queue else {
            return;
        };
        let retry = event.concerns_login();
        let record = AuditRecord::now(session_id, event);
        let record = match queue.try_send(record) {
            Ok(()) => return,
            Err(mpsc::error::TrySendError::Full(record)) if retry => record,
            Err(_) => return self.count_drop(),
        };
        match queue.try_reserve() {
            Ok(permit) => permit.send(record),
            Err(_) => self.count_drop(),
        }
    }

    fn count_drop(&self) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        if total == 1 || total % 500 == 0 {
            warn!(count = total, "Audit queue full, records dropped");
        }
    }
}

async fn open_trail(path: &Path) -> std::io::Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
}

async fn write_trail(mut rx: mpsc::Receiver<AuditRecord>, path: PathBuf) {
    let mut file = match open_trail(&path).await {
        Ok(file) => file,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Audit trail unavailable");
            // Discard records so the queue never fills.
            while rx.recv().await.is_some() {}
            return;
        }
    };

    while let Some(record) = rx.recv().await {
        let mut line = match serde_json::to_vec(&record) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, event = record.event.name(), "Audit record not serializable");
                continue;
            }
        };
        line.push(b'\n');
        trace!(event = record.event.name(), session_id = %record.session_id, "Audit");
        let written = async {
            file.write_all(&line).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            error!(path = %path.display(), error = %e, "Audit trail write failed");
        }
    }
}
