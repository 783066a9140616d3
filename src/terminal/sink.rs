use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tokio::sync::mpsc;

/// Events sent to the browser terminal, one JSON text frame each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    TerminalOutput { data: String },
    RequestInput { prompt: String },
    SessionClosed { reason: String },
}

fn ansi_regex() -> &'static Regex {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;:?]*[A-Za-z]").expect("ANSI pattern is valid"))
}

/// Remove ANSI CSI color/cursor sequences.
pub fn strip_ansi(text: &str) -> String {
    ansi_regex().replace_all(text, "").into_owned()
}

/// Render capability handed to menu and feature handlers.
pub trait Console {
    fn line(&mut self, text: &str);

    fn blank(&mut self) {
        self.line("");
    }
}

/// Collects lines in memory. Used by handler tests.
impl Console for Vec<String> {
    fn line(&mut self, text: &str) {
        self.push(text.to_string());
    }
}

/// Output target of exactly one session.
#[derive(Debug, Clone)]
pub struct OutputSink {
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl OutputSink {
    pub fn new(tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end, for callers that drain events themselves.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Forward `text` with ANSI escapes removed. Whitespace-only text is dropped.
    pub fn write(&self, text: &str) {
        let cleaned = strip_ansi(text);
        if cleaned.trim().is_empty() {
            return;
        }
        self.send(ServerEvent::TerminalOutput { data: cleaned });
    }

    /// Output is forwarded as soon as it is written.
    pub fn flush(&self) {}

    pub fn request_input(&self, prompt: &str) {
        self.send(ServerEvent::RequestInput {
            prompt: prompt.to_string(),
        });
    }

    pub fn close(&self, reason: &str) {
        self.send(ServerEvent::SessionClosed {
            reason: reason.to_string(),
        });
    }

    /// Buffer everything rendered until the returned guard is dropped.
    pub fn bind(&self) -> BoundConsole {
        BoundConsole {
            sink: self.clone(),
            buffer: String::new(),
        }
    }

    fn send(&self, event: ServerEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Terminal client already gone, output discarded");
        }
    }
}

/// Console scoped to one inbound message of one session. Dropping it
/// forwards the buffered text through [`OutputSink::write`].
#[derive(Debug)]
pub struct BoundConsole {
    sink: OutputSink,
    buffer: String,
}

impl Console for BoundConsole {
    fn line(&mut self, text: &str) {
        self.buffer.push_str(text);
        self.buffer.push('\n');
    }
}

impl Drop for BoundConsole {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            self.sink.write(&self.buffer);
            self.sink.flush();
        }
    }
}
