use std::fmt;
use std::io::IsTerminal;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::config::types::LogFormat;

/// Access decision carried by a log message, shown as a bracketed tag in
/// front of the line so refused logins stand out when tailing the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    fn classify(message: &str) -> Option<Verdict> {
        const DENY: &[&str] = &["denied", "login failed", "locked out", "inactive account"];
        let lower = message.to_lowercase();
        if DENY.iter().any(|needle| lower.contains(needle)) {
            Some(Verdict::Deny)
        } else if lower.contains("login success") {
            Some(Verdict::Allow)
        } else {
            None
        }
    }

    fn tag(self, ansi: bool) -> &'static str {
        match (self, ansi) {
            (Verdict::Allow, true) => "\x1b[34m[ALLOW]\x1b[0m ",
            (Verdict::Allow, false) => "[ALLOW] ",
            (Verdict::Deny, true) => "\x1b[31m[DENY]\x1b[0m ",
            (Verdict::Deny, false) => "[DENY] ",
        }
    }
}

/// Event formatter for the pretty log format: adds the [`Verdict`] tag and,
/// on a terminal, colors the field names the terminal sessions log with.
pub struct PrefixedFormatter<E> {
    inner: E,
    ansi: bool,
}

impl<E> PrefixedFormatter<E> {
    pub fn new(inner: E, ansi: bool) -> Self {
        Self { inner, ansi }
    }
}

impl<S, N, E> FormatEvent<S, N> for PrefixedFormatter<E>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    E: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut message = MessageText::default();
        event.record(&mut message);
        if let Some(verdict) = Verdict::classify(&message.0) {
            writer.write_str(verdict.tag(self.ansi))?;
        }

        if !self.ansi {
            return self.inner.format_event(ctx, writer, event);
        }
        let mut line = String::new();
        self.inner.format_event(ctx, Writer::new(&mut line), event)?;
        writer.write_str(&colorize_fields(&line))
    }
}

#[derive(Default)]
struct MessageText(String);

impl Visit for MessageText {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

/// ANSI color for a structured field: cyan for who, yellow for what,
/// magenta for where from.
fn field_color(name: &str) -> Option<&'static str> {
    match name {
        "user" | "role" => Some("36"),
        "state" | "tag" | "status" | "menu" => Some("33"),
        "peer" => Some("35"),
        "session_id" => Some("2"),
        "attempt" | "duration_ms" | "count" => Some("32"),
        "error" | "reason" => Some("31"),
        _ => None,
    }
}

/// Color the `name=` part of every `name=value` token whose name is known
/// to [`field_color`]. Tokens are split on spaces, so a field name appearing
/// inside a quoted message is left alone unless it starts a token.
fn colorize_fields(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + 32);
    for token in line.split_inclusive(' ') {
        let colored = token
            .split_once('=')
            .and_then(|(name, rest)| field_color(name).map(|code| (name, code, rest)));
        match colored {
            Some((name, code, rest)) => {
                out.push_str("\x1b[");
                out.push_str(code);
                out.push('m');
                out.push_str(name);
                out.push_str("=\x1b[0m");
                out.push_str(rest);
            }
            None => out.push_str(token),
        }
    }
    out
}

/// Install the global subscriber. An unparsable level falls back to `info`.
pub fn setup_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => {
            let ansi = std::io::stdout().is_terminal();
            builder
                .with_ansi(ansi)
                .event_format(PrefixedFormatter::new(
                    tracing_subscriber::fmt::format::Format::default(),
                    ansi,
                ))
                .init()
        }
    }
}
