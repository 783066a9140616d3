use invterm::api::{self, AppState};
use invterm::auth::password;
use invterm::auth::roles::Role;
use invterm::config::types::AppConfig;
use invterm::server::build_context;
use invterm::terminal::SessionManager;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const ADMIN_PASS: &str = "adminpass1";
pub const VIEWER_PASS: &str = "viewerpass1";

/// Argon2 with minimal cost so tests stay fast.
pub fn fast_hash(pw: &str) -> String {
    password::hash_password_with_params(pw, 1024, 1, 1).unwrap()
}

/// Holds references to a running terminal server
pub struct TestServer {
    pub port: u16,
    pub sessions: Arc<SessionManager>,
    pub shutdown: CancellationToken,
    pub _reports: tempfile::TempDir,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Start a server on an OS-assigned port with `admin` and `viewer1` accounts.
pub async fn start_server() -> TestServer {
    let reports = tempfile::TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.server.banner = "E2E inventory".to_string();
    config.reports.output_dir = reports.path().to_path_buf();
    config.bootstrap.admin_password = None;
    config.bootstrap.admin_password_hash = Some(fast_hash(ADMIN_PASS));

    let ctx = build_context(config).unwrap();
    ctx.store
        .add_user("viewer1", &fast_hash(VIEWER_PASS), Role::Viewer, None, false)
        .unwrap();
    let sessions = Arc::new(SessionManager::new(ctx));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let shutdown = CancellationToken::new();
    tokio::spawn(api::start_api_server_on_listener(
        listener,
        AppState::new(sessions.clone()),
        shutdown.clone(),
    ));

    TestServer {
        port,
        sessions,
        shutdown,
        _reports: reports,
    }
}

pub async fn connect(port: u16) -> Client {
    let (ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws"))
        .await
        .unwrap();
    ws
}

pub async fn send_line(ws: &mut Client, line: &str) {
    let frame = serde_json::json!({ "event": "terminal_input", "data": line });
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

/// Read events until the next prompt or close. Returns the collected
/// terminal output and the final event.
pub async fn read_until_control(ws: &mut Client) -> (String, Value) {
    let mut output = String::new();
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for server event")
            .expect("connection ended before a prompt")
            .unwrap();
        let Message::Text(text) = msg else {
            continue;
        };
        let event: Value = serde_json::from_str(text.as_str()).unwrap();
        match event["event"].as_str() {
            Some("terminal_output") => output.push_str(event["data"].as_str().unwrap_or_default()),
            Some("request_input") | Some("session_closed") => return (output, event),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
