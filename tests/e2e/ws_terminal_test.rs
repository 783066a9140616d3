#[allow(dead_code, unused_imports)]
mod helpers;

use futures_util::{SinkExt, StreamExt};
use helpers::*;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::Message;

// ---------------------------------------------------------------------------
// Test 1: a new connection gets the banner and the username prompt
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_connect_greets_with_username_prompt() {
    let server = start_server().await;
    let mut ws = connect(server.port).await;

    let (output, event) = read_until_control(&mut ws).await;
    assert!(output.contains("E2E inventory"));
    assert_eq!(event["event"], "request_input");
    assert_eq!(event["prompt"], "Username: ");
}

// ---------------------------------------------------------------------------
// Test 2: login, submenu round trip, logout closes the socket
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_login_navigate_logout() {
    let server = start_server().await;
    let mut ws = connect(server.port).await;
    read_until_control(&mut ws).await;

    send_line(&mut ws, "admin").await;
    let (_, event) = read_until_control(&mut ws).await;
    assert_eq!(event["prompt"], "Password: ");

    send_line(&mut ws, ADMIN_PASS).await;
    let (output, event) = read_until_control(&mut ws).await;
    assert!(output.contains("MAIN MENU"));
    assert!(output.contains("must be changed"));
    assert_eq!(event["prompt"], "Select an option: ");

    send_line(&mut ws, "4").await;
    let (output, _) = read_until_control(&mut ws).await;
    assert!(output.contains("ACCESS AND SYSTEM"));

    send_line(&mut ws, "5").await;
    let (output, _) = read_until_control(&mut ws).await;
    assert!(output.contains("MAIN MENU"));

    send_line(&mut ws, "5").await;
    let (output, event) = read_until_control(&mut ws).await;
    assert!(output.contains("Goodbye, admin"));
    assert_eq!(event["event"], "session_closed");
    assert_eq!(event["reason"], "logout");

    // The server closes the socket after the close event.
    let next = timeout(Duration::from_secs(5), ws.next()).await.unwrap();
    assert!(matches!(next, None | Some(Ok(Message::Close(_))) | Some(Err(_))));
}

// ---------------------------------------------------------------------------
// Test 3: three wrong passwords close the connection
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_lockout_closes_connection() {
    let server = start_server().await;
    let mut ws = connect(server.port).await;
    read_until_control(&mut ws).await;

    for attempt in 1..=3 {
        send_line(&mut ws, "viewer1").await;
        read_until_control(&mut ws).await;
        send_line(&mut ws, "wrong").await;
        let (output, event) = read_until_control(&mut ws).await;
        if attempt < 3 {
            assert!(output.contains(&format!("Attempt {} of 3", attempt)));
            assert_eq!(event["prompt"], "Username: ");
        } else {
            assert_eq!(event["event"], "session_closed");
        }
    }

    timeout(Duration::from_secs(5), async {
        while server.sessions.active_sessions() > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
}

// ---------------------------------------------------------------------------
// Test 4: bare text frames are accepted as input lines
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_bare_text_frame_is_a_line() {
    let server = start_server().await;
    let mut ws = connect(server.port).await;
    read_until_control(&mut ws).await;

    ws.send(Message::Text("viewer1".into())).await.unwrap();
    let (_, event) = read_until_control(&mut ws).await;
    assert_eq!(event["prompt"], "Password: ");
}

// ---------------------------------------------------------------------------
// Test 5: two clients keep separate sessions
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_two_clients_are_isolated() {
    let server = start_server().await;
    let mut a = connect(server.port).await;
    let mut b = connect(server.port).await;
    read_until_control(&mut a).await;
    read_until_control(&mut b).await;

    send_line(&mut a, "admin").await;
    read_until_control(&mut a).await;
    send_line(&mut a, ADMIN_PASS).await;
    let (output_a, _) = read_until_control(&mut a).await;
    assert!(output_a.contains("Welcome, admin"));

    // b is still at the username prompt.
    send_line(&mut b, "1").await;
    let (output_b, event_b) = read_until_control(&mut b).await;
    assert!(!output_b.contains("Welcome"));
    assert_eq!(event_b["prompt"], "Password: ");
    assert_eq!(server.sessions.active_sessions(), 2);
}

// ---------------------------------------------------------------------------
// Test 6: dropping the socket removes the session
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_disconnect_drops_session() {
    let server = start_server().await;
    let mut ws = connect(server.port).await;
    read_until_control(&mut ws).await;
    assert_eq!(server.sessions.active_sessions(), 1);

    ws.close(None).await.unwrap();
    timeout(Duration::from_secs(5), async {
        while server.sessions.active_sessions() > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
}

// ---------------------------------------------------------------------------
// Test 7: HTTP endpoints
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_http_probes_and_page() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let server = start_server().await;
    for (path, expect) in [
        ("/livez", "200 OK"),
        ("/readyz", "200 OK"),
        ("/terminal", "200 OK"),
        ("/metrics", "200 OK"),
        ("/api/status", "200 OK"),
        ("/", "308"),
        ("/api/nothing", "404"),
    ] {
        let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", server.port))
            .await
            .unwrap();
        let req = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(req.as_bytes()).await.unwrap();
        let mut resp = String::new();
        stream.read_to_string(&mut resp).await.unwrap();
        assert!(resp.starts_with(&format!("HTTP/1.1 {expect}")), "{path}: {resp}");
        if path == "/metrics" {
            assert!(resp.contains("invterm_sessions_active"));
        }
        if path == "/api/status" {
            assert!(resp.contains("\"active_sessions\""));
        }
        if path == "/api/nothing" {
            assert!(resp.contains("\"success\":false"));
            assert!(resp.contains("no route for /api/nothing"));
        }
    }
}
