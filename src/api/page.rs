use axum::{http::StatusCode, response::IntoResponse};

const TERMINAL_PAGE: &str = include_str!("../../assets/terminal.html");

/// Inline style and script are pinned by hash; editing either means
/// updating the matching hash here.
const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self' 'sha256-FFMXV/8CGD5rCSEB9YrTVBRkIyIsSeWST2MJzqsgnGk='; style-src 'self' 'sha256-cOjyMKq630zO2tt/McLyWvJ990bYWiX5UTAkKx4geW0='; connect-src 'self' ws: wss:";

/// The browser terminal.
pub async fn serve_terminal() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            ("content-type", "text/html; charset=utf-8"),
            ("content-security-policy", CONTENT_SECURITY_POLICY),
            ("x-frame-options", "DENY"),
            ("x-content-type-options", "nosniff"),
        ],
        TERMINAL_PAGE,
    )
}
