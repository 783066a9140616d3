use invterm::terminal::sink::strip_ansi;
use invterm::terminal::{Console, OutputSink, ServerEvent};
use proptest::prelude::*;

proptest! {
    #[test]
    fn strip_ansi_never_panics(s in "\\PC{0,200}") {
        let _ = strip_ansi(&s);
    }

    #[test]
    fn strip_ansi_leaves_plain_text_alone(s in "[a-zA-Z0-9 .,:!?-]{0,120}") {
        prop_assert_eq!(strip_ansi(&s), s);
    }

    #[test]
    fn strip_ansi_removes_color_codes(s in "[a-zA-Z0-9 ]{0,60}", code in 0u8..108) {
        let colored = format!("\x1b[{}m{}\x1b[0m", code, s);
        prop_assert_eq!(strip_ansi(&colored), s);
    }

    #[test]
    fn strip_ansi_removes_colon_color_codes(s in "[a-zA-Z0-9 ]{0,60}", idx in 0u16..256) {
        let colored = format!("\x1b[38:5:{}m{}\x1b[0m", idx, s);
        prop_assert_eq!(strip_ansi(&colored), s);
    }

    #[test]
    fn bound_console_emits_at_most_one_output(lines in proptest::collection::vec("[a-z ]{0,20}", 0..10)) {
        let (sink, mut rx) = OutputSink::channel();
        {
            let mut console = sink.bind();
            for line in &lines {
                console.line(line);
            }
        }
        let mut outputs = 0;
        while let Ok(event) = rx.try_recv() {
            let is_output = matches!(event, ServerEvent::TerminalOutput { .. });
            prop_assert!(is_output);
            outputs += 1;
        }
        prop_assert!(outputs <= 1);
    }
}

#[test]
fn test_output_event_json_shape() {
    let event = ServerEvent::TerminalOutput {
        data: "hello\n".to_string(),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "terminal_output");
    assert_eq!(json["data"], "hello\n");

    let event = ServerEvent::RequestInput {
        prompt: "Username: ".to_string(),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "request_input");
    assert_eq!(json["prompt"], "Username: ");
}

#[test]
fn test_write_after_client_gone_is_silent() {
    let (sink, rx) = OutputSink::channel();
    drop(rx);
    sink.write("nobody listening");
    sink.request_input("Username: ");
    sink.close("gone");
}
