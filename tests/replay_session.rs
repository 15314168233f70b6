//! End-to-end turns driven by recorded replay scripts.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use thinkstream::{
    ChatSession, Config, Directive, DirectiveLog, Message, PlainTextRenderer, ProviderKind,
    provider,
};

struct Script {
    path: PathBuf,
}

impl Script {
    fn new(name: &str, lines: &[&str]) -> Self {
        let path = std::env::temp_dir().join(format!(
            "thinkstream-{name}-{}.jsonl",
            std::process::id()
        ));
        std::fs::write(&path, lines.join("\n")).unwrap();
        Self { path }
    }

    fn session(&self) -> ChatSession {
        let config = Config::new(ProviderKind::Replay).with_replay_path(&self.path);
        let provider = provider::from_config(&config).unwrap();
        ChatSession::new(provider, config.thread_id)
    }
}

impl Drop for Script {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn not_interrupted() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

#[tokio::test]
async fn reasoning_then_answer_in_color() {
    let script = Script::new(
        "color",
        &[r#"[{"reasoning_text": "analyzing "}, {"reasoning_text": "input"}, {"answer_text": "42"}]"#],
    );
    let mut session = script.session();
    let mut renderer = PlainTextRenderer::with_writer(Vec::new(), true);
    session
        .send_streaming("question", &mut renderer, not_interrupted())
        .await
        .unwrap();
    let out = String::from_utf8(renderer.into_inner()).unwrap();
    assert_eq!(
        out,
        "\x1b[0m\x1b[90manalyzing input\x1b[0m\n\n\x1b[0m\x1b[92m42\x1b[0m\n\n"
    );
}

#[tokio::test]
async fn plain_text_without_color() {
    let script = Script::new("plain", &[r#""Hello""#, r#"", world""#]);
    let mut session = script.session();
    let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
    session
        .send_streaming("hi", &mut renderer, not_interrupted())
        .await
        .unwrap();
    let out = String::from_utf8(renderer.into_inner()).unwrap();
    assert_eq!(out, "[answer] Hello, world\n\n");
}

#[tokio::test]
async fn unknown_blocks_do_not_change_channel() {
    let script = Script::new(
        "unknown",
        &[
            r#"[{"reasoning_text": "a"}]"#,
            r#"[{"foo_text": "ignored"}]"#,
            r#"[{"reasoning_text": "b"}]"#,
        ],
    );
    let mut session = script.session();
    let mut log = DirectiveLog::new();
    let outcome = session
        .send_streaming("q", &mut log, not_interrupted())
        .await
        .unwrap();
    assert!(outcome.fragment_errors.is_empty());
    assert_eq!(
        log.directives(),
        &[
            Directive::EnterReasoning,
            Directive::Text("a".to_string()),
            Directive::Text("b".to_string()),
            Directive::Reset,
        ]
    );
}

#[tokio::test]
async fn bad_line_aborts_after_earlier_output() {
    let script = Script::new("bad", &[r#""partial""#, "{truncated", r#""unreached""#]);
    let mut session = script.session();
    let mut log = DirectiveLog::new();
    let err = session
        .send_streaming("q", &mut log, not_interrupted())
        .await
        .unwrap_err();
    assert!(err.is_provider());
    assert_eq!(log.text(), "partial");
    assert_eq!(log.count(&Directive::Reset), 1);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn history_accumulates_across_turns() {
    let script = Script::new(
        "history",
        &[r#"[{"reasoning_text": "thinking"}, {"answer_text": "done"}]"#],
    );
    let mut session = script.session();
    let mut log = DirectiveLog::new();
    for input in ["one", "two"] {
        session
            .send_streaming(input, &mut log, not_interrupted())
            .await
            .unwrap();
    }
    assert_eq!(session.thread_id(), "1");
    assert_eq!(
        session.history(),
        vec![
            Message::user("one"),
            Message::assistant("done"),
            Message::user("two"),
            Message::assistant("done"),
        ]
    );
}

#[tokio::test]
async fn interrupt_before_first_fragment() {
    let script = Script::new("interrupt", &[r#""never""#]);
    let mut session = script.session();
    let mut log = DirectiveLog::new();
    let outcome = session
        .send_streaming("q", &mut log, Arc::new(AtomicBool::new(true)))
        .await
        .unwrap();
    assert!(outcome.interrupted);
    assert_eq!(log.directives(), &[Directive::Interrupted, Directive::Reset]);
}
