//! Interactive chat with a reasoning model.
//!
//! Reasoning and the final answer stream to the terminal as they arrive, each in its own style.
//! Configuration comes from the environment (a `.env` file in the working directory is loaded
//! first).
//!
//! # Usage
//!
//! ```bash
//! # Anthropic with extended thinking
//! ANTHROPIC_API_KEY=... thinkstream
//!
//! # Gemini with thought summaries
//! THINKSTREAM_PROVIDER=gemini GOOGLE_API_KEY=... thinkstream
//!
//! # Replay a recorded response without network access
//! THINKSTREAM_PROVIDER=replay THINKSTREAM_REPLAY=turn.jsonl thinkstream
//! ```
//!
//! Type `exit` or `quit` to leave.  Ctrl+C stops a response in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use thinkstream::{ChatSession, Config, PlainTextRenderer, Renderer, logging, provider};

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Blank,
    Exit,
    Turn(&'a str),
}

/// Surrounding whitespace is ignored; `exit` and `quit` match in any case.
fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        Input::Blank
    } else if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        Input::Exit
    } else {
        Input::Turn(line)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let config = Config::from_env()?;
    logging::init(&config)?;

    let provider = provider::from_config(&config)?;
    let mut session = ChatSession::new(provider, config.thread_id.clone());
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));

    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    tracing::info!(
        provider = %config.provider,
        model = %config.model,
        thread_id = %config.thread_id,
        "session started"
    );
    renderer.print_info(&format!(
        "thinkstream ({}, model: {})",
        session.provider_name(),
        config.model
    ));
    renderer.print_info("Type exit or quit to leave\n");

    loop {
        interrupted.store(false, Ordering::Relaxed);

        match rl.readline("You: ") {
            Ok(line) => {
                let line = match parse_input(&line) {
                    Input::Blank => continue,
                    Input::Exit => {
                        renderer.print_info("Goodbye!");
                        break;
                    }
                    Input::Turn(line) => line,
                };
                let _ = rl.add_history_entry(line);

                println!();
                match session
                    .send_streaming(line, &mut renderer, interrupted.clone())
                    .await
                {
                    Ok(outcome) => {
                        for err in &outcome.fragment_errors {
                            renderer.print_error(&err.to_string());
                        }
                    }
                    Err(err) => renderer.print_error(&err.to_string()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at the prompt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                renderer.print_info("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}
