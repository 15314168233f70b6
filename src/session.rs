//! Core chat session management.
//!
//! This module provides the [`ChatSession`] struct which ties a [`Provider`] to a
//! [`Checkpointer`] and streams each turn through the classifier and section renderer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::StreamExt;

use crate::checkpoint::{Checkpointer, MemoryCheckpointer};
use crate::classify::{Channel, classify};
use crate::error::{Error, Result};
use crate::observability::{
    FRAGMENT_SHAPE_ERRORS, FRAGMENTS_RECEIVED, TURN_DURATION, TURNS_FAILED, TURNS_INTERRUPTED,
    TURNS_STARTED,
};
use crate::provider::Provider;
use crate::render::Renderer;
use crate::section::{ChannelState, finish_turn, render};
use crate::turn::{Message, Turn};

/// How often the interrupt flag is checked while waiting on the provider.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// What happened during one turn.
#[derive(Clone, Debug, Default)]
pub struct TurnOutcome {
    /// Fragments received from the provider.
    pub fragments: usize,
    /// Segments rendered.
    pub segments: usize,
    /// The channel active when the turn ended.
    pub final_channel: Option<Channel>,
    /// Concatenated answer-channel text.
    pub answer: String,
    /// Fragments that were skipped because of their shape.
    pub fragment_errors: Vec<Error>,
    /// True when the user interrupted the turn.
    pub interrupted: bool,
}

/// A chat session bound to one conversation thread.
pub struct ChatSession {
    provider: Box<dyn Provider>,
    checkpointer: Box<dyn Checkpointer>,
    thread_id: String,
}

impl ChatSession {
    /// Creates a session that keeps history in memory.
    pub fn new(provider: Box<dyn Provider>, thread_id: impl Into<String>) -> Self {
        Self::with_checkpointer(provider, Box::new(MemoryCheckpointer::new()), thread_id)
    }

    /// Creates a session with a custom checkpointer.
    pub fn with_checkpointer(
        provider: Box<dyn Provider>,
        checkpointer: Box<dyn Checkpointer>,
        thread_id: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            checkpointer,
            thread_id: thread_id.into(),
        }
    }

    /// The thread this session reads and writes.
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Name of the underlying provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// The history of this session's thread.
    pub fn history(&self) -> Vec<Message> {
        self.checkpointer.load(&self.thread_id)
    }

    /// Forgets this session's thread.
    pub fn clear(&mut self) {
        self.checkpointer.clear(&self.thread_id);
    }

    /// Sends a user message and streams the response.
    ///
    /// Every turn starts with a fresh [`ChannelState`] and ends with exactly one style reset,
    /// whether it completed, failed, or was interrupted.  Only completed turns that produced
    /// answer text are written to the checkpointer.
    ///
    /// # Errors
    ///
    /// Returns the provider error that aborted the turn, or a render-sink error if the output
    /// could not be written.  Fragment-shape errors do not abort the turn; they are collected
    /// in [`TurnOutcome::fragment_errors`].
    pub async fn send_streaming(
        &mut self,
        user_input: &str,
        renderer: &mut dyn Renderer,
        interrupted: Arc<AtomicBool>,
    ) -> Result<TurnOutcome> {
        TURNS_STARTED.click();
        let start = Instant::now();
        let turn = Turn::new(self.thread_id.clone(), user_input)
            .with_history(self.checkpointer.load(&self.thread_id));

        let mut outcome = TurnOutcome::default();
        let streamed = self
            .stream_turn(&turn, renderer, &interrupted, &mut outcome)
            .await;
        let finished = finish_turn(renderer);
        TURN_DURATION.add(start.elapsed().as_secs_f64());

        if let Err(err) = streamed.and(finished) {
            TURNS_FAILED.click();
            tracing::warn!(
                thread_id = %self.thread_id,
                fragments = outcome.fragments,
                error = %err,
                "turn aborted"
            );
            return Err(err);
        }
        if outcome.interrupted {
            TURNS_INTERRUPTED.click();
            tracing::info!(
                thread_id = %self.thread_id,
                fragments = outcome.fragments,
                "turn interrupted"
            );
            return Ok(outcome);
        }

        // History alternates user and assistant messages, all non-empty.
        if outcome.answer.is_empty() {
            tracing::debug!(thread_id = %self.thread_id, "no answer text; turn not checkpointed");
            return Ok(outcome);
        }
        self.checkpointer.append(
            &self.thread_id,
            vec![
                Message::user(user_input),
                Message::assistant(outcome.answer.clone()),
            ],
        );
        tracing::debug!(
            thread_id = %self.thread_id,
            answer_bytes = outcome.answer.len(),
            "turn checkpointed"
        );
        Ok(outcome)
    }

    async fn stream_turn(
        &self,
        turn: &Turn,
        renderer: &mut dyn Renderer,
        interrupted: &AtomicBool,
        outcome: &mut TurnOutcome,
    ) -> Result<()> {
        let mut stream = tokio::select! {
            biased;
            _ = wait_for_interrupt(interrupted) => {
                outcome.interrupted = true;
                renderer.print_interrupted();
                return Ok(());
            }
            stream = self.provider.send(turn) => stream?,
        };

        let mut state = ChannelState::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = wait_for_interrupt(interrupted) => {
                    outcome.interrupted = true;
                    renderer.print_interrupted();
                    return Ok(());
                }
                next = stream.next() => next,
            };
            let Some(fragment) = next else {
                return Ok(());
            };
            let fragment = fragment?;
            FRAGMENTS_RECEIVED.click();
            outcome.fragments += 1;

            let segments = match classify(&fragment) {
                Ok(segments) => segments,
                Err(err) => {
                    FRAGMENT_SHAPE_ERRORS.click();
                    tracing::warn!(
                        thread_id = %turn.thread_id,
                        shape = fragment.shape(),
                        "skipping fragment: {err}"
                    );
                    outcome.fragment_errors.push(err);
                    continue;
                }
            };
            for segment in segments {
                state = render(state, segment.channel, segment.text, renderer)?;
                outcome.segments += 1;
                if segment.channel == Channel::Answer {
                    outcome.answer.push_str(segment.text);
                }
            }
            outcome.final_channel = state.current();
        }
    }
}

async fn wait_for_interrupt(flag: &AtomicBool) {
    while !flag.load(Ordering::Relaxed) {
        tokio::time::sleep(INTERRUPT_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::stream;
    use serde_json::json;

    use super::*;
    use crate::fragment::{ContentBlock, RawFragment};
    use crate::provider::{FragmentStream, ReplayProvider};
    use crate::render::{Directive, DirectiveLog};

    fn session(fragments: Vec<Result<RawFragment>>) -> ChatSession {
        ChatSession::new(Box::new(ReplayProvider::from_fragments(fragments)), "1")
    }

    fn flag() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    struct Unavailable;

    #[async_trait]
    impl Provider for Unavailable {
        fn name(&self) -> &str {
            "unavailable"
        }

        async fn send(&self, _: &Turn) -> Result<FragmentStream> {
            Err(Error::connection("connection refused", None))
        }
    }

    /// Yields one fragment, raises the interrupt flag, then never yields again.
    struct Stalls {
        flag: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Provider for Stalls {
        fn name(&self) -> &str {
            "stalls"
        }

        async fn send(&self, _: &Turn) -> Result<FragmentStream> {
            let flag = Arc::clone(&self.flag);
            Ok(Box::pin(
                stream::iter(vec![Ok(RawFragment::blocks([ContentBlock::reasoning(
                    "partial",
                )]))])
                .inspect(move |_| flag.store(true, Ordering::Relaxed))
                .chain(stream::pending()),
            ))
        }
    }

    #[tokio::test]
    async fn reasoning_then_answer() {
        let mut session = session(vec![Ok(RawFragment::blocks([
            ContentBlock::reasoning("analyzing "),
            ContentBlock::reasoning("input"),
            ContentBlock::answer("42"),
        ]))]);
        let mut log = DirectiveLog::new();
        let outcome = session.send_streaming("q", &mut log, flag()).await.unwrap();
        assert_eq!(
            log.directives(),
            &[
                Directive::EnterReasoning,
                Directive::Text("analyzing ".to_string()),
                Directive::Text("input".to_string()),
                Directive::ParagraphBreak,
                Directive::EnterAnswer,
                Directive::Text("42".to_string()),
                Directive::Reset,
            ]
        );
        assert_eq!(outcome.segments, 3);
        assert_eq!(outcome.final_channel, Some(Channel::Answer));
        assert_eq!(outcome.answer, "42");
    }

    #[tokio::test]
    async fn empty_response_only_resets() {
        let mut session = session(vec![Ok(RawFragment::blocks([]))]);
        let mut log = DirectiveLog::new();
        let outcome = session.send_streaming("q", &mut log, flag()).await.unwrap();
        assert_eq!(log.directives(), &[Directive::Reset]);
        assert_eq!(outcome.final_channel, None);
        assert_eq!(outcome.fragments, 1);
    }

    #[tokio::test]
    async fn shape_error_skips_one_fragment() {
        let mut session = session(vec![
            Ok(RawFragment::plain("before ")),
            Ok(RawFragment::Unrecognized(json!({"unexpected": 1}))),
            Ok(RawFragment::plain("after")),
        ]);
        let mut log = DirectiveLog::new();
        let outcome = session.send_streaming("q", &mut log, flag()).await.unwrap();
        assert_eq!(outcome.fragment_errors.len(), 1);
        assert!(outcome.fragment_errors[0].is_fragment_shape());
        assert_eq!(log.text(), "before after");
        assert_eq!(log.count(&Directive::EnterAnswer), 1);
        assert_eq!(log.count(&Directive::Reset), 1);
    }

    #[tokio::test]
    async fn provider_error_mid_stream_still_resets() {
        let mut session = session(vec![
            Ok(RawFragment::blocks([ContentBlock::reasoning("thinking")])),
            Err(Error::streaming("connection reset", None)),
            Ok(RawFragment::plain("never shown")),
        ]);
        let mut log = DirectiveLog::new();
        let err = session.send_streaming("q", &mut log, flag()).await.unwrap_err();
        assert!(err.is_provider());
        assert_eq!(log.text(), "thinking");
        assert_eq!(log.count(&Directive::Reset), 1);
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn failed_send_still_resets() {
        let mut session = ChatSession::new(Box::new(Unavailable), "1");
        let mut log = DirectiveLog::new();
        let err = session.send_streaming("q", &mut log, flag()).await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert_eq!(log.directives(), &[Directive::Reset]);
    }

    #[tokio::test]
    async fn closed_sink_aborts_turn() {
        let mut session = session(vec![Ok(RawFragment::plain("x"))]);
        let mut log = DirectiveLog::closed();
        let err = session.send_streaming("q", &mut log, flag()).await.unwrap_err();
        assert!(err.is_render_sink());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn interrupt_keeps_partial_output() {
        let interrupted = flag();
        let provider = Stalls {
            flag: Arc::clone(&interrupted),
        };
        let mut session = ChatSession::new(Box::new(provider), "1");
        let mut log = DirectiveLog::new();
        let outcome = session
            .send_streaming("q", &mut log, interrupted)
            .await
            .unwrap();
        assert!(outcome.interrupted);
        assert_eq!(
            log.directives(),
            &[
                Directive::EnterReasoning,
                Directive::Text("partial".to_string()),
                Directive::Interrupted,
                Directive::Reset,
            ]
        );
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn completed_turns_are_checkpointed() {
        let mut session = session(vec![
            Ok(RawFragment::blocks([ContentBlock::reasoning("hidden")])),
            Ok(RawFragment::plain("shown")),
        ]);
        let mut log = DirectiveLog::new();
        session.send_streaming("first", &mut log, flag()).await.unwrap();
        session.send_streaming("second", &mut log, flag()).await.unwrap();
        assert_eq!(
            session.history(),
            vec![
                Message::user("first"),
                Message::assistant("shown"),
                Message::user("second"),
                Message::assistant("shown"),
            ]
        );
        session.clear();
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn reasoning_only_turn_is_not_checkpointed() {
        let mut session = session(vec![Ok(RawFragment::blocks([ContentBlock::reasoning(
            "only thinking",
        )]))]);
        let mut log = DirectiveLog::new();
        let outcome = session.send_streaming("q", &mut log, flag()).await.unwrap();
        assert!(outcome.answer.is_empty());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn each_turn_starts_without_a_channel() {
        let mut session = session(vec![Ok(RawFragment::plain("a"))]);
        let mut log = DirectiveLog::new();
        session.send_streaming("1", &mut log, flag()).await.unwrap();
        session.send_streaming("2", &mut log, flag()).await.unwrap();
        assert_eq!(log.count(&Directive::EnterAnswer), 2);
        assert_eq!(log.count(&Directive::Reset), 2);
    }
}
