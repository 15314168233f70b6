//! Section transitions between the reasoning and answer channels.
//!
//! [`ChannelState`] is the only state a turn carries.  It is created fresh for every turn and
//! threaded by value through [`render`]; [`finish_turn`] closes the output region.

use crate::classify::Channel;
use crate::error::Result;
use crate::observability::{ANSWER_SEGMENTS, CHANNEL_TRANSITIONS, REASONING_SEGMENTS};
use crate::render::Renderer;

/// The channel most recently rendered in the current turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelState {
    current: Option<Channel>,
}

impl ChannelState {
    /// The state at the start of every turn.
    pub fn new() -> Self {
        Self::default()
    }

    /// The active channel, or `None` before anything was rendered.
    pub fn current(&self) -> Option<Channel> {
        self.current
    }
}

/// Renders `text` on `channel`, emitting a transition first if the channel changed.
///
/// Entering the answer channel straight from reasoning also emits a paragraph break so the two
/// read as separate passages.  Every other change emits the style opener alone.
pub fn render(
    state: ChannelState,
    channel: Channel,
    text: &str,
    renderer: &mut dyn Renderer,
) -> Result<ChannelState> {
    if state.current != Some(channel) {
        if state.current == Some(Channel::Reasoning) && channel == Channel::Answer {
            renderer.paragraph_break()?;
        }
        renderer.enter_channel(channel)?;
        CHANNEL_TRANSITIONS.click();
    }
    renderer.print_text(text)?;
    match channel {
        Channel::Reasoning => REASONING_SEGMENTS.click(),
        Channel::Answer => ANSWER_SEGMENTS.click(),
    }
    Ok(ChannelState {
        current: Some(channel),
    })
}

/// Ends the turn's output region.
///
/// Must be called exactly once per turn, whatever state the turn ended in.
pub fn finish_turn(renderer: &mut dyn Renderer) -> Result<()> {
    renderer.reset_style()
}
