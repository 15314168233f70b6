//! Output rendering for streamed turns.
//!
//! This module provides the [`Renderer`] styling boundary along with a plain-text
//! implementation that speaks ANSI escape sequences and a recording implementation that keeps
//! the directives it receives.

use std::io::{self, Stdout, Write};

use crate::classify::Channel;
use crate::error::{Error, Result};

/// ANSI escape code for gray text (used for reasoning).
const ANSI_GRAY: &str = "\x1b[90m";

/// ANSI escape code for bright green text (used for answers).
const ANSI_GREEN: &str = "\x1b[92m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for dim text (used for notices).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// Trait for rendering a streamed turn.
///
/// The section renderer only ever calls the directive methods (`enter_channel`,
/// `paragraph_break`, `print_text`, `reset_style`).  The remaining methods carry out-of-band
/// messages from the session loop and never fail.
pub trait Renderer: Send {
    /// Switch to the style of `channel`.
    fn enter_channel(&mut self, channel: Channel) -> Result<()>;

    /// Separate two logical passages.
    fn paragraph_break(&mut self) -> Result<()>;

    /// Print a chunk of text in the active style.
    ///
    /// This is called incrementally as fragments arrive; no separator is inserted.
    fn print_text(&mut self, text: &str) -> Result<()>;

    /// Reset styling and end the output region with a blank line.
    fn reset_style(&mut self) -> Result<()>;

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self) {}
}

/// Plain text renderer with optional ANSI styling.
///
/// Without color, channel changes are marked with bracketed labels instead.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer on stdout with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer over an arbitrary writer.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self { out, use_color }
    }

    /// Returns whether ANSI styling is enabled.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Consumes the renderer and returns the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Writes and flushes so streamed content shows up immediately.
    fn emit(&mut self, s: &str) -> Result<()> {
        self.out
            .write_all(s.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(|err| Error::render_sink("failed to write to output", err))
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn enter_channel(&mut self, channel: Channel) -> Result<()> {
        match (self.use_color, channel) {
            (true, Channel::Reasoning) => self.emit(&format!("{ANSI_RESET}{ANSI_GRAY}")),
            (true, Channel::Answer) => self.emit(&format!("{ANSI_RESET}{ANSI_GREEN}")),
            (false, Channel::Reasoning) => self.emit("[thinking] "),
            (false, Channel::Answer) => self.emit("[answer] "),
        }
    }

    fn paragraph_break(&mut self) -> Result<()> {
        if self.use_color {
            self.emit(&format!("{ANSI_RESET}\n\n"))
        } else {
            self.emit("\n\n")
        }
    }

    fn print_text(&mut self, text: &str) -> Result<()> {
        self.emit(text)
    }

    fn reset_style(&mut self) -> Result<()> {
        if self.use_color {
            self.emit(&format!("{ANSI_RESET}\n\n"))
        } else {
            self.emit("\n\n")
        }
    }

    fn print_error(&mut self, error: &str) {
        let line = if self.use_color {
            format!("{ANSI_RED}Error: {error}{ANSI_RESET}\n")
        } else {
            format!("Error: {error}\n")
        };
        let _ = self.emit(&line);
    }

    fn print_info(&mut self, info: &str) {
        let _ = self.emit(&format!("{info}\n"));
    }

    fn print_interrupted(&mut self) {
        let notice = if self.use_color {
            format!("{ANSI_RESET}\n{ANSI_DIM}[interrupted]{ANSI_RESET}")
        } else {
            "\n[interrupted]".to_string()
        };
        let _ = self.emit(&notice);
    }
}

///////////////////////////////////////// Directives /////////////////////////////////////////

/// A styling directive as received by a [`Renderer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Enter the reasoning style.
    EnterReasoning,
    /// Enter the answer style.
    EnterAnswer,
    /// Separate two passages.
    ParagraphBreak,
    /// Text in the active style.
    Text(String),
    /// Reset styling at the end of a turn.
    Reset,
    /// An out-of-band error message.
    Error(String),
    /// An out-of-band informational message.
    Info(String),
    /// The turn was interrupted.
    Interrupted,
}

/// A renderer that records directives instead of drawing them.
#[derive(Clone, Debug, Default)]
pub struct DirectiveLog {
    directives: Vec<Directive>,
    fail_writes: bool,
}

impl DirectiveLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log whose directive methods fail like a closed sink.
    pub fn closed() -> Self {
        Self {
            directives: Vec::new(),
            fail_writes: true,
        }
    }

    /// The directives recorded so far.
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Counts recorded directives equal to `directive`.
    pub fn count(&self, directive: &Directive) -> usize {
        self.directives.iter().filter(|d| *d == directive).count()
    }

    /// Concatenates all recorded text.
    pub fn text(&self) -> String {
        self.directives
            .iter()
            .filter_map(|d| match d {
                Directive::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, directive: Directive) -> Result<()> {
        if self.fail_writes {
            return Err(Error::render_sink(
                "sink is closed",
                io::Error::from(io::ErrorKind::BrokenPipe),
            ));
        }
        self.directives.push(directive);
        Ok(())
    }
}

impl Renderer for DirectiveLog {
    fn enter_channel(&mut self, channel: Channel) -> Result<()> {
        self.record(match channel {
            Channel::Reasoning => Directive::EnterReasoning,
            Channel::Answer => Directive::EnterAnswer,
        })
    }

    fn paragraph_break(&mut self) -> Result<()> {
        self.record(Directive::ParagraphBreak)
    }

    fn print_text(&mut self, text: &str) -> Result<()> {
        self.record(Directive::Text(text.to_string()))
    }

    fn reset_style(&mut self) -> Result<()> {
        self.record(Directive::Reset)
    }

    fn print_error(&mut self, error: &str) {
        self.directives.push(Directive::Error(error.to_string()));
    }

    fn print_info(&mut self, info: &str) {
        self.directives.push(Directive::Info(info.to_string()));
    }

    fn print_interrupted(&mut self) {
        self.directives.push(Directive::Interrupted);
    }
}
