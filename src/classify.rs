//! Channel classification for raw fragments.
//!
//! The classifier maps one [`RawFragment`] onto the two logical channels of a thinking model's
//! output.  It is lazy: nothing is copied, and segments are produced in the order the provider
//! sent them.

use std::fmt;
use std::slice;

use crate::error::{Error, Result};
use crate::fragment::{ContentBlock, RawFragment};
use crate::observability::UNCLASSIFIABLE_BLOCKS;

/// The logical category of emitted text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Internal deliberation.
    Reasoning,
    /// User-facing final content.
    Answer,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Reasoning => write!(f, "reasoning"),
            Channel::Answer => write!(f, "answer"),
        }
    }
}

/// A non-empty run of text on a single channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment<'a> {
    /// The channel the text belongs to.
    pub channel: Channel,
    /// The text, verbatim.
    pub text: &'a str,
}

impl<'a> Segment<'a> {
    fn new(channel: Channel, text: &'a str) -> Self {
        Self { channel, text }
    }
}

/// Classifies a fragment into channel segments.
///
/// Plain text always lands on the answer channel.  Blocks are tried for non-empty
/// `reasoning_text` first and non-empty `answer_text` second; blocks with neither are skipped.
/// Only a fragment that is neither plain text nor a block list is an error.
pub fn classify(fragment: &RawFragment) -> Result<Segments<'_>> {
    match fragment {
        RawFragment::PlainText(text) => Ok(Segments {
            inner: SegmentsInner::Plain(Some(text.as_str())),
        }),
        RawFragment::BlockList(blocks) => Ok(Segments {
            inner: SegmentsInner::Blocks(blocks.iter()),
        }),
        RawFragment::Unrecognized(value) => Err(Error::fragment_shape(format!(
            "expected a string or an array of blocks, got {}: {value}",
            fragment.shape()
        ))),
    }
}

/// Classifies a single block.
pub fn classify_block(block: &ContentBlock) -> Option<Segment<'_>> {
    if let Some(text) = non_empty(&block.reasoning_text) {
        Some(Segment::new(Channel::Reasoning, text))
    } else {
        non_empty(&block.answer_text).map(|text| Segment::new(Channel::Answer, text))
    }
}

fn non_empty(text: &Option<String>) -> Option<&str> {
    text.as_deref().filter(|t| !t.is_empty())
}

/// Lazy iterator over the segments of one fragment.
#[derive(Clone, Debug)]
pub struct Segments<'a> {
    inner: SegmentsInner<'a>,
}

#[derive(Clone, Debug)]
enum SegmentsInner<'a> {
    Plain(Option<&'a str>),
    Blocks(slice::Iter<'a, ContentBlock>),
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            SegmentsInner::Plain(text) => text
                .take()
                .filter(|t| !t.is_empty())
                .map(|t| Segment::new(Channel::Answer, t)),
            SegmentsInner::Blocks(blocks) => {
                for block in blocks.by_ref() {
                    match classify_block(block) {
                        Some(segment) => return Some(segment),
                        None => UNCLASSIFIABLE_BLOCKS.click(),
                    }
                }
                None
            }
        }
    }
}
