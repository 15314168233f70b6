use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const REASONING_TEXT: &str = "reasoning_text";
const ANSWER_TEXT: &str = "answer_text";

/// One incremental unit of a streamed model response.
///
/// On the wire a JSON string is plain text, a JSON array is a block list, and anything else is
/// kept as [`RawFragment::Unrecognized`] so that the classifier can reject it on its own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFragment {
    /// The provider gave no channel markup.
    PlainText(String),
    /// An ordered sequence of channel-tagged blocks.
    BlockList(Vec<ContentBlock>),
    /// Any other top-level shape.
    Unrecognized(Value),
}

impl RawFragment {
    /// Creates a plain text fragment.
    pub fn plain(text: impl Into<String>) -> Self {
        RawFragment::PlainText(text.into())
    }

    /// Creates a block list fragment.
    pub fn blocks(blocks: impl IntoIterator<Item = ContentBlock>) -> Self {
        RawFragment::BlockList(blocks.into_iter().collect())
    }

    /// Describes the top-level shape for diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            RawFragment::PlainText(_) => "string",
            RawFragment::BlockList(_) => "array",
            RawFragment::Unrecognized(Value::Null) => "null",
            RawFragment::Unrecognized(Value::Bool(_)) => "bool",
            RawFragment::Unrecognized(Value::Number(_)) => "number",
            RawFragment::Unrecognized(Value::Object(_)) => "object",
            RawFragment::Unrecognized(_) => "unknown",
        }
    }
}

impl From<&str> for RawFragment {
    fn from(text: &str) -> Self {
        RawFragment::plain(text)
    }
}

impl From<Vec<ContentBlock>> for RawFragment {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        RawFragment::BlockList(blocks)
    }
}

/// A structured sub-unit of a fragment.
///
/// Only string values under `reasoning_text` and `answer_text` are recognized.  Whatever else the
/// provider sent is preserved in `unrecognized`: the leftover keys of an object, or the whole
/// value when the block is not an object at all.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct ContentBlock {
    /// Text for the reasoning channel.
    pub reasoning_text: Option<String>,
    /// Text for the answer channel.
    pub answer_text: Option<String>,
    /// Provider data this crate does not interpret.
    pub unrecognized: Option<Value>,
}

impl ContentBlock {
    /// A block on the reasoning channel.
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            reasoning_text: Some(text.into()),
            ..Self::default()
        }
    }

    /// A block on the answer channel.
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            answer_text: Some(text.into()),
            ..Self::default()
        }
    }

    /// A block carrying only provider data.
    pub fn unrecognized(value: Value) -> Self {
        Self {
            unrecognized: Some(value),
            ..Self::default()
        }
    }
}

impl From<Value> for ContentBlock {
    fn from(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return ContentBlock::unrecognized(value);
        };
        let reasoning_text = take_string(&mut map, REASONING_TEXT);
        let answer_text = take_string(&mut map, ANSWER_TEXT);
        let unrecognized = if map.is_empty() {
            None
        } else {
            Some(Value::Object(map))
        };
        ContentBlock {
            reasoning_text,
            answer_text,
            unrecognized,
        }
    }
}

impl From<ContentBlock> for Value {
    fn from(block: ContentBlock) -> Self {
        let mut map = match block.unrecognized {
            Some(Value::Object(map)) => map,
            Some(other) if block.reasoning_text.is_none() && block.answer_text.is_none() => {
                return other;
            }
            Some(other) => {
                let mut map = Map::new();
                map.insert("unrecognized".to_string(), other);
                map
            }
            None => Map::new(),
        };
        if let Some(text) = block.reasoning_text {
            map.insert(REASONING_TEXT.to_string(), Value::String(text));
        }
        if let Some(text) = block.answer_text {
            map.insert(ANSWER_TEXT.to_string(), Value::String(text));
        }
        Value::Object(map)
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(text)) => Some(text),
        Some(other) => {
            map.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}
