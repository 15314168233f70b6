//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! This module turns raw byte streams from HTTP providers into [`SseEvent`] values.  It does
//! not interpret payloads; each provider maps events onto fragments itself.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::error::{Error, Result};

/// One server-sent event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, if present.
    pub event: Option<String>,
    /// All `data:` lines joined with newlines.
    pub data: String,
}

/// Process a stream of bytes into a stream of server-sent events.
///
/// Events split across chunks are reassembled, and a final event lacking its blank-line
/// terminator is still emitted when the byte stream ends.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<SseEvent>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    let buffer = String::new();
    let pending = Vec::new();
    stream::unfold(
        (stream, buffer, pending, false),
        move |(mut stream, mut buffer, mut pending, done)| async move {
            if done {
                return None;
            }
            loop {
                if let Some((event, remaining)) = extract_event(&buffer) {
                    buffer = remaining;
                    if let Some(event) = event {
                        return Some((Ok(event), (stream, buffer, pending, false)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        pending.extend_from_slice(&bytes);
                        if let Err(e) = decode_utf8(&mut pending, &mut buffer) {
                            return Some((Err(e), (stream, buffer, pending, true)));
                        }
                    }
                    Some(Err(e)) => {
                        return Some((Err(e), (stream, buffer, pending, true)));
                    }
                    None => {
                        let tail = std::mem::take(&mut buffer);
                        return parse_event(&tail)
                            .map(|event| (Ok(event), (stream, buffer, pending, true)));
                    }
                }
            }
        },
    )
}

/// Move the decodable prefix of `pending` into `buffer`, normalizing line endings to `\n`.
///
/// A multi-byte character cut off at the end of a chunk stays in `pending` until the rest of
/// it arrives.  So does a trailing `\r`, which may be the first half of `\r\n`.
fn decode_utf8(pending: &mut Vec<u8>, buffer: &mut String) -> Result<()> {
    let mut valid = match std::str::from_utf8(pending) {
        Ok(text) => text.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(e) => {
            return Err(Error::encoding(
                format!("Invalid UTF-8 in stream: {e}"),
                Some(Box::new(e)),
            ));
        }
    };
    if valid > 0 && pending[valid - 1] == b'\r' {
        valid -= 1;
    }
    let rest = pending.split_off(valid);
    let text = std::str::from_utf8(pending)?;
    if text.contains('\r') {
        buffer.push_str(&text.replace("\r\n", "\n").replace('\r', "\n"));
    } else {
        buffer.push_str(text);
    }
    *pending = rest;
    Ok(())
}

/// Extract a complete SSE event from a buffer string.
///
/// Returns `None` when no blank line has arrived yet.  The inner `None` is a block that held
/// only comments.
fn extract_event(buffer: &str) -> Option<(Option<SseEvent>, String)> {
    let (event_text, rest) = buffer.split_once("\n\n")?;
    Some((parse_event(event_text), rest.to_string()))
}

/// Parse the lines of one event.
fn parse_event(event_text: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Option<String> = None;
    for line in event_text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => match &mut data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            _ => {}
        }
    }
    if event.is_none() && data.is_none() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    type ByteResult = std::result::Result<Bytes, std::io::Error>;

    async fn collect(chunks: Vec<&'static [u8]>) -> Vec<Result<SseEvent>> {
        let stream = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c)))
                .collect::<Vec<ByteResult>>(),
        );
        process_sse(stream).collect().await
    }

    fn event(name: Option<&str>, data: &str) -> SseEvent {
        SseEvent {
            event: name.map(String::from),
            data: data.to_string(),
        }
    }

    #[tokio::test]
    async fn parse_named_event() {
        let events = collect(vec![b"event: ping\ndata: {}\n\n".as_slice()]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &event(Some("ping"), "{}"));
    }

    #[tokio::test]
    async fn parse_multiple_events() {
        let events = collect(vec![b"data: 1\n\ndata: 2\n\n".as_slice()]).await;
        let events: Vec<SseEvent> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events, vec![event(None, "1"), event(None, "2")]);
    }

    #[tokio::test]
    async fn handle_split_event() {
        let events = collect(vec![
            b"event: ping\n".as_slice(),
            b"data: {\"a\"".as_slice(),
            b": 1}\n".as_slice(),
            b"\n".as_slice(),
        ])
        .await;
        assert_eq!(
            events[0].as_ref().unwrap(),
            &event(Some("ping"), "{\"a\": 1}")
        );
    }

    #[tokio::test]
    async fn crlf_and_comments() {
        let events =
            collect(vec![b": keepalive\r\n\r\ndata: x\r\ndata: y\r\n\r\n".as_slice()]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &event(None, "x\ny"));
    }

    #[tokio::test]
    async fn bare_carriage_returns() {
        let events = collect(vec![b"event: ping\rdata: 1\r\rdata: 2\r\r".as_slice()]).await;
        let events: Vec<SseEvent> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events, vec![event(Some("ping"), "1"), event(None, "2")]);
    }

    #[tokio::test]
    async fn crlf_split_across_chunks() {
        let events = collect(vec![
            b"data: 1\r".as_slice(),
            b"\ndata: 2\r".as_slice(),
            b"\n\r\n".as_slice(),
        ])
        .await;
        let events: Vec<SseEvent> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events, vec![event(None, "1\n2")]);
    }

    #[tokio::test]
    async fn trailing_event_without_blank_line() {
        let events = collect(vec![b"data: last".as_slice()]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &event(None, "last"));
    }

    #[tokio::test]
    async fn invalid_utf8_is_an_error() {
        let events = collect(vec![b"data: \xff\xfe\n\n".as_slice()]).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(Error::Encoding { .. })));
    }

    #[tokio::test]
    async fn character_split_across_chunks() {
        let bytes = "data: caf\u{e9}\n\n".as_bytes();
        let cut = bytes.len() - 3;
        let (head, tail) = bytes.split_at(cut);
        let events = collect(vec![head, tail]).await;
        assert_eq!(events[0].as_ref().unwrap(), &event(None, "caf\u{e9}"));
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let stream = stream::iter(vec![
            Ok(Bytes::from_static(b"data: 1\n\n")),
            Err(std::io::Error::other("reset")),
            Ok(Bytes::from_static(b"data: 2\n\n")),
        ]);
        let events: Vec<Result<SseEvent>> = process_sse(stream).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(matches!(events[1], Err(Error::Streaming { .. })));
    }
}
