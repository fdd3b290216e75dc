//! Decoding of server-sent-event token streams.

use futures::{Stream, StreamExt};

use vestige_core::{Error, Result, TokenStream};

use super::types::ChatCompletionChunk;

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

/// One decoded line of an SSE body.
enum SseLine {
    /// Blank line, `: comment` keep-alive, or a delta with no text.
    Ignored,
    /// Terminal `data: [DONE]` marker.
    Done,
    /// Reply text carried by a delta.
    Delta(String),
    /// Unparseable `data:` payload.
    Malformed(Error),
}

/// Turn the raw response byte stream into a stream of reply fragments.
///
/// Network read errors surface as stream items so the caller sees them in
/// order, after any fragments already decoded.
pub fn parse_sse_stream(
    stream: impl Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> TokenStream {
    Box::pin(stream.filter_map(|read| async move {
        match read {
            Ok(bytes) => decode_events(&String::from_utf8_lossy(&bytes)),
            Err(e) => Some(Err(Error::Inference(format!("Stream error: {}", e)))),
        }
    }))
}

/// Decode one chunk of the SSE body, which may carry several `data:`
/// events. Their delta contents are concatenated into a single fragment;
/// `None` means the chunk carried no reply text.
fn decode_events(raw: &str) -> Option<Result<String>> {
    let mut fragment = String::new();

    for line in raw.lines() {
        match decode_line(line.trim()) {
            SseLine::Ignored => {}
            SseLine::Done => return None,
            SseLine::Delta(text) => fragment.push_str(&text),
            SseLine::Malformed(e) => return Some(Err(e)),
        }
    }

    (!fragment.is_empty()).then_some(Ok(fragment))
}

fn decode_line(line: &str) -> SseLine {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return SseLine::Ignored;
    };

    if payload == DONE_MARKER {
        return SseLine::Done;
    }

    match serde_json::from_str::<ChatCompletionChunk>(payload) {
        Ok(chunk) => {
            let text: String = chunk
                .choices
                .into_iter()
                .filter_map(|choice| choice.delta.content)
                .collect();
            if text.is_empty() {
                SseLine::Ignored
            } else {
                SseLine::Delta(text)
            }
        }
        Err(e) => SseLine::Malformed(Error::Inference(format!(
            "Failed to parse SSE chunk: {}",
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_delta_content() {
        let chunk = r#"data: {"id":"test","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        assert_eq!(decode_events(chunk).unwrap().unwrap(), "Hello");
    }

    #[test]
    fn test_decode_done_marker_ends_stream() {
        assert!(decode_events("data: [DONE]").is_none());
    }

    #[test]
    fn test_decode_empty_delta_yields_nothing() {
        let chunk =
            r#"data: {"id":"test","choices":[{"index":0,"delta":{},"finish_reason":null}]}"#;
        assert!(decode_events(chunk).is_none());
    }

    #[test]
    fn test_decode_role_only_delta_yields_nothing() {
        let chunk = r#"data: {"id":"test","choices":[{"index":0,"delta":{"role":"assistant"},"finish_reason":null}]}"#;
        assert!(decode_events(chunk).is_none());
    }

    #[test]
    fn test_decode_comment_line_ignored() {
        assert!(decode_events(": keep-alive").is_none());
    }

    #[test]
    fn test_decode_concatenates_events_in_one_chunk() {
        let chunk = r#"data: {"id":"test","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}

data: {"id":"test","choices":[{"index":0,"delta":{"content":" World"},"finish_reason":null}]}"#;
        assert_eq!(decode_events(chunk).unwrap().unwrap(), "Hello World");
    }

    #[test]
    fn test_decode_malformed_payload_is_an_error() {
        let result = decode_events("data: {invalid json}");
        assert!(result.unwrap().is_err());
    }

    #[test]
    fn test_decode_final_delta_with_finish_reason() {
        let chunk = r#"data: {"id":"test","choices":[{"index":0,"delta":{"content":"!"},"finish_reason":"stop"}]}"#;
        assert_eq!(decode_events(chunk).unwrap().unwrap(), "!");
    }
}
