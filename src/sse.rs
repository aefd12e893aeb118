//! Server-Sent Events (SSE) processing for streaming chat responses.
//!
//! This module turns raw response bytes into [`StreamFrame`] values.  Chunk boundaries carry no
//! meaning: a chunk may end in the middle of a line or even in the middle of a UTF-8 sequence,
//! and the decoder carries the unfinished tail over to the next chunk.  The sequence of frames
//! is the same however the bytes are split.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_DECODE_ERRORS, STREAM_FRAMES};
use crate::types::StreamFrame;
use crate::{Error, Result};

/// Prefix of the only significant line type.
const DATA_PREFIX: &str = "data: ";

/// Incremental, chunk-invariant decoder for the chat event stream.
///
/// Feed chunks with [`FrameDecoder::push`] as they arrive and call [`FrameDecoder::finish`]
/// once the byte stream ends.  Each returned item is either a frame or a decode error for one
/// line; decode errors never stop the decoder.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending_bytes: Vec<u8>,
    line: String,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk of bytes, returning every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<StreamFrame>> {
        STREAM_BYTES.count(chunk.len() as u64);
        let mut out = Vec::new();
        self.pending_bytes.extend_from_slice(chunk);
        // Text already in `line` holds no newline; only the new suffix needs scanning.
        let mut scan_from = self.line.len();
        self.decode_utf8(false, &mut out);
        let mut consumed = 0;
        while let Some(offset) = self.line[scan_from..].find('\n') {
            let end = scan_from + offset + 1;
            if let Some(item) = parse_line(&self.line[consumed..end]) {
                out.push(item);
            }
            consumed = end;
            scan_from = end;
        }
        self.line.drain(..consumed);
        out
    }

    /// Flush the decoder at end of stream.
    ///
    /// A final `data:` line without a terminating newline is still decoded.
    pub fn finish(&mut self) -> Vec<Result<StreamFrame>> {
        let mut out = Vec::new();
        self.decode_utf8(true, &mut out);
        let line = std::mem::take(&mut self.line);
        if let Some(item) = parse_line(&line) {
            out.push(item);
        }
        out
    }

    /// Move every complete UTF-8 sequence from `pending_bytes` into `line`.
    ///
    /// An incomplete sequence at the end is kept for the next chunk unless `at_end` is set.
    /// Invalid bytes become U+FFFD and are reported as encoding errors.
    fn decode_utf8(&mut self, at_end: bool, out: &mut Vec<Result<StreamFrame>>) {
        let mut start = 0;
        while start < self.pending_bytes.len() {
            match std::str::from_utf8(&self.pending_bytes[start..]) {
                Ok(text) => {
                    self.line.push_str(text);
                    start = self.pending_bytes.len();
                }
                Err(err) => {
                    let valid = start + err.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending_bytes[start..valid]) {
                        self.line.push_str(text);
                    }
                    match err.error_len() {
                        Some(len) => {
                            start = valid + len;
                        }
                        None if at_end => {
                            start = self.pending_bytes.len();
                        }
                        None => {
                            start = valid;
                            break;
                        }
                    }
                    self.line.push(char::REPLACEMENT_CHARACTER);
                    STREAM_DECODE_ERRORS.click();
                    out.push(Err(Error::encoding(
                        format!("Invalid UTF-8 in stream: {err}"),
                        Some(Box::new(err)),
                    )));
                }
            }
        }
        self.pending_bytes.drain(..start);
    }
}

/// Parse one line of the stream.
///
/// Returns `None` for lines that carry nothing: non-`data:` lines and events without a
/// conversation id or answer.
fn parse_line(line: &str) -> Option<Result<StreamFrame>> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?;
    match serde_json::from_str::<StreamFrame>(payload) {
        Ok(frame) if frame.is_empty() => None,
        Ok(frame) => {
            STREAM_FRAMES.click();
            Some(Ok(frame))
        }
        Err(err) => {
            STREAM_DECODE_ERRORS.click();
            Some(Err(Error::serialization(
                format!("Malformed event data {payload:?}: {err}"),
                Some(Box::new(err)),
            )))
        }
    }
}

/// Process a stream of bytes into a stream of frames.
///
/// Transport errors from the byte stream are passed through and end the stream.  Decode errors
/// are yielded in place and the stream continues.  The next chunk is not read until every frame
/// from the previous chunk has been consumed.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<StreamFrame>>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let state = (byte_stream, FrameDecoder::new(), VecDeque::new(), false);
    stream::unfold(
        state,
        |(mut stream, mut decoder, mut ready, mut done)| async move {
            loop {
                if let Some(item) = ready.pop_front() {
                    return Some((item, (stream, decoder, ready, done)));
                }
                if done {
                    return None;
                }
                match stream.next().await {
                    Some(Ok(bytes)) => ready.extend(decoder.push(&bytes)),
                    Some(Err(err)) => {
                        done = true;
                        return Some((Err(err), (stream, decoder, ready, done)));
                    }
                    None => {
                        done = true;
                        ready.extend(decoder.finish());
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &[u8] = b"data: {\"conversation_id\":\"abc\"}\n\
        data: {\"answer\":\"Hi \"}\n\
        event: ping\n\
        \n\
        data: {\"answer\":\"there \\u00e9\xc3\xa9\"}\n\
        data: {\"event\":\"message_end\"}\n";

    fn frames(items: Vec<Result<StreamFrame>>) -> Vec<StreamFrame> {
        items.into_iter().filter_map(Result::ok).collect()
    }

    fn decode_in_chunks(bytes: &[u8], size: usize) -> Vec<StreamFrame> {
        let mut decoder = FrameDecoder::new();
        let mut out = Vec::new();
        for chunk in bytes.chunks(size) {
            out.extend(frames(decoder.push(chunk)));
        }
        out.extend(frames(decoder.finish()));
        out
    }

    #[test]
    fn decodes_whole_stream() {
        let got = decode_in_chunks(SCENARIO, SCENARIO.len());
        assert_eq!(
            got,
            vec![
                StreamFrame::session("abc"),
                StreamFrame::answer("Hi "),
                StreamFrame::answer("there éé"),
            ]
        );
    }

    #[test]
    fn chunking_invariance() {
        let whole = decode_in_chunks(SCENARIO, SCENARIO.len());
        for size in 1..SCENARIO.len() {
            assert_eq!(decode_in_chunks(SCENARIO, size), whole, "chunk size {size}");
        }
    }

    #[test]
    fn split_line_is_carried_over() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"ans").is_empty());
        let got = frames(decoder.push(b"wer\":\"hi\"}\n"));
        assert_eq!(got, vec![StreamFrame::answer("hi")]);
    }

    #[test]
    fn malformed_json_is_reported_and_skipped() {
        let mut decoder = FrameDecoder::new();
        let items = decoder.push(b"data: {not json}\ndata: {\"answer\":\"ok\"}\n");
        assert_eq!(items.len(), 2);
        assert!(items[0].as_ref().is_err_and(Error::is_frame_decode));
        assert_eq!(items[1].as_ref().ok(), Some(&StreamFrame::answer("ok")));
    }

    #[test]
    fn crlf_lines() {
        let mut decoder = FrameDecoder::new();
        let got = frames(decoder.push(b"data: {\"answer\":\"x\"}\r\n"));
        assert_eq!(got, vec![StreamFrame::answer("x")]);
    }

    #[test]
    fn unterminated_final_line_is_flushed() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"answer\":\"tail\"}").is_empty());
        assert_eq!(frames(decoder.finish()), vec![StreamFrame::answer("tail")]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut decoder = FrameDecoder::new();
        let items = decoder.push(b"data: {\"answer\":\"a\xffb\"}\n");
        assert!(items[0].as_ref().is_err_and(Error::is_frame_decode));
        assert_eq!(
            items[1].as_ref().ok(),
            Some(&StreamFrame::answer("a\u{fffd}b"))
        );
    }

    #[test]
    fn long_line_fed_byte_by_byte() {
        let answer = "x".repeat(4096);
        let wire = format!("data: {{\"answer\":\"{answer}\"}}\n");
        let mut decoder = FrameDecoder::new();
        let mut got = Vec::new();
        for byte in wire.as_bytes().chunks(1) {
            got.extend(frames(decoder.push(byte)));
        }
        assert_eq!(got, vec![StreamFrame::answer(answer)]);
        assert!(decoder.line.is_empty());
    }

    #[test]
    fn many_lines_in_one_chunk() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"answer\":\"a\"}").is_empty());
        let got = frames(decoder.push(
            b"\ndata: {\"answer\":\"b\"}\n\ndata: {\"answer\":\"c\"}\ndata: {\"ans",
        ));
        assert_eq!(
            got,
            vec![
                StreamFrame::answer("a"),
                StreamFrame::answer("b"),
                StreamFrame::answer("c"),
            ]
        );
        assert_eq!(decoder.line, "data: {\"ans");
        assert_eq!(frames(decoder.push(b"wer\":\"d\"}\n")), vec![StreamFrame::answer("d")]);
    }

    #[tokio::test]
    async fn process_sse_stream() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: {\"conversation_id\":\"abc\"}\nda")),
            Ok(Bytes::from_static(b"ta: {\"answer\":\"Hi\"}\n")),
        ];
        let sse = process_sse(stream::iter(chunks));
        let got: Vec<_> = sse.collect().await;
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].as_ref().ok(), Some(&StreamFrame::session("abc")));
        assert_eq!(got[1].as_ref().ok(), Some(&StreamFrame::answer("Hi")));
    }

    #[tokio::test]
    async fn process_sse_passes_transport_errors_through() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: {\"answer\":\"partial\"}\n")),
            Err(Error::streaming("connection reset", None)),
            Ok(Bytes::from_static(b"data: {\"answer\":\"never\"}\n")),
        ];
        let sse = process_sse(stream::iter(chunks));
        let got: Vec<_> = sse.collect().await;
        assert_eq!(got.len(), 2);
        assert!(got[1].as_ref().is_err_and(Error::is_transport));
    }
}
