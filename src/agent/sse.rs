//! Translation of an OpenAI-style event stream into plain text deltas.
//!
//! The upstream body is a sequence of `data: <json>` lines separated by blank
//! lines and closed with `data: [DONE]`. Each JSON record carries the next
//! piece of the reply at `choices[0].delta.content`.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::errors::StreamError;

/// Splits a byte stream into lines without decoding partial characters.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    /// Appends `chunk` and returns every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buf[start..].iter().position(|b| *b == b'\n') {
            let end = start + pos;
            lines.push(decode_line(&self.buf[start..end]));
            start = end + 1;
        }
        self.buf.drain(..start);
        lines
    }

    /// Returns the trailing line if the stream ended without a newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(decode_line(&rest))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[derive(Debug, PartialEq, Eq)]
pub enum Record<'a> {
    Data(&'a str),
    Done,
}

/// Classifies one line. Blank lines, comments and non-`data` fields yield `None`.
pub fn parse_record(line: &str) -> Option<Record<'_>> {
    let payload = line.strip_prefix("data:")?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    match payload.trim() {
        "" => None,
        "[DONE]" => Some(Record::Done),
        _ => Some(Record::Data(payload)),
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// Pulls `choices[0].delta.content` out of a record payload.
/// Empty content is treated as absent.
pub fn extract_delta(payload: &str) -> Result<Option<String>, serde_json::Error> {
    let chunk: StreamChunk = serde_json::from_str(payload)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty()))
}

struct Translator<S> {
    upstream: Pin<Box<S>>,
    lines: LineDecoder,
    pending: VecDeque<Bytes>,
    finished: bool,
}

impl<S> Translator<S> {
    fn queue(&mut self, lines: impl IntoIterator<Item = String>) {
        for line in lines {
            match parse_record(&line) {
                Some(Record::Data(payload)) => match extract_delta(payload) {
                    Ok(Some(delta)) => self.pending.push_back(Bytes::from(delta)),
                    Ok(None) => {}
                    Err(e) => warn!("Skipping malformed stream record: {e} (payload: {payload})"),
                },
                Some(Record::Done) => debug!("Upstream sent end-of-stream sentinel"),
                None => {}
            }
        }
    }
}

/// Turns an upstream event-stream body into a stream of text deltas.
///
/// Single pass and lazy: a chunk is only pulled from `upstream` once every
/// delta decoded so far has been handed out. The output ends when `upstream`
/// ends. An upstream error is forwarded as one `Err` and then the output ends.
pub fn translate<S, E>(upstream: S) -> impl Stream<Item = Result<Bytes, StreamError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send,
{
    let state = Translator {
        upstream: Box::pin(upstream),
        lines: LineDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(delta) = st.pending.pop_front() {
                return Some((Ok(delta), st));
            }
            if st.finished {
                return None;
            }
            match st.upstream.next().await {
                Some(Ok(chunk)) => {
                    let lines = st.lines.push(&chunk);
                    st.queue(lines);
                }
                Some(Err(e)) => {
                    error!("Upstream stream interrupted: {e}");
                    st.finished = true;
                    return Some((Err(StreamError { message: e.to_string() }), st));
                }
                None => {
                    st.finished = true;
                    let rest = st.lines.finish();
                    st.queue(rest);
                }
            }
        }
    })
}
