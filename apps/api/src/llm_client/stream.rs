//! Line decoder for the chat-completion event stream.
//!
//! The upstream body is a sequence of `data: <json>` lines separated by blank
//! lines, terminated by `data: [DONE]`. Bytes are buffered until a newline is
//! seen so that lines (and multi-byte characters) split across network chunks
//! are reassembled before parsing.

use serde::Deserialize;
use tracing::{debug, warn};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";
const STOP_REASON: &str = "stop";

/// One decoded unit of the stream, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental fragment of the final answer.
    Content(String),
    /// Incremental fragment of the model's reasoning channel.
    Reasoning(String),
    /// A chunk carried `finish_reason == "stop"`.
    Stop,
    /// The `[DONE]` sentinel. Nothing after it is interpreted.
    Done,
}

#[derive(Debug, Deserialize)]
struct ChunkEnvelope {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<ChunkUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: Option<ChunkDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
    reasoning_content: Option<String>,
}

/// Providers report usage with varying completeness; every field is optional.
#[derive(Debug, Deserialize)]
struct ChunkUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

/// Incremental decoder. Feed it raw body chunks; it yields events for every
/// complete line seen so far.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Appends `chunk` and decodes every newline-terminated line it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.decode_line(&line[..line.len() - 1], &mut events);
        }
        events
    }

    /// Flushes a trailing line that was never newline-terminated.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.decode_line(&line, &mut events);
        }
        events
    }

    fn decode_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) {
        if self.done {
            return;
        }

        let text = String::from_utf8_lossy(raw);
        let line = text.trim_end_matches('\r');
        if line.trim().is_empty() {
            return;
        }

        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };

        // Not JSON; must be checked before parsing.
        if payload.trim_end() == DONE_SENTINEL {
            self.done = true;
            events.push(StreamEvent::Done);
            return;
        }

        let envelope: ChunkEnvelope = match serde_json::from_str(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Skipping malformed stream line: {e}");
                return;
            }
        };

        let Some(choice) = envelope.choices.into_iter().next() else {
            debug!("Stream chunk without choices");
            return;
        };

        if let Some(delta) = choice.delta {
            if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                events.push(StreamEvent::Content(content));
            }
            if let Some(reasoning) = delta.reasoning_content.filter(|r| !r.is_empty()) {
                events.push(StreamEvent::Reasoning(reasoning));
            }
        }

        if choice.finish_reason.as_deref() == Some(STOP_REASON) {
            if let Some(usage) = envelope.usage {
                debug!(
                    "Stream finished: prompt_tokens={:?}, completion_tokens={:?}, total_tokens={:?}",
                    usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
                );
            }
            events.push(StreamEvent::Stop);
        }
    }
}
