//! Event-stream protocol for council responses
//!
//! The service pushes a line-oriented event stream: each logical event is an
//! `event: <name>` line followed by a `data: <json>` line. Four event names
//! mark the completion of a pipeline stage; everything else passes through
//! untyped and is dropped by the collector.

use serde_json::Value;

/// A pipeline stage of the council service
///
/// The set is closed: candidate drafting, cross-review, synthesis, and
/// claim verification. Matching on `StageId` is exhaustive, so adding a
/// stage forces every consumer to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    /// Candidate answer drafting
    Stage1,
    /// Cross-review of candidates
    Stage2,
    /// Final answer synthesis
    Stage3,
    /// Claim verification
    Stage4,
}

impl StageId {
    /// All stages, in pipeline order
    pub const ALL: [StageId; 4] = [Self::Stage1, Self::Stage2, Self::Stage3, Self::Stage4];

    /// The event name that marks this stage's completion
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Stage1 => "stage1.complete",
            Self::Stage2 => "stage2.complete",
            Self::Stage3 => "stage3.complete",
            Self::Stage4 => "stage4.complete",
        }
    }

    /// Short key used for latency maps and report rows
    pub fn key(&self) -> &'static str {
        match self {
            Self::Stage1 => "stage1",
            Self::Stage2 => "stage2",
            Self::Stage3 => "stage3",
            Self::Stage4 => "stage4",
        }
    }

    /// Map a completion event name back to its stage
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "stage1.complete" => Some(Self::Stage1),
            "stage2.complete" => Some(Self::Stage2),
            "stage3.complete" => Some(Self::Stage3),
            "stage4.complete" => Some(Self::Stage4),
            _ => None,
        }
    }
}

/// One decoded event from the stream
#[derive(Debug, Clone)]
pub struct StageEvent {
    /// Raw event name (e.g. "stage3.complete"); not restricted to stages
    pub name: String,
    /// Decoded JSON payload from the `data:` line
    pub payload: Value,
}

impl StageEvent {
    /// Stage this event completes, if it is a stage-completion event
    pub fn stage(&self) -> Option<StageId> {
        StageId::from_event_name(&self.name)
    }
}

/// Parser state: either waiting for an event line, or armed with the name
/// from one and waiting for its data line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParserState {
    Idle,
    Armed(String),
}

/// Incremental parser for the `event:`/`data:` line protocol
///
/// Feed lines one at a time as they arrive; a `StageEvent` is produced for
/// each completed event/data pair. One parser instance is scoped to one
/// response stream; there is no cross-stream buffering.
///
/// An `event:` line arms the parser with its name; the next `data:` line
/// consumes it. A `data:` line with nothing armed is dropped, as is a
/// `data:` line whose payload is not valid JSON (the stream keeps going:
/// losing one stage is preferable to losing the whole result). A second
/// `event:` line before any data re-arms with the new name.
#[derive(Debug)]
pub struct EventStreamParser {
    state: ParserState,
}

impl EventStreamParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Idle,
        }
    }

    /// Consume one raw line from the stream
    ///
    /// Returns a decoded event when the line completes an event/data pair,
    /// `None` otherwise. Blank lines and unrecognized line shapes are
    /// ignored.
    pub fn feed_line(&mut self, raw: &str) -> Option<StageEvent> {
        let line = raw.trim();

        if let Some(name) = line.strip_prefix("event: ") {
            self.state = ParserState::Armed(name.to_string());
            return None;
        }

        if let Some(body) = line.strip_prefix("data: ") {
            // A data line only counts against an armed event, and consumes
            // the armed name whether or not its payload decodes.
            if let ParserState::Armed(name) = std::mem::replace(&mut self.state, ParserState::Idle)
            {
                match serde_json::from_str::<Value>(body) {
                    Ok(payload) => {
                        return Some(StageEvent {
                            name,
                            payload,
                        })
                    }
                    Err(err) => {
                        tracing::debug!("dropping undecodable payload for '{}': {}", name, err);
                    }
                }
            }
        }

        None
    }
}

impl Default for EventStreamParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Reassembles lines from a stream of byte chunks
///
/// Network chunks split lines (and UTF-8 sequences) at arbitrary byte
/// boundaries, so splitting happens on raw bytes and each completed line is
/// decoded lossily on its own.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let rest = self.buf.split_off(pos + 1);
            let line = std::mem::replace(&mut self.buf, rest);
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Drain whatever remains after the stream ends (a final unterminated line)
    pub fn flush(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Some(line)
    }
}
