use std::sync::LazyLock;

use regex::Regex;

use super::frames::{METADATA_SENTINEL, StreamMetadata, TOOL_EVENT_SENTINEL, ToolEvent};
use super::tracker::ToolCallTracker;

/// Greedy match from the first `{` to the last `}` of the metadata buffer.
static OBJECT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("metadata pattern is a valid regex"));

/// Decoder position in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    StreamingText,
    CollectingMetadata,
    Done,
}

/// One decoded frame, ready for the UI to apply, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderUpdate {
    Text(String),
    ToolEvent(ToolEvent),
    Metadata(StreamMetadata),
}

/// Everything reconstructed from one response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedStream {
    pub content: String,
    pub tool_events: Vec<ToolEvent>,
    pub metadata: Option<StreamMetadata>,
    /// Tool calls that never reported a result.
    pub active_tool_calls: Vec<String>,
}

/// Incremental demultiplexer for a response body.
///
/// Network chunks do not line up with frames, so the decoder holds back
/// anything that could still turn into a frame: a tail that is a prefix of a
/// sentinel, a tool-event frame whose terminating newline has not arrived,
/// and a partial UTF-8 sequence. The output is therefore the same however
/// the body is split.
#[derive(Debug)]
pub struct StreamDecoder {
    state: DecoderState,
    pending: String,
    utf8_tail: Vec<u8>,
    metadata_buf: Vec<u8>,
    content: String,
    tool_events: Vec<ToolEvent>,
    tracker: ToolCallTracker,
    metadata: Option<StreamMetadata>,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::StreamingText,
            pending: String::new(),
            utf8_tail: Vec::new(),
            metadata_buf: Vec::new(),
            content: String::new(),
            tool_events: Vec::new(),
            tracker: ToolCallTracker::new(),
            metadata: None,
        }
    }

    /// Decode a complete body in one go.
    pub fn decode(body: &[u8]) -> DecodedStream {
        let mut decoder = Self::new();
        decoder.push(body);
        decoder.finish();
        decoder.into_decoded()
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Plain text decoded so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn tool_events(&self) -> &[ToolEvent] {
        &self.tool_events
    }

    pub fn tracker(&self) -> &ToolCallTracker {
        &self.tracker
    }

    pub fn metadata(&self) -> Option<&StreamMetadata> {
        self.metadata.as_ref()
    }

    /// Feed one network chunk and get the updates it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DecoderUpdate> {
        let mut updates = Vec::new();
        match self.state {
            DecoderState::StreamingText => {
                let text = self.take_utf8(chunk);
                self.pending.push_str(&text);
                self.drain_pending(&mut updates, false);
            }
            DecoderState::CollectingMetadata => self.metadata_buf.extend_from_slice(chunk),
            DecoderState::Done => {
                tracing::debug!(bytes = chunk.len(), "Ignoring data after end of stream");
            }
        }
        updates
    }

    /// Signal end of stream: flush held-back text and parse the metadata.
    /// Never fails; a missing or unreadable metadata frame leaves
    /// `metadata()` empty.
    pub fn finish(&mut self) -> Vec<DecoderUpdate> {
        let mut updates = Vec::new();
        if self.state == DecoderState::StreamingText {
            if !self.utf8_tail.is_empty() {
                let tail = String::from_utf8_lossy(&self.utf8_tail).into_owned();
                self.utf8_tail.clear();
                self.pending.push_str(&tail);
            }
            self.drain_pending(&mut updates, true);
        }

        match self.state {
            DecoderState::CollectingMetadata => {
                let raw = String::from_utf8_lossy(&self.metadata_buf).into_owned();
                self.metadata = recover_metadata(&raw);
                match &self.metadata {
                    Some(meta) => updates.push(DecoderUpdate::Metadata(meta.clone())),
                    None => tracing::warn!(
                        bytes = raw.len(),
                        "Metadata frame unreadable, continuing without it"
                    ),
                }
            }
            DecoderState::StreamingText => {
                tracing::warn!("Stream ended without a metadata frame");
            }
            DecoderState::Done => {}
        }

        self.state = DecoderState::Done;
        updates
    }

    pub fn into_decoded(self) -> DecodedStream {
        DecodedStream {
            active_tool_calls: self
                .tracker
                .active_ids()
                .into_iter()
                .map(str::to_string)
                .collect(),
            content: self.content,
            tool_events: self.tool_events,
            metadata: self.metadata,
        }
    }

    // ── internals ───────────────────────────────────────────────────────────

    /// Convert bytes to text, keeping an incomplete trailing UTF-8 sequence
    /// for the next chunk.
    fn take_utf8(&mut self, chunk: &[u8]) -> String {
        self.utf8_tail.extend_from_slice(chunk);
        match std::str::from_utf8(&self.utf8_tail) {
            Ok(text) => {
                let text = text.to_string();
                self.utf8_tail.clear();
                text
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let text = String::from_utf8_lossy(&self.utf8_tail[..valid]).into_owned();
                self.utf8_tail.drain(..valid);
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.utf8_tail).into_owned();
                self.utf8_tail.clear();
                text
            }
        }
    }

    fn drain_pending(&mut self, updates: &mut Vec<DecoderUpdate>, at_end: bool) {
        loop {
            let tool_at = self.pending.find(TOOL_EVENT_SENTINEL);
            let meta_at = self.pending.find(METADATA_SENTINEL);

            match (tool_at, meta_at) {
                (_, Some(meta)) if tool_at.is_none_or(|tool| meta < tool) => {
                    let before: String = self.pending.drain(..meta).collect();
                    self.emit_text(before, updates);
                    let rest = self.pending.split_off(METADATA_SENTINEL.len());
                    self.pending.clear();
                    self.metadata_buf.extend_from_slice(rest.as_bytes());
                    self.metadata_buf.append(&mut self.utf8_tail);
                    self.state = DecoderState::CollectingMetadata;
                    return;
                }
                (Some(tool), _) => {
                    let before: String = self.pending.drain(..tool).collect();
                    self.emit_text(before, updates);

                    // The sentinel now sits at the start of `pending`
                    let body_start = TOOL_EVENT_SENTINEL.len();
                    match self.pending[body_start..].find('\n') {
                        Some(rel) => {
                            let end = body_start + rel;
                            match parse_tool_event(&self.pending[body_start..end]) {
                                Some(event) => {
                                    self.pending.drain(..=end);
                                    self.emit_tool_event(event, updates);
                                }
                                None => {
                                    // Keep the newline: it may open the next sentinel
                                    let raw: String = self.pending.drain(..end).collect();
                                    tracing::debug!(frame = %raw.trim(), "Malformed tool event kept as text");
                                    self.emit_text(raw, updates);
                                }
                            }
                        }
                        None if at_end => {
                            let raw = std::mem::take(&mut self.pending);
                            match parse_tool_event(&raw[body_start..]) {
                                Some(event) => self.emit_tool_event(event, updates),
                                None => self.emit_text(raw, updates),
                            }
                            return;
                        }
                        None => return,
                    }
                }
                (None, _) => {
                    let keep = if at_end {
                        0
                    } else {
                        partial_sentinel_len(&self.pending)
                    };
                    let emit_to = self.pending.len() - keep;
                    let text: String = self.pending.drain(..emit_to).collect();
                    self.emit_text(text, updates);
                    return;
                }
            }
        }
    }

    fn emit_text(&mut self, text: String, updates: &mut Vec<DecoderUpdate>) {
        if text.is_empty() {
            return;
        }
        self.content.push_str(&text);
        updates.push(DecoderUpdate::Text(text));
    }

    fn emit_tool_event(&mut self, event: ToolEvent, updates: &mut Vec<DecoderUpdate>) {
        self.tracker.observe(&event);
        self.tool_events.push(event.clone());
        updates.push(DecoderUpdate::ToolEvent(event));
    }
}

fn parse_tool_event(payload: &str) -> Option<ToolEvent> {
    serde_json::from_str(payload.trim_end_matches('\r')).ok()
}

/// Length of the longest suffix of `text` that is a proper prefix of either
/// sentinel. Sentinels are ASCII, so the cut is always a char boundary.
fn partial_sentinel_len(text: &str) -> usize {
    [TOOL_EVENT_SENTINEL, METADATA_SENTINEL]
        .iter()
        .map(|sentinel| {
            (1..sentinel.len())
                .rev()
                .find(|&k| text.ends_with(&sentinel[..k]))
                .unwrap_or(0)
        })
        .max()
        .unwrap_or(0)
}

/// Parse a metadata buffer, tolerating transport garbage.
///
/// Tries the whole buffer first, then the longest leading `{…}` object that
/// parses, shrinking from the last closing brace.
pub fn recover_metadata(raw: &str) -> Option<StreamMetadata> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(meta) = serde_json::from_str(trimmed) {
        return Some(meta);
    }

    let candidate = OBJECT_PATTERN.find(trimmed)?.as_str();
    let mut end = candidate.len();
    loop {
        if let Ok(meta) = serde_json::from_str::<StreamMetadata>(&candidate[..end]) {
            tracing::debug!(
                discarded = trimmed.len() - end,
                "Recovered metadata from a damaged frame"
            );
            return Some(meta);
        }
        end = candidate[..end - 1].rfind('}')? + 1;
    }
}
