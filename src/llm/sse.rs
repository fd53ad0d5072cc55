use serde::Deserialize;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

/// Incremental decoder for a provider's streamed `data:` frames.
///
/// Bytes arrive in arbitrary chunks, so a trailing partial line (which may
/// end mid-frame or mid-UTF-8-sequence) is carried in `pending` until the
/// rest of it shows up. Lines that are not well-formed content frames are
/// dropped without comment: a line split across chunks parses fine on the
/// next push, and the `[DONE]` sentinel is an end marker, not content.
pub struct DeltaDecoder {
    pending: Vec<u8>,
    content: String,
}

impl DeltaDecoder {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            content: String::new(),
        }
    }

    /// Feeds one upstream chunk and returns the content deltas completed
    /// by it, in order. Each returned delta has already been appended to
    /// the accumulated final text.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut deltas = Vec::new();
        let mut consumed = 0;
        while let Some(nl) = self.pending[consumed..].iter().position(|&b| b == b'\n') {
            let end = consumed + nl;
            if let Some(delta) = decode_line(&self.pending[consumed..end], &mut self.content) {
                deltas.push(delta);
            }
            consumed = end + 1;
        }
        self.pending.drain(..consumed);
        deltas
    }

    /// Flushes any buffered final line and returns it alongside the
    /// accumulated text, which is the canonical content for persistence.
    pub fn finish(mut self) -> (Option<String>, String) {
        let tail = if self.pending.is_empty() {
            None
        } else {
            decode_line(&self.pending, &mut self.content)
        };
        (tail, self.content)
    }
}

impl Default for DeltaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_line(line: &[u8], accumulated: &mut String) -> Option<String> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let line = std::str::from_utf8(line).ok()?;
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    if payload == DONE_SENTINEL {
        return None;
    }
    let frame: StreamChunk = serde_json::from_str(payload).ok()?;
    let delta = frame.choices.into_iter().next()?.delta.content?;
    if delta.is_empty() {
        return None;
    }
    accumulated.push_str(&delta);
    Some(delta)
}
