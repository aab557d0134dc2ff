//! Incremental newline framing
//!
//! Bytes arrive in arbitrary chunks. Complete lines are emitted as soon as
//! their delimiter is seen; a trailing partial line stays buffered and is
//! prefixed to the next chunk. Lines are decoded as UTF-8 only once complete,
//! so a multi-byte character split across chunks survives intact.

/// Splits an inbound byte stream into trimmed, non-empty lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let Some(last_newline) = self.buffer.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete
            .split(|b| *b == b'\n')
            .filter_map(Self::decode_line)
            .collect()
    }

    /// Flush whatever partial line remains once the stream has ended
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        Self::decode_line(&rest)
    }

    /// Bytes buffered awaiting a delimiter
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn decode_line(bytes: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(bytes);
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}
