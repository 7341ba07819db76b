//! Incremental UTF-8 decoding for terminal output.
//!
//! PTY reads split the byte stream at arbitrary points, so a multi-byte
//! character can straddle two chunks. [`Utf8Decoder`] keeps the incomplete
//! tail of one chunk and prepends it to the next.

/// Longest possible UTF-8 sequence.
const MAX_SEQUENCE: usize = 4;

/// Stateful decoder that turns a chunked byte stream into text.
///
/// Invalid sequences are replaced with U+FFFD; only a truncated sequence at
/// the very end of a chunk is held back.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        None => {
                            // Truncated sequence at the end of the input.
                            self.pending.extend_from_slice(after);
                            break;
                        }
                    }
                }
            }
        }
        debug_assert!(self.pending.len() < MAX_SEQUENCE);
        out
    }

    /// Flush whatever is still held back, lossily.
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
