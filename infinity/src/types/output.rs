/// Append-only transcript of the supervised process's combined output.
///
/// Bytes arrive in arbitrary chunks, so a multi-byte UTF-8 sequence split
/// across two reads is held back until the rest of it shows up. Invalid bytes
/// are replaced with U+FFFD. The decoded text never shrinks.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    text: String,
    pending: Vec<u8>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw chunk. Returns true when the decoded text grew.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        let before = self.text.len();
        self.pending.extend_from_slice(chunk);

        let mut consumed = 0;
        while consumed < self.pending.len() {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    consumed = self.pending.len();
                }
                Err(err) => {
                    let valid_len = err.valid_up_to();
                    self.text.push_str(&String::from_utf8_lossy(
                        &self.pending[consumed..consumed + valid_len],
                    ));
                    consumed += valid_len;
                    match err.error_len() {
                        Some(invalid_len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            consumed += invalid_len;
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => break,
                    }
                }
            }
        }
        self.pending.drain(..consumed);

        self.text.len() > before
    }

    /// Flush a dangling partial sequence once the stream has ended.
    pub fn finish(&mut self) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let tail = std::mem::take(&mut self.pending);
        self.text.push_str(&String::from_utf8_lossy(&tail));
        true
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_accumulates_cumulative_text() {
        let mut buffer = OutputBuffer::new();
        let mut seen = Vec::new();
        for chunk in ["A", "B", "C"] {
            assert!(buffer.push(chunk.as_bytes()));
            seen.push(buffer.as_str().to_string());
        }
        assert_eq!(seen, ["A", "AB", "ABC"]);
    }

    #[test]
    fn test_push_holds_back_split_multibyte_sequence() {
        let bytes = "✓ passed".as_bytes();
        let mut buffer = OutputBuffer::new();

        assert!(!buffer.push(&bytes[..1]));
        assert_eq!(buffer.as_str(), "");
        assert!(!buffer.push(&bytes[1..2]));
        assert!(buffer.push(&bytes[2..]));
        assert_eq!(buffer.as_str(), "✓ passed");
    }

    #[test]
    fn test_push_replaces_invalid_bytes() {
        let mut buffer = OutputBuffer::new();
        buffer.push(b"ok \xff done");
        assert_eq!(buffer.as_str(), "ok \u{FFFD} done");
    }

    #[test]
    fn test_finish_flushes_truncated_tail() {
        let mut buffer = OutputBuffer::new();
        buffer.push(b"end \xe2\x9c");
        assert_eq!(buffer.as_str(), "end ");
        assert!(buffer.finish());
        assert_eq!(buffer.as_str(), "end \u{FFFD}");
        assert!(!buffer.finish());
    }

    #[test]
    fn test_length_never_decreases() {
        let mut buffer = OutputBuffer::new();
        let mut last = 0;
        for chunk in [&b"collecting"[..], b"", b"\xe2", b"\x9c\x93", b"\n", b"\xff"] {
            buffer.push(chunk);
            assert!(buffer.len() >= last);
            last = buffer.len();
        }
        assert!(!buffer.is_empty());
    }
}
