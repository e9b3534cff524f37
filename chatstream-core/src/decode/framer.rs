//! Newline framing over a raw byte stream.

use super::utf8::Utf8Decoder;

/// Splits a byte stream into lines terminated by `\r\n`, `\n` or `\r`.
///
/// The unterminated tail is retained across `feed` calls. Emitted lines plus the
/// retained tail always equal everything fed so far, decoded.
#[derive(Debug, Default)]
pub struct LineFramer {
    decoder: Utf8Decoder,
    buf: String,
    // prefix of `buf` already known to hold no terminator
    scanned: usize,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and drain every complete line.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decoder.decode_into(chunk, &mut self.buf);
        self.drain_lines()
    }

    /// End of input: the held-back tail as a final line, if non-empty.
    ///
    /// Returns more than one line only when a held `\r` turns out to be a
    /// terminator followed by a flushed partial character.
    pub fn flush(&mut self) -> Vec<String> {
        let rest = self.decoder.finish();
        self.buf.push_str(&rest);
        let mut lines = self.drain_lines();
        let mut tail = std::mem::take(&mut self.buf);
        self.scanned = 0;
        if tail.ends_with('\r') {
            tail.pop();
            lines.push(tail);
        } else if !tail.is_empty() {
            lines.push(tail);
        }
        lines
    }

    /// Bytes of text currently held as the unterminated tail.
    pub fn tail(&self) -> &str {
        &self.buf
    }

    fn drain_lines(&mut self) -> Vec<String> {
        let bytes = self.buf.as_bytes();
        let len = bytes.len();
        let mut lines = Vec::new();
        let mut start = 0;
        let mut i = self.scanned;
        while i < len {
            match bytes[i] {
                b'\n' => {
                    lines.push(self.buf[start..i].to_string());
                    i += 1;
                    start = i;
                }
                b'\r' => {
                    if i + 1 == len {
                        // may be the first half of `\r\n`
                        break;
                    }
                    lines.push(self.buf[start..i].to_string());
                    i += if bytes[i + 1] == b'\n' { 2 } else { 1 };
                    start = i;
                }
                _ => i += 1,
            }
        }
        self.buf.drain(..start);
        self.scanned = i - start;
        lines
    }
}
