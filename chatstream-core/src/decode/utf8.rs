//! Incremental UTF-8 decoding across arbitrary chunk boundaries.

/// Stateful UTF-8 decoder.
///
/// A multi-byte sequence split across two chunks is held until the rest
/// arrives. Invalid sequences decode to U+FFFD and decoding continues.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, appending the text to `out`.
    pub fn decode_into(&mut self, chunk: &[u8], out: &mut String) {
        let owned;
        let mut bytes: &[u8] = if self.pending.is_empty() {
            chunk
        } else {
            self.pending.extend_from_slice(chunk);
            owned = std::mem::take(&mut self.pending);
            &owned
        };

        loop {
            match std::str::from_utf8(bytes) {
                Ok(s) => {
                    out.push_str(s);
                    return;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    if let Ok(valid) = std::str::from_utf8(&bytes[..valid_up_to]) {
                        out.push_str(valid);
                    }
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            bytes = &bytes[valid_up_to + bad..];
                        }
                        None => {
                            // incomplete sequence at the end, wait for more bytes
                            self.pending.extend_from_slice(&bytes[valid_up_to..]);
                            return;
                        }
                    }
                }
            }
        }
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut out = String::with_capacity(chunk.len());
        self.decode_into(chunk, &mut out);
        out
    }

    /// End of input: any held incomplete sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
