//! The immutable bytecode buffer and its optional hook-session prefix.

/// The literal 5-byte prefix that, if present at offset 0, signals that a
/// session should be opened with the optimizer hook before execution
/// begins.
pub const HOOK_SESSION_MAGIC: &[u8; 5] = b"AXION";

/// An immutable byte buffer, loaded once per VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    bytes: Vec<u8>,
    opens_hook_session: bool,
}

impl Code {
    /// Loads raw bytes, stripping a leading `AXION` magic if present.
    pub fn load(raw: &[u8]) -> Self {
        if raw.starts_with(HOOK_SESSION_MAGIC) {
            Self {
                bytes: raw[HOOK_SESSION_MAGIC.len()..].to_vec(),
                opens_hook_session: true,
            }
        } else {
            Self {
                bytes: raw.to_vec(),
                opens_hook_session: false,
            }
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn opens_hook_session(&self) -> bool {
        self.opens_hook_session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_hook_session_prefix() {
        let mut raw = HOOK_SESSION_MAGIC.to_vec();
        raw.extend_from_slice(&[0x00, 0xFF]);
        let code = Code::load(&raw);
        assert!(code.opens_hook_session());
        assert_eq!(code.bytes(), &[0x00, 0xFF]);
    }

    #[test]
    fn leaves_plain_code_untouched() {
        let code = Code::load(&[0x00, 0xFF]);
        assert!(!code.opens_hook_session());
        assert_eq!(code.bytes(), &[0x00, 0xFF]);
    }
}
