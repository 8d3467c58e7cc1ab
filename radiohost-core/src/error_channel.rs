//! Bounded, overwrite-on-failure diagnostic buffer.

use std::ffi::CStr;

/// Capacity of the channel in bytes, including the terminating NUL.
pub const ERROR_CAPACITY: usize = 256;

/// Holds the message of the most recent failure.
///
/// Every write fully replaces the previous content. Messages longer than
/// `ERROR_CAPACITY - 1` bytes are truncated on a UTF-8 boundary, and an
/// interior NUL ends the message, so the buffer is always a valid C string
/// and a valid `&str`.
pub struct ErrorChannel {
    buf: [u8; ERROR_CAPACITY],
}

impl Default for ErrorChannel {
    fn default() -> Self {
        Self {
            buf: [0; ERROR_CAPACITY],
        }
    }
}

impl ErrorChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the channel with `message`.
    pub fn set(&mut self, message: &str) {
        let message = message.split('\0').next().unwrap_or_default();
        let mut end = message.len().min(ERROR_CAPACITY - 1);
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        self.buf = [0; ERROR_CAPACITY];
        self.buf[..end].copy_from_slice(&message.as_bytes()[..end]);
    }

    pub fn as_str(&self) -> &str {
        let len = self.buf.iter().position(|&b| b == 0).unwrap_or(ERROR_CAPACITY);
        std::str::from_utf8(&self.buf[..len]).unwrap_or_default()
    }

    pub fn as_c_str(&self) -> &CStr {
        CStr::from_bytes_until_nul(&self.buf).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.buf[0] == 0
    }
}

impl std::fmt::Debug for ErrorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ErrorChannel").field(&self.as_str()).finish()
    }
}
