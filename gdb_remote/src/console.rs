//! Program console output captured while the stub owns the line.

/// Small staging buffer for console bytes.
///
/// The owner flushes it before it can overflow, so no byte is ever dropped.
pub struct OutputBuffer<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> OutputBuffer<N> {
    pub const fn new() -> Self {
        Self { buf: [0; N], len: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= N
    }

    pub fn contents(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Append `byte`. Returns `false` if the buffer is full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.buf[self.len] = byte;
        self.len += 1;
        true
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl<const N: usize> Default for OutputBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
