use crate::codec::ESCAPE_BYTE;
use crate::codec::ESCAPE_XOR;
use crate::codec::from_hex_digit;

/// Result of feeding one received byte to [`RspFrameAssembler::push`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RspFrameEvent {
    /// Byte outside any frame that carries no meaning.
    Ignore,
    /// Byte consumed; the frame is not complete yet.
    NeedMore,
    /// `$` seen inside a frame; accumulation restarted.
    Resync,
    /// Interrupt request (0x03) seen between frames.
    CtrlC,
    /// Payload grew past the buffer; the frame was dropped.
    Overflow,
    /// Frame complete and its checksum matches. The payload is available via
    /// [`RspFrameAssembler::packet`] until the next byte is pushed.
    FrameComplete,
    /// Frame complete but the checksum does not match.
    ChecksumMismatch,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum RspFrameState {
    Idle,
    Accumulating,
    EscapeNext,
    ChecksumHi,
    ChecksumLo(u8),
}

/// Byte-at-a-time RSP frame decoder with a fixed command buffer.
///
/// A payload holds at most `N - 1` bytes.
pub struct RspFrameAssembler<const N: usize> {
    state: RspFrameState,
    buf: [u8; N],
    len: usize,
    checksum: u8,
}

impl<const N: usize> RspFrameAssembler<N> {
    pub const fn new() -> Self {
        Self {
            state: RspFrameState::Idle,
            buf: [0; N],
            len: 0,
            checksum: 0,
        }
    }

    pub fn reset(&mut self) {
        self.state = RspFrameState::Idle;
        self.len = 0;
        self.checksum = 0;
    }

    pub fn is_idle(&self) -> bool {
        self.state == RspFrameState::Idle
    }

    /// Payload of the last completed frame, with escapes removed.
    pub fn packet(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    fn restart(&mut self) {
        self.state = RspFrameState::Accumulating;
        self.len = 0;
        self.checksum = 0;
    }

    fn store(&mut self, byte: u8) -> RspFrameEvent {
        if self.len + 1 >= N {
            self.state = RspFrameState::Idle;
            self.len = 0;
            return RspFrameEvent::Overflow;
        }
        self.buf[self.len] = byte;
        self.len += 1;
        RspFrameEvent::NeedMore
    }

    pub fn push(&mut self, byte: u8) -> RspFrameEvent {
        match self.state {
            RspFrameState::Idle => match byte {
                b'$' => {
                    self.restart();
                    RspFrameEvent::NeedMore
                }
                0x03 => RspFrameEvent::CtrlC,
                _ => RspFrameEvent::Ignore,
            },
            RspFrameState::Accumulating => match byte {
                b'#' => {
                    self.state = RspFrameState::ChecksumHi;
                    RspFrameEvent::NeedMore
                }
                b'$' => {
                    self.restart();
                    RspFrameEvent::Resync
                }
                ESCAPE_BYTE => {
                    if self.len + 1 >= N {
                        self.state = RspFrameState::Idle;
                        self.len = 0;
                        return RspFrameEvent::Overflow;
                    }
                    self.checksum = self.checksum.wrapping_add(byte);
                    self.state = RspFrameState::EscapeNext;
                    RspFrameEvent::NeedMore
                }
                _ => {
                    self.checksum = self.checksum.wrapping_add(byte);
                    self.store(byte)
                }
            },
            RspFrameState::EscapeNext => {
                self.checksum = self.checksum.wrapping_add(byte);
                self.state = RspFrameState::Accumulating;
                self.store(byte ^ ESCAPE_XOR)
            }
            RspFrameState::ChecksumHi => {
                self.state = RspFrameState::ChecksumLo(byte);
                RspFrameEvent::NeedMore
            }
            RspFrameState::ChecksumLo(hi) => {
                self.state = RspFrameState::Idle;
                let received = match (from_hex_digit(hi), from_hex_digit(byte)) {
                    (Some(h), Some(l)) => Some((h << 4) | l),
                    _ => None,
                };
                if received == Some(self.checksum) {
                    RspFrameEvent::FrameComplete
                } else {
                    self.len = 0;
                    RspFrameEvent::ChecksumMismatch
                }
            }
        }
    }
}

impl<const N: usize> Default for RspFrameAssembler<N> {
    fn default() -> Self {
        Self::new()
    }
}
