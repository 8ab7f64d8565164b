use crate::stop::StopReason;

/// Target-specific error handling for debugger requests.
#[derive(Debug, thiserror::Error)]
pub enum TargetError<E> {
    /// The request is not implemented; answered with an empty packet.
    #[error("request not supported by the target")]
    NotSupported,
    /// The request failed; answered with `E01`.
    #[error("target rejected the request: {0:?}")]
    Recoverable(E),
}

pub type TargetResult<T, E> = Result<T, TargetError<E>>;

/// Processor status word of the stopped context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusWord(pub u32);

impl StatusWord {
    /// Interrupt level field.
    pub const INTLEVEL_MASK: u32 = 0xF;

    pub const fn intlevel(self) -> u32 {
        self.0 & Self::INTLEVEL_MASK
    }

    pub const fn with_intlevel(self, level: u32) -> Self {
        Self((self.0 & !Self::INTLEVEL_MASK) | (level & Self::INTLEVEL_MASK))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchpointKind {
    Write,
    Read,
    Access,
}

impl WatchpointKind {
    /// Kind selected by the digit of a `Z2`/`Z3`/`Z4` packet.
    pub const fn from_packet_type(ty: u8) -> Option<Self> {
        match ty {
            b'2' => Some(Self::Write),
            b'3' => Some(Self::Read),
            b'4' => Some(Self::Access),
            _ => None,
        }
    }

    /// Access field as the debug unit encodes it.
    pub const fn hw_code(self) -> u32 {
        match self {
            Self::Read => 1,
            Self::Write => 2,
            Self::Access => 3,
        }
    }
}

/// Address mask selecting how many low address bits a watchpoint ignores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchMask(u32);

impl WatchMask {
    /// Mask for a watched span of `len` bytes, if the unit can express it.
    pub const fn for_len(len: u32) -> Option<Self> {
        let mask = match len {
            1 => 0x3F,
            2 => 0x3E,
            4 => 0x3C,
            8 => 0x38,
            16 => 0x30,
            32 => 0x20,
            64 => 0x00,
            _ => return None,
        };
        Some(Self(mask))
    }

    pub const fn bits(self) -> u32 {
        self.0
    }
}

/// Abstraction over the stopped CPU context plus the hardware it can reach.
///
/// One instance describes one stop; it is created by the entry point with a
/// copy of the saved register frame and dropped when execution resumes.
pub trait Target {
    type Error: core::fmt::Debug;

    /// Interrupt level reserved for the debug exception.
    const DEBUG_LEVEL: u32;

    fn stop_reason(&self) -> StopReason;
    fn set_stop_reason(&mut self, reason: StopReason);

    fn status_word(&self) -> StatusWord;
    fn set_status_word(&mut self, ps: StatusWord);

    /// Serialize the register file in the debugger's `g` order.
    /// Returns the number of words written.
    fn read_registers(&mut self, dst: &mut [u32]) -> TargetResult<usize, Self::Error>;
    /// Load the register file from words in the `G` order.
    fn write_registers(&mut self, src: &[u32]) -> TargetResult<(), Self::Error>;

    /// Read target memory into `dst`. Bytes outside readable memory come
    /// back as `0xFF`; reading never fails.
    fn read_memory(&mut self, addr: u32, dst: &mut [u8]);
    /// Write target memory. The whole write is rejected when either end of
    /// the range is not writable.
    fn write_memory(&mut self, addr: u32, src: &[u8]) -> TargetResult<(), Self::Error>;

    fn insert_hw_breakpoint(&mut self, _addr: u32, _kind: u32) -> TargetResult<(), Self::Error> {
        Err(TargetError::NotSupported)
    }
    fn remove_hw_breakpoint(&mut self, _addr: u32) -> TargetResult<(), Self::Error> {
        Err(TargetError::NotSupported)
    }

    fn insert_watchpoint(
        &mut self,
        _kind: WatchpointKind,
        _addr: u32,
        _mask: WatchMask,
    ) -> TargetResult<(), Self::Error> {
        Err(TargetError::NotSupported)
    }
    fn remove_watchpoint(&mut self, _addr: u32) -> TargetResult<(), Self::Error> {
        Err(TargetError::NotSupported)
    }

    /// Arm the trap that fires after exactly one more instruction.
    fn arm_single_step(&mut self);

    /// Restart the whole device. On hardware this does not return.
    fn restart(&mut self);

    /// Called once when a synchronous stop is about to resume, so the
    /// instruction that caused it is not executed again.
    fn step_over_stop(&mut self) {}
}
