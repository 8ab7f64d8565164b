//! Why the target is paused, and how that is reported to the debugger.

/// Raw reason value marking a stop requested by the debugger itself.
pub const USER_BREAK_RAW: u32 = 0xFF;
/// Set in the raw reason when the stop came from a CPU exception.
pub const EXCEPTION_FLAG: u32 = 0x80;

pub const SIGINT: u8 = 2;
pub const SIGTRAP: u8 = 5;
pub const SIGSEGV: u8 = 11;

/// Exception cause to signal number, indexed by cause code.
const EXCEPTION_SIGNAL: [u8; 16] = [4, 31, 11, 11, 2, 6, 8, 0, 6, 7, 0, 0, 7, 7, 7, 7];

/// Debug-cause bitmap reported by the debug exception vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebugEvents(u8);

impl DebugEvents {
    pub const NONE: Self = Self(0);
    /// Instruction-count trap used for single stepping.
    pub const SINGLE_STEP: Self = Self(1 << 0);
    pub const HW_BREAKPOINT: Self = Self(1 << 1);
    pub const WATCHPOINT: Self = Self(1 << 2);
    /// 3-byte `BREAK` instruction.
    pub const BREAK: Self = Self(1 << 3);
    /// 2-byte `BREAK.N` instruction.
    pub const BREAK_N: Self = Self(1 << 4);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x7F)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl core::ops::BitOr for DebugEvents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Classification of the current stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    UserBreak,
    Exception(u8),
    DebugEvent(DebugEvents),
}

impl StopReason {
    pub const fn from_raw(raw: u32) -> Self {
        let raw = raw & 0xFF;
        if raw == USER_BREAK_RAW {
            Self::UserBreak
        } else if raw & EXCEPTION_FLAG != 0 {
            Self::Exception((raw & 0x7F) as u8)
        } else {
            Self::DebugEvent(DebugEvents::from_bits(raw as u8))
        }
    }

    pub const fn to_raw(self) -> u32 {
        match self {
            Self::UserBreak => USER_BREAK_RAW,
            Self::Exception(cause) => EXCEPTION_FLAG | (cause as u32 & 0x7F),
            Self::DebugEvent(events) => events.bits() as u32,
        }
    }

    /// Signal number carried in the `T` stop reply.
    pub const fn signal(self) -> u8 {
        match self {
            Self::UserBreak => SIGINT,
            Self::Exception(cause) => {
                let idx = cause as usize;
                if idx < EXCEPTION_SIGNAL.len() {
                    EXCEPTION_SIGNAL[idx]
                } else {
                    SIGSEGV
                }
            }
            Self::DebugEvent(_) => SIGTRAP,
        }
    }

    pub const fn is_debug_event(self, event: DebugEvents) -> bool {
        match self {
            Self::DebugEvent(events) => events.contains(event),
            _ => false,
        }
    }
}
