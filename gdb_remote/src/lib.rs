#![no_std]

//! Remote Serial Protocol engine for a single-core microcontroller that is
//! debugged over its own console line.
//!
//! The engine runs on the device itself, inside the debug exception, a fatal
//! exception, or the line's receive interrupt. It never allocates: the command
//! buffer, the console buffer and all replies live in fixed-size storage, and
//! replies are streamed byte by byte to the transport.

use core::fmt;

macro_rules! gdb_debug {
    ($($arg:tt)*) => {
        log::trace!(target: "gdb_remote", $($arg)*)
    };
}

pub mod codec;
mod config;
mod console;
mod dispatch;
mod platform;
mod rsp_framing;
mod session;
pub mod stop;
mod target;

pub use config::DEFAULT_PACKET_SIZE;
pub use config::MIN_PACKET_SIZE;
pub use config::OBUF_LEN;
pub use config::StubConfig;
pub use console::OutputBuffer;
pub use dispatch::Control;
pub use dispatch::MAX_REGISTER_WORDS;
pub use platform::LineHook;
pub use platform::NoHook;
pub use platform::Platform;
pub use rsp_framing::RspFrameAssembler;
pub use rsp_framing::RspFrameEvent;
pub use session::DebugSession;
pub use stop::DebugEvents;
pub use stop::StopReason;
pub use target::StatusWord;
pub use target::Target;
pub use target::TargetError;
pub use target::TargetResult;
pub use target::WatchMask;
pub use target::WatchpointKind;

/// Errors that abort a debugger entry.
///
/// Everything the debugger can get wrong is answered on the wire; only a
/// failing transport ends the session loop early.
#[derive(Debug, thiserror::Error)]
pub enum GdbError<SE> {
    /// Underlying stream error.
    #[error("transport error: {0:?}")]
    Stream(SE),
}

impl<SE> From<SE> for GdbError<SE> {
    fn from(err: SE) -> Self {
        GdbError::Stream(err)
    }
}

const DEBUG_PRINTABLE_BUF: usize = 64;
const DEBUG_PRINTABLE_TRUNC: usize = 48;

struct DebugPrintable {
    buf: [u8; DEBUG_PRINTABLE_BUF],
    len: usize,
}

impl DebugPrintable {
    fn new(data: &[u8]) -> Self {
        let mut buf = [0u8; DEBUG_PRINTABLE_BUF];
        let mut len = 0usize;

        for &b in data.iter().take(DEBUG_PRINTABLE_TRUNC) {
            buf[len] = match b {
                0x20..=0x7e => b,
                _ => b'.',
            };
            len += 1;
        }

        if data.len() > DEBUG_PRINTABLE_TRUNC {
            buf[len..len + 3].copy_from_slice(b"...");
            len += 3;
        }

        Self { buf, len }
    }
}

/// Log-safe rendering of a command payload: printable ASCII only, truncated.
fn debug_printable_prefix(data: &[u8]) -> DebugPrintable {
    DebugPrintable::new(data)
}

impl fmt::Display for DebugPrintable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // SAFETY: DebugPrintable::new only writes ASCII bytes into the buffer.
        let s = unsafe { core::str::from_utf8_unchecked(&self.buf[..self.len]) };
        f.write_str(s)
    }
}
