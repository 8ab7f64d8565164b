#![no_std]

//! GDB remote stub for the Xtensa lx106 core (ESP8266).
//!
//! [`Lx106Stub`] is what the exception and interrupt trampolines call. Each
//! entry copies the saved frame into a [`RegisterFrame`], runs the
//! [`gdb_remote::DebugSession`] against an [`Lx106Target`] view of it, and
//! writes the result back for the trampoline to restore.

pub mod debug_unit;
pub mod emulation;
pub mod frame;
pub mod memory;

use byte_stream::ByteStream;
use gdb_remote::DEFAULT_PACKET_SIZE;
use gdb_remote::DebugSession;
use gdb_remote::GdbError;
use gdb_remote::LineHook;
use gdb_remote::NoHook;
use gdb_remote::Platform;
use gdb_remote::StatusWord;
use gdb_remote::StopReason;
use gdb_remote::StubConfig;
use gdb_remote::Target;
use gdb_remote::TargetError;
use gdb_remote::TargetResult;
use gdb_remote::WatchMask;
use gdb_remote::WatchpointKind;
use gdb_remote::stop::EXCEPTION_FLAG;

pub use debug_unit::DebugUnit;
pub use frame::DebugExceptionFrame;
pub use frame::ExtraSfrs;
pub use frame::G_REGISTER_WORDS;
pub use frame::HalExceptionFrame;
pub use frame::RegisterFrame;
pub use memory::DirectMemory;
pub use memory::Lx106Memory;
pub use memory::MemoryMap;
pub use memory::PhysicalMemory;

/// Interrupt level of the debug exception (XCHAL_DEBUGLEVEL).
pub const DEBUG_LEVEL: u32 = 2;

/// Exception causes that should be routed to
/// [`Lx106Stub::handle_fatal_exception`]: illegal instruction, syscall,
/// instruction/load-store errors, divide by zero, unaligned access, and the
/// address and privilege faults.
pub const FATAL_EXCEPTION_CAUSES: [u8; 13] = [0, 1, 2, 3, 6, 9, 12, 13, 14, 15, 20, 28, 29];

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Lx106Error {
    #[error("write of {len} bytes at {addr:#010x} is outside writable memory")]
    NotWritable { addr: u32, len: u32 },
    #[error("register file has {len} words, expected 22")]
    BadRegisterFile { len: usize },
    #[error("debug unit rejected breakpoint at {addr:#010x}")]
    BreakpointRejected { addr: u32 },
    #[error("debug unit rejected watchpoint at {addr:#010x}")]
    WatchpointRejected { addr: u32 },
}

/// Everything about the target that outlives a single stop.
pub struct Lx106GdbState<M, D> {
    mem: Lx106Memory<M>,
    unit: D,
}

impl<M: PhysicalMemory, D: DebugUnit> Lx106GdbState<M, D> {
    pub const fn new(phys: M, map: MemoryMap, unit: D) -> Self {
        Self {
            mem: Lx106Memory::new(phys, map),
            unit,
        }
    }

    pub fn target<'a>(&'a mut self, regs: &'a mut RegisterFrame) -> Lx106Target<'a, M, D> {
        Lx106Target { regs, state: self }
    }

    pub fn memory(&self) -> &Lx106Memory<M> {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut Lx106Memory<M> {
        &mut self.mem
    }

    pub fn debug_unit(&self) -> &D {
        &self.unit
    }

    pub fn debug_unit_mut(&mut self) -> &mut D {
        &mut self.unit
    }
}

/// One stop of the lx106 core as the protocol engine sees it.
pub struct Lx106Target<'a, M, D> {
    regs: &'a mut RegisterFrame,
    state: &'a mut Lx106GdbState<M, D>,
}

impl<'a, M: PhysicalMemory, D: DebugUnit> Target for Lx106Target<'a, M, D> {
    type Error = Lx106Error;

    const DEBUG_LEVEL: u32 = DEBUG_LEVEL;

    fn stop_reason(&self) -> StopReason {
        StopReason::from_raw(self.regs.reason)
    }

    fn set_stop_reason(&mut self, reason: StopReason) {
        self.regs.reason = reason.to_raw();
    }

    fn status_word(&self) -> StatusWord {
        StatusWord(self.regs.ps)
    }

    fn set_status_word(&mut self, ps: StatusWord) {
        self.regs.ps = ps.0;
    }

    fn read_registers(&mut self, dst: &mut [u32]) -> TargetResult<usize, Self::Error> {
        let len = dst.len();
        let Some(dst) = dst.first_chunk_mut::<G_REGISTER_WORDS>() else {
            return Err(TargetError::Recoverable(Lx106Error::BadRegisterFile { len }));
        };
        self.regs.to_words(dst);
        Ok(G_REGISTER_WORDS)
    }

    fn write_registers(&mut self, src: &[u32]) -> TargetResult<(), Self::Error> {
        let Ok(words) = <&[u32; G_REGISTER_WORDS]>::try_from(src) else {
            return Err(TargetError::Recoverable(Lx106Error::BadRegisterFile {
                len: src.len(),
            }));
        };
        self.regs.load_words(words);
        Ok(())
    }

    fn read_memory(&mut self, addr: u32, dst: &mut [u8]) {
        self.state.mem.read(addr, dst);
    }

    fn write_memory(&mut self, addr: u32, src: &[u8]) -> TargetResult<(), Self::Error> {
        if !self.state.mem.write(addr, src) {
            return Err(TargetError::Recoverable(Lx106Error::NotWritable {
                addr,
                len: src.len() as u32,
            }));
        }
        // The write may have patched code.
        self.state.unit.sync_instruction_stream();
        Ok(())
    }

    fn insert_hw_breakpoint(&mut self, addr: u32, kind: u32) -> TargetResult<(), Self::Error> {
        if self.state.unit.set_breakpoint(addr, kind) {
            Ok(())
        } else {
            Err(TargetError::Recoverable(Lx106Error::BreakpointRejected { addr }))
        }
    }

    fn remove_hw_breakpoint(&mut self, addr: u32) -> TargetResult<(), Self::Error> {
        if self.state.unit.clear_breakpoint(addr) {
            Ok(())
        } else {
            Err(TargetError::Recoverable(Lx106Error::BreakpointRejected { addr }))
        }
    }

    fn insert_watchpoint(
        &mut self,
        kind: WatchpointKind,
        addr: u32,
        mask: WatchMask,
    ) -> TargetResult<(), Self::Error> {
        if self.state.unit.set_watchpoint(addr, mask.bits(), kind.hw_code()) {
            Ok(())
        } else {
            Err(TargetError::Recoverable(Lx106Error::WatchpointRejected { addr }))
        }
    }

    fn remove_watchpoint(&mut self, addr: u32) -> TargetResult<(), Self::Error> {
        if self.state.unit.clear_watchpoint(addr) {
            Ok(())
        } else {
            Err(TargetError::Recoverable(Lx106Error::WatchpointRejected { addr }))
        }
    }

    fn arm_single_step(&mut self) {
        self.state.unit.arm_single_step();
    }

    fn restart(&mut self) {
        self.state.unit.restart();
    }

    fn step_over_stop(&mut self) {
        emulation::step_over_stop(self.regs, &mut self.state.mem);
    }
}

/// The stub as installed on the device: one debug session plus the target
/// state, driven from the exception and interrupt entry points.
pub struct Lx106Stub<S, P, M, D, H = NoHook, const MAX_PKT: usize = DEFAULT_PACKET_SIZE>
where
    S: ByteStream,
    P: Platform,
    H: LineHook,
{
    session: DebugSession<S, P, H, MAX_PKT>,
    state: Lx106GdbState<M, D>,
}

impl<S, P, M, D, H, const MAX_PKT: usize> Lx106Stub<S, P, M, D, H, MAX_PKT>
where
    S: ByteStream,
    P: Platform,
    M: PhysicalMemory,
    D: DebugUnit,
    H: LineHook,
{
    pub const fn new(
        stream: S,
        platform: P,
        state: Lx106GdbState<M, D>,
        config: StubConfig,
    ) -> Self {
        Self {
            session: DebugSession::new(stream, platform, config),
            state,
        }
    }

    /// Finish bring-up once the trampolines are installed.
    pub fn init(&mut self) {
        let config = *self.session.config();
        log::info!(
            target: "lx106_gdb",
            "gdb stub ready (ctrl-c: {}, console: {}, exceptions: {})",
            config.ctrlc_break,
            config.redirect_console,
            config.break_on_exception
        );
        if config.break_on_init {
            self.state.unit.request_break();
        }
    }

    /// Exception causes the platform should hand to
    /// [`Self::handle_fatal_exception`]; empty when exceptions are not caught.
    pub fn exception_causes(&self) -> &'static [u8] {
        if self.session.config().break_on_exception {
            &FATAL_EXCEPTION_CAUSES
        } else {
            &[]
        }
    }

    pub fn session(&self) -> &DebugSession<S, P, H, MAX_PKT> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DebugSession<S, P, H, MAX_PKT> {
        &mut self.session
    }

    pub fn state(&self) -> &Lx106GdbState<M, D> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut Lx106GdbState<M, D> {
        &mut self.state
    }

    fn run(&mut self, regs: &mut RegisterFrame, system_stopped: bool) -> Result<(), GdbError<S::Error>> {
        let mut target = self.state.target(regs);
        self.session.enter(&mut target, system_stopped)
    }

    /// Debug exception vector: breakpoint, watchpoint, single step, BREAK
    /// instruction or a requested break.
    pub fn handle_debug_exception(
        &mut self,
        frame: &mut DebugExceptionFrame,
    ) -> Result<(), GdbError<S::Error>> {
        let mut regs = frame.to_registers();
        let result = self.run(&mut regs, true);
        frame.store_registers(&regs);
        result
    }

    /// Handler for the causes in [`FATAL_EXCEPTION_CAUSES`]. `sfrs.reason`
    /// holds the exception cause.
    pub fn handle_fatal_exception(
        &mut self,
        frame: &mut HalExceptionFrame,
        frame_addr: u32,
        sfrs: ExtraSfrs,
    ) -> Result<(), GdbError<S::Error>> {
        let mut regs = frame.to_registers(frame_addr, sfrs);
        regs.reason |= EXCEPTION_FLAG;
        log::error!(
            target: "lx106_gdb",
            "fatal exception {} at {:#010x}",
            regs.reason & !EXCEPTION_FLAG,
            regs.pc
        );
        self.session.platform_mut().disable_line_interrupt();
        let result = self.run(&mut regs, true);
        frame.store_registers(&regs);
        result
    }

    /// Line receive interrupt while the program runs.
    pub fn handle_uart_interrupt(
        &mut self,
        frame: &mut HalExceptionFrame,
        frame_addr: u32,
        sfrs: ExtraSfrs,
    ) -> Result<(), GdbError<S::Error>> {
        let mut regs = frame.to_registers(frame_addr, sfrs);
        let result = self.run(&mut regs, false);
        frame.store_registers(&regs);
        result
    }

    /// Replacement for the program's character output routine.
    pub fn console_putc(&mut self, byte: u8) -> Result<(), GdbError<S::Error>> {
        self.session.console_putc(byte)
    }

    pub fn console_write_char(&mut self, byte: u8) -> Result<(), GdbError<S::Error>> {
        self.session.console_write_char(byte)
    }

    pub fn console_write(&mut self, buf: &[u8]) -> Result<(), GdbError<S::Error>> {
        self.session.console_write(buf)
    }

    pub fn flush_console(&mut self) -> Result<(), GdbError<S::Error>> {
        self.session.flush_console()
    }

    pub fn install_line_hook(&mut self, hook: H) -> Option<H> {
        self.session.install_line_hook(hook)
    }

    pub fn remove_line_hook(&mut self) -> Option<H> {
        self.session.remove_line_hook()
    }
}
