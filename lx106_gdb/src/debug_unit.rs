/// The core's debug hardware and the few special-register operations the
/// stub cannot do from portable code.
///
/// Breakpoint and watchpoint calls report success as a `bool`; the stub keeps
/// no record of what is set, so clearing something that was never set simply
/// returns `false`.
pub trait DebugUnit {
    /// Program an instruction breakpoint at `addr`.
    fn set_breakpoint(&mut self, addr: u32, kind: u32) -> bool;
    fn clear_breakpoint(&mut self, addr: u32) -> bool;

    /// Program a data breakpoint. `mask` is the DBREAKA low-bit mask and
    /// `access` the DBREAKC access field (1 read, 2 write, 3 both).
    fn set_watchpoint(&mut self, addr: u32, mask: u32, access: u32) -> bool;
    fn clear_watchpoint(&mut self, addr: u32) -> bool;

    /// Load ICOUNT so a debug exception fires after the next instruction.
    fn arm_single_step(&mut self);

    /// Make instruction fetch see memory just written (ISYNC).
    fn sync_instruction_stream(&mut self);

    /// Restart the core. Does not return on hardware.
    fn restart(&mut self);

    /// Raise a debug exception right now, entering the stub synchronously.
    fn request_break(&mut self);
}
