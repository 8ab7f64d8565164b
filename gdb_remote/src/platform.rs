/// Execution-control services the engine needs while it holds the CPU.
pub trait Platform {
    /// Mask the debug line's receive interrupt.
    fn disable_line_interrupt(&mut self);
    fn enable_line_interrupt(&mut self);

    /// Stop the watchdog from resetting the device while paused.
    fn disable_watchdog(&mut self);
    fn enable_watchdog(&mut self);

    /// Keep the hardware watchdog from firing during a busy wait.
    fn feed_watchdog(&mut self);
}

/// Another subsystem sharing the debug line while no debugger is attached.
///
/// Installed through [`crate::DebugSession::install_line_hook`] in place of a
/// nullable callback: the stub owns the line interrupt and forwards to the
/// hook, so the line stays usable when nobody is debugging.
pub trait LineHook {
    /// A byte arrived on the line.
    fn on_rx_byte(&mut self, byte: u8);

    /// A console character the program wrote while unattached.
    /// Returns `false` to let the stub send it itself.
    fn on_console_char(&mut self, _byte: u8) -> bool {
        false
    }
}

/// Hook used when no other subsystem shares the line.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHook;

impl LineHook for NoHook {
    fn on_rx_byte(&mut self, _byte: u8) {}
}
