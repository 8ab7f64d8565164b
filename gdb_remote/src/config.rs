/// Default command buffer size. Must hold a full `G` packet.
pub const DEFAULT_PACKET_SIZE: usize = 256;
/// Smallest buffer that fits a `G` packet for the lx106 register file.
pub const MIN_PACKET_SIZE: usize = 190;
/// Console redirection buffer size.
pub const OBUF_LEN: usize = 32;

/// Which parts of the device the stub takes over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StubConfig {
    /// The stub owns the line's receive interrupt: Ctrl-C breaks in, and raw
    /// bytes go to the installed [`crate::LineHook`] while unattached.
    pub ctrlc_break: bool,
    /// Program console output goes through the stub.
    pub redirect_console: bool,
    /// Fatal CPU exceptions stop in the debugger instead of rebooting.
    pub break_on_exception: bool,
    /// Break into the debugger right after initialization.
    pub break_on_init: bool,
}

impl StubConfig {
    pub const fn new() -> Self {
        Self {
            ctrlc_break: true,
            redirect_console: true,
            break_on_exception: true,
            break_on_init: false,
        }
    }

    pub const fn with_ctrlc_break(mut self, enabled: bool) -> Self {
        self.ctrlc_break = enabled;
        self
    }

    pub const fn with_redirect_console(mut self, enabled: bool) -> Self {
        self.redirect_console = enabled;
        self
    }

    pub const fn with_break_on_exception(mut self, enabled: bool) -> Self {
        self.break_on_exception = enabled;
        self
    }

    pub const fn with_break_on_init(mut self, enabled: bool) -> Self {
        self.break_on_init = enabled;
        self
    }
}

impl Default for StubConfig {
    fn default() -> Self {
        Self::new()
    }
}
