use crate::GdbError;
use crate::codec::PacketWriter;
use crate::config::DEFAULT_PACKET_SIZE;
use crate::config::MIN_PACKET_SIZE;
use crate::config::OBUF_LEN;
use crate::config::StubConfig;
use crate::console::OutputBuffer;
use crate::debug_printable_prefix;
use crate::dispatch::Control;
use crate::dispatch::Dispatcher;
use crate::dispatch::send_stop_reply;
use crate::platform::LineHook;
use crate::platform::NoHook;
use crate::platform::Platform;
use crate::rsp_framing::RspFrameAssembler;
use crate::rsp_framing::RspFrameEvent;
use crate::stop::StopReason;
use crate::target::StatusWord;
use crate::target::Target;
use byte_stream::ByteStream;
use byte_stream::ByteStreamBlockingExt;

type SessionResult<SE> = Result<(), GdbError<SE>>;

/// The single debug session of the device.
///
/// Holds the attached/paused flags, the incremental packet decoder and the
/// console buffer. Every entry point (debug exception, fatal exception, line
/// interrupt, console output) goes through this object; the caller guarantees
/// only one of them runs at a time by keeping interrupts masked.
pub struct DebugSession<S, P, H = NoHook, const MAX_PKT: usize = DEFAULT_PACKET_SIZE>
where
    S: ByteStream,
    P: Platform,
    H: LineHook,
{
    stream: S,
    platform: P,
    hook: Option<H>,
    config: StubConfig,
    framing: RspFrameAssembler<MAX_PKT>,
    console: OutputBuffer<OBUF_LEN>,
    attached: bool,
    paused: bool,
    pending_step: Option<StatusWord>,
}

impl<S, P, H, const MAX_PKT: usize> DebugSession<S, P, H, MAX_PKT>
where
    S: ByteStream,
    P: Platform,
    H: LineHook,
{
    pub const fn new(stream: S, platform: P, config: StubConfig) -> Self {
        const { assert!(MAX_PKT >= MIN_PACKET_SIZE) };
        Self {
            stream,
            platform,
            hook: None,
            config,
            framing: RspFrameAssembler::new(),
            console: OutputBuffer::new(),
            attached: false,
            paused: false,
            pending_step: None,
        }
    }

    pub fn config(&self) -> &StubConfig {
        &self.config
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Status word saved by `s`, until the step trap restores it.
    pub fn pending_step(&self) -> Option<StatusWord> {
        self.pending_step
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Whether the stub owns the line's receive interrupt.
    pub fn has_line_control(&self) -> bool {
        self.config.ctrlc_break
    }

    /// Whether program console output is routed through the stub.
    pub fn has_console_control(&self) -> bool {
        self.config.redirect_console
    }

    /// Share the line with another subsystem, returning the previous hook.
    pub fn install_line_hook(&mut self, hook: H) -> Option<H> {
        self.platform.disable_line_interrupt();
        let old = self.hook.replace(hook);
        self.platform.enable_line_interrupt();
        old
    }

    pub fn remove_line_hook(&mut self) -> Option<H> {
        self.platform.disable_line_interrupt();
        let old = self.hook.take();
        self.platform.enable_line_interrupt();
        old
    }

    fn pause(&mut self) -> SessionResult<S::Error> {
        self.paused = true;
        self.platform.disable_line_interrupt();
        self.platform.disable_watchdog();
        self.flush_console()
    }

    fn unpause(&mut self) {
        self.paused = false;
        self.platform.enable_watchdog();
        self.platform.enable_line_interrupt();
    }

    /// Undo the interrupt masking applied by `s`, keeping everything else
    /// the stepped instruction did to the status word.
    fn complete_single_step<T: Target>(&mut self, target: &mut T) {
        if let Some(saved) = self.pending_step.take() {
            let ps = target.status_word().with_intlevel(saved.intlevel());
            target.set_status_word(ps);
        }
    }

    /// Run the debugger until the program may continue.
    ///
    /// `system_stopped` is set when the program stopped involuntarily
    /// (debug exception or fatal exception): the target is paused and the
    /// stop reason is announced before any byte is read. Otherwise this was
    /// called from the line interrupt and returns as soon as the receive
    /// FIFO is empty while not paused.
    pub fn enter<T: Target>(&mut self, target: &mut T, system_stopped: bool) -> SessionResult<S::Error> {
        if system_stopped {
            self.complete_single_step(target);
            self.pause()?;
            send_stop_reply(&mut self.stream, target.stop_reason())?;
        }

        loop {
            let byte = if self.paused {
                self.read_paused()?
            } else {
                match self.stream.try_read()? {
                    Some(byte) => byte,
                    None => break,
                }
            };
            self.on_byte(target, byte, system_stopped)?;
        }

        if system_stopped {
            target.step_over_stop();
        }
        Ok(())
    }

    /// Line receive interrupt while the program runs.
    pub fn on_line_interrupt<T: Target>(&mut self, target: &mut T) -> SessionResult<S::Error> {
        self.enter(target, false)
    }

    fn read_paused(&mut self) -> Result<u8, GdbError<S::Error>> {
        // A human is on the other end; wait as long as it takes.
        loop {
            if let Some(byte) = self.stream.try_read()? {
                return Ok(byte);
            }
            self.platform.feed_watchdog();
        }
    }

    fn on_byte<T: Target>(
        &mut self,
        target: &mut T,
        byte: u8,
        system_stopped: bool,
    ) -> SessionResult<S::Error> {
        if self.config.ctrlc_break && !self.attached {
            if let Some(hook) = self.hook.as_mut() {
                hook.on_rx_byte(byte);
            }
        }

        match self.framing.push(byte) {
            RspFrameEvent::CtrlC => {
                if self.attached && !self.paused {
                    log::debug!(target: "gdb_remote", "ctrl-c, breaking in");
                    self.pause()?;
                    target.set_stop_reason(StopReason::UserBreak);
                    send_stop_reply(&mut self.stream, StopReason::UserBreak)?;
                }
            }
            RspFrameEvent::FrameComplete => self.on_packet(target, system_stopped)?,
            RspFrameEvent::ChecksumMismatch => {
                log::debug!(target: "gdb_remote", "checksum mismatch");
                if self.attached {
                    self.stream.write_blocking(b'-')?;
                }
            }
            RspFrameEvent::Overflow => {
                log::debug!(target: "gdb_remote", "packet exceeds {} bytes, dropped", MAX_PKT - 1);
            }
            RspFrameEvent::Resync => {
                log::debug!(target: "gdb_remote", "packet restarted");
            }
            RspFrameEvent::Ignore | RspFrameEvent::NeedMore => {}
        }
        Ok(())
    }

    fn on_packet<T: Target>(&mut self, target: &mut T, system_stopped: bool) -> SessionResult<S::Error> {
        // A valid packet means a debugger is listening; freeze the program
        // even if it was left running by an earlier `c`.
        self.attached = true;
        if !self.paused {
            self.pause()?;
            target.set_stop_reason(StopReason::UserBreak);
        }
        self.stream.write_blocking(b'+')?;

        gdb_debug!(
            "on_packet: payload=\"{}\"",
            debug_printable_prefix(self.framing.packet())
        );
        let Self {
            stream,
            framing,
            pending_step,
            ..
        } = self;
        let mut dispatcher: Dispatcher<'_, S, MAX_PKT> = Dispatcher {
            stream,
            pending_step,
        };
        let control = dispatcher.handle(target, framing.packet())?;
        self.finish_command(control, system_stopped);
        Ok(())
    }

    /// Shared tail of `D` and `c`/`s`: a detach falls through into resume,
    /// except during a synchronous stop, where the program cannot simply go
    /// on and stays paused until a debugger attaches again.
    fn finish_command(&mut self, control: Control, system_stopped: bool) {
        match control {
            Control::Detach => {
                self.attached = false;
                if !system_stopped {
                    self.unpause();
                }
            }
            Control::Continue => self.unpause(),
            Control::Ok | Control::KillAndKeepGoing => {}
        }
    }

    /// Console character from the program's redirected output routine.
    pub fn console_putc(&mut self, byte: u8) -> SessionResult<S::Error> {
        if !self.attached {
            if let Some(hook) = self.hook.as_mut() {
                if hook.on_console_char(byte) {
                    return Ok(());
                }
            }
        }
        self.console_write_char_buffered(byte)
    }

    /// Buffer `byte`; the buffer goes out on newline, when full, or
    /// immediately while paused.
    pub fn console_write_char_buffered(&mut self, byte: u8) -> SessionResult<S::Error> {
        if self.console.is_full() {
            self.flush_console()?;
        }
        self.console.push(byte);
        if byte == b'\n' || self.console.is_full() || self.paused {
            self.flush_console()?;
        }
        Ok(())
    }

    /// Write one byte and flush it right away.
    pub fn console_write_char(&mut self, byte: u8) -> SessionResult<S::Error> {
        if self.console.is_full() {
            self.flush_console()?;
        }
        self.console.push(byte);
        self.flush_console()
    }

    pub fn console_write(&mut self, buf: &[u8]) -> SessionResult<S::Error> {
        for &b in buf {
            self.console_write_char_buffered(b)?;
        }
        self.flush_console()
    }

    /// Send buffered console output: as an `O` packet while a debugger is
    /// attached, raw otherwise.
    pub fn flush_console(&mut self) -> SessionResult<S::Error> {
        if self.console.is_empty() {
            return Ok(());
        }
        if self.attached {
            let mut writer = PacketWriter::start(&mut self.stream)?;
            writer.push(b'O')?;
            writer.push_hex_bytes(self.console.contents())?;
            writer.finish()?;
        } else {
            self.stream.write_all_blocking(self.console.contents())?;
        }
        self.console.clear();
        Ok(())
    }
}
