use crate::GdbError;
use crate::codec::HexReader;
use crate::codec::HexWidth;
use crate::codec::PacketWriter;
use crate::codec::hex_decode;
use crate::codec::send_packet;
use crate::debug_printable_prefix;
use crate::stop::StopReason;
use crate::target::StatusWord;
use crate::target::Target;
use crate::target::TargetError;
use crate::target::TargetResult;
use crate::target::WatchMask;
use crate::target::WatchpointKind;
use byte_stream::ByteStream;

/// Upper bound on the words in one `g`/`G` register file.
pub const MAX_REGISTER_WORDS: usize = 64;

const MEMORY_CHUNK: usize = 16;

/// What the session loop should do after a command was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// Keep reading commands.
    Ok,
    /// Resume the program (`c` or `s`).
    Continue,
    /// The debugger detached.
    Detach,
    /// A device restart was requested. Only reached if the restart returned.
    KillAndKeepGoing,
}

type DispatchResult<SE> = Result<Control, GdbError<SE>>;

/// Send `T<signal>` for `reason`.
pub(crate) fn send_stop_reply<S: ByteStream>(
    stream: &mut S,
    reason: StopReason,
) -> Result<(), GdbError<S::Error>> {
    let mut writer = PacketWriter::start(stream)?;
    writer.push(b'T')?;
    writer.push_hex(reason.signal() as u32, 8)?;
    writer.finish()?;
    Ok(())
}

/// Executes one checksum-valid command against the stopped target.
pub(crate) struct Dispatcher<'a, S: ByteStream, const MAX_PKT: usize> {
    pub(crate) stream: &'a mut S,
    pub(crate) pending_step: &'a mut Option<StatusWord>,
}

impl<'a, S: ByteStream, const MAX_PKT: usize> Dispatcher<'a, S, MAX_PKT> {
    fn send(&mut self, payload: &[u8]) -> Result<(), GdbError<S::Error>> {
        send_packet(self.stream, payload)?;
        Ok(())
    }

    fn send_ok(&mut self) -> Result<(), GdbError<S::Error>> {
        self.send(b"OK")
    }

    fn send_e01(&mut self) -> Result<(), GdbError<S::Error>> {
        self.send(b"E01")
    }

    fn send_empty(&mut self) -> Result<(), GdbError<S::Error>> {
        self.send(b"")
    }

    /// Reply `OK`, `E01` or empty depending on a target result.
    fn reply_result<E: core::fmt::Debug>(
        &mut self,
        result: TargetResult<(), E>,
    ) -> DispatchResult<S::Error> {
        match result {
            Ok(()) => self.send_ok()?,
            Err(TargetError::Recoverable(e)) => {
                log::debug!(target: "gdb_remote", "target rejected request: {:?}", e);
                self.send_e01()?;
            }
            Err(TargetError::NotSupported) => self.send_empty()?,
        }
        Ok(Control::Ok)
    }

    pub(crate) fn handle<T: Target>(
        &mut self,
        target: &mut T,
        cmd: &[u8],
    ) -> DispatchResult<S::Error> {
        let Some((&selector, body)) = cmd.split_first() else {
            gdb_debug!("dispatch: empty packet, replying empty");
            self.send_empty()?;
            return Ok(Control::Ok);
        };

        match selector {
            b'g' => {
                gdb_debug!("dispatch: 'g' (read all registers)");
                self.handle_read_registers(target)
            }
            b'G' => {
                gdb_debug!("dispatch: 'G' (write all registers) len={}", body.len());
                self.handle_write_registers(target, body)
            }
            b'm' => {
                gdb_debug!(
                    "dispatch: 'm' (read memory) payload=\"{}\"",
                    debug_printable_prefix(body)
                );
                self.handle_read_memory(target, body)
            }
            b'M' => {
                gdb_debug!(
                    "dispatch: 'M' (write memory) payload=\"{}\"",
                    debug_printable_prefix(body)
                );
                self.handle_write_memory(target, body)
            }
            b'?' => {
                gdb_debug!("dispatch: '?' (stop reason)");
                send_stop_reply(self.stream, target.stop_reason())?;
                Ok(Control::Ok)
            }
            b'c' => {
                gdb_debug!("dispatch: 'c' (continue)");
                Ok(Control::Continue)
            }
            b's' => {
                gdb_debug!("dispatch: 's' (step)");
                self.handle_step(target)
            }
            b'D' => {
                log::info!(target: "gdb_remote", "debugger detached");
                self.send_ok()?;
                Ok(Control::Detach)
            }
            b'k' => {
                log::info!(target: "gdb_remote", "kill requested, restarting device");
                target.restart();
                Ok(Control::KillAndKeepGoing)
            }
            b'q' => {
                gdb_debug!(
                    "dispatch: 'q' (query) payload=\"{}\"",
                    debug_printable_prefix(body)
                );
                self.handle_query(body)
            }
            b'Z' | b'z' => {
                gdb_debug!(
                    "dispatch: '{}' (breakpoint) payload=\"{}\"",
                    selector as char,
                    debug_printable_prefix(body)
                );
                self.handle_breakpoint(target, body, selector == b'Z')
            }
            _ => {
                gdb_debug!(
                    "dispatch: unknown first byte {:?}, replying empty",
                    selector
                );
                self.send_empty()?;
                Ok(Control::Ok)
            }
        }
    }

    fn handle_read_registers<T: Target>(&mut self, target: &mut T) -> DispatchResult<S::Error> {
        let mut regs = [0u32; MAX_REGISTER_WORDS];
        let count = match target.read_registers(&mut regs) {
            Ok(count) => count.min(MAX_REGISTER_WORDS),
            Err(e) => return self.reply_result(Err(e)),
        };
        let mut writer = PacketWriter::start(self.stream)?;
        for &value in &regs[..count] {
            writer.push_swapped_u32(value)?;
        }
        writer.finish()?;
        Ok(Control::Ok)
    }

    fn handle_write_registers<T: Target>(
        &mut self,
        target: &mut T,
        body: &[u8],
    ) -> DispatchResult<S::Error> {
        let mut regs = [0u32; MAX_REGISTER_WORDS];
        let mut count = 0usize;
        let mut reader = HexReader::new(body);
        while !reader.is_empty() {
            if count >= regs.len() {
                gdb_debug!("handle_write_registers: too many registers");
                self.send_e01()?;
                return Ok(Control::Ok);
            }
            let Ok(value) = reader.read_swapped_u32() else {
                gdb_debug!("handle_write_registers: bad hex at word {}", count);
                self.send_e01()?;
                return Ok(Control::Ok);
            };
            regs[count] = value;
            count += 1;
        }
        let result = target.write_registers(&regs[..count]);
        self.reply_result(result)
    }

    fn handle_read_memory<T: Target>(
        &mut self,
        target: &mut T,
        body: &[u8],
    ) -> DispatchResult<S::Error> {
        let Ok((addr, len)) = parse_addr_len(&mut HexReader::new(body)) else {
            gdb_debug!("handle_read_memory: parse_addr_len failed");
            self.send_e01()?;
            return Ok(Control::Ok);
        };
        gdb_debug!("handle_read_memory: addr=0x{:x} len={}", addr, len);

        let mut writer = PacketWriter::start(self.stream)?;
        let mut chunk = [0u8; MEMORY_CHUNK];
        let mut offset = 0u32;
        while offset < len {
            let n = (len - offset).min(MEMORY_CHUNK as u32) as usize;
            target.read_memory(addr.wrapping_add(offset), &mut chunk[..n]);
            writer.push_hex_bytes(&chunk[..n])?;
            offset += n as u32;
        }
        writer.finish()?;
        Ok(Control::Ok)
    }

    fn handle_write_memory<T: Target>(
        &mut self,
        target: &mut T,
        body: &[u8],
    ) -> DispatchResult<S::Error> {
        let mut reader = HexReader::new(body);
        let header = parse_addr_len(&mut reader).and_then(|v| reader.expect(b':').map(|()| v));
        let Ok((addr, len)) = header else {
            gdb_debug!("handle_write_memory: bad header");
            self.send_e01()?;
            return Ok(Control::Ok);
        };

        let data_hex = reader.remaining();
        let mut data = [0u8; MAX_PKT];
        let decoded = match hex_decode(data_hex, &mut data) {
            Ok(decoded) if decoded as u32 == len => decoded,
            _ => {
                gdb_debug!(
                    "handle_write_memory: data does not match len={} hex_len={}",
                    len,
                    data_hex.len()
                );
                self.send_e01()?;
                return Ok(Control::Ok);
            }
        };
        gdb_debug!("handle_write_memory: addr=0x{:x} len={}", addr, decoded);

        let result = target.write_memory(addr, &data[..decoded]);
        self.reply_result(result)
    }

    fn handle_step<T: Target>(&mut self, target: &mut T) -> DispatchResult<S::Error> {
        // An interrupt taken during the step would trip the instruction
        // counter inside the handler, so mask everything below debug level.
        let ps = target.status_word();
        *self.pending_step = Some(ps);
        target.set_status_word(ps.with_intlevel(T::DEBUG_LEVEL - 1));
        target.arm_single_step();
        Ok(Control::Continue)
    }

    fn handle_query(&mut self, body: &[u8]) -> DispatchResult<S::Error> {
        if body.starts_with(b"Supported") {
            let mut writer = PacketWriter::start(self.stream)?;
            writer.push_bytes(b"swbreak+;hwbreak+;PacketSize=")?;
            writer.push_hex_upper((MAX_PKT - 1) as u32)?;
            writer.finish()?;
            return Ok(Control::Ok);
        }
        if body.starts_with(b"Attached") {
            // The program was already running when the debugger showed up,
            // so quitting the debugger should detach rather than kill.
            self.send(b"1")?;
            return Ok(Control::Ok);
        }
        self.send_empty()?;
        Ok(Control::Ok)
    }

    fn handle_breakpoint<T: Target>(
        &mut self,
        target: &mut T,
        body: &[u8],
        insert: bool,
    ) -> DispatchResult<S::Error> {
        let Some((&bp_type, rest)) = body.split_first() else {
            self.send_empty()?;
            return Ok(Control::Ok);
        };
        let watch_kind = WatchpointKind::from_packet_type(bp_type);
        if bp_type != b'1' && watch_kind.is_none() {
            self.send_empty()?;
            return Ok(Control::Ok);
        }

        let mut reader = HexReader::new(rest);
        let parsed = reader
            .expect(b',')
            .and_then(|()| reader.read(HexWidth::Variable))
            .and_then(|addr| {
                if reader.is_empty() && !insert {
                    return Ok((addr, 0));
                }
                reader.expect(b',')?;
                Ok((addr, reader.read(HexWidth::Variable)?))
            });
        let Ok((addr, len_or_kind)) = parsed else {
            gdb_debug!("handle_breakpoint: malformed request");
            self.send_e01()?;
            return Ok(Control::Ok);
        };

        let result = match (watch_kind, insert) {
            (None, true) => target.insert_hw_breakpoint(addr, len_or_kind),
            (None, false) => target.remove_hw_breakpoint(addr),
            (Some(kind), true) => {
                let Some(mask) = WatchMask::for_len(len_or_kind) else {
                    gdb_debug!(
                        "handle_breakpoint: unsupported watch length {}",
                        len_or_kind
                    );
                    self.send_empty()?;
                    return Ok(Control::Ok);
                };
                target.insert_watchpoint(kind, addr, mask)
            }
            (Some(_), false) => target.remove_watchpoint(addr),
        };
        self.reply_result(result)
    }
}

fn parse_addr_len(reader: &mut HexReader<'_>) -> Result<(u32, u32), crate::codec::HexError> {
    let addr = reader.read(HexWidth::Variable)?;
    reader.expect(b',')?;
    let len = reader.read(HexWidth::Variable)?;
    Ok((addr, len))
}
