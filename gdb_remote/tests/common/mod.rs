#![allow(dead_code)]

use byte_stream::ByteStream;
use gdb_remote::DebugSession;
use gdb_remote::LineHook;
use gdb_remote::Platform;
use gdb_remote::StatusWord;
use gdb_remote::StopReason;
use gdb_remote::StubConfig;
use gdb_remote::Target;
use gdb_remote::TargetError;
use gdb_remote::TargetResult;
use gdb_remote::WatchMask;
use gdb_remote::WatchpointKind;
use std::collections::VecDeque;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Consecutive empty polls after which the mock reports the line as dead
/// instead of letting a paused session spin forever.
const IDLE_POLL_LIMIT: usize = 100_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockStreamError {
    Starved,
}

#[derive(Default)]
pub struct MockStream {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    /// Empty polls to report before each received byte.
    pub stall_polls: usize,
    stalled: usize,
    idle_polls: usize,
}

impl MockStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_tx(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.tx)
    }
}

impl ByteStream for MockStream {
    type Error = MockStreamError;

    fn try_read(&mut self) -> Result<Option<u8>, Self::Error> {
        if !self.rx.is_empty() && self.stalled < self.stall_polls {
            self.stalled += 1;
            return Ok(None);
        }
        match self.rx.pop_front() {
            Some(byte) => {
                self.stalled = 0;
                self.idle_polls = 0;
                Ok(Some(byte))
            }
            None => {
                self.idle_polls += 1;
                if self.idle_polls > IDLE_POLL_LIMIT {
                    Err(MockStreamError::Starved)
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn try_write(&mut self, byte: u8) -> Result<bool, Self::Error> {
        self.tx.push(byte);
        Ok(true)
    }
}

pub struct MockPlatform {
    pub line_interrupt: bool,
    pub watchdog: bool,
    pub feeds: usize,
    pub line_interrupt_toggles: usize,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            line_interrupt: true,
            watchdog: true,
            feeds: 0,
            line_interrupt_toggles: 0,
        }
    }
}

impl Platform for MockPlatform {
    fn disable_line_interrupt(&mut self) {
        self.line_interrupt = false;
        self.line_interrupt_toggles += 1;
    }

    fn enable_line_interrupt(&mut self) {
        self.line_interrupt = true;
        self.line_interrupt_toggles += 1;
    }

    fn disable_watchdog(&mut self) {
        self.watchdog = false;
    }

    fn enable_watchdog(&mut self) {
        self.watchdog = true;
    }

    fn feed_watchdog(&mut self) {
        self.feeds += 1;
    }
}

#[derive(Default)]
pub struct MockHook {
    pub rx: Vec<u8>,
    pub console: Vec<u8>,
    pub claim_console: bool,
}

impl LineHook for MockHook {
    fn on_rx_byte(&mut self, byte: u8) {
        self.rx.push(byte);
    }

    fn on_console_char(&mut self, byte: u8) -> bool {
        if self.claim_console {
            self.console.push(byte);
        }
        self.claim_console
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockTargetError {
    OutOfRange,
    BadLength,
    NotSet,
}

pub const MOCK_REG_COUNT: usize = 22;
pub const MEM_BASE: u32 = 0x1000;
pub const MEM_LEN: usize = 256;

pub struct MockTarget {
    pub reason: StopReason,
    pub ps: u32,
    pub regs: [u32; MOCK_REG_COUNT],
    pub mem: [u8; MEM_LEN],
    pub hw_breakpoints: bool,
    pub breakpoints: Vec<u32>,
    pub watchpoints: Vec<(WatchpointKind, u32, WatchMask)>,
    pub steps_armed: usize,
    pub restarts: usize,
    pub step_overs: usize,
}

impl MockTarget {
    pub fn new(reason: StopReason) -> Self {
        Self {
            reason,
            ps: 0,
            regs: [0; MOCK_REG_COUNT],
            mem: [0; MEM_LEN],
            hw_breakpoints: true,
            breakpoints: Vec::new(),
            watchpoints: Vec::new(),
            steps_armed: 0,
            restarts: 0,
            step_overs: 0,
        }
    }

    fn mem_index(addr: u32) -> Option<usize> {
        let off = addr.checked_sub(MEM_BASE)? as usize;
        (off < MEM_LEN).then_some(off)
    }
}

type MockResult<T> = TargetResult<T, MockTargetError>;

impl Target for MockTarget {
    type Error = MockTargetError;

    const DEBUG_LEVEL: u32 = 2;

    fn stop_reason(&self) -> StopReason {
        self.reason
    }

    fn set_stop_reason(&mut self, reason: StopReason) {
        self.reason = reason;
    }

    fn status_word(&self) -> StatusWord {
        StatusWord(self.ps)
    }

    fn set_status_word(&mut self, ps: StatusWord) {
        self.ps = ps.0;
    }

    fn read_registers(&mut self, dst: &mut [u32]) -> MockResult<usize> {
        dst[..MOCK_REG_COUNT].copy_from_slice(&self.regs);
        Ok(MOCK_REG_COUNT)
    }

    fn write_registers(&mut self, src: &[u32]) -> MockResult<()> {
        if src.len() != MOCK_REG_COUNT {
            return Err(TargetError::Recoverable(MockTargetError::BadLength));
        }
        self.regs.copy_from_slice(src);
        Ok(())
    }

    fn read_memory(&mut self, addr: u32, dst: &mut [u8]) {
        for (i, slot) in dst.iter_mut().enumerate() {
            *slot = match Self::mem_index(addr.wrapping_add(i as u32)) {
                Some(idx) => self.mem[idx],
                None => 0xFF,
            };
        }
    }

    fn write_memory(&mut self, addr: u32, src: &[u8]) -> MockResult<()> {
        let Some(start) = Self::mem_index(addr) else {
            return Err(TargetError::Recoverable(MockTargetError::OutOfRange));
        };
        if start + src.len() > MEM_LEN {
            return Err(TargetError::Recoverable(MockTargetError::OutOfRange));
        }
        self.mem[start..start + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn insert_hw_breakpoint(&mut self, addr: u32, _kind: u32) -> MockResult<()> {
        if !self.hw_breakpoints {
            return Err(TargetError::NotSupported);
        }
        self.breakpoints.push(addr);
        Ok(())
    }

    fn remove_hw_breakpoint(&mut self, addr: u32) -> MockResult<()> {
        if !self.hw_breakpoints {
            return Err(TargetError::NotSupported);
        }
        let Some(pos) = self.breakpoints.iter().position(|&a| a == addr) else {
            return Err(TargetError::Recoverable(MockTargetError::NotSet));
        };
        self.breakpoints.remove(pos);
        Ok(())
    }

    fn insert_watchpoint(
        &mut self,
        kind: WatchpointKind,
        addr: u32,
        mask: WatchMask,
    ) -> MockResult<()> {
        self.watchpoints.push((kind, addr, mask));
        Ok(())
    }

    fn remove_watchpoint(&mut self, addr: u32) -> MockResult<()> {
        let Some(pos) = self.watchpoints.iter().position(|w| w.1 == addr) else {
            return Err(TargetError::Recoverable(MockTargetError::NotSet));
        };
        self.watchpoints.remove(pos);
        Ok(())
    }

    fn arm_single_step(&mut self) {
        self.steps_armed += 1;
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }

    fn step_over_stop(&mut self) {
        self.step_overs += 1;
    }
}

pub type TestSession<H = MockHook> = DebugSession<MockStream, MockPlatform, H>;

pub fn new_session() -> TestSession {
    DebugSession::new(MockStream::new(), MockPlatform::new(), StubConfig::new())
}

pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Frame `payload` as the debugger would send it. No escaping is applied.
pub fn encode_packet(payload: &[u8]) -> Vec<u8> {
    let sum = checksum(payload);
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.push(b'$');
    out.extend_from_slice(payload);
    out.push(b'#');
    out.push(HEX[(sum >> 4) as usize]);
    out.push(HEX[(sum & 0xF) as usize]);
    out
}

/// Queue one packet per payload on the mock line.
pub fn feed_packets<H: LineHook>(session: &mut TestSession<H>, payloads: &[&[u8]]) {
    for payload in payloads {
        session.stream_mut().rx.extend(encode_packet(payload));
    }
}

pub fn feed_bytes<H: LineHook>(session: &mut TestSession<H>, bytes: &[u8]) {
    session.stream_mut().rx.extend(bytes.iter().copied());
}

/// Everything the stub sent, split into packet payloads (escapes left in
/// place, checksum verified) and the bytes seen between packets.
pub struct Transcript {
    pub packets: Vec<Vec<u8>>,
    pub between: Vec<u8>,
}

pub fn parse_tx(tx: &[u8]) -> Transcript {
    let mut packets = Vec::new();
    let mut between = Vec::new();
    let mut idx = 0usize;
    while idx < tx.len() {
        if tx[idx] != b'$' {
            between.push(tx[idx]);
            idx += 1;
            continue;
        }
        let start = idx + 1;
        let Some(hash) = tx[start..].iter().position(|&b| b == b'#') else {
            panic!("unterminated packet in {:?}", String::from_utf8_lossy(tx));
        };
        let end = start + hash;
        let payload = &tx[start..end];
        let sent = &tx[end + 1..end + 3];
        let mut expected = [0u8; 2];
        let sum = checksum(payload);
        expected[0] = HEX[(sum >> 4) as usize];
        expected[1] = HEX[(sum & 0xF) as usize];
        assert_eq!(sent, &expected, "bad checksum on {:?}", String::from_utf8_lossy(payload));
        packets.push(payload.to_vec());
        idx = end + 3;
    }
    Transcript { packets, between }
}

pub fn take_transcript<H: LineHook>(session: &mut TestSession<H>) -> Transcript {
    let tx = session.stream_mut().take_tx();
    parse_tx(&tx)
}

pub fn hex_string(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[(b >> 4) as usize]);
        out.push(HEX[(b & 0xF) as usize]);
    }
    out
}
