#![allow(dead_code)]

use byte_stream::ByteStream;
use gdb_remote::Platform;
use gdb_remote::StubConfig;
use lx106_gdb::DebugUnit;
use lx106_gdb::Lx106GdbState;
use lx106_gdb::Lx106Memory;
use lx106_gdb::Lx106Stub;
use lx106_gdb::MemoryMap;
use lx106_gdb::PhysicalMemory;
use std::collections::BTreeMap;
use std::collections::VecDeque;

pub const IRAM: u32 = 0x4010_0000;
pub const DRAM: u32 = 0x3FFE_8000;

/// Sparse word-addressed memory; untouched words read as zero.
#[derive(Default)]
pub struct FakeMemory {
    pub words: BTreeMap<u32, u32>,
    pub word_writes: Vec<u32>,
}

impl FakeMemory {
    /// Store `bytes` at `addr` in little-endian order, bypassing the map.
    pub fn poke(&mut self, addr: u32, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            let a = addr + i as u32;
            let shift = (a & 3) * 8;
            let word = self.words.entry(a & !3).or_insert(0);
            *word = (*word & !(0xFF << shift)) | ((b as u32) << shift);
        }
    }

    pub fn word(&self, addr: u32) -> u32 {
        self.words.get(&addr).copied().unwrap_or(0)
    }
}

impl PhysicalMemory for FakeMemory {
    fn read_word(&mut self, addr: u32) -> u32 {
        assert_eq!(addr & 3, 0, "unaligned word read at {addr:#x}");
        self.word(addr)
    }

    fn write_word(&mut self, addr: u32, value: u32) {
        assert_eq!(addr & 3, 0, "unaligned word write at {addr:#x}");
        self.word_writes.push(addr);
        self.words.insert(addr, value);
    }
}

pub fn memory() -> Lx106Memory<FakeMemory> {
    Lx106Memory::new(FakeMemory::default(), MemoryMap::LX106)
}

/// The core has a single instruction breakpoint and a single data
/// breakpoint.
#[derive(Default)]
pub struct MockDebugUnit {
    pub breakpoint: Option<u32>,
    pub watchpoint: Option<(u32, u32, u32)>,
    pub steps_armed: usize,
    pub syncs: usize,
    pub restarts: usize,
    pub break_requests: usize,
}

impl DebugUnit for MockDebugUnit {
    fn set_breakpoint(&mut self, addr: u32, _kind: u32) -> bool {
        if self.breakpoint.is_some() {
            return false;
        }
        self.breakpoint = Some(addr);
        true
    }

    fn clear_breakpoint(&mut self, addr: u32) -> bool {
        if self.breakpoint != Some(addr) {
            return false;
        }
        self.breakpoint = None;
        true
    }

    fn set_watchpoint(&mut self, addr: u32, mask: u32, access: u32) -> bool {
        if self.watchpoint.is_some() {
            return false;
        }
        self.watchpoint = Some((addr, mask, access));
        true
    }

    fn clear_watchpoint(&mut self, addr: u32) -> bool {
        if self.watchpoint.map(|w| w.0) != Some(addr) {
            return false;
        }
        self.watchpoint = None;
        true
    }

    fn arm_single_step(&mut self) {
        self.steps_armed += 1;
    }

    fn sync_instruction_stream(&mut self) {
        self.syncs += 1;
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }

    fn request_break(&mut self) {
        self.break_requests += 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineError {
    Idle,
}

/// Scripted serial line. Errors out once the script runs dry for a while so
/// a stub waiting on a silent debugger fails the test instead of hanging.
#[derive(Default)]
pub struct ScriptedLine {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    idle: usize,
}

impl ByteStream for ScriptedLine {
    type Error = LineError;

    fn try_read(&mut self) -> Result<Option<u8>, Self::Error> {
        match self.rx.pop_front() {
            Some(b) => {
                self.idle = 0;
                Ok(Some(b))
            }
            None if self.idle >= 10_000 => Err(LineError::Idle),
            None => {
                self.idle += 1;
                Ok(None)
            }
        }
    }

    fn try_write(&mut self, byte: u8) -> Result<bool, Self::Error> {
        self.tx.push(byte);
        Ok(true)
    }
}

#[derive(Default)]
pub struct Board {
    pub uart_rx_irq: bool,
    pub watchdog: bool,
}

impl Platform for Board {
    fn disable_line_interrupt(&mut self) {
        self.uart_rx_irq = false;
    }

    fn enable_line_interrupt(&mut self) {
        self.uart_rx_irq = true;
    }

    fn disable_watchdog(&mut self) {
        self.watchdog = false;
    }

    fn enable_watchdog(&mut self) {
        self.watchdog = true;
    }

    fn feed_watchdog(&mut self) {}
}

pub type TestStub = Lx106Stub<ScriptedLine, Board, FakeMemory, MockDebugUnit>;

pub fn stub_with(config: StubConfig) -> TestStub {
    let state = Lx106GdbState::new(FakeMemory::default(), MemoryMap::LX106, MockDebugUnit::default());
    let board = Board {
        uart_rx_irq: true,
        watchdog: true,
    };
    Lx106Stub::new(ScriptedLine::default(), board, state, config)
}

pub fn stub() -> TestStub {
    stub_with(StubConfig::new())
}

fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |s, &b| s.wrapping_add(b))
}

/// Queue `$payload#cc` for each payload.
pub fn send(stub: &mut TestStub, payloads: &[&[u8]]) {
    let rx = &mut stub.session_mut().stream_mut().rx;
    for payload in payloads {
        rx.push_back(b'$');
        rx.extend(payload.iter().copied());
        rx.extend(format!("#{:02x}", checksum(payload)).bytes());
    }
}

/// Payloads of every packet the stub sent, checksums verified.
pub fn replies(stub: &TestStub) -> Vec<Vec<u8>> {
    let tx = &stub.session().stream().tx;
    let mut out = Vec::new();
    let mut i = 0;
    while i < tx.len() {
        if tx[i] != b'$' {
            i += 1;
            continue;
        }
        let hash = i + 1 + tx[i + 1..].iter().position(|&b| b == b'#').expect("unterminated packet");
        let payload = &tx[i + 1..hash];
        let sent = std::str::from_utf8(&tx[hash + 1..hash + 3]).unwrap();
        assert_eq!(u8::from_str_radix(sent, 16).unwrap(), checksum(payload));
        out.push(payload.to_vec());
        i = hash + 3;
    }
    out
}

pub fn swapped_hex(words: &[u32]) -> Vec<u8> {
    words
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .flat_map(|b| format!("{b:02x}").into_bytes())
        .collect()
}
