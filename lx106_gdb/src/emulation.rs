//! Getting past the instruction a synchronous stop was taken on.
//!
//! A watchpoint traps before the access completes, so resuming would trap
//! again on the same load or store. The stub performs the access itself and
//! moves the pc past it. BREAK and BREAK.N traps leave the pc on the
//! breakpoint instruction, which is skipped the same way.

use crate::frame::RegisterFrame;
use crate::memory::Lx106Memory;
use crate::memory::PhysicalMemory;

// Raw reason tests. Bit 7 marks an exception, which never matches.
const WATCH_MASK: u32 = 0x84;
const WATCH_HIT: u32 = 0x04;
const BREAK_MASK: u32 = 0x88;
const BREAK_HIT: u32 = 0x08;
const BREAK_N_MASK: u32 = 0x90;
const BREAK_N_HIT: u32 = 0x10;

/// A decoded L32I, S32I, L32I.N or S32I.N.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadStore {
    pub load: bool,
    /// Register loaded into, or stored from.
    pub data_reg: usize,
    pub base_reg: usize,
    /// Byte offset from the base register.
    pub offset: u32,
    /// Instruction length in bytes.
    pub len: u32,
}

impl LoadStore {
    /// Decode from the first instruction bytes. `i2` is only consulted for
    /// the 3-byte form.
    pub fn decode(i0: u8, i1: u8, i2: impl FnOnce() -> u8) -> Option<Self> {
        if (i0 & 0x0F) == 0x2 && (i1 & 0xB0) == 0x20 {
            return Some(Self {
                load: (i1 & 0xF0) == 0x20,
                data_reg: (i0 >> 4) as usize,
                base_reg: (i1 & 0x0F) as usize,
                offset: i2() as u32 * 4,
                len: 3,
            });
        }
        if (i0 & 0x0E) == 0x8 {
            return Some(Self {
                load: (i0 & 0x0F) == 0x8,
                data_reg: (i0 >> 4) as usize,
                base_reg: (i1 & 0x0F) as usize,
                offset: (i1 >> 4) as u32 * 4,
                len: 2,
            });
        }
        None
    }
}

/// Execute the load or store at the pc and advance past it.
///
/// Returns `false`, leaving the frame untouched, when the pc does not hold
/// one of the four recognized encodings.
pub fn emulate_load_store<M: PhysicalMemory>(
    regs: &mut RegisterFrame,
    mem: &mut Lx106Memory<M>,
) -> bool {
    let pc = regs.pc;
    let i0 = mem.read_byte(pc);
    let i1 = mem.read_byte(pc.wrapping_add(1));
    let Some(insn) = LoadStore::decode(i0, i1, || mem.read_byte(pc.wrapping_add(2))) else {
        log::warn!(target: "lx106_gdb", "no load/store at {:#010x} ({:02x} {:02x})", pc, i0, i1);
        return false;
    };

    let addr = regs.a[insn.base_reg].wrapping_add(insn.offset);
    if insn.load {
        regs.a[insn.data_reg] = mem.read_word(addr);
    } else {
        mem.write_word(addr, regs.a[insn.data_reg]);
    }
    regs.pc = pc.wrapping_add(insn.len);
    true
}

/// Skip a BREAK or BREAK.N the program stopped on, if it is still there.
/// The debugger may already have put the original instruction back.
pub fn skip_break<M: PhysicalMemory>(regs: &mut RegisterFrame, mem: &mut Lx106Memory<M>) -> bool {
    let pc = regs.pc;
    if (regs.reason & BREAK_MASK) == BREAK_HIT {
        if mem.read_byte(pc.wrapping_add(2)) == 0x00
            && (mem.read_byte(pc.wrapping_add(1)) & 0xF0) == 0x40
            && (mem.read_byte(pc) & 0x0F) == 0x00
        {
            regs.pc = pc.wrapping_add(3);
            return true;
        }
    } else if (regs.reason & BREAK_N_MASK) == BREAK_N_HIT
        && (mem.read_byte(pc.wrapping_add(1)) & 0xF0) == 0xF0
        && mem.read_byte(pc) == 0x2D
    {
        regs.pc = pc.wrapping_add(2);
        return true;
    }
    false
}

/// Adjust the frame so resuming does not stop on the same instruction again.
pub fn step_over_stop<M: PhysicalMemory>(regs: &mut RegisterFrame, mem: &mut Lx106Memory<M>) {
    if (regs.reason & WATCH_MASK) == WATCH_HIT {
        emulate_load_store(regs, mem);
    } else {
        skip_break(regs, mem);
    }
}
