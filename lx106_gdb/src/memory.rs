//! Bounds-checked access to the lx106 physical address space.
//!
//! The debug engine runs inside exception handlers, so a bad address coming
//! from the debugger must never turn into a second fault. Reads outside the
//! readable window return `0xFF`; writes are limited to a few known regions.

use core::ops::Range;

/// Byte returned for addresses outside the readable window.
pub const UNREADABLE_BYTE: u8 = 0xFF;

/// Word-granular access to physical memory. Addresses are always 4-byte
/// aligned.
pub trait PhysicalMemory {
    fn read_word(&mut self, addr: u32) -> u32;
    fn write_word(&mut self, addr: u32, value: u32);
}

/// Volatile loads and stores straight to the physical address.
pub struct DirectMemory(());

impl DirectMemory {
    /// # Safety
    /// Every address the owning [`Lx106Memory`]'s map declares readable must be
    /// mapped and side-effect free to read, and every address it declares
    /// writable must be safe to store to while the program is stopped.
    pub const unsafe fn new() -> Self {
        Self(())
    }
}

impl PhysicalMemory for DirectMemory {
    fn read_word(&mut self, addr: u32) -> u32 {
        // SAFETY: Lx106Memory only passes aligned addresses inside the
        // readable window, which the constructor's contract covers.
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    fn write_word(&mut self, addr: u32, value: u32) {
        // SAFETY: Lx106Memory only passes aligned addresses inside a
        // writable region, which the constructor's contract covers.
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }
}

/// Which addresses the debugger may touch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryMap {
    pub readable: Range<u32>,
    pub writable: [Range<u32>; 3],
}

impl MemoryMap {
    /// ESP8266: data RAM, instruction RAM and the first peripheral window.
    pub const LX106: Self = Self {
        readable: 0x2000_0000..0x6000_0000,
        writable: [
            0x3FF0_0000..0x4000_0000,
            0x4010_0000..0x4014_0000,
            0x6000_0000..0x6000_2000,
        ],
    };

    pub fn is_readable(&self, addr: u32) -> bool {
        self.readable.contains(&addr)
    }

    pub fn is_writable(&self, addr: u32) -> bool {
        self.writable.iter().any(|r| r.contains(&addr))
    }

    /// A write of `len` bytes at `addr` is accepted when both `addr` and
    /// `addr + len` fall inside writable regions.
    pub fn can_write(&self, addr: u32, len: u32) -> bool {
        match addr.checked_add(len) {
            Some(end) => self.is_writable(addr) && self.is_writable(end),
            None => false,
        }
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::LX106
    }
}

/// Byte view over word-only physical memory, clamped to a [`MemoryMap`].
pub struct Lx106Memory<M> {
    phys: M,
    map: MemoryMap,
}

impl<M: PhysicalMemory> Lx106Memory<M> {
    pub const fn new(phys: M, map: MemoryMap) -> Self {
        Self { phys, map }
    }

    pub fn map(&self) -> &MemoryMap {
        &self.map
    }

    pub fn phys(&self) -> &M {
        &self.phys
    }

    pub fn phys_mut(&mut self) -> &mut M {
        &mut self.phys
    }

    pub fn read_byte(&mut self, addr: u32) -> u8 {
        if !self.map.is_readable(addr) {
            return UNREADABLE_BYTE;
        }
        let word = self.phys.read_word(addr & !3);
        (word >> ((addr & 3) * 8)) as u8
    }

    pub fn read(&mut self, addr: u32, dst: &mut [u8]) {
        for (i, slot) in dst.iter_mut().enumerate() {
            *slot = self.read_byte(addr.wrapping_add(i as u32));
        }
    }

    /// Replace one byte of the containing word. Bytes outside the writable
    /// regions are left alone.
    pub fn write_byte(&mut self, addr: u32, value: u8) {
        if !self.map.is_writable(addr) {
            return;
        }
        let aligned = addr & !3;
        let shift = (addr & 3) * 8;
        let word = self.phys.read_word(aligned);
        let word = (word & !(0xFF << shift)) | ((value as u32) << shift);
        self.phys.write_word(aligned, word);
    }

    /// Write `src` at `addr`, or nothing at all if the range is rejected.
    pub fn write(&mut self, addr: u32, src: &[u8]) -> bool {
        if !self.map.can_write(addr, src.len() as u32) {
            return false;
        }
        for (i, &b) in src.iter().enumerate() {
            self.write_byte(addr.wrapping_add(i as u32), b);
        }
        true
    }

    /// Aligned word read used by the instruction emulator.
    pub fn read_word(&mut self, addr: u32) -> u32 {
        if !self.map.is_readable(addr) {
            return u32::MAX;
        }
        self.phys.read_word(addr & !3)
    }

    /// Aligned word store used by the instruction emulator. Dropped outside
    /// the writable regions.
    pub fn write_word(&mut self, addr: u32, value: u32) {
        if self.map.is_writable(addr) {
            self.phys.write_word(addr & !3, value);
        }
    }
}
