//! Saved CPU context of a stopped lx106 core.
//!
//! The stub works on a [`RegisterFrame`] copy; the entry points copy it out of
//! whichever hardware frame the exception code left behind and copy it back
//! before resuming.

/// Distance from the HAL exception frame to the interrupted stack pointer.
/// The HAL clobbers `a1`, but its value is always recoverable from this.
pub const EXCEPTION_GDB_SP_OFFSET: u32 = 0x100;

pub const REG_A0: usize = 0;
pub const REG_A15: usize = 15;
pub const REG_PC: usize = 16;
pub const REG_SAR: usize = 17;
pub const REG_LITBASE: usize = 18;
pub const REG_SR176: usize = 19;
pub const REG_RESERVED: usize = 20;
pub const REG_PS: usize = 21;

/// Number of 32-bit words in a `g` reply.
pub const G_REGISTER_WORDS: usize = REG_PS + 1;

/// Register state seen and edited by the debugger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegisterFrame {
    pub a: [u32; 16],
    pub pc: u32,
    pub ps: u32,
    pub sar: u32,
    pub litbase: u32,
    pub sr176: u32,
    pub sr208: u32,
    /// Raw stop reason, see [`gdb_remote::StopReason::from_raw`].
    pub reason: u32,
}

impl RegisterFrame {
    /// Serialize in the debugger's register order.
    pub fn to_words(&self, dst: &mut [u32; G_REGISTER_WORDS]) {
        dst[REG_A0..=REG_A15].copy_from_slice(&self.a);
        dst[REG_PC] = self.pc;
        dst[REG_SAR] = self.sar;
        dst[REG_LITBASE] = self.litbase;
        dst[REG_SR176] = self.sr176;
        dst[REG_RESERVED] = 0;
        dst[REG_PS] = self.ps;
    }

    /// Load from the debugger's register order. The reserved slot is ignored.
    pub fn load_words(&mut self, src: &[u32; G_REGISTER_WORDS]) {
        self.a.copy_from_slice(&src[REG_A0..=REG_A15]);
        self.pc = src[REG_PC];
        self.sar = src[REG_SAR];
        self.litbase = src[REG_LITBASE];
        self.sr176 = src[REG_SR176];
        self.ps = src[REG_PS];
    }
}

/// Special registers the HAL does not save, captured by the exception
/// trampoline before the stub is called.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtraSfrs {
    pub litbase: u32,
    pub sr176: u32,
    pub sr208: u32,
    /// Exception cause for fatal exceptions, unused for the line interrupt.
    pub reason: u32,
}

/// Frame written by the debug exception vector: everything the stub needs,
/// in this order.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebugExceptionFrame {
    pub pc: u32,
    pub ps: u32,
    pub sar: u32,
    pub vpri: u32,
    pub a: [u32; 16],
    pub litbase: u32,
    pub sr176: u32,
    pub sr208: u32,
    pub reason: u32,
}

impl DebugExceptionFrame {
    pub fn to_registers(&self) -> RegisterFrame {
        RegisterFrame {
            a: self.a,
            pc: self.pc,
            ps: self.ps,
            sar: self.sar,
            litbase: self.litbase,
            sr176: self.sr176,
            sr208: self.sr208,
            reason: self.reason,
        }
    }

    pub fn store_registers(&mut self, regs: &RegisterFrame) {
        self.a = regs.a;
        self.pc = regs.pc;
        self.ps = regs.ps;
        self.sar = regs.sar;
        self.litbase = regs.litbase;
        self.sr176 = regs.sr176;
        self.sr208 = regs.sr208;
        self.reason = regs.reason;
    }
}

/// Frame the HAL builds for fatal exceptions and interrupts. `a1` is not
/// saved; the stub derives it from the frame address.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HalExceptionFrame {
    pub pc: u32,
    pub ps: u32,
    pub sar: u32,
    pub vpri: u32,
    pub a0: u32,
    /// `a2..=a15`.
    pub a2_a15: [u32; 14],
}

impl HalExceptionFrame {
    /// Build the register view of this frame. `frame_addr` is the address the
    /// HAL passed the handler.
    pub fn to_registers(&self, frame_addr: u32, sfrs: ExtraSfrs) -> RegisterFrame {
        let mut a = [0u32; 16];
        a[0] = self.a0;
        a[1] = frame_addr.wrapping_add(EXCEPTION_GDB_SP_OFFSET);
        a[2..].copy_from_slice(&self.a2_a15);
        RegisterFrame {
            a,
            pc: self.pc,
            ps: self.ps,
            sar: self.sar,
            litbase: sfrs.litbase,
            sr176: sfrs.sr176,
            sr208: sfrs.sr208,
            reason: sfrs.reason,
        }
    }

    /// Write back what the HAL will restore. Edits to `a1` and the special
    /// registers have nowhere to go and are dropped.
    pub fn store_registers(&mut self, regs: &RegisterFrame) {
        self.pc = regs.pc;
        self.ps = regs.ps;
        self.sar = regs.sar;
        self.a0 = regs.a[0];
        self.a2_a15.copy_from_slice(&regs.a[2..]);
    }
}
