//! # N64 Hardware Backend
//!
//! [`N64`] drives the real SI, MI and PIF registers through
//! `volatile-register` blocks, and uses MIPS inline assembly for the CP0
//! registers and data cache operations.
//!
//! Only available with the `n64` feature on a `mips` target.
//!
//! ```ignore
//! let mut rtc = Rtc::new(unsafe { N64::take() }, RtcConfig::default());
//! ```

use core::arch::asm;

use volatile_register::{RO, RW, WO};

use crate::{
    regs::{DPC_BASE, MI_BASE, MI_INTR_SI, PHYS_MASK, PIF_RAM, PIF_RAM_PHYS, SI_BASE, SiStatus},
    si::{CycleCounter, PifBlock, SiBus},
};

const CACHE_LINE: usize = 16;

/// Runs a `cache` op on every data cache line of a [`PifBlock`].
macro_rules! cache_lines {
    ($op:literal, $block:expr) => {
        for line in 0..PifBlock::CACHE_LINES {
            let addr = $block as *const PifBlock as usize + line * CACHE_LINE;
            unsafe { asm!(concat!("cache ", $op, ", 0({0})"), in(reg) addr) };
        }
    };
}

#[repr(C)]
pub struct SiRegs {
    pub dram_addr: RW<u32>,
    pub pif_ad_rd64b: WO<u32>,
    pub pif_ad_rd4b: WO<u32>,
    _reserved: u32,
    pub pif_ad_wr64b: WO<u32>,
    pub pif_ad_wr4b: WO<u32>,
    pub status: RW<u32>,
}

#[repr(C)]
pub struct MiRegs {
    pub mode: RW<u32>,
    pub version: RO<u32>,
    pub intr: RO<u32>,
    pub mask: RW<u32>,
}

#[repr(C)]
pub struct DpcRegs {
    pub start: RW<u32>,
    pub end: RW<u32>,
    pub current: RO<u32>,
    pub status: RW<u32>,
    pub clock: RO<u32>,
    pub bufbusy: RO<u32>,
    pub pipebusy: RO<u32>,
    pub tmem: RO<u32>,
}

#[repr(C)]
pub struct PifRam {
    pub words: [RO<u32>; PifBlock::WORDS],
}

/// Handle to the console's serial interface and CPU counter.
pub struct N64 {
    _private: (),
}

impl N64 {
    /// # Safety
    ///
    /// Only one `N64` may exist, and nothing else may use the SI while an
    /// [`SiGuard`](crate::si::SiGuard) is held.
    pub unsafe fn take() -> N64 {
        N64 { _private: () }
    }

    #[inline(always)]
    fn si(&self) -> &'static mut SiRegs {
        unsafe { &mut *(SI_BASE as *mut SiRegs) }
    }

    #[inline(always)]
    fn mi(&self) -> &'static MiRegs {
        unsafe { &*(MI_BASE as *const MiRegs) }
    }

    #[inline(always)]
    fn dpc(&self) -> &'static DpcRegs {
        unsafe { &*(DPC_BASE as *const DpcRegs) }
    }

    #[inline(always)]
    fn pif_ram(&self) -> &'static PifRam {
        unsafe { &*(PIF_RAM as *const PifRam) }
    }
}

#[inline(always)]
fn phys(block: &PifBlock) -> u32 {
    (block as *const PifBlock as usize as u32) & PHYS_MASK
}

impl SiBus for N64 {
    #[inline(never)]
    fn set_interrupts(&mut self, enable: bool) -> bool {
        let prev: u32;
        unsafe {
            if enable {
                asm!(
                    "mfc0 {tmp}, $12",
                    "andi {prev}, {tmp}, 1",
                    "ori {tmp}, {tmp}, 1",
                    "mtc0 {tmp}, $12",
                    tmp = out(reg) _,
                    prev = out(reg) prev,
                );
            } else {
                asm!(
                    "mfc0 {tmp}, $12",
                    "andi {prev}, {tmp}, 1",
                    "subu {tmp}, {tmp}, {prev}",
                    "mtc0 {tmp}, $12",
                    tmp = out(reg) _,
                    prev = out(reg) prev,
                );
            }
        }
        prev != 0
    }

    #[inline(always)]
    fn status(&mut self) -> SiStatus {
        SiStatus::from_bits_truncate(self.si().status.read())
    }

    #[inline(always)]
    fn interrupt_pending(&mut self) -> bool {
        let mi = self.mi();
        mi.intr.read() & mi.mask.read() & MI_INTR_SI != 0
    }

    #[inline(always)]
    fn clear_interrupt(&mut self) {
        unsafe { self.si().status.write(0) };
    }

    fn dram_addr(&mut self) -> u32 {
        self.si().dram_addr.read()
    }

    fn set_dram_addr(&mut self, addr: u32) {
        unsafe { self.si().dram_addr.write(addr) };
    }

    fn start_write(&mut self, block: &PifBlock) {
        let si = self.si();
        unsafe {
            si.dram_addr.write(phys(block));
            si.pif_ad_wr64b.write(PIF_RAM_PHYS);
        }
    }

    fn start_read(&mut self, block: &mut PifBlock) {
        let si = self.si();
        unsafe {
            si.dram_addr.write(phys(block));
            si.pif_ad_rd64b.write(PIF_RAM_PHYS);
        }
    }

    #[inline(always)]
    fn read_pif_word(&mut self, index: usize) -> u32 {
        self.pif_ram().words[index % PifBlock::WORDS].read()
    }

    fn writeback(&mut self, block: &PifBlock) {
        // hit writeback invalidate
        cache_lines!("0x19", block);
    }

    fn invalidate(&mut self, block: &mut PifBlock) {
        // hit invalidate
        cache_lines!("0x11", block);
    }

    fn is_emulator(&mut self) -> bool {
        let dpc = self.dpc();
        dpc.bufbusy.read() | dpc.pipebusy.read() | dpc.tmem.read() == 0
    }
}

impl CycleCounter for N64 {
    #[inline(always)]
    fn count(&mut self) -> u32 {
        let count: u32;
        unsafe { asm!("mfc0 {0}, $9", out(reg) count) };
        count
    }
}
