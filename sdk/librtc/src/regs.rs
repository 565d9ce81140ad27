//! # Register Addresses and Flags
//!
//! Physical layout of the hardware the driver touches, and the bitflags used
//! to read it.
//!
//! | Block      | Base (KSEG1)   | Used for                                 |
//! |------------|----------------|------------------------------------------|
//! | SI         | `$A480_0000`   | DMA between RDRAM and PIF RAM            |
//! | MI         | `$A430_0000`   | SI completion interrupt                  |
//! | DPC        | `$A410_0000`   | Emulator detection                       |
//! | PIF RAM    | `$BFC0_07C0`   | 64-byte joybus command buffer            |
//!
//! ## SiStatus (`SI_STATUS`, `$A480_0018`)
//!
//! | Flag           | Meaning                                    |
//! |----------------|--------------------------------------------|
//! | `DMA_BUSY`     | A DMA transfer is in progress              |
//! | `IO_BUSY`      | A single-word PIF RAM access is in progress|
//! | `READ_PENDING` | An IO read is waiting to complete          |
//! | `DMA_ERROR`    | The last DMA overlapped another access     |
//! | `INTERRUPT`    | SI interrupt raised. Writing the register clears it |

pub const SI_BASE: usize = 0xA480_0000;
pub const SI_DRAM_ADDR: usize = SI_BASE;
pub const SI_PIF_AD_RD64B: usize = SI_BASE + 0x04;
pub const SI_PIF_AD_WR64B: usize = SI_BASE + 0x10;
pub const SI_STATUS: usize = SI_BASE + 0x18;

pub const MI_BASE: usize = 0xA430_0000;
pub const MI_INTR: usize = MI_BASE + 0x08;
pub const MI_MASK: usize = MI_BASE + 0x0C;
/// SI bit in `MI_INTR` / `MI_MASK`.
pub const MI_INTR_SI: u32 = 0x2;

pub const DPC_BASE: usize = 0xA410_0000;

pub const PIF_RAM: usize = 0xBFC0_07C0;
/// PIF RAM as seen by the SI DMA engine.
pub const PIF_RAM_PHYS: u32 = 0x1FC0_07C0;

/// Mask from a KSEG0/KSEG1 virtual address to a physical one.
pub const PHYS_MASK: u32 = 0x1FFF_FFFF;

bitflags::bitflags! {
    /// SI status register at `$A480_0018`.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct SiStatus: u32 {
        const DMA_BUSY      = 0b0000_0001;
        const IO_BUSY       = 0b0000_0010;
        const READ_PENDING  = 0b0000_0100;
        const DMA_ERROR     = 0b0000_1000;
        /// Mirrors the SI bit of `MI_INTR`.
        const INTERRUPT     = 0b1_0000_0000_0000;
    }

    /// Driver session flags.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct RtcState: u8 {
        /// The identify probe has run. Set even when the probe fails.
        const INIT_CALLED = 0b0000_0001;
        /// The settle window has elapsed (or was skipped).
        const NOT_WAITING = 0b0000_0010;
        /// The cartridge answered the identify probe as an RTC.
        const PRESENT     = 0b0000_0100;

        const READY = Self::INIT_CALLED.bits() | Self::NOT_WAITING.bits();
    }
}

impl SiStatus {
    /// True while the SI can't accept a new transfer.
    #[inline(always)]
    pub fn is_busy(self) -> bool {
        self.intersects(SiStatus::DMA_BUSY | SiStatus::IO_BUSY)
    }
}
