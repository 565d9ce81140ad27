//! # Serial Interface
//!
//! The SI is the DMA engine between RDRAM and the PIF's 64 bytes of RAM. A
//! joybus transaction is a command block DMA'd into PIF RAM, executed by the
//! PIF when PIF RAM is DMA'd back out, with the replies written in place.
//!
//! Other code (controller polling, EEPROM saves) shares PIF RAM with this
//! driver, so every transaction saves PIF RAM first and restores it after.
//! [`SerialInterface::lock`] does both and keeps interrupts off in between:
//!
//! ```ignore
//! let mut si = SerialInterface::new(N64::take());
//! {
//!     let mut guard = si.lock();
//!     *guard.buffer_mut() = IDENTIFY;
//!     guard.exec();
//!     // PIF RAM and the interrupt state are restored when `guard` drops
//! }
//! ```
//!
//! The hardware itself sits behind [`SiBus`] and [`CycleCounter`], implemented
//! for real consoles by [`N64`](crate::n64::N64) and for tests by the `pif-emu`
//! crate.

use bit_field::BitField;
use log::trace;

use crate::regs::SiStatus;

// joybus command bytes
pub const JOYBUS_SKIP_CHANNEL: u8 = 0x00;
pub const JOYBUS_IDENTIFY: u8 = 0x06;
pub const JOYBUS_READ_BLOCK: u8 = 0x07;
pub const JOYBUS_WRITE_BLOCK: u8 = 0x08;
pub const JOYBUS_END: u8 = 0xFE;
pub const JOYBUS_NOP: u8 = 0xFF;

/// Set on a channel's rx-length byte when no device answered.
pub const JOYBUS_NO_DEVICE: u8 = 0x80;

/// Device type reported by the RTC in reply to an identify.
pub const RTC_DEVICE_ID: u16 = 0x0010;

/// Byte 63 of PIF RAM, the PIF control byte.
pub const PIF_CONTROL: usize = 63;
/// Control bit that makes the PIF parse and run the joybus command block.
pub const PIF_CONTROL_RUN: u8 = 0x01;

/// Identify the device on the cartridge port.
///
/// Channels 0-3 are skipped, then `tx 1, rx 3, cmd 0x06`. The 3 reply bytes
/// land at bytes 8..11: device id `0x0010` and a status byte.
pub const IDENTIFY: PifBlock = PifBlock::command(&[0, 0xFF01_0306, 0xFFFF_FFFE]);

/// Read RTC block 0 (control): `tx 2, rx 9, cmd 0x07, block 0`.
pub const READ_CONTROL_BLOCK: PifBlock =
    PifBlock::command(&[0, 0x0209_0700, 0, 0, 0x00FE_0000]);

/// Write RTC block 0 (control). Patched over the reply of
/// [`READ_CONTROL_BLOCK`] so the rest of the control block is written back
/// unchanged. Only words 1, 2, 4 and 15 are replaced.
pub const WRITE_CONTROL_BLOCK: [(usize, u32); 4] = [
    (1, 0x0A01_0800),
    (2, 0x0300_0000),
    (4, 0x00FE_0000),
    (15, PIF_CONTROL_RUN as u32),
];

/// Read RTC block 2 (time): `tx 2, rx 9, cmd 0x07, block 2`.
///
/// The 8 data bytes land at bytes 8..16: seconds, minutes, hours, day of
/// month, weekday, month, year and century, all BCD. Byte 16 is the status.
pub const READ_TIME_BLOCK: PifBlock =
    PifBlock::command(&[0, 0x0209_0702, 0x0000_8001, 0x0401_7000, 0x80FE_0000]);

/// Offset of the reply data of a block read.
pub const BLOCK_DATA: usize = 8;

/// The 64 bytes of PIF RAM as 16 big-endian words.
///
/// Aligned to a data cache line so cache maintenance never touches a
/// neighbouring object.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PifBlock(pub [u32; 16]);

impl PifBlock {
    pub const WORDS: usize = 16;
    pub const BYTES: usize = 64;
    /// Number of 16-byte cache lines the block spans.
    pub const CACHE_LINES: usize = 4;

    pub const fn zeroed() -> Self {
        PifBlock([0; 16])
    }

    /// A command block: `words` followed by zeroes, with the PIF run bit set.
    pub const fn command(words: &[u32]) -> Self {
        let mut block = [0u32; 16];
        let mut i = 0;
        while i < words.len() && i < Self::WORDS - 1 {
            block[i] = words[i];
            i += 1;
        }
        block[Self::WORDS - 1] = PIF_CONTROL_RUN as u32;
        PifBlock(block)
    }

    /// Byte `index` in PIF RAM order (big-endian within each word).
    #[inline(always)]
    pub fn byte(&self, index: usize) -> u8 {
        let shift = (3 - index % 4) * 8;
        self.0[index / 4].get_bits(shift..shift + 8) as u8
    }

    #[inline(always)]
    pub fn set_byte(&mut self, index: usize, value: u8) {
        let shift = (3 - index % 4) * 8;
        self.0[index / 4].set_bits(shift..shift + 8, value as u32);
    }

    pub fn to_bytes(&self) -> [u8; Self::BYTES] {
        let mut bytes = [0u8; Self::BYTES];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(self.0.iter()) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8; Self::BYTES]) -> Self {
        let mut block = PifBlock::zeroed();
        for (word, chunk) in block.0.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        block
    }
}

/// The SI, MI and PIF registers the driver needs, plus the CPU's interrupt
/// enable and data cache.
///
/// DMA is asynchronous: after `start_write` or `start_read` the caller polls
/// [`SiBus::interrupt_pending`] and must not touch the block until it
/// reports completion.
pub trait SiBus {
    /// Sets the CPU interrupt enable and returns the previous setting.
    fn set_interrupts(&mut self, enable: bool) -> bool;

    fn status(&mut self) -> SiStatus;

    /// True once the SI has raised its interrupt in `MI_INTR & MI_MASK`.
    fn interrupt_pending(&mut self) -> bool;

    /// Acknowledges the SI interrupt by writing `SI_STATUS`.
    fn clear_interrupt(&mut self);

    fn dram_addr(&mut self) -> u32;
    fn set_dram_addr(&mut self, addr: u32);

    /// Starts a 64-byte DMA from `block` into PIF RAM.
    fn start_write(&mut self, block: &PifBlock);

    /// Starts a 64-byte DMA from PIF RAM into `block`. This is what makes
    /// the PIF execute the joybus commands.
    fn start_read(&mut self, block: &mut PifBlock);

    /// Reads one word of PIF RAM through its memory-mapped window. Unlike a
    /// DMA read this never runs the joybus.
    fn read_pif_word(&mut self, index: usize) -> u32;

    /// Writes the block's cache lines back to RDRAM.
    fn writeback(&mut self, block: &PifBlock);

    /// Discards the block's cache lines so the next access sees RDRAM.
    fn invalidate(&mut self, block: &mut PifBlock);

    /// True when the RDP status looks like an emulator rather than a console.
    fn is_emulator(&mut self) -> bool;
}

/// A free-running 32-bit cycle counter (CP0 Count on the N64).
pub trait CycleCounter {
    fn count(&mut self) -> u32;
}

/// Command buffer, PIF RAM backup and the saved SI state, around an [`SiBus`].
pub struct SerialInterface<H> {
    hw: H,
    buffer: PifBlock,
    backup: PifBlock,
    prev_dram_addr: u32,
    exec_on_write_bug: bool,
}

impl<H: SiBus> SerialInterface<H> {
    pub const fn new(hw: H) -> Self {
        Self {
            hw,
            buffer: PifBlock::zeroed(),
            backup: PifBlock::zeroed(),
            prev_dram_addr: 0,
            exec_on_write_bug: false,
        }
    }

    /// Enters a critical section for one transaction.
    ///
    /// Disables interrupts, waits for any SI transfer in flight (letting
    /// interrupts run meanwhile if they were enabled), then saves PIF RAM.
    pub fn lock(&mut self) -> SiGuard<'_, H> {
        let interrupts = self.hw.set_interrupts(false);
        self.wait_safe(interrupts);
        self.pif_save();
        SiGuard { si: self, interrupts }
    }

    /// True if the PIF runs commands on DMA write, as some emulators do.
    pub fn exec_on_write_bug(&self) -> bool {
        self.exec_on_write_bug
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn into_inner(self) -> H {
        self.hw
    }

    fn wait_safe(&mut self, yield_to_interrupts: bool) {
        while self.hw.status().is_busy() {
            self.hw.set_interrupts(yield_to_interrupts);
            while self.hw.status().is_busy() {
                core::hint::spin_loop();
            }
            self.hw.set_interrupts(false);
        }
    }

    fn await_op(&mut self) {
        while !self.hw.interrupt_pending() {
            core::hint::spin_loop();
        }
        self.hw.clear_interrupt();
    }

    fn pif_save(&mut self) {
        self.prev_dram_addr = self.hw.dram_addr();
        for (index, word) in self.backup.0.iter_mut().enumerate() {
            *word = self.hw.read_pif_word(index);
        }
    }

    fn pif_restore(&mut self) {
        let control = &mut self.backup.0[PifBlock::WORDS - 1];
        if self.exec_on_write_bug {
            // a reparse would run the saved commands again
            *control &= 0xFFFF_FF00;
        } else {
            *control |= PIF_CONTROL_RUN as u32;
        }

        self.hw.writeback(&self.backup);
        self.hw.start_write(&self.backup);
        self.await_op();
        self.hw.set_dram_addr(self.prev_dram_addr);
    }

    fn dma_write(&mut self) {
        trace!("si: write {:08x?}", self.buffer.0);
        self.hw.writeback(&self.buffer);
        self.hw.start_write(&self.buffer);
        self.await_op();
    }

    fn dma_read(&mut self) {
        self.hw.start_read(&mut self.buffer);
        self.await_op();
        self.hw.invalidate(&mut self.buffer);
        trace!("si: read  {:08x?}", self.buffer.0);
    }
}

/// An SI transaction in progress.
///
/// Interrupts stay disabled while the guard lives. Dropping it writes the
/// saved PIF RAM back, restores `SI_DRAM_ADDR` and then the caller's
/// interrupt setting.
pub struct SiGuard<'a, H: SiBus> {
    si: &'a mut SerialInterface<H>,
    interrupts: bool,
}

impl<'a, H: SiBus> Drop for SiGuard<'a, H> {
    fn drop(&mut self) {
        self.si.pif_restore();
        self.si.hw.set_interrupts(self.interrupts);
    }
}

impl<'a, H: SiBus> SiGuard<'a, H> {
    pub fn buffer(&self) -> &PifBlock {
        &self.si.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut PifBlock {
        &mut self.si.buffer
    }

    /// Interrupt setting that will be restored on drop.
    pub fn interrupts_were_enabled(&self) -> bool {
        self.interrupts
    }

    /// DMAs the buffer into PIF RAM.
    pub fn dma_write(&mut self) {
        self.si.dma_write();
    }

    /// DMAs PIF RAM into the buffer, running the joybus.
    pub fn dma_read(&mut self) {
        self.si.dma_read();
    }

    /// Runs the command block in the buffer and reads back the replies.
    pub fn exec(&mut self) {
        self.si.dma_write();
        self.si.dma_read();
    }

    /// Checks whether the DMA write that just happened already ran the
    /// joybus, by peeking at the identify command's rx length (byte 6) and
    /// first reply byte (byte 8). Both are untouched on real hardware.
    ///
    /// Sticky: once detected it applies to every later restore.
    pub fn detect_exec_on_write(&mut self) -> bool {
        let rx_len = self.si.hw.read_pif_word(1).get_bits(8..16) as u8;
        let reply = self.si.hw.read_pif_word(2).get_bits(24..32) as u8;
        if rx_len != IDENTIFY.byte(6) || reply != IDENTIFY.byte(8) {
            self.si.exec_on_write_bug = true;
        }
        self.si.exec_on_write_bug
    }

    pub fn is_emulator(&mut self) -> bool {
        self.si.hw.is_emulator()
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.si.hw
    }
}
