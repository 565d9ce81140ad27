use heapless::HistoryBuffer;
use log::{debug, trace, warn};

use librtc::{
    regs::{
        DPC_BASE, MI_INTR, MI_INTR_SI, MI_MASK, PHYS_MASK, PIF_RAM, SI_DRAM_ADDR, SI_STATUS,
        SiStatus,
    },
    si::{CycleCounter, PifBlock, SiBus},
};

use crate::{config::ConsoleConfig, pif::Pif, rtc_chip::RtcChip};

const DPC_REGS: usize = 8;
const DPC_LAST: usize = DPC_BASE + (DPC_REGS - 1) * 4;
const PIF_RAM_LAST: usize = PIF_RAM + PifBlock::BYTES - 4;

// DPC_BUFBUSY, DPC_PIPEBUSY, DPC_TMEM
const DPC_BUSY_COUNTERS: [usize; 3] = [5, 6, 7];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// RDRAM to PIF RAM.
    Write,
    /// PIF RAM to RDRAM.
    Read,
}

/// One SI DMA, as recorded in [`Console::history`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiEvent {
    pub direction: Direction,
    pub dram_addr: u32,
    pub interrupts_enabled: bool,
    /// Whether the PIF ran the joybus as part of this DMA.
    pub executed: bool,
    /// PIF RAM once the DMA finished.
    pub pif_ram: [u8; PifBlock::BYTES],
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub dma_writes: u32,
    pub dma_reads: u32,
    pub writebacks: u32,
    pub invalidates: u32,
    pub joybus_runs: u32,
    /// Times interrupts were switched on while the SI was busy.
    pub yields: u32,
    /// Interrupt enable/disable calls that changed the setting.
    pub interrupt_toggles: u32,
}

/// A console with nothing but an SI, a PIF and (optionally) a cartridge RTC.
pub struct Console {
    config: ConsoleConfig,
    pif: Pif,
    rtc: Option<RtcChip>,

    interrupts_enabled: bool,
    si_dram_addr: u32,
    si_interrupt: bool,
    mi_mask: u32,
    dpc: [u32; DPC_REGS],

    /// Status polls until the transfer in flight finishes.
    busy_polls: u32,
    /// Whether that transfer is ours and should raise the SI interrupt.
    raise_on_complete: bool,

    cycles: u64,

    pub stats: Stats,
    history: HistoryBuffer<SiEvent, 32>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new(ConsoleConfig::default())
    }
}

impl Console {
    pub fn new(config: ConsoleConfig) -> Self {
        let mut dpc = [0; DPC_REGS];
        if !config.emulator {
            // idle RDP still counts clocks
            for (reg, value) in DPC_BUSY_COUNTERS.into_iter().zip([0x0001_2A4C, 0x0000_3F10, 0x0000_0C80]) {
                dpc[reg] = value;
            }
        }

        Self {
            pif: Pif::default(),
            rtc: config.rtc_present.then(|| RtcChip::new(config.unix_time)),
            interrupts_enabled: config.interrupts_enabled,
            si_dram_addr: config.dram_addr,
            si_interrupt: false,
            mi_mask: MI_INTR_SI,
            dpc,
            busy_polls: config.busy_on_start,
            raise_on_complete: false,
            cycles: 0,
            stats: Stats::default(),
            history: HistoryBuffer::new(),
            config,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn pif_ram(&self) -> &[u8; PifBlock::BYTES] {
        self.pif.ram()
    }

    pub fn rtc(&self) -> Option<&RtcChip> {
        self.rtc.as_ref()
    }

    pub fn rtc_mut(&mut self) -> Option<&mut RtcChip> {
        self.sync_rtc();
        self.rtc.as_mut()
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    /// Oldest first.
    pub fn history(&self) -> impl Iterator<Item = &SiEvent> {
        self.history.oldest_ordered()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.cycles / self.config.counter_hz.max(1) as u64
    }

    pub fn advance_cycles(&mut self, cycles: u64) {
        self.cycles = self.cycles.saturating_add(cycles);
    }

    pub fn advance_seconds(&mut self, seconds: u64) {
        self.advance_cycles(seconds.saturating_mul(self.config.counter_hz as u64));
    }

    /// Leaves another caller's command block in PIF RAM.
    pub fn load_pif_ram(&mut self, bytes: &[u8; PifBlock::BYTES]) {
        self.pif.load(bytes);
    }

    /// Starts a transfer that isn't ours, e.g. a controller read kicked off
    /// by the game's vblank handler.
    pub fn start_foreign_transfer(&mut self, polls: u32) {
        self.busy_polls = polls;
        self.raise_on_complete = false;
    }

    pub fn read_word(&mut self, address: usize) -> u32 {
        match address {
            SI_DRAM_ADDR => self.si_dram_addr,
            SI_STATUS => self.si_status().bits(),
            MI_INTR => {
                self.step();
                if self.si_interrupt { MI_INTR_SI } else { 0 }
            }
            MI_MASK => self.mi_mask,
            DPC_BASE..=DPC_LAST => self.dpc[(address - DPC_BASE) / 4],
            PIF_RAM..=PIF_RAM_LAST => self.pif.word((address - PIF_RAM) / 4),
            _ => {
                warn!("console: read from unmapped address {address:#010x}");
                0
            }
        }
    }

    pub fn write_word(&mut self, address: usize, value: u32) {
        match address {
            SI_DRAM_ADDR => self.si_dram_addr = value,
            // any write acknowledges the interrupt
            SI_STATUS => self.si_interrupt = false,
            MI_MASK => self.mi_mask = value,
            _ => warn!("console: write of {value:#010x} to unmapped address {address:#010x}"),
        }
    }

    fn si_status(&mut self) -> SiStatus {
        self.step();
        let mut status = SiStatus::empty();
        status.set(SiStatus::DMA_BUSY, self.busy_polls > 0);
        status.set(SiStatus::INTERRUPT, self.si_interrupt);
        status
    }

    /// Advances the transfer in flight by one poll.
    fn step(&mut self) {
        if self.busy_polls == 0 {
            return;
        }
        self.busy_polls -= 1;
        if self.busy_polls == 0 && self.raise_on_complete {
            self.si_interrupt = true;
        }
    }

    fn begin_dma(&mut self) {
        if self.busy_polls > 0 {
            warn!("console: DMA started while the SI is busy");
        }
        self.raise_on_complete = true;
        self.busy_polls = self.config.dma_latency;
        if self.busy_polls == 0 {
            self.si_interrupt = true;
        }
    }

    fn sync_rtc(&mut self) {
        let uptime = self.uptime_seconds();
        if let Some(rtc) = self.rtc.as_mut() {
            rtc.sync(uptime);
        }
    }

    fn run_joybus(&mut self) {
        self.sync_rtc();
        let commands = self
            .pif
            .execute(self.rtc.as_mut().map(|rtc| rtc as &mut dyn crate::pif::JoybusDevice));
        self.stats.joybus_runs += 1;
        trace!("console: joybus ran {commands} commands");
    }

    fn record(&mut self, direction: Direction, executed: bool) {
        self.history.write(SiEvent {
            direction,
            dram_addr: self.si_dram_addr,
            interrupts_enabled: self.interrupts_enabled,
            executed,
            pif_ram: *self.pif.ram(),
        });
    }
}

fn phys(block: &PifBlock) -> u32 {
    (block as *const PifBlock as usize as u32) & PHYS_MASK
}

impl SiBus for Console {
    fn set_interrupts(&mut self, enable: bool) -> bool {
        let prev = self.interrupts_enabled;
        if prev != enable {
            self.stats.interrupt_toggles += 1;
        }
        if enable && self.busy_polls > 0 {
            self.stats.yields += 1;
        }
        self.interrupts_enabled = enable;
        prev
    }

    fn status(&mut self) -> SiStatus {
        self.si_status()
    }

    fn interrupt_pending(&mut self) -> bool {
        self.read_word(MI_INTR) & self.read_word(MI_MASK) & MI_INTR_SI != 0
    }

    fn clear_interrupt(&mut self) {
        self.write_word(SI_STATUS, 0);
    }

    fn dram_addr(&mut self) -> u32 {
        self.read_word(SI_DRAM_ADDR)
    }

    fn set_dram_addr(&mut self, addr: u32) {
        self.write_word(SI_DRAM_ADDR, addr);
    }

    fn start_write(&mut self, block: &PifBlock) {
        self.write_word(SI_DRAM_ADDR, phys(block));
        self.begin_dma();
        self.stats.dma_writes += 1;

        self.pif.load(&block.to_bytes());
        let executed = self.config.exec_on_write && self.pif.run_requested();
        if executed {
            debug!("console: joybus ran on DMA write");
            self.run_joybus();
        }
        self.record(Direction::Write, executed);
    }

    fn start_read(&mut self, block: &mut PifBlock) {
        self.write_word(SI_DRAM_ADDR, phys(block));
        self.begin_dma();
        self.stats.dma_reads += 1;

        let executed = self.pif.run_requested();
        if executed {
            self.run_joybus();
        }
        *block = PifBlock::from_bytes(self.pif.ram());
        self.record(Direction::Read, executed);
    }

    fn read_pif_word(&mut self, index: usize) -> u32 {
        self.read_word(PIF_RAM + (index % PifBlock::WORDS) * 4)
    }

    fn writeback(&mut self, _block: &PifBlock) {
        self.stats.writebacks += 1;
    }

    fn invalidate(&mut self, _block: &mut PifBlock) {
        self.stats.invalidates += 1;
    }

    fn is_emulator(&mut self) -> bool {
        DPC_BUSY_COUNTERS
            .iter()
            .fold(0, |acc, &reg| acc | self.read_word(DPC_BASE + reg * 4))
            == 0
    }
}

impl CycleCounter for Console {
    fn count(&mut self) -> u32 {
        self.cycles = self.cycles.saturating_add(self.config.cycles_per_read as u64);
        (self.config.initial_count as u64).wrapping_add(self.cycles) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use librtc::si::{IDENTIFY, READ_TIME_BLOCK};

    fn await_op(console: &mut Console) {
        while !console.interrupt_pending() {}
        console.clear_interrupt();
    }

    #[test]
    fn dma_completes_after_latency() {
        let mut console = Console::new(ConsoleConfig { dma_latency: 3, ..Default::default() });
        let block = IDENTIFY;
        console.start_write(&block);

        assert!(console.status().contains(SiStatus::DMA_BUSY));
        assert!(!console.interrupt_pending());
        assert!(console.interrupt_pending());
        assert!(!console.status().is_busy());

        console.clear_interrupt();
        assert!(!console.interrupt_pending());
    }

    #[test]
    fn joybus_runs_on_read() {
        let mut console = Console::default();
        console.start_write(&IDENTIFY);
        await_op(&mut console);
        assert_eq!(console.stats.joybus_runs, 0);
        assert_eq!(console.read_pif_word(2), 0xFFFF_FFFE);

        let mut block = PifBlock::zeroed();
        console.start_read(&mut block);
        await_op(&mut console);
        assert_eq!(console.stats.joybus_runs, 1);
        assert_eq!(block.0[2], 0x0010_00FE);
    }

    #[test]
    fn exec_on_write_quirk() {
        let mut console = Console::new(ConsoleConfig { exec_on_write: true, ..Default::default() });
        console.start_write(&IDENTIFY);
        await_op(&mut console);
        assert_eq!(console.stats.joybus_runs, 1);
        assert_eq!(console.read_pif_word(2), 0x0010_00FE);

        let mut block = PifBlock::zeroed();
        console.start_read(&mut block);
        assert_eq!(console.stats.joybus_runs, 1);
    }

    #[test]
    fn time_block_tracks_uptime() {
        let mut console = Console::new(ConsoleConfig { unix_time: 0, ..Default::default() });
        console.advance_seconds(3_661);
        console.start_write(&READ_TIME_BLOCK);
        await_op(&mut console);
        let mut block = PifBlock::zeroed();
        console.start_read(&mut block);
        await_op(&mut console);

        // 01:01:01 on Thursday 1970-01-01
        let data: [u8; 8] = core::array::from_fn(|i| block.byte(8 + i));
        assert_eq!(data, [0x01, 0x01, 0x81, 0x01, 0x04, 0x01, 0x70, 0x00]);
    }

    #[test]
    fn dpc_signature() {
        assert!(!Console::default().is_emulator());
        assert!(Console::new(ConsoleConfig { emulator: true, ..Default::default() }).is_emulator());
    }

    #[test]
    fn counter_wraps() {
        let mut console = Console::new(ConsoleConfig {
            initial_count: u32::MAX - 1_500,
            cycles_per_read: 1_000,
            ..Default::default()
        });
        assert_eq!(console.count(), u32::MAX - 500);
        assert_eq!(console.count(), 499);
    }

    #[test]
    fn unmapped_reads_are_zero() {
        let mut console = Console::default();
        assert_eq!(console.read_word(0xA400_0000), 0);
    }

    #[test]
    fn history_keeps_latest() {
        let mut console = Console::default();
        for _ in 0..40 {
            console.start_write(&IDENTIFY);
            await_op(&mut console);
        }
        assert_eq!(console.history().count(), 32);
        assert!(console.history().all(|e| e.direction == Direction::Write));
    }
}
