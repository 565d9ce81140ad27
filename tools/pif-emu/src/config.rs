use librtc::config::N64_COUNTER_HZ;

/// How the simulated console behaves at power on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// RTC time at power on, as Unix time.
    pub unix_time: i64,
    /// Whether an RTC sits on the cartridge port (joybus channel 4).
    pub rtc_present: bool,
    /// Run the joybus on DMA write instead of DMA read, like some emulators.
    pub exec_on_write: bool,
    /// Leave the RDP status registers zeroed, as emulators do.
    pub emulator: bool,
    /// SI status polls before a DMA raises its interrupt.
    pub dma_latency: u32,
    /// SI status polls before a transfer started by someone else finishes.
    pub busy_on_start: u32,
    pub interrupts_enabled: bool,
    /// Counter rate, used to turn elapsed cycles into RTC seconds.
    pub counter_hz: u32,
    /// Cycles that pass between two reads of the counter.
    pub cycles_per_read: u32,
    pub initial_count: u32,
    /// `SI_DRAM_ADDR` left behind by whatever used the SI last.
    pub dram_addr: u32,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            // 2024-02-29 12:34:56
            unix_time: 1_709_210_096,
            rtc_present: true,
            exec_on_write: false,
            emulator: false,
            dma_latency: 4,
            busy_on_start: 0,
            interrupts_enabled: true,
            counter_hz: N64_COUNTER_HZ,
            cycles_per_read: 1_000,
            initial_count: 0,
            dram_addr: 0x0010_0000,
        }
    }
}
