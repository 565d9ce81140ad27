//! # Driver Configuration
//!
//! Timing parameters that depend on the CPU the driver runs on.
//!
//! The settle delay after [`Rtc::init`](crate::Rtc::init) is measured with the
//! CPU cycle counter, so its length in ticks depends on the counter rate. On a
//! retail console CP0 Count runs at half the 93.75 MHz CPU clock.
//!
//! ```ignore
//! let rtc = Rtc::new(N64::take(), RtcConfig::default());
//!
//! // iQue Player: 144 MHz CPU, Count at half rate
//! let rtc = Rtc::new(hw, RtcConfig { counter_hz: 72_000_000, ..RtcConfig::default() });
//! ```

/// CP0 Count rate on a retail N64.
pub const N64_COUNTER_HZ: u32 = 46_875_000;

/// Time some flashcarts need before the RTC status is valid.
pub const DEFAULT_SETTLE_MS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcConfig {
    /// Ticks per second of the [`CycleCounter`](crate::si::CycleCounter).
    pub counter_hz: u32,
    /// Delay between a successful probe and the first trusted read.
    /// Zero disables the delay.
    pub settle_ms: u32,
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            counter_hz: N64_COUNTER_HZ,
            settle_ms: DEFAULT_SETTLE_MS,
        }
    }
}

impl RtcConfig {
    /// Length of the settle window in counter ticks.
    ///
    /// Saturates just below the counter period so the window can never cover
    /// a full wrap of the 32-bit counter.
    pub const fn settle_cycles(&self) -> u32 {
        let cycles = self.counter_hz as u64 * self.settle_ms as u64 / 1000;
        if cycles >= u32::MAX as u64 {
            u32::MAX - 1
        } else {
            cycles as u32
        }
    }
}
