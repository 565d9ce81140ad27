//! # RTC Session
//!
//! [`Rtc`] owns the hardware and tracks where the driver is in its session:
//!
//! ```text
//! Uninitialized --init()--> NotPresent
//!               \
//!                `--------> Settling --ready()--> Ready
//! ```
//!
//! Nothing else happens on the joybus outside of these transitions and the
//! time reads, and the session never goes backwards. [`Rtc::get_time_raw`]
//! runs `init` and waits out the settle window on its own, so calling `init`
//! early only moves the 20 ms wait somewhere more convenient.
//!
//! ```ignore
//! let mut rtc = Rtc::new(unsafe { N64::take() }, RtcConfig::default());
//! if !rtc.init() {
//!     // no RTC on this cartridge: get_time() will report NotPresent
//! }
//!
//! // ... load assets while the RTC settles ...
//!
//! match rtc.get_time() {
//!     Ok(now) => show_clock(&now),
//!     Err(e) => show_clock(&e.fallback()),
//! }
//! ```

use bit_field::BitField;
use log::{debug, trace, warn};

use crate::{
    calendar::{CalendarTime, is_leap_year, month_start, weekday},
    config::RtcConfig,
    error::Error,
    regs::RtcState,
    si::{
        BLOCK_DATA, CycleCounter, IDENTIFY, READ_CONTROL_BLOCK, READ_TIME_BLOCK,
        RTC_DEVICE_ID, SerialInterface, SiBus, WRITE_CONTROL_BLOCK,
    },
};

/// Where the driver is in its session. See the [module docs](self).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Session {
    Uninitialized,
    /// The identify probe ran and nothing answered.
    NotPresent,
    /// Present, but the settle window has not elapsed yet.
    Settling,
    Ready,
}

/// The RTC driver.
///
/// All state lives here rather than in globals: the PIF shadow buffers, the
/// session flags, the settle window and the clock offset.
pub struct Rtc<H> {
    pub(crate) si: SerialInterface<H>,
    pub(crate) config: RtcConfig,
    pub(crate) state: RtcState,
    pub(crate) wait_start: u32,
    pub(crate) wait_end: u32,
    pub(crate) offset: i64,
    pub(crate) tod_offset: i32,
}

impl<H: SiBus + CycleCounter> Rtc<H> {
    pub const fn new(hw: H, config: RtcConfig) -> Self {
        Self {
            si: SerialInterface::new(hw),
            config,
            state: RtcState::empty(),
            wait_start: 0,
            wait_end: 0,
            offset: 0,
            tod_offset: 0,
        }
    }

    pub fn session(&self) -> Session {
        if !self.state.contains(RtcState::INIT_CALLED) {
            Session::Uninitialized
        } else if !self.state.contains(RtcState::PRESENT) {
            Session::NotPresent
        } else if !self.state.contains(RtcState::NOT_WAITING) {
            Session::Settling
        } else {
            Session::Ready
        }
    }

    /// Probes for the RTC and starts it.
    ///
    /// Returns whether an RTC is present. Only the first call touches the
    /// hardware; later calls return the cached answer.
    pub fn init(&mut self) -> bool {
        if self.state.contains(RtcState::INIT_CALLED) {
            return self.state.contains(RtcState::PRESENT);
        }

        let mut si = self.si.lock();
        self.state.insert(RtcState::INIT_CALLED);

        *si.buffer_mut() = IDENTIFY;
        si.dma_write();
        if si.detect_exec_on_write() {
            warn!("rtc: PIF ran the joybus on DMA write, commands will be cleared on restore");
        }
        si.dma_read();

        let reply = si.buffer();
        let device = u16::from_be_bytes([reply.byte(8), reply.byte(9)]);
        let status = reply.byte(10);
        if device != RTC_DEVICE_ID || status != 0 {
            warn!("rtc: no RTC on the cartridge port (device {device:#06x}, status {status:#04x})");
            self.state.insert(RtcState::NOT_WAITING);
            return false;
        }
        self.state.insert(RtcState::PRESENT);

        *si.buffer_mut() = READ_CONTROL_BLOCK;
        si.exec();
        let block = si.buffer_mut();
        for (word, value) in WRITE_CONTROL_BLOCK {
            block.0[word] = value;
        }
        si.exec();

        self.wait_start = si.hardware_mut().count();
        self.wait_end = self.wait_start.wrapping_add(self.config.settle_cycles());

        if si.is_emulator() || self.config.settle_ms == 0 {
            debug!("rtc: present, skipping settle window");
            self.state.insert(RtcState::NOT_WAITING);
        } else {
            debug!(
                "rtc: present, settling until count {:#010x} (now {:#010x})",
                self.wait_end, self.wait_start
            );
        }
        true
    }

    /// True once `init` has run and the settle window has elapsed.
    ///
    /// Never blocks. The window check survives the counter wrapping, and
    /// once it passes it is never checked again.
    pub fn ready(&mut self) -> bool {
        if !self.state.contains(RtcState::INIT_CALLED) {
            return false;
        }
        if self.state.contains(RtcState::NOT_WAITING) {
            return true;
        }

        let now = self.si.hardware_mut().count();
        let elapsed = if self.wait_end < self.wait_start {
            now >= self.wait_end && now < self.wait_start
        } else {
            now < self.wait_start || now >= self.wait_end
        };

        if elapsed {
            debug!("rtc: settled at count {now:#010x}");
            self.state.insert(RtcState::NOT_WAITING);
        }
        elapsed
    }

    /// Reads the RTC without applying the offset.
    ///
    /// Runs `init` and blocks until [`ready`](Self::ready) if that hasn't
    /// happened yet. The result is whatever the chip holds: it is not
    /// normalized, and `isdst` is -1.
    pub fn get_time_raw(&mut self) -> Result<CalendarTime, Error> {
        if !self.state.contains(RtcState::READY) {
            self.init();
            while !self.ready() {
                core::hint::spin_loop();
            }
        }

        if !self.state.contains(RtcState::PRESENT) {
            return Err(Error::NotPresent);
        }

        let mut data = [0u8; 8];
        {
            let mut si = self.si.lock();
            *si.buffer_mut() = READ_TIME_BLOCK;
            si.exec();
            let reply = si.buffer();
            for (i, byte) in data.iter_mut().enumerate() {
                *byte = reply.byte(BLOCK_DATA + i);
            }
        }

        let tm = decode_time(&data);
        trace!("rtc: time block {data:02x?} -> {tm} (weekday byte {})", bcd(data[4]));
        Ok(tm)
    }

    pub fn is_present(&self) -> bool {
        self.state.contains(RtcState::PRESENT)
    }

    /// True if this console runs joybus commands on DMA write. Known only
    /// after `init`.
    pub fn exec_on_write_bug(&self) -> bool {
        self.si.exec_on_write_bug()
    }

    pub fn config(&self) -> &RtcConfig {
        &self.config
    }

    pub fn hardware(&self) -> &H {
        self.si.hardware()
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        self.si.hardware_mut()
    }

    pub fn into_inner(self) -> H {
        self.si.into_inner()
    }
}

/// Decodes the 8 BCD bytes of the time block.
///
/// The weekday is computed from the date. The chip's own weekday byte is
/// only as good as whatever last set the clock.
fn decode_time(data: &[u8; 8]) -> CalendarTime {
    let mut tm = CalendarTime {
        sec: bcd(data[0]),
        min: bcd(data[1]),
        // bit 7 is the 24-hour mode flag
        hour: bcd(data[2].wrapping_sub(0x80)),
        mday: bcd(data[3]),
        mon: bcd(data[5]) - 1,
        year: 100 * bcd(data[7]) + bcd(data[6]),
        wday: 0,
        yday: 0,
        isdst: -1,
    };

    if (0..12).contains(&tm.mon) {
        let leap = is_leap_year(tm.full_year());
        tm.yday = month_start(tm.mon as usize, leap) + tm.mday - 1;
    } else {
        warn!("rtc: month byte {:#04x} out of range", data[5]);
    }
    tm.wday = weekday(tm.to_unix_time());
    tm
}

#[inline(always)]
fn bcd(byte: u8) -> i32 {
    (byte.get_bits(4..8) * 10 + byte.get_bits(0..4)) as i32
}
