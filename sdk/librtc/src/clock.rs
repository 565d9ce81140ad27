//! # Clock Offset
//!
//! Games rarely want to write the RTC itself, so the "current time" is the
//! RTC reading plus a software offset in seconds. Persisting the offset
//! (usually in the save file) is up to the caller.
//!
//! ```ignore
//! // the player set the clock to 08:30
//! let offset = rtc.set_time(&CalendarTime::from_date(2024, 6, 1).at(8, 30, 0));
//! save.clock_offset = offset;
//!
//! // next boot
//! rtc.set_offset(save.clock_offset);
//! let now = rtc.get_time()?;
//! ```

use log::debug;

use crate::{
    calendar::{CalendarTime, SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_MINUTE, time_diff},
    error::Error,
    rtc::Rtc,
    si::{CycleCounter, SiBus},
};

impl<H: SiBus + CycleCounter> Rtc<H> {
    /// Sets the offset applied by [`get_time`](Self::get_time) and
    /// [`get_time_of_day`](Self::get_time_of_day).
    pub fn set_offset(&mut self, offset: i64) {
        self.offset = offset;
        self.tod_offset = (offset % SECONDS_PER_DAY) as i32;
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Adjusts the offset so the current time reads as `now`.
    ///
    /// Returns the offset in effect afterwards. If the RTC can't be read the
    /// offset is left alone.
    pub fn set_time(&mut self, now: &CalendarTime) -> i64 {
        if let Ok(raw) = self.get_time_raw() {
            self.set_offset(time_diff(&raw, now));
            debug!("rtc: clock set to {now}, offset {}s", self.offset);
        }
        self.offset
    }

    /// The RTC time with the offset applied. Normalized unless the offset is
    /// zero, in which case this is exactly [`get_time_raw`](Self::get_time_raw).
    pub fn get_time(&mut self) -> Result<CalendarTime, Error> {
        let mut tm = self.get_time_raw()?;
        if self.offset != 0 {
            tm.add_time(self.offset);
        }
        Ok(tm)
    }

    /// Seconds since midnight of the adjusted time, in `0..86400`, or -1 if
    /// the RTC can't be read.
    ///
    /// Uses only the time-of-day part of the offset, so it stays in 32-bit
    /// arithmetic.
    pub fn get_time_of_day(&mut self) -> i32 {
        let Ok(tm) = self.get_time_raw() else {
            return -1;
        };

        let seconds = tm.sec
            + tm.min * SECONDS_PER_MINUTE as i32
            + tm.hour * SECONDS_PER_HOUR as i32
            + self.tod_offset;
        seconds.rem_euclid(SECONDS_PER_DAY as i32)
    }
}
