//! # Calendar Math
//!
//! Conversions between [`CalendarTime`] and signed 64-bit Unix time on the
//! proleptic Gregorian calendar, using integer arithmetic only.
//!
//! The RTC only hands back BCD date fields, so everything the driver offers
//! beyond the raw read (offsets, normalization, formatting) goes through the
//! two conversions here:
//!
//! ```ignore
//! let mut tm = CalendarTime::from_date(2024, 2, 28).at(23, 0, 0);
//! tm.add_time(2 * 60 * 60);
//! assert_eq!((tm.mon, tm.mday, tm.hour), (1, 29, 1)); // Feb 29, 01:00
//! ```
//!
//! ## Range
//!
//! `year` is an `i32` counted from 1900, so Unix times are representable from
//! the start of year `i32::MIN + 1900` up to the end of year `i32::MAX + 1900`
//! (about ±6.8 × 10^16 seconds). Anything outside is clamped to
//! [`CalendarTime::MIN`] or [`CalendarTime::MAX`] and reported as
//! [`Error::OutOfRange`].

use core::fmt;

use crate::error::Error;

pub const SECONDS_PER_MINUTE: i64 = 60;
pub const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
pub const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;
const SECONDS_PER_NON_LEAP_YEAR: i64 = 365 * SECONDS_PER_DAY;

/// Mean Gregorian year, used to guess the year of a timestamp.
const SECONDS_PER_AVERAGE_YEAR: i64 = 31_556_952;

/// Days before the first of each month in a non-leap year.
pub(crate) const YDAY_TABLE: [i32; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

/// First representable Unix time (start of year `i32::MIN + 1900`).
pub const UNIX_TIME_MIN: i64 = year_start(i32::MIN as i64 + 1900);

/// One past the last representable Unix time (start of year `i32::MAX + 1901`).
pub const UNIX_TIME_END: i64 = year_start(i32::MAX as i64 + 1901);

/// Calendar time, laid out like the C standard library's `struct tm`.
///
/// Fields are not validated on construction. Hardware reads only guarantee
/// each decoded byte is in `0..=99`; call [`normalize`](Self::normalize) to
/// bring every field into range and recompute `wday` and `yday`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CalendarTime {
    /// Seconds after the minute `[0, 59]`
    pub sec: i32,
    /// Minutes after the hour `[0, 59]`
    pub min: i32,
    /// Hours since midnight `[0, 23]`
    pub hour: i32,
    /// Day of the month `[1, 31]`
    pub mday: i32,
    /// Months since January `[0, 11]`
    pub mon: i32,
    /// Years since 1900
    pub year: i32,
    /// Days since Sunday `[0, 6]`
    pub wday: i32,
    /// Days since January 1 `[0, 365]`
    pub yday: i32,
    /// Kept for parity with `struct tm`. Never read.
    pub isdst: i32,
}

impl CalendarTime {
    /// 1970-01-01 00:00:00, a Thursday.
    pub const EPOCH: CalendarTime = CalendarTime {
        sec: 0,
        min: 0,
        hour: 0,
        mday: 1,
        mon: 0,
        year: 70,
        wday: 4,
        yday: 0,
        isdst: -1,
    };

    /// January 1 of year `i32::MIN + 1900`, 00:00:00.
    pub const MIN: CalendarTime = CalendarTime {
        sec: 0,
        min: 0,
        hour: 0,
        mday: 1,
        mon: 0,
        year: i32::MIN,
        wday: 4,
        yday: 0,
        isdst: 0,
    };

    /// December 31 of year `i32::MAX + 1900`, 23:59:59.
    pub const MAX: CalendarTime = CalendarTime {
        sec: 59,
        min: 59,
        hour: 23,
        mday: 31,
        mon: 11,
        year: i32::MAX,
        wday: 3,
        yday: 364,
        isdst: 0,
    };

    /// Midnight on a date given as a full year and a month counted from 1.
    ///
    /// `wday` and `yday` are left at zero until the value is normalized.
    pub const fn from_date(year: i32, month: i32, day: i32) -> Self {
        CalendarTime {
            sec: 0,
            min: 0,
            hour: 0,
            mday: day,
            mon: month - 1,
            year: year.wrapping_sub(1900),
            wday: 0,
            yday: 0,
            isdst: -1,
        }
    }

    /// The same date at another time of day.
    pub const fn at(self, hour: i32, min: i32, sec: i32) -> Self {
        CalendarTime { hour, min, sec, ..self }
    }

    /// The Gregorian year, e.g. `2024`.
    pub const fn full_year(&self) -> i64 {
        self.year as i64 + 1900
    }

    /// Seconds since the Unix epoch, interpreting the time as UTC.
    ///
    /// Out-of-range months carry into the year (`mon == -1` is December of the
    /// previous year). Days, hours, minutes and seconds may also be out of
    /// range and simply add up. `wday` and `yday` are ignored.
    pub const fn to_unix_time(&self) -> i64 {
        let mon = self.mon as i64;
        let year = self.year as i64 + 1900 + mon.div_euclid(12);
        let month = mon.rem_euclid(12) as usize;

        let mut days = YDAY_TABLE[month] as i64 + self.mday as i64 - 1;
        if month >= 2 && is_leap_year(year) {
            days += 1;
        }

        year_start(year)
            + days * SECONDS_PER_DAY
            + self.hour as i64 * SECONDS_PER_HOUR
            + self.min as i64 * SECONDS_PER_MINUTE
            + self.sec as i64
    }

    /// Breaks a Unix time down into a normalized calendar time.
    ///
    /// Times outside the representable range return
    /// [`Error::OutOfRange`] holding [`CalendarTime::MIN`] or
    /// [`CalendarTime::MAX`].
    pub fn from_unix_time(unix: i64) -> Result<CalendarTime, Error> {
        if unix >= UNIX_TIME_END {
            return Err(Error::OutOfRange(Self::MAX));
        }
        if unix < UNIX_TIME_MIN {
            return Err(Error::OutOfRange(Self::MIN));
        }

        // The guess is off by at most a year either way.
        let mut year = 1970 + unix / SECONDS_PER_AVERAGE_YEAR;
        let mut year_ts = year_start(year);
        while unix < year_ts {
            year -= 1;
            year_ts = year_start(year);
        }
        loop {
            let next_ts = year_start(year + 1);
            if unix < next_ts {
                break;
            }
            year += 1;
            year_ts = next_ts;
        }

        // at most 366 days, fits an i32
        let mut ts = (unix - year_ts) as i32;
        let yday = ts / SECONDS_PER_DAY as i32;
        ts %= SECONDS_PER_DAY as i32;
        let (mon, mday) = month_and_day(year, yday);

        Ok(CalendarTime {
            sec: ts % SECONDS_PER_MINUTE as i32,
            min: (ts % SECONDS_PER_HOUR as i32) / SECONDS_PER_MINUTE as i32,
            hour: ts / SECONDS_PER_HOUR as i32,
            mday,
            mon,
            year: (year - 1900) as i32,
            wday: weekday(unix),
            yday,
            isdst: 0,
        })
    }

    /// Brings every field into range and recomputes `wday` and `yday`.
    ///
    /// On overflow `self` is clamped and the error is returned.
    pub fn normalize(&mut self) -> Result<(), Error> {
        match Self::from_unix_time(self.to_unix_time()) {
            Ok(tm) => {
                *self = tm;
                Ok(())
            }
            Err(e) => {
                *self = e.fallback();
                Err(e)
            }
        }
    }

    /// Adds a (possibly negative) number of seconds and normalizes.
    pub fn add_time(&mut self, seconds: i64) -> &mut Self {
        let unix = self.to_unix_time().saturating_add(seconds);
        *self = Self::from_unix_time(unix).unwrap_or_else(|e| e.fallback());
        self
    }
}

impl fmt::Display for CalendarTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.full_year(),
            self.mon + 1,
            self.mday,
            self.hour,
            self.min,
            self.sec
        )
    }
}

/// Seconds from `a` to `b`; negative when `a` is later.
pub const fn time_diff(a: &CalendarTime, b: &CalendarTime) -> i64 {
    b.to_unix_time() - a.to_unix_time()
}

/// Proleptic Gregorian leap year rule, valid for negative years too.
pub const fn is_leap_year(year: i64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Number of days in `mon` (0-based) of `year`.
pub const fn days_in_month(year: i64, mon: usize) -> i32 {
    match mon {
        1 if is_leap_year(year) => 29,
        1 => 28,
        3 | 5 | 8 | 10 => 30,
        _ => 31,
    }
}

/// Unix time of January 1, 00:00:00 of `year`.
///
/// Counts leap years with `⌈y/4⌉ - ⌈y/100⌉ + ⌈y/400⌉`, offset so that 1970
/// contributes none.
pub(crate) const fn year_start(year: i64) -> i64 {
    let leap_years = (year + 3).div_euclid(4) - (year + 99).div_euclid(100) + (year + 399).div_euclid(400) - 478;
    (year - 1970) * SECONDS_PER_NON_LEAP_YEAR + leap_years * SECONDS_PER_DAY
}

/// Day of year (0-based) of the first of `mon`.
pub(crate) const fn month_start(mon: usize, leap: bool) -> i32 {
    YDAY_TABLE[mon] + (leap && mon >= 2) as i32
}

fn month_and_day(year: i64, yday: i32) -> (i32, i32) {
    let leap = is_leap_year(year);
    let mut mon = 11;
    while yday < month_start(mon, leap) {
        mon -= 1;
    }
    (mon as i32, yday - month_start(mon, leap) + 1)
}

/// Day of week for a Unix time; 1970-01-01 was a Thursday.
pub(crate) const fn weekday(unix: i64) -> i32 {
    (4 + unix.div_euclid(SECONDS_PER_DAY)).rem_euclid(7) as i32
}
