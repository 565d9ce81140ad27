use core::fmt;

use crate::calendar::CalendarTime;

/// Errors reported by the driver and the calendar conversions.
///
/// Nothing in this crate panics on bad input. Every failure still produces a
/// usable value, available through [`Error::fallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The cartridge did not answer the RTC identify command.
    /// Cached for the lifetime of the session.
    NotPresent,
    /// The time does not fit in a normalized [`CalendarTime`].
    /// Carries the clamped minimum or maximum value.
    OutOfRange(CalendarTime),
}

impl Error {
    /// The value written in place of a real result: the Unix epoch when the
    /// RTC is missing, the clamped time when a conversion overflowed.
    pub const fn fallback(&self) -> CalendarTime {
        match self {
            Error::NotPresent => CalendarTime::EPOCH,
            Error::OutOfRange(clamped) => *clamped,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotPresent => write!(f, "no real-time clock answered the joybus probe"),
            Error::OutOfRange(clamped) => {
                write!(f, "time out of representable range, clamped to {}", clamped)
            }
        }
    }
}

impl core::error::Error for Error {}
