//! # Time Formatting
//!
//! [`strftime`] renders a [`CalendarTime`] into a caller-provided byte buffer,
//! following the C standard library's `strftime` in the "C" locale.
//!
//! ```ignore
//! let mut buf = [0u8; 32];
//! let len = strftime(&mut buf, "%a %d %b %Y, %H:%M", &now);
//! console.print(&buf[..len]);
//! ```
//!
//! ## Supported directives
//!
//! | Directive | Output | Directive | Output |
//! |-----------|--------|-----------|--------|
//! | `%Y` | year, e.g. `2024` | `%y` | last two digits of the year |
//! | `%C` | century | `%G` / `%g` | ISO 8601 week-based year (full / 2 digits) |
//! | `%V` | ISO 8601 week `01-53` | `%U` / `%W` | week of year, weeks start Sunday / Monday |
//! | `%j` | day of year `001-366` | `%m` | month `01-12` |
//! | `%d` | day `01-31` | `%e` | day, space padded |
//! | `%b` `%h` / `%B` | `Jan` / `January` | `%a` / `%A` | `Mon` / `Monday` |
//! | `%w` | weekday `0-6`, Sunday is 0 | `%u` | weekday `1-7`, Monday is 1 |
//! | `%H` / `%I` | hour `00-23` / `01-12` | `%p` | `AM` / `PM` |
//! | `%M` | minute | `%S` | second |
//! | `%c` | `%a %b %e %H:%M:%S %Y` | `%x` `%D` | `%m/%d/%y` |
//! | `%X` `%T` | `%H:%M:%S` | `%F` | `%Y-%m-%d` |
//! | `%r` | `%I:%M:%S %p` | `%R` | `%H:%M` |
//! | `%%` `%n` `%t` | `%`, newline, tab | | |
//!
//! `%j` counts from 1, so it prints `yday + 1` rather than the 0-based
//! `yday` field itself.
//!
//! The `E` and `O` modifiers are accepted and ignored. A `0` modifier is also
//! accepted; on `%e` it selects zero padding.
//!
//! ## Failure
//!
//! Every field is checked against the remaining space before it is written.
//! If anything does not fit, or the format has an unknown directive, the
//! whole call fails and [`strftime`] returns 0. Because an empty format also
//! returns 0, use [`format`] when that distinction matters.

use crate::calendar::{CalendarTime, is_leap_year};

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Formats `tm` into `buf` and NUL-terminates it.
///
/// `buf.len()` is the capacity including the terminator. `tm` is normalized
/// (on a copy) before formatting. Returns the number of bytes written, not
/// counting the NUL, or 0 on failure. The last byte of `buf` is always set
/// to NUL, even when formatting fails part way.
pub fn strftime(buf: &mut [u8], format: &str, tm: &CalendarTime) -> usize {
    let Some(limit) = buf.len().checked_sub(1) else {
        return 0;
    };
    buf[limit] = 0;

    let mut tm = *tm;
    let _ = tm.normalize();

    let mut writer = Writer { buf, len: 0, limit };
    match writer.format(format.as_bytes(), &tm) {
        Some(()) => {
            writer.buf[writer.len] = 0;
            writer.len
        }
        None => 0,
    }
}

/// Formats `tm` into a fixed-capacity string of at most `N` bytes.
///
/// Returns `None` when the result does not fit or the format is invalid, so
/// unlike [`strftime`] an empty format gives `Some("")`.
pub fn format<const N: usize>(format: &str, tm: &CalendarTime) -> Option<heapless::String<N>> {
    let mut buf = [0u8; N];
    let mut tm = *tm;
    let _ = tm.normalize();

    let mut writer = Writer { buf: &mut buf, len: 0, limit: N };
    writer.format(format.as_bytes(), &tm)?;
    let len = writer.len;

    let text = core::str::from_utf8(&buf[..len]).ok()?;
    let mut out = heapless::String::new();
    out.push_str(text).ok()?;
    Some(out)
}

struct Writer<'a> {
    buf: &'a mut [u8],
    len: usize,
    /// Maximum number of bytes of output, excluding any terminator.
    limit: usize,
}

impl Writer<'_> {
    fn format(&mut self, format: &[u8], tm: &CalendarTime) -> Option<()> {
        let mut bytes = format.iter().copied();
        while let Some(byte) = bytes.next() {
            if byte != b'%' {
                self.push(&[byte])?;
                continue;
            }

            let mut conv = bytes.next()?;
            let zero_pad = conv == b'0';
            if matches!(conv, b'E' | b'O' | b'0') {
                conv = bytes.next()?;
            }
            self.directive(conv, zero_pad, tm)?;
        }
        Some(())
    }

    fn directive(&mut self, conv: u8, zero_pad: bool, tm: &CalendarTime) -> Option<()> {
        let year = tm.full_year();
        match conv {
            b'%' => self.push(b"%"),
            b'n' => self.push(b"\n"),
            b't' => self.push(b"\t"),

            b'Y' => self.push_number(year),
            b'y' => self.push_2digits(year.rem_euclid(100) as i32),
            b'C' => self.push_number(year.div_euclid(100)),
            b'G' => self.push_number(iso_week(tm).year),
            b'g' => self.push_2digits(iso_week(tm).year.rem_euclid(100) as i32),

            b'V' => self.push_2digits(iso_week(tm).week),
            b'U' => self.push_2digits((tm.yday - tm.wday + 7) / 7),
            b'W' => self.push_2digits((tm.yday - (tm.wday + 6) % 7 + 7) / 7),
            b'j' => self.push_3digits(tm.yday + 1),

            b'm' => self.push_2digits(tm.mon + 1),
            b'b' | b'h' => self.push(&month_name(tm)?.as_bytes()[..3]),
            b'B' => self.push(month_name(tm)?.as_bytes()),

            b'd' => self.push_2digits(tm.mday),
            b'e' if zero_pad || tm.mday > 9 => self.push_2digits(tm.mday),
            b'e' => self.push(&[b' ', digit(tm.mday)]),

            b'a' => self.push(&weekday_name(tm)?.as_bytes()[..3]),
            b'A' => self.push(weekday_name(tm)?.as_bytes()),
            b'w' => self.push(&[digit(tm.wday)]),
            b'u' if tm.wday == 0 => self.push(b"7"),
            b'u' => self.push(&[digit(tm.wday)]),

            b'H' => self.push_2digits(tm.hour),
            b'I' => self.push_2digits(1 + (tm.hour + 11) % 12),
            b'M' => self.push_2digits(tm.min),
            b'S' => self.push_2digits(tm.sec),
            b'p' if tm.hour < 12 => self.push(b"AM"),
            b'p' => self.push(b"PM"),

            b'c' => self.format(b"%a %b %e %H:%M:%S %Y", tm),
            b'x' | b'D' => self.format(b"%m/%d/%y", tm),
            b'X' | b'T' => self.format(b"%H:%M:%S", tm),
            b'F' => self.format(b"%Y-%m-%d", tm),
            b'r' => self.format(b"%I:%M:%S %p", tm),
            b'R' => self.format(b"%H:%M", tm),

            _ => None,
        }
    }

    /// Writes all of `bytes` or nothing.
    fn push(&mut self, bytes: &[u8]) -> Option<()> {
        let end = self.len.checked_add(bytes.len())?;
        if end > self.limit {
            return None;
        }
        self.buf[self.len..end].copy_from_slice(bytes);
        self.len = end;
        Some(())
    }

    fn push_2digits(&mut self, n: i32) -> Option<()> {
        self.push(&[digit(n / 10), digit(n % 10)])
    }

    fn push_3digits(&mut self, n: i32) -> Option<()> {
        self.push(&[digit(n / 100), digit(n / 10 % 10), digit(n % 10)])
    }

    fn push_number(&mut self, n: i64) -> Option<()> {
        let mut digits = [0u8; 20];
        let mut start = digits.len();
        let mut rest = n.unsigned_abs();
        loop {
            start -= 1;
            digits[start] = b'0' + (rest % 10) as u8;
            rest /= 10;
            if rest == 0 {
                break;
            }
        }
        if n < 0 {
            start -= 1;
            digits[start] = b'-';
        }
        self.push(&digits[start..])
    }
}

#[inline(always)]
fn digit(n: i32) -> u8 {
    b'0' + n.rem_euclid(10) as u8
}

fn month_name(tm: &CalendarTime) -> Option<&'static str> {
    MONTH_NAMES.get(usize::try_from(tm.mon).ok()?).copied()
}

fn weekday_name(tm: &CalendarTime) -> Option<&'static str> {
    WEEKDAY_NAMES.get(usize::try_from(tm.wday).ok()?).copied()
}

#[derive(Debug, PartialEq, Eq)]
struct IsoWeek {
    year: i64,
    week: i32,
}

/// ISO 8601 week-based year and week number.
///
/// Week 1 is the week (starting Monday) that contains the year's first
/// Thursday, so the first and last few days of a year may belong to the
/// neighbouring week-year.
fn iso_week(tm: &CalendarTime) -> IsoWeek {
    let year = tm.full_year();
    let days = iso_week_days(tm.yday, tm.wday);
    if days < 0 {
        let prev = year - 1;
        let days = iso_week_days(tm.yday + year_length(prev), tm.wday);
        return IsoWeek { year: prev, week: days / 7 + 1 };
    }

    let next_days = iso_week_days(tm.yday - year_length(year), tm.wday);
    if next_days >= 0 {
        IsoWeek { year: year + 1, week: next_days / 7 + 1 }
    } else {
        IsoWeek { year, week: days / 7 + 1 }
    }
}

/// Days since the Monday starting ISO week 1, for a day of year and weekday.
/// Negative when the day belongs to the previous week-year.
fn iso_week_days(yday: i32, wday: i32) -> i32 {
    // 382 keeps the dividend positive for yday >= -366
    yday - (yday - wday + 382) % 7 + 3
}

fn year_length(year: i64) -> i32 {
    if is_leap_year(year) { 366 } else { 365 }
}
