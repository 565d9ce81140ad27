use anyhow::{Context, Result, bail};
use librtc::CalendarTime;
use tracing::warn;

/// Parses a time given on the command line.
///
/// Accepts a Unix timestamp (`1709210096`, `-86400`) or a date with an
/// optional time (`2024-02-29`, `2024-02-29T12:34:56`, `2024-02-29 12:34`).
/// Fields are not range checked, `2024-13-01` is January 2025.
pub fn parse_time(arg: &str) -> Result<CalendarTime> {
    let arg = arg.trim();
    if let Ok(unix) = arg.parse::<i64>() {
        return Ok(from_unix(unix));
    }

    let (date, time) = match arg.split_once(['T', ' ']) {
        Some((date, time)) => (date, Some(time)),
        None => (arg, None),
    };

    // a leading '-' belongs to the year
    let (sign, unsigned) = match date.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, date),
    };
    let [year, month, day] = fields::<3>(unsigned, '-')
        .with_context(|| format!("expected YYYY-MM-DD, got {date:?}"))?;

    let [hour, min, sec] = match time {
        Some(time) => match fields::<3>(time, ':') {
            Some(hms) => hms,
            None => {
                let [hour, min] = fields::<2>(time, ':')
                    .with_context(|| format!("expected HH:MM[:SS], got {time:?}"))?;
                [hour, min, 0]
            }
        },
        None => [0, 0, 0],
    };

    let mut tm = CalendarTime::from_date(sign * year, month, day).at(hour, min, sec);
    if let Err(e) = tm.normalize() {
        warn!("{e}");
    }
    Ok(tm)
}

pub fn from_unix(unix: i64) -> CalendarTime {
    CalendarTime::from_unix_time(unix).unwrap_or_else(|e| {
        warn!("{e}");
        e.fallback()
    })
}

fn fields<const N: usize>(text: &str, separator: char) -> Option<[i32; N]> {
    let mut out = [0; N];
    let mut parts = text.split(separator);
    for field in out.iter_mut() {
        *field = parts.next()?.parse().ok()?;
    }
    match parts.next() {
        Some(_) => None,
        None => Some(out),
    }
}

/// Renders `tm` with a strftime format.
pub fn render(format: &str, tm: &CalendarTime) -> Result<String> {
    match librtc::format::<256>(format, tm) {
        Some(text) => Ok(text.as_str().to_owned()),
        None => bail!("format {format:?} has an unknown directive or expands past 256 bytes"),
    }
}
