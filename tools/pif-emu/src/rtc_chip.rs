//! The cartridge RTC as seen over the joybus.
//!
//! The chip has three 8-byte blocks:
//!
//! | Block | Contents                                                     |
//! |-------|--------------------------------------------------------------|
//! | 0     | control: byte 0 is write protection, byte 1 bit 2 stops the clock |
//! | 1     | battery-backed scratch                                       |
//! | 2     | time: sec, min, hour, day, weekday, month, year, century (BCD)|

use bit_field::BitField;
use log::{debug, warn};

use librtc::{
    calendar::CalendarTime,
    si::{JOYBUS_IDENTIFY, JOYBUS_READ_BLOCK, JOYBUS_WRITE_BLOCK, RTC_DEVICE_ID},
};

use crate::pif::JoybusDevice;

/// Joybus reset, answered like identify.
const JOYBUS_RESET: u8 = 0xFF;

const BLOCK_CONTROL: u8 = 0;
const BLOCK_SCRATCH: u8 = 1;
const BLOCK_TIME: u8 = 2;

/// Status byte bit reported while the clock is stopped.
const STATUS_STOPPED: u8 = 0x80;

#[derive(Debug, Clone)]
pub struct RtcChip {
    control: [u8; 8],
    scratch: [u8; 8],
    /// Time at `base_seconds` of console uptime.
    base_unix: i64,
    base_seconds: u64,
    uptime_seconds: u64,
}

impl RtcChip {
    pub fn new(unix_time: i64) -> Self {
        Self {
            control: [0x03, 0, 0, 0, 0, 0, 0, 0],
            scratch: [0; 8],
            base_unix: unix_time,
            base_seconds: 0,
            uptime_seconds: 0,
        }
    }

    /// Tells the chip how long the console has been on.
    pub fn sync(&mut self, uptime_seconds: u64) {
        self.uptime_seconds = uptime_seconds;
    }

    pub fn stopped(&self) -> bool {
        self.control[1].get_bit(2)
    }

    pub fn control(&self) -> &[u8; 8] {
        &self.control
    }

    /// Current time as Unix time.
    pub fn unix_time(&self) -> i64 {
        if self.stopped() {
            self.base_unix
        } else {
            let elapsed = self.uptime_seconds.saturating_sub(self.base_seconds);
            self.base_unix.saturating_add(elapsed as i64)
        }
    }

    pub fn set_unix_time(&mut self, unix_time: i64) {
        self.base_unix = unix_time;
        self.base_seconds = self.uptime_seconds;
    }

    fn status(&self) -> u8 {
        if self.stopped() { STATUS_STOPPED } else { 0 }
    }

    fn read_block(&self, block: u8) -> Option<[u8; 8]> {
        match block {
            BLOCK_CONTROL => Some(self.control),
            BLOCK_SCRATCH => Some(self.scratch),
            BLOCK_TIME => Some(encode_time(self.unix_time())),
            _ => None,
        }
    }

    fn write_block(&mut self, block: u8, data: &[u8]) -> bool {
        let Ok(data) = <[u8; 8]>::try_from(data) else {
            return false;
        };
        match block {
            BLOCK_CONTROL => {
                // rebase so stopping and starting don't lose or gain time
                let now = self.unix_time();
                self.control = data;
                self.set_unix_time(now);
            }
            BLOCK_SCRATCH if !self.control[0].get_bit(0) => self.scratch = data,
            BLOCK_TIME if !self.control[0].get_bit(1) => {
                let tm = decode_time(&data);
                debug!("rtc chip: time set to {tm}");
                self.set_unix_time(tm.to_unix_time());
            }
            BLOCK_SCRATCH | BLOCK_TIME => warn!("rtc chip: block {block} is write protected"),
            _ => return false,
        }
        true
    }
}

impl JoybusDevice for RtcChip {
    fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> bool {
        match (tx, rx.len()) {
            ([JOYBUS_IDENTIFY | JOYBUS_RESET], 3) => {
                let [hi, lo] = RTC_DEVICE_ID.to_be_bytes();
                rx.copy_from_slice(&[hi, lo, self.status()]);
                true
            }
            ([JOYBUS_READ_BLOCK, block], 9) => match self.read_block(*block) {
                Some(data) => {
                    rx[..8].copy_from_slice(&data);
                    rx[8] = self.status();
                    true
                }
                None => false,
            },
            ([JOYBUS_WRITE_BLOCK, block, data @ ..], 1) => {
                if !self.write_block(*block, data) {
                    return false;
                }
                rx[0] = self.status();
                true
            }
            _ => {
                warn!("rtc chip: unhandled command {tx:02x?} (rx {})", rx.len());
                false
            }
        }
    }
}

fn to_bcd(value: i32) -> u8 {
    let value = value.rem_euclid(100) as u8;
    ((value / 10) << 4) | (value % 10)
}

fn from_bcd(byte: u8) -> i32 {
    (byte.get_bits(4..8) * 10 + byte.get_bits(0..4)) as i32
}

/// Encodes the time block. Years outside 1900..=2899 don't fit the century
/// digit and are clamped.
pub fn encode_time(unix_time: i64) -> [u8; 8] {
    let tm = CalendarTime::from_unix_time(unix_time).unwrap_or_else(|e| e.fallback());
    let year = tm.year.clamp(0, 999);
    [
        to_bcd(tm.sec),
        to_bcd(tm.min),
        to_bcd(tm.hour) | 0x80,
        to_bcd(tm.mday),
        to_bcd(tm.wday),
        to_bcd(tm.mon + 1),
        to_bcd(year % 100),
        to_bcd(year / 100),
    ]
}

pub fn decode_time(data: &[u8; 8]) -> CalendarTime {
    let mut tm = CalendarTime::from_date(
        1900 + 100 * from_bcd(data[7]) + from_bcd(data[6]),
        from_bcd(data[5]),
        from_bcd(data[3]),
    )
    .at(from_bcd(data[2] & 0x7F), from_bcd(data[1]), from_bcd(data[0]));
    let _ = tm.normalize();
    tm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_bcd_time_block() {
        // 2024-02-29 12:34:56, Thursday
        assert_eq!(encode_time(1_709_210_096), [0x56, 0x34, 0x92, 0x29, 0x04, 0x02, 0x24, 0x01]);
        assert_eq!(encode_time(0), [0x00, 0x00, 0x80, 0x01, 0x04, 0x01, 0x70, 0x00]);
    }

    #[test]
    fn decode_inverts_encode() {
        for unix in [0, 1_000_000_000, 1_709_210_096, 4_102_444_799] {
            assert_eq!(decode_time(&encode_time(unix)).to_unix_time(), unix);
        }
    }

    #[test]
    fn identify_reply() {
        let mut chip = RtcChip::new(0);
        let mut rx = [0xFF; 3];
        assert!(chip.transact(&[JOYBUS_IDENTIFY], &mut rx));
        assert_eq!(rx, [0x00, 0x10, 0x00]);
    }

    #[test]
    fn time_advances_with_uptime() {
        let mut chip = RtcChip::new(1_000);
        chip.sync(25);
        assert_eq!(chip.unix_time(), 1_025);

        let mut rx = [0; 9];
        assert!(chip.transact(&[JOYBUS_READ_BLOCK, BLOCK_TIME], &mut rx));
        assert_eq!(&rx[..8], &encode_time(1_025));
        assert_eq!(rx[8], 0);
    }

    #[test]
    fn stop_bit_freezes_time() {
        let mut chip = RtcChip::new(1_000);
        chip.sync(10);

        let mut rx = [0; 1];
        let stop = [JOYBUS_WRITE_BLOCK, BLOCK_CONTROL, 0x00, 0x04, 0, 0, 0, 0, 0, 0];
        assert!(chip.transact(&stop, &mut rx));
        assert_eq!(rx[0], STATUS_STOPPED);

        chip.sync(500);
        assert_eq!(chip.unix_time(), 1_010);

        let mut tx = [JOYBUS_WRITE_BLOCK, BLOCK_TIME, 0, 0, 0, 0, 0, 0, 0, 0];
        tx[2..].copy_from_slice(&encode_time(86_400));
        assert!(chip.transact(&tx, &mut rx));
        assert_eq!(chip.unix_time(), 86_400);

        let start = [JOYBUS_WRITE_BLOCK, BLOCK_CONTROL, 0x03, 0x00, 0, 0, 0, 0, 0, 0];
        assert!(chip.transact(&start, &mut rx));
        chip.sync(530);
        assert_eq!(chip.unix_time(), 86_430);
    }

    #[test]
    fn protected_blocks_ignore_writes() {
        let mut chip = RtcChip::new(1_000);
        let mut tx = [JOYBUS_WRITE_BLOCK, BLOCK_TIME, 0, 0, 0, 0, 0, 0, 0, 0];
        tx[2..].copy_from_slice(&encode_time(0));
        let mut rx = [0; 1];
        assert!(chip.transact(&tx, &mut rx));
        assert_eq!(chip.unix_time(), 1_000);
    }

    #[test]
    fn unknown_commands_get_no_reply() {
        let mut chip = RtcChip::new(0);
        assert!(!chip.transact(&[0x01], &mut [0; 4]));
        assert!(!chip.transact(&[JOYBUS_READ_BLOCK, 7], &mut [0; 9]));
    }
}
