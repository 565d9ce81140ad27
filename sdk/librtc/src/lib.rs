//! # librtc
//!
//! Driver for the real-time clock found on some Nintendo 64 cartridges and
//! flashcarts, which speaks the joybus protocol on the cartridge port.
//!
//! On top of the raw reads it offers a software clock offset (so games can
//! "set" the time without writing the chip), proleptic Gregorian calendar
//! math on signed 64-bit Unix time, and a `strftime` that works without an
//! allocator.
//!
//! ```ignore
//! use librtc::{N64, Rtc, RtcConfig, strftime};
//!
//! let mut rtc = Rtc::new(unsafe { N64::take() }, RtcConfig::default());
//! let now = rtc.get_time().unwrap_or_else(|e| e.fallback());
//!
//! let mut buf = [0u8; 32];
//! let len = strftime(&mut buf, "%A %H:%M", &now);
//! ```
//!
//! The hardware is reached through the [`SiBus`] and [`CycleCounter`] traits.
//! [`N64`] implements them for the real console (`n64` feature); the
//! `pif-emu` crate implements them in software for tests and tools.

#![no_std]
#![cfg_attr(feature = "n64", feature(asm_experimental_arch))]

pub mod calendar;
pub mod clock;
pub mod config;
pub mod error;
pub mod format;
pub mod regs;
pub mod rtc;
pub mod si;

#[cfg(feature = "n64")]
pub mod n64;

pub use calendar::{CalendarTime, is_leap_year, time_diff};
pub use config::RtcConfig;
pub use error::Error;
pub use format::{format, strftime};
pub use rtc::{Rtc, Session};
pub use si::{CycleCounter, SiBus};

#[cfg(feature = "n64")]
pub use n64::N64;
