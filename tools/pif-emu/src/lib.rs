//! A software N64 serial interface for running [`librtc`] off-console.
//!
//! [`Console`] implements [`librtc::SiBus`] and [`librtc::CycleCounter`] with
//! a PIF that parses joybus command blocks, and a cartridge RTC whose time
//! advances with the simulated cycle counter.
//!
//! ```ignore
//! let console = Console::new(ConsoleConfig { exec_on_write: true, ..Default::default() });
//! let mut rtc = Rtc::new(console, RtcConfig::default());
//! assert!(rtc.init());
//! assert!(rtc.exec_on_write_bug());
//! ```

#![no_std]

pub mod config;
pub mod console;
pub mod pif;
pub mod rtc_chip;

pub use config::ConsoleConfig;
pub use console::{Console, Direction, SiEvent, Stats};
pub use pif::{JoybusDevice, Pif};
pub use rtc_chip::RtcChip;
