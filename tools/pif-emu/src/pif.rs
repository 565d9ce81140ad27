//! The PIF's 64 bytes of RAM and its joybus command parser.
//!
//! A command block is a sequence of per-channel commands:
//!
//! | Byte        | Meaning                                          |
//! |-------------|--------------------------------------------------|
//! | `0x00`      | skip to the next channel                         |
//! | `0xFF`      | padding, ignored                                 |
//! | `0xFE`      | end of block                                     |
//! | otherwise   | `tx len, rx len, tx bytes..., rx bytes...`       |
//!
//! Byte 63 is the control byte. Bit 0 asks the PIF to run the block.

use bit_field::BitField;
use log::{trace, warn};

use librtc::si::{
    JOYBUS_END, JOYBUS_NO_DEVICE, JOYBUS_NOP, JOYBUS_SKIP_CHANNEL, PIF_CONTROL, PIF_CONTROL_RUN,
    PifBlock,
};

/// Joybus channel wired to the cartridge port.
pub const CARTRIDGE_CHANNEL: usize = 4;

/// Something that answers joybus commands.
pub trait JoybusDevice {
    /// Handles one command. `tx[0]` is the command byte and the reply goes in
    /// `rx`. Returns false if the device doesn't respond.
    fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> bool;
}

#[derive(Debug, Clone)]
pub struct Pif {
    ram: [u8; PifBlock::BYTES],
}

impl Default for Pif {
    fn default() -> Self {
        Self { ram: [0; PifBlock::BYTES] }
    }
}

impl Pif {
    pub fn ram(&self) -> &[u8; PifBlock::BYTES] {
        &self.ram
    }

    /// Word `index` of the memory-mapped window, big-endian.
    pub fn word(&self, index: usize) -> u32 {
        let base = (index % PifBlock::WORDS) * 4;
        u32::from_be_bytes([
            self.ram[base],
            self.ram[base + 1],
            self.ram[base + 2],
            self.ram[base + 3],
        ])
    }

    pub fn load(&mut self, bytes: &[u8; PifBlock::BYTES]) {
        self.ram = *bytes;
    }

    pub fn run_requested(&self) -> bool {
        self.ram[PIF_CONTROL].get_bit(0)
    }

    /// Runs the command block, writing replies in place, and clears the run
    /// bit. Returns the number of commands sent to a channel.
    pub fn execute(&mut self, mut cartridge: Option<&mut dyn JoybusDevice>) -> usize {
        let mut channel = 0;
        let mut commands = 0;
        let mut i = 0;

        while i < PIF_CONTROL {
            match self.ram[i] {
                JOYBUS_END => break,
                JOYBUS_NOP => {
                    i += 1;
                    continue;
                }
                JOYBUS_SKIP_CHANNEL => {
                    channel += 1;
                    i += 1;
                    continue;
                }
                _ => {}
            }

            let tx_len = self.ram[i].get_bits(0..6) as usize;
            let rx_index = i + 1;
            let rx_len = self.ram[rx_index].get_bits(0..6) as usize;
            let tx_start = i + 2;
            let rx_start = tx_start + tx_len;
            let end = rx_start + rx_len;
            if end > PIF_CONTROL {
                warn!("pif: command at byte {i} runs past the control byte");
                break;
            }

            let (head, rx) = self.ram[..end].split_at_mut(rx_start);
            let tx = &head[tx_start..];
            let answered = match cartridge.as_deref_mut() {
                Some(device) if channel == CARTRIDGE_CHANNEL => device.transact(tx, rx),
                _ => false,
            };
            trace!("pif: channel {channel} tx {tx:02x?} answered={answered}");
            if !answered {
                self.ram[rx_index] |= JOYBUS_NO_DEVICE;
            }

            commands += 1;
            channel += 1;
            i = end;
        }

        self.ram[PIF_CONTROL] &= !PIF_CONTROL_RUN;
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use librtc::si::{IDENTIFY, READ_TIME_BLOCK};

    struct Echo;

    impl JoybusDevice for Echo {
        fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> bool {
            for (out, byte) in rx.iter_mut().zip(tx.iter().cycle()) {
                *out = *byte;
            }
            true
        }
    }

    #[test]
    fn replies_land_after_tx_bytes() {
        let mut pif = Pif::default();
        pif.load(&IDENTIFY.to_bytes());
        assert!(pif.run_requested());

        assert_eq!(pif.execute(Some(&mut Echo)), 1);
        assert_eq!(&pif.ram()[8..12], &[0x06, 0x06, 0x06, JOYBUS_END]);
        assert_eq!(pif.ram()[6], 0x03);
        assert!(!pif.run_requested());
    }

    #[test]
    fn empty_port_sets_error_bit() {
        let mut pif = Pif::default();
        pif.load(&READ_TIME_BLOCK.to_bytes());
        pif.execute(None);
        assert_eq!(pif.ram()[5], 0x09 | JOYBUS_NO_DEVICE);
        // reply area untouched
        assert_eq!(&pif.ram()[8..12], &[0x00, 0x00, 0x80, 0x01]);
    }

    #[test]
    fn only_channel_four_reaches_the_cartridge() {
        let mut block = PifBlock::zeroed();
        // channel 0: tx 1, rx 1, cmd 0x00 (controller status)
        block.set_byte(0, 0x01);
        block.set_byte(1, 0x01);
        block.set_byte(2, 0x00);
        block.set_byte(4, JOYBUS_END);
        block.set_byte(PIF_CONTROL, PIF_CONTROL_RUN);

        let mut pif = Pif::default();
        pif.load(&block.to_bytes());
        assert_eq!(pif.execute(Some(&mut Echo)), 1);
        assert_eq!(pif.ram()[1], 0x01 | JOYBUS_NO_DEVICE);
    }

    #[test]
    fn overrun_stops_parsing() {
        let mut block = PifBlock::zeroed();
        for i in 0..4 {
            block.set_byte(i, JOYBUS_SKIP_CHANNEL);
        }
        block.set_byte(60, 0x3F);
        block.set_byte(61, 0x3F);
        block.set_byte(PIF_CONTROL, PIF_CONTROL_RUN);
        for i in 4..60 {
            block.set_byte(i, JOYBUS_NOP);
        }

        let mut pif = Pif::default();
        pif.load(&block.to_bytes());
        assert_eq!(pif.execute(Some(&mut Echo)), 0);
        assert_eq!(pif.ram()[PIF_CONTROL], 0);
    }

    #[test]
    fn words_are_big_endian() {
        let mut pif = Pif::default();
        pif.load(&IDENTIFY.to_bytes());
        assert_eq!(pif.word(1), 0xFF01_0306);
        assert_eq!(pif.word(15), 1);
    }
}
