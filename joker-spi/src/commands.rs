//! SPI opcode set, fixed by `joker_spi.c` for the m25p128-style flash on
//! the capture core (§4.10's "opaque SPI byte stream" resolved).

pub const CMD_READ_ID: u8 = 0x9F;
pub const CMD_WRITE_ENABLE: u8 = 0x06;
pub const CMD_SECTOR_ERASE: u8 = 0xD8;
pub const CMD_PAGE_PROGRAM: u8 = 0x02;
pub const CMD_READ_STATUS: u8 = 0x05;

pub const STATUS_WIP: u8 = 0x01;

pub const SECTOR_SIZE: usize = 256 * 1024;
pub const PAGE_SIZE: usize = 256;

/// JEDEC ID of the expected m25p128-compatible part.
pub const EXPECTED_ID: [u8; 3] = [0x20, 0x20, 0x18];

pub fn address_bytes(addr: u32) -> [u8; 3] {
    [(addr >> 16) as u8, (addr >> 8) as u8, addr as u8]
}
