//! SPI flash programmer (C10, §4.10) over an m25p128-style command set.

pub mod commands;
pub mod error;
pub mod programmer;

pub use error::FlashError;
pub use programmer::SpiFlashProgrammer;
