//! I²C master driver (C3, §4.3): drives the OpenCores I2C-master block
//! behind the command bus to talk to the tuner, demodulator, and LNB
//! controller chips.

pub mod master;
pub mod registers;

pub use master::I2cMaster;
