//! Wire protocol for the command bus (C2) that multiplexes every control
//! request the core issues — I²C, register, TS filter, SPI, CI — over one
//! bulk-OUT/bulk-IN pair.
//!
//! This crate only describes the frame shapes and the [`ControlBus`]
//! abstraction over "exchange one frame, get one reply". It knows nothing
//! about USB; `joker-core` is the only crate that implements [`ControlBus`]
//! against a real device. Every other crate in the workspace is generic over
//! the trait, so it can be exercised against an in-memory fake bus in tests.

pub mod bus;
pub mod error;
pub mod filter;
pub mod frame;
pub mod opcode;
pub mod reset;

pub use bus::ControlBus;
pub use error::Error;
pub use filter::FilterCommand;
pub use frame::{CommandFrame, MAX_FRAME_LEN};
pub use opcode::Opcode;
pub use reset::ResetMask;

/// USB identity of the device this protocol talks to (§6).
pub const VENDOR_ID: u16 = 0x2D6B;
pub const PRODUCT_ID: u16 = 0x7777;

/// Bulk and isochronous endpoint addresses (§6).
pub const EP_BULK_OUT: u8 = 0x02;
pub const EP_BULK_IN: u8 = 0x81;
pub const EP_ISO_IN: u8 = 0x83;

/// Sync byte that begins every 188-byte TS packet.
pub const TS_SYNC: u8 = 0x47;

/// Size of one TS packet.
pub const TS_PACKET_LEN: usize = 188;

/// Wildcard PID meaning "dispatch to this hook for every PID" (§4.5).
pub const PID_WILDCARD: u16 = 0x2000;

/// Default deadline for a bulk control [`ControlBus::exchange`] (§4.1).
pub const DEFAULT_EXCHANGE_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(200);
