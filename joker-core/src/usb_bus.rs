use std::time::Duration;

use joker_proto::{CommandFrame, ControlBus, Error, DEFAULT_EXCHANGE_TIMEOUT, EP_BULK_IN, EP_BULK_OUT};
use rusb::{Context, DeviceHandle};

/// Implements [`ControlBus`] over the device's bulk-OUT/bulk-IN pair
/// (C1, §4.1–§4.2). Not shared on its own — [`crate::shared_bus::SharedBus`]
/// wraps it in a mutex so every component can drive the same physical bus.
pub struct UsbBus {
    handle: DeviceHandle<Context>,
    timeout: Duration,
}

impl UsbBus {
    pub fn new(handle: DeviceHandle<Context>) -> Self {
        UsbBus { handle, timeout: DEFAULT_EXCHANGE_TIMEOUT }
    }

    pub fn with_timeout(handle: DeviceHandle<Context>, timeout: Duration) -> Self {
        UsbBus { handle, timeout }
    }

    pub fn handle(&self) -> &DeviceHandle<Context> {
        &self.handle
    }

    /// Raw libusb handle, for the isochronous engine's direct `rusb::ffi`
    /// calls (§4.1). Valid for as long as this `UsbBus` is alive.
    pub fn as_raw(&self) -> *mut rusb::ffi::libusb_device_handle {
        self.handle.as_raw()
    }
}

impl ControlBus for UsbBus {
    fn exchange(&mut self, frame: &CommandFrame, reply_len: usize) -> Result<Vec<u8>, Error> {
        let wire = frame.encode();
        let written = self
            .handle
            .write_bulk(EP_BULK_OUT, &wire, self.timeout)
            .map_err(|e| match e {
                rusb::Error::Timeout => Error::IoTimeout,
                other => Error::IoBackend(other.to_string()),
            })?;
        if written != wire.len() {
            return Err(Error::IoShortWrite { got: written, expected: wire.len() });
        }

        if reply_len == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; reply_len];
        let read = self
            .handle
            .read_bulk(EP_BULK_IN, &mut buf, self.timeout)
            .map_err(|e| match e {
                rusb::Error::Timeout => Error::IoTimeout,
                other => Error::IoBackend(other.to_string()),
            })?;
        if read != reply_len {
            return Err(Error::IoShortRead { got: read, expected: reply_len });
        }
        Ok(buf)
    }
}
