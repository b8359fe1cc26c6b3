use std::sync::{Arc, Mutex};

use joker_proto::{CommandFrame, ControlBus, Error};

use crate::usb_bus::UsbBus;

/// A cloneable handle to one physical [`UsbBus`], serialized behind a
/// mutex so every long-running component (I²C master, frontend, SPI
/// programmer, CI link) can hold its own handle while still sharing one
/// wire (§4.2, §5: "one mutex serializes every component's exchange").
#[derive(Clone)]
pub struct SharedBus(Arc<Mutex<UsbBus>>);

impl SharedBus {
    pub fn new(bus: UsbBus) -> Self {
        SharedBus(Arc::new(Mutex::new(bus)))
    }

    /// Raw libusb handle for the isochronous engine, which talks to the
    /// device through `rusb::ffi` directly rather than through
    /// [`ControlBus::exchange`] (§4.1).
    pub fn as_raw_handle(&self) -> *mut rusb::ffi::libusb_device_handle {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).as_raw()
    }
}

impl ControlBus for SharedBus {
    fn exchange(&mut self, frame: &CommandFrame, reply_len: usize) -> Result<Vec<u8>, Error> {
        let mut guard = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.exchange(frame, reply_len)
    }
}
