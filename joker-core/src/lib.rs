//! USB transport and device lifecycle (C1): opens the device, serializes
//! every component's access to the command bus, drives isochronous
//! capture into the TS pipeline, and exposes the other crates' components
//! through one [`Device`] handle.

pub mod device;
pub mod error;
pub mod iso;
pub mod options;
pub mod shared_bus;
pub mod usb_bus;

pub use device::Device;
pub use error::CoreError;
pub use options::DeviceOptions;
pub use shared_bus::SharedBus;
pub use usb_bus::UsbBus;
