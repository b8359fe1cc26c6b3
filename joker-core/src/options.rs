use std::time::Duration;

use joker_frontend::BlindScanOptions;
use joker_proto::{DEFAULT_EXCHANGE_TIMEOUT, PRODUCT_ID, VENDOR_ID};
use joker_ts::RingOptions;

/// Everything needed to open a device and stand up its capture pipeline
/// (C1, §6). Defaults match the device's advertised identity and the
/// other crates' own defaults.
#[derive(Debug, Clone)]
pub struct DeviceOptions {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    pub exchange_timeout: Duration,
    pub ring: RingOptions,
    pub blind_scan: BlindScanOptions,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        DeviceOptions {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            interface: 0,
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
            ring: RingOptions::default(),
            blind_scan: BlindScanOptions::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_the_advertised_device_identity() {
        let options = DeviceOptions::default();
        assert_eq!(options.vendor_id, VENDOR_ID);
        assert_eq!(options.product_id, PRODUCT_ID);
        assert_eq!(options.interface, 0);
    }
}
