/// CAM slot status (§4.8 `ci_read_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CiStatus {
    pub module_present: bool,
    pub has_data: bool,
    pub ready: bool,
}

const MODULE_PRESENT: u8 = 0x01;
const HAS_DATA: u8 = 0x02;
const READY: u8 = 0x04;

impl CiStatus {
    pub fn from_wire(bits: [u8; 2]) -> Self {
        let flags = bits[1];
        CiStatus {
            module_present: flags & MODULE_PRESENT != 0,
            has_data: flags & HAS_DATA != 0,
            ready: flags & READY != 0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_each_flag_independently() {
        let status = CiStatus::from_wire([0, MODULE_PRESENT | READY]);
        assert!(status.module_present);
        assert!(!status.has_data);
        assert!(status.ready);
    }
}
