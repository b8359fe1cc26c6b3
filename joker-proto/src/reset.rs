bitflags::bitflags! {
    /// Chip reset mask (§4.2). A bit set means the corresponding block is
    /// *released* from reset, not held in it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResetMask: u16 {
        const SAT_DEMOD   = 1 << 0;
        const TUNER       = 1 << 1;
        const ATSC_DEMOD  = 1 << 2;
        const DTMB_DEMOD  = 1 << 3;
        const USB_PHY     = 1 << 4;
        const TONE_RAIL   = 1 << 5;
        const CI_RAIL     = 1 << 6;
        const TUNER_I2C_GATE = 1 << 7;
    }
}

impl ResetMask {
    /// Every block held in reset.
    pub fn all_held() -> Self {
        ResetMask::empty()
    }

    pub fn to_wire(self) -> u16 {
        self.bits()
    }

    pub fn from_wire(bits: u16) -> Self {
        ResetMask::from_bits_truncate(bits)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn release_is_idempotent() {
        let mut mask = ResetMask::all_held();
        mask.insert(ResetMask::SAT_DEMOD);
        let before = mask;
        mask.insert(ResetMask::SAT_DEMOD);
        assert_eq!(mask, before);
    }

    #[test]
    fn wire_round_trip() {
        let mask = ResetMask::SAT_DEMOD | ResetMask::TUNER | ResetMask::TUNER_I2C_GATE;
        assert_eq!(ResetMask::from_wire(mask.to_wire()), mask);
    }
}
