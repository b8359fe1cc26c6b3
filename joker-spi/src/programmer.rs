use std::thread;
use std::time::{Duration, Instant};

use joker_proto::ControlBus;
use log::{debug, warn};

use crate::commands::{
    address_bytes, CMD_PAGE_PROGRAM, CMD_READ_ID, CMD_READ_STATUS, CMD_SECTOR_ERASE,
    CMD_WRITE_ENABLE, EXPECTED_ID, PAGE_SIZE, SECTOR_SIZE, STATUS_WIP,
};
use crate::error::FlashError;

const ERASE_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_BACKOFF: Duration = Duration::from_millis(5);

/// SPI flash programmer (C10, §4.10): a state machine per sector — write
/// enable, erase, poll, then write-enable/program/poll for each page.
pub struct SpiFlashProgrammer<B> {
    bus: B,
}

impl<B: ControlBus> SpiFlashProgrammer<B> {
    pub fn new(bus: B) -> Self {
        SpiFlashProgrammer { bus }
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Reads the flash's JEDEC ID and checks it against the expected
    /// m25p128-compatible signature.
    pub fn identify(&mut self) -> Result<[u8; 3], FlashError> {
        let reply = self.bus.spi(vec![CMD_READ_ID, 0, 0, 0])?;
        let got = [reply[1], reply[2], reply[3]];
        if got != EXPECTED_ID {
            return Err(FlashError::IdMismatch { expected: EXPECTED_ID, got });
        }
        Ok(got)
    }

    fn write_enable(&mut self) -> Result<(), FlashError> {
        self.bus.spi(vec![CMD_WRITE_ENABLE])?;
        Ok(())
    }

    fn read_status(&mut self) -> Result<u8, FlashError> {
        let reply = self.bus.spi(vec![CMD_READ_STATUS, 0])?;
        Ok(reply[1])
    }

    fn poll_until_ready(&mut self, timeout: Duration) -> Result<(), FlashError> {
        let start = Instant::now();
        loop {
            let status = self.read_status()?;
            if status & STATUS_WIP == 0 {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(FlashError::EraseTimeout(timeout));
            }
            thread::sleep(POLL_BACKOFF);
        }
    }

    /// Erases the 256 KiB sector containing `addr`.
    pub fn erase_sector(&mut self, addr: u32) -> Result<(), FlashError> {
        debug!("erasing sector at 0x{:06X}", addr);
        self.write_enable()?;
        let mut frame = vec![CMD_SECTOR_ERASE];
        frame.extend_from_slice(&address_bytes(addr));
        self.bus.spi(frame)?;
        self.poll_until_ready(ERASE_TIMEOUT)
    }

    /// Programs up to one page (256 B) at `addr`. `addr` and `data.len()`
    /// must not straddle a page boundary.
    pub fn program_page(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        if data.len() > PAGE_SIZE {
            return Err(FlashError::PageTooLarge(PAGE_SIZE));
        }
        self.write_enable()?;
        let mut frame = vec![CMD_PAGE_PROGRAM];
        frame.extend_from_slice(&address_bytes(addr));
        frame.extend_from_slice(data);
        self.bus.spi(frame)?;
        self.poll_until_ready(ERASE_TIMEOUT)
    }

    /// Writes `image` starting at `base_addr`, erasing each 256 KiB sector
    /// it touches before programming its pages.
    pub fn write_image(&mut self, base_addr: u32, image: &[u8]) -> Result<(), FlashError> {
        self.identify()?;

        let mut offset = 0usize;
        while offset < image.len() {
            let addr = base_addr + offset as u32;
            if addr % SECTOR_SIZE as u32 == 0 {
                self.erase_sector(addr)?;
            }
            let page_len = (image.len() - offset).min(PAGE_SIZE);
            self.program_page(addr, &image[offset..offset + page_len])?;
            offset += page_len;
        }
        warn!("flash image write complete: {} bytes at 0x{:06X}", image.len(), base_addr);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use joker_proto::{CommandFrame, Error, Opcode};
    use std::collections::VecDeque;

    struct FakeFlash {
        status_sequence: VecDeque<u8>,
        id: [u8; 3],
        writes: Vec<Vec<u8>>,
    }

    impl ControlBus for FakeFlash {
        fn exchange(&mut self, frame: &CommandFrame, reply_len: usize) -> Result<Vec<u8>, Error> {
            assert_eq!(frame.opcode(), Opcode::Spi);
            let payload = frame.payload().to_vec();
            self.writes.push(payload.clone());
            match payload[0] {
                CMD_READ_ID => Ok(vec![0, self.id[0], self.id[1], self.id[2]]),
                CMD_READ_STATUS => {
                    let status = self.status_sequence.pop_front().unwrap_or(0);
                    Ok(vec![0, status])
                }
                _ => Ok(vec![0; reply_len]),
            }
        }
    }

    #[test]
    fn identify_accepts_the_expected_signature() {
        let flash = FakeFlash { status_sequence: VecDeque::new(), id: EXPECTED_ID, writes: Vec::new() };
        let mut programmer = SpiFlashProgrammer::new(flash);
        assert_eq!(programmer.identify().unwrap(), EXPECTED_ID);
    }

    #[test]
    fn identify_rejects_a_mismatched_signature() {
        let flash = FakeFlash { status_sequence: VecDeque::new(), id: [0xFF, 0xFF, 0xFF], writes: Vec::new() };
        let mut programmer = SpiFlashProgrammer::new(flash);
        let err = programmer.identify().unwrap_err();
        assert!(matches!(err, FlashError::IdMismatch { .. }));
    }

    #[test]
    fn erase_sector_polls_status_until_wip_clears() {
        let flash = FakeFlash {
            status_sequence: VecDeque::from(vec![STATUS_WIP, STATUS_WIP, 0x00]),
            id: EXPECTED_ID,
            writes: Vec::new(),
        };
        let mut programmer = SpiFlashProgrammer::new(flash);
        programmer.erase_sector(0).unwrap();
        assert_eq!(programmer.bus.writes[0][0], CMD_WRITE_ENABLE);
        assert_eq!(programmer.bus.writes[1][0], CMD_SECTOR_ERASE);
    }

    #[test]
    fn program_page_rejects_oversized_data() {
        let flash = FakeFlash { status_sequence: VecDeque::new(), id: EXPECTED_ID, writes: Vec::new() };
        let mut programmer = SpiFlashProgrammer::new(flash);
        let data = vec![0u8; PAGE_SIZE + 1];
        let err = programmer.program_page(0, &data).unwrap_err();
        assert!(matches!(err, FlashError::PageTooLarge(_)));
    }
}
