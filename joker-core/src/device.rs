use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use joker_ci::CiLink;
use joker_frontend::{BlindScanSequencer, Frontend};
use joker_i2c::I2cMaster;
use joker_proto::{ControlBus, ResetMask};
use joker_psi::{FilterCoordinator, ProgramIndex};
use joker_spi::SpiFlashProgrammer;
use joker_ts::TsPipeline;
use rusb::{Context, UsbContext};

use crate::error::CoreError;
use crate::iso::IsoEngine;
use crate::options::DeviceOptions;
use crate::shared_bus::SharedBus;
use crate::usb_bus::UsbBus;

/// The blocks a fresh chip reset releases, in the order `open` brings them
/// up (§4.2 "Reset sequencing"): the USB PHY first so the bulk pipe stays
/// alive, then the tuner ahead of whichever demodulator drives it.
const BRING_UP_ORDER: [ResetMask; 3] =
    [ResetMask::USB_PHY, ResetMask::TUNER, ResetMask::SAT_DEMOD];

/// One open capture device: owns the USB transport, the command bus every
/// other component shares, the TS ingest pipeline, and the PSI/filter
/// state built on top of it (C1). Constructed with a concrete [`Frontend`]
/// implementation for whichever demodulator/tuner pair the hardware
/// carries; this crate only wires the plumbing around it.
pub struct Device {
    context: Context,
    bus: SharedBus,
    pipeline: Arc<TsPipeline>,
    iso: Option<IsoEngine>,
    programs: ProgramIndex,
    filter: FilterCoordinator,
    i2c: I2cMaster<SharedBus>,
    spi: SpiFlashProgrammer<SharedBus>,
    ci: CiLink<SharedBus>,
    frontend: Box<dyn Frontend + Send>,
    options: DeviceOptions,
    capturing: bool,
}

impl Device {
    /// Opens the first device matching `options`'s VID/PID, claims its
    /// interface, releases every block from reset, and stands up the TS
    /// pipeline. Isochronous capture itself does not start until
    /// [`Device::start_capture`].
    pub fn open(
        options: DeviceOptions,
        mut frontend: Box<dyn Frontend + Send>,
    ) -> Result<Self, CoreError> {
        let context = Context::new()?;
        let handle = context
            .open_device_with_vid_pid(options.vendor_id, options.product_id)
            .ok_or(CoreError::DeviceNotFound(options.vendor_id, options.product_id))?;

        let _ = handle.set_auto_detach_kernel_driver(true);
        handle.claim_interface(options.interface)?;

        let usb_bus = UsbBus::with_timeout(handle, options.exchange_timeout);
        let mut bus = SharedBus::new(usb_bus);

        bus.reset_write(ResetMask::all_held())?;
        let mut released = ResetMask::all_held();
        for block in BRING_UP_ORDER {
            released.insert(block);
            bus.reset_write(released)?;
        }

        let pipeline = TsPipeline::new(options.ring);
        let i2c = I2cMaster::new(bus.clone())?;
        let spi = SpiFlashProgrammer::new(bus.clone());
        let ci = CiLink::new(bus.clone());

        frontend.init()?;

        Ok(Device {
            context,
            bus,
            pipeline,
            iso: None,
            programs: ProgramIndex::new(),
            filter: FilterCoordinator::new(0),
            i2c,
            spi,
            ci,
            frontend,
            options,
            capturing: false,
        })
    }

    pub fn bus(&mut self) -> &mut SharedBus {
        &mut self.bus
    }

    pub fn i2c(&mut self) -> &mut I2cMaster<SharedBus> {
        &mut self.i2c
    }

    pub fn spi(&mut self) -> &mut SpiFlashProgrammer<SharedBus> {
        &mut self.spi
    }

    pub fn ci(&mut self) -> &mut CiLink<SharedBus> {
        &mut self.ci
    }

    pub fn frontend(&mut self) -> &mut dyn Frontend {
        self.frontend.as_mut()
    }

    pub fn pipeline(&self) -> &Arc<TsPipeline> {
        &self.pipeline
    }

    pub fn programs(&self) -> &ProgramIndex {
        &self.programs
    }

    pub fn programs_mut(&mut self) -> &mut ProgramIndex {
        &mut self.programs
    }

    /// Tunes the frontend and blocks (polling `read_status` at the
    /// driver's suggested interval) until lock or timeout (§4.4).
    pub fn tune(&mut self, params: &joker_frontend::FrontendParams, timeout: Duration) -> Result<(), CoreError> {
        self.frontend.set_frontend(params)?;
        let poll_ms = self.frontend.tune(true)?;
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let status = self.frontend.read_status()?;
            if status.locked() {
                return Ok(());
            }
            if std::time::Instant::now() >= deadline {
                return Err(CoreError::Scan(joker_frontend::ScanError::Bus(
                    joker_proto::Error::NoLock,
                )));
            }
            std::thread::sleep(Duration::from_millis(poll_ms as u64));
        }
    }

    /// Builds a [`BlindScanSequencer`] against this device's frontend,
    /// borrowing it for the sequencer's lifetime (C9, §4.9). `cancel` lets
    /// the caller abort a long-running scan from another thread.
    pub fn blind_scan(&mut self, cancel: Arc<AtomicBool>) -> BlindScanSequencer<'_, dyn Frontend + Send> {
        BlindScanSequencer::new(self.frontend.as_mut(), self.options.blind_scan, cancel)
    }

    /// Applies a program selection to the hardware PID filter and PAT
    /// rewriter (C7, §4.7).
    pub fn select_programs(&mut self, numbers: &[u16]) -> Result<(), CoreError> {
        let snapshot = self.programs.snapshot();
        self.filter.apply(&mut self.bus, &self.pipeline, &snapshot, numbers)?;
        Ok(())
    }

    /// Starts isochronous capture, feeding the TS pipeline (§4.1, §9).
    /// Rejected if capture is already running; callers must
    /// `stop_capture` first.
    pub fn start_capture(&mut self) -> Result<(), CoreError> {
        if self.capturing {
            return Err(CoreError::AlreadyStarted);
        }
        let raw_handle = self.bus.as_raw_handle();
        let engine = IsoEngine::start(self.context.clone(), raw_handle, Arc::clone(&self.pipeline))?;
        self.iso = Some(engine);
        self.capturing = true;
        Ok(())
    }

    /// Reclaims the ring, joins the ingest worker, and tears down the
    /// isochronous transfers, mirroring `TsPipeline::stop`'s idempotent
    /// cancel-then-join discipline (§5 `stop_ts`).
    pub fn stop_capture(&mut self) -> Result<(), CoreError> {
        if !self.capturing {
            return Err(CoreError::NotStarted);
        }
        if let Some(mut engine) = self.iso.take() {
            engine.stop();
        }
        self.pipeline.stop();
        self.capturing = false;
        Ok(())
    }

    pub fn close(mut self) -> Result<(), CoreError> {
        if self.capturing {
            self.stop_capture()?;
        }
        self.bus.reset_write(ResetMask::all_held())?;
        self.frontend.release()?;
        Ok(())
    }
}
