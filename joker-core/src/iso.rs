use std::os::raw::c_int;
use std::os::raw::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use joker_proto::EP_ISO_IN;
use joker_ts::TsPipeline;
use rusb::{ffi, Context, UsbContext};

const NUM_TRANSFERS: usize = 8;
const PACKETS_PER_TRANSFER: usize = 32;
/// Close to one microframe's worth of TS data; real hardware negotiates
/// the exact isochronous packet size via `isoc_len_write` (§4.2), so this
/// is only the host-side buffer allocation unit.
const ISO_PACKET_SIZE: usize = 3 * 188;

const LIBUSB_TRANSFER_COMPLETED: i32 = 0;
const LIBUSB_TRANSFER_CANCELLED: i32 = 3;

struct CallbackState {
    pipeline: Arc<TsPipeline>,
    cancel: Arc<AtomicBool>,
}

/// Owns the libusb isochronous IN transfers feeding the TS ingest
/// pipeline (C1, §4.1, §9 "callback-driven isochronous IO"). `rusb`'s
/// synchronous API has no isochronous support, so this drives the raw
/// transfer struct from `rusb::ffi` directly, the same layer real
/// isochronous capture drivers (webcam, SDR) sit on top of.
pub struct IsoEngine {
    transfers: Vec<*mut ffi::libusb_transfer>,
    states: Vec<Box<CallbackState>>,
    cancel: Arc<AtomicBool>,
    event_thread: Option<JoinHandle<()>>,
}

// Transfers and their buffers are only touched from the event thread
// (inside libusb's callback) or during `stop`, which joins that thread
// first; the raw pointers themselves are never aliased concurrently.
unsafe impl Send for IsoEngine {}

impl IsoEngine {
    pub fn start(
        context: Context,
        dev_handle: *mut ffi::libusb_device_handle,
        pipeline: Arc<TsPipeline>,
    ) -> Result<Self, rusb::Error> {
        let mut transfers = Vec::with_capacity(NUM_TRANSFERS);
        let mut states = Vec::with_capacity(NUM_TRANSFERS);
        let cancel = Arc::new(AtomicBool::new(false));

        for _ in 0..NUM_TRANSFERS {
            let state = Box::new(CallbackState {
                pipeline: Arc::clone(&pipeline),
                cancel: Arc::clone(&cancel),
            });
            let transfer = unsafe { ffi::libusb_alloc_transfer(PACKETS_PER_TRANSFER as c_int) };
            if transfer.is_null() {
                return Err(rusb::Error::NoMem);
            }

            let buffer_len = ISO_PACKET_SIZE * PACKETS_PER_TRANSFER;
            let buffer: Box<[u8]> = vec![0u8; buffer_len].into_boxed_slice();
            let buffer_ptr = Box::into_raw(buffer) as *mut u8;
            let user_data = state.as_ref() as *const CallbackState as *mut c_void;

            unsafe {
                ffi::libusb_fill_iso_transfer(
                    transfer,
                    dev_handle,
                    EP_ISO_IN,
                    buffer_ptr,
                    buffer_len as c_int,
                    PACKETS_PER_TRANSFER as c_int,
                    iso_callback,
                    user_data,
                    1000,
                );
                ffi::libusb_set_iso_packet_lengths(transfer, ISO_PACKET_SIZE as u32);
                let rc = ffi::libusb_submit_transfer(transfer);
                if rc != 0 {
                    let _ = Vec::from_raw_parts(buffer_ptr, buffer_len, buffer_len);
                    ffi::libusb_free_transfer(transfer);
                    return Err(rusb::Error::Other);
                }
            }

            transfers.push(transfer);
            states.push(state);
        }

        let thread_cancel = Arc::clone(&cancel);
        let event_thread = thread::Builder::new()
            .name("joker-core-usb-events".into())
            .spawn(move || {
                while !thread_cancel.load(Ordering::Relaxed) {
                    unsafe {
                        ffi::libusb_handle_events(context.as_raw());
                    }
                }
            })
            .expect("failed to spawn USB event-pump thread");

        Ok(IsoEngine {
            transfers,
            states,
            cancel,
            event_thread: Some(event_thread),
        })
    }

    /// Cancels every in-flight transfer, joins the event-pump thread, and
    /// frees libusb's transfer structs and their buffers.
    pub fn stop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        for &transfer in &self.transfers {
            unsafe {
                ffi::libusb_cancel_transfer(transfer);
            }
        }
        if let Some(handle) = self.event_thread.take() {
            let _ = handle.join();
        }
        for &transfer in &self.transfers {
            unsafe {
                let length = (*transfer).length as usize;
                let buffer = (*transfer).buffer;
                if !buffer.is_null() {
                    drop(Vec::from_raw_parts(buffer, length, length));
                }
                ffi::libusb_free_transfer(transfer);
            }
        }
        self.transfers.clear();
        self.states.clear();
    }
}

impl Drop for IsoEngine {
    fn drop(&mut self) {
        if self.event_thread.is_some() {
            self.stop();
        }
    }
}

extern "system" fn iso_callback(transfer: *mut ffi::libusb_transfer) {
    unsafe {
        if (*transfer).user_data.is_null() {
            return;
        }
        let state = &*((*transfer).user_data as *const CallbackState);
        let status = (*transfer).status as i32;
        if status == LIBUSB_TRANSFER_COMPLETED {
            let num_packets = (*transfer).num_iso_packets as usize;
            let mut offset: isize = 0;
            for i in 0..num_packets {
                let desc = &*(*transfer).iso_packet_desc.as_ptr().offset(i as isize);
                if desc.status as i32 == LIBUSB_TRANSFER_COMPLETED && desc.actual_length > 0 {
                    let data = std::slice::from_raw_parts(
                        (*transfer).buffer.offset(offset),
                        desc.actual_length as usize,
                    );
                    state.pipeline.on_iso_payload(data);
                }
                offset += desc.length as isize;
            }
        }

        // A cancelled transfer must not be resubmitted: `stop()` cancels,
        // joins the event thread, then frees this transfer's buffer and
        // struct. Resubmitting here would hand libusb a pointer stop() is
        // about to free out from under it.
        if status == LIBUSB_TRANSFER_CANCELLED || state.cancel.load(Ordering::Relaxed) {
            return;
        }
        ffi::libusb_submit_transfer(transfer);
    }
}
