use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use joker_proto::ControlBus;
use log::{trace, warn};

use crate::link::CiLink;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Invoked whenever the CAM posts a reply, so the host program can deliver
/// EN50221 application-layer traffic through the bridge (§4.8).
pub trait CamUpcall: Send {
    fn on_cam_reply(&mut self, connection_id: u8, payload: &[u8]);
}

/// Bridges bytes between the CAM channel and a single connected loopback
/// client. Binds only to the loopback interface (§4.8).
pub struct CiRelay {
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl CiRelay {
    pub fn spawn<B, U>(mut link: CiLink<B>, mut upcall: U) -> std::io::Result<Self>
    where
        B: ControlBus + Send + 'static,
        U: CamUpcall + 'static,
    {
        let listener = TcpListener::bind(("127.0.0.1", 0))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);

        let worker = thread::Builder::new()
            .name("joker-ci-relay".into())
            .spawn(move || {
                let mut client: Option<TcpStream> = None;
                let mut buf = [0u8; 4096];

                while !worker_cancel.load(Ordering::Relaxed) {
                    if client.is_none() {
                        if let Ok((stream, _)) = listener.accept() {
                            stream.set_nonblocking(true).ok();
                            client = Some(stream);
                        }
                    }

                    if let Some(stream) = client.as_mut() {
                        match stream.read(&mut buf) {
                            Ok(0) => client = None,
                            Ok(n) => {
                                if let Err(err) = link.tpdu_send(0, &buf[..n]) {
                                    warn!("CI relay: write to CAM failed: {err}");
                                }
                            }
                            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                            Err(_) => client = None,
                        }
                    }

                    match link.ci_read_status() {
                        Ok(status) if status.has_data => match link.tpdu_recv() {
                            Ok((connection_id, payload)) => {
                                upcall.on_cam_reply(connection_id, &payload);
                                if let Some(stream) = client.as_mut() {
                                    let _ = stream.write_all(&payload);
                                }
                            }
                            Err(err) => warn!("CI relay: read from CAM failed: {err}"),
                        },
                        Ok(_) => {}
                        Err(err) => warn!("CI relay: status read failed: {err}"),
                    }

                    trace!("CI relay tick");
                    thread::sleep(POLL_INTERVAL);
                }
            })?;

        Ok(CiRelay { cancel, worker: Some(worker), local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CiRelay {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::link::CiLink;
    use joker_proto::{CommandFrame, Error, Opcode};
    use std::net::TcpStream;

    #[derive(Default)]
    struct IdleBus;

    impl ControlBus for IdleBus {
        fn exchange(&mut self, frame: &CommandFrame, _reply_len: usize) -> Result<Vec<u8>, Error> {
            match frame.opcode() {
                Opcode::CiStatus => Ok(vec![0, 0x00]),
                Opcode::CiWrite => Ok(Vec::new()),
                Opcode::CiRead => Ok(vec![0, 0x00]),
                _ => Ok(Vec::new()),
            }
        }
    }

    struct RecordingUpcall {
        seen: Arc<std::sync::Mutex<Vec<(u8, Vec<u8>)>>>,
    }

    impl CamUpcall for RecordingUpcall {
        fn on_cam_reply(&mut self, connection_id: u8, payload: &[u8]) {
            self.seen.lock().unwrap().push((connection_id, payload.to_vec()));
        }
    }

    #[test]
    fn relay_binds_only_to_loopback() {
        let link = CiLink::new(IdleBus::default());
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut relay = CiRelay::spawn(link, RecordingUpcall { seen }).unwrap();
        assert!(relay.local_addr().ip().is_loopback());

        // A client can connect; the relay should not crash servicing it.
        let stream = TcpStream::connect(relay.local_addr());
        assert!(stream.is_ok());

        relay.stop();
    }
}
