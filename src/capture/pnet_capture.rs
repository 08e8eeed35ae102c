//! pnet-based packet capture implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pnet::datalink::{self, Channel, Config, DataLinkReceiver, NetworkInterface};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};

use super::{FrameSource, FrameStream, InterfaceCandidate, InterfaceSelector, RawFrame};
use crate::error::CaptureError;

/// Read timeout so the capture loop can observe the running flag.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Packet capture using the pnet library.
pub struct PnetCapture {
    selector: InterfaceSelector,
    interface: Option<NetworkInterface>,
    running: Arc<AtomicBool>,
}

impl PnetCapture {
    /// Create a capture that will resolve its interface with `selector`.
    pub fn new(selector: InterfaceSelector) -> Self {
        Self {
            selector,
            interface: None,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// List all available network interfaces.
    pub fn list_interfaces() -> Vec<String> {
        datalink::interfaces()
            .into_iter()
            .map(|iface| {
                let status = if iface.is_up() { "UP" } else { "DOWN" };
                let ips: Vec<_> = iface.ips.iter().map(|ip| ip.to_string()).collect();
                format!(
                    "{}: {} [{}] {}",
                    iface.name,
                    status,
                    if ips.is_empty() {
                        "no IP".to_string()
                    } else {
                        ips.join(", ")
                    },
                    iface.description
                )
            })
            .collect()
    }

    fn resolve_interface(&self) -> Result<NetworkInterface, CaptureError> {
        let interfaces = datalink::interfaces();
        let candidates: Vec<InterfaceCandidate> =
            interfaces.iter().map(InterfaceCandidate::from).collect();

        self.selector
            .select(&candidates)
            .and_then(|idx| interfaces.into_iter().nth(idx))
            .ok_or_else(|| CaptureError::InterfaceNotFound(self.selector.to_string()))
    }
}

impl FrameSource for PnetCapture {
    fn open(&mut self) -> Result<FrameStream, CaptureError> {
        if self.interface.is_some() {
            return Err(CaptureError::AlreadyOpen);
        }

        let interface = self.resolve_interface()?;
        tracing::info!("Opening capture on interface {}", interface.name);

        let config = Config {
            read_timeout: Some(READ_TIMEOUT),
            ..Config::default()
        };

        let rx = match datalink::channel(&interface, config) {
            Ok(Channel::Ethernet(_tx, rx)) => rx,
            Ok(_) => {
                return Err(CaptureError::ChannelCreation(
                    "unsupported channel type".to_string(),
                ))
            }
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("permission") || msg.contains("Operation not permitted") {
                    return Err(CaptureError::InsufficientPermissions);
                }
                return Err(CaptureError::ChannelCreation(msg));
            }
        };

        self.interface = Some(interface);

        Ok(Box::new(Ipv4FrameIterator::new(rx, Arc::clone(&self.running))))
    }

    fn interface_name(&self) -> Option<&str> {
        self.interface.as_ref().map(|iface| iface.name.as_str())
    }

    fn set_running(&mut self, running: Arc<AtomicBool>) {
        self.running = running;
    }
}

/// Consecutive receive errors tolerated before the stream ends.
const MAX_CONSECUTIVE_ERRORS: u32 = 50;

/// Pause after a receive error other than a read timeout.
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Iterator that yields IPv4 frames from the network.
///
/// Ends when the running flag is cleared or the receiver keeps failing.
struct Ipv4FrameIterator {
    rx: Box<dyn DataLinkReceiver>,
    running: Arc<AtomicBool>,
    errors: u32,
}

impl Ipv4FrameIterator {
    fn new(rx: Box<dyn DataLinkReceiver>, running: Arc<AtomicBool>) -> Self {
        Self {
            rx,
            running,
            errors: 0,
        }
    }
}

impl Iterator for Ipv4FrameIterator {
    type Item = RawFrame;

    fn next(&mut self) -> Option<Self::Item> {
        while self.running.load(Ordering::SeqCst) {
            match self.rx.next() {
                Ok(data) => {
                    self.errors = 0;
                    let Some(ethernet) = EthernetPacket::new(data) else {
                        continue;
                    };
                    let ethertype = ethernet.get_ethertype();
                    // Same as an "ip" capture filter
                    if ethertype != EtherTypes::Ipv4 {
                        continue;
                    }
                    return Some(RawFrame::new(ethertype, data.to_vec()));
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => {
                    self.errors += 1;
                    if self.errors >= MAX_CONSECUTIVE_ERRORS {
                        tracing::error!(
                            "Capture receiver failed {} times in a row, last error: {}",
                            self.errors,
                            e
                        );
                        return None;
                    }
                    tracing::debug!("Capture error: {}", e);
                    std::thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        None
    }
}
