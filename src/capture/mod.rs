//! Packet capture abstraction.
//!
//! This module defines the `FrameSource` trait and provides a pnet-based
//! implementation, an interface selector, and the capture engine that
//! feeds decoded records into the packet window.

mod engine;
mod interface;
mod pnet_capture;

pub use engine::{CaptureEngine, CaptureState, CaptureStats};
pub use interface::{InterfaceCandidate, InterfaceSelector, DEFAULT_INTERFACE_HINTS};
pub use pnet_capture::PnetCapture;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use pnet::packet::ethernet::EtherType;

use crate::error::CaptureError;

/// A raw link-layer frame as delivered by the capture facility.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Ethernet payload type of the frame
    pub ethertype: EtherType,
    /// The complete captured frame, link-layer header included
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn new(ethertype: EtherType, data: Vec<u8>) -> Self {
        Self { ethertype, data }
    }
}

/// Stream of captured frames from an open session.
pub type FrameStream = Box<dyn Iterator<Item = RawFrame> + Send>;

/// Trait for capture backends.
///
/// Lets the capture engine run against a live interface or against a
/// canned sequence of frames in tests.
pub trait FrameSource: Send {
    /// Resolve the target interface and open a capture session.
    ///
    /// The returned stream ends once the running flag is cleared.
    fn open(&mut self) -> Result<FrameStream, CaptureError>;

    /// Name of the interface being captured, once resolved.
    fn interface_name(&self) -> Option<&str>;

    /// Set the running flag for graceful shutdown.
    fn set_running(&mut self, running: Arc<AtomicBool>);
}
