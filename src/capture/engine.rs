//! Capture engine: frames in, packet records into the window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{FrameSource, FrameStream};
use crate::decoder::FrameDecoder;
use crate::error::CaptureError;
use crate::window::PacketWindow;

/// Lifecycle of a capture engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Opening,
    Capturing,
    Stopped,
    /// Interface resolution or session open failed. Terminal.
    Failed,
}

/// Counters for one capture run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames delivered by the source
    pub frames: u64,
    /// Frames decoded into packet records
    pub accepted: u64,
    /// Frames the decoder produced nothing for
    pub discarded: u64,
}

/// Owns a capture session and feeds every decoded frame into the window.
///
/// Frames are decoded and appended strictly in arrival order on the
/// calling thread.
pub struct CaptureEngine<S: FrameSource> {
    source: S,
    decoder: FrameDecoder,
    window: Arc<PacketWindow>,
    running: Arc<AtomicBool>,
    frames: Option<FrameStream>,
    state: CaptureState,
}

impl<S: FrameSource> CaptureEngine<S> {
    /// Create an idle engine writing into `window`.
    pub fn new(mut source: S, window: Arc<PacketWindow>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        source.set_running(Arc::clone(&running));

        Self {
            source,
            decoder: FrameDecoder::new(),
            window,
            running,
            frames: None,
            state: CaptureState::Idle,
        }
    }

    /// Get a handle to stop the engine.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn interface_name(&self) -> Option<&str> {
        self.source.interface_name()
    }

    /// Resolve the interface and open the capture session.
    ///
    /// Failure moves the engine to `Failed`; callers treat it as fatal.
    pub fn open(&mut self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Idle {
            return Err(CaptureError::AlreadyOpen);
        }

        self.state = CaptureState::Opening;
        match self.source.open() {
            Ok(frames) => {
                self.frames = Some(frames);
                self.state = CaptureState::Capturing;
                tracing::info!(
                    "Capturing on interface {}",
                    self.source.interface_name().unwrap_or("<unknown>")
                );
                Ok(())
            }
            Err(e) => {
                self.state = CaptureState::Failed;
                Err(e)
            }
        }
    }

    /// Consume frames until the source ends or the running flag clears.
    ///
    /// Blocks the calling thread; run it on a dedicated worker.
    pub fn run(&mut self) -> Result<CaptureStats, CaptureError> {
        let frames = self.frames.take().ok_or(CaptureError::NotOpen)?;
        let mut stats = CaptureStats::default();

        for frame in frames {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            stats.frames += 1;
            match self.decoder.decode(&frame) {
                Some(record) => {
                    tracing::trace!("{}", record);
                    self.window.append(record);
                    stats.accepted += 1;
                }
                None => stats.discarded += 1,
            }
        }

        self.state = CaptureState::Stopped;
        tracing::info!(
            "Capture stopped: {} frames, {} accepted, {} discarded",
            stats.frames,
            stats.accepted,
            stats.discarded
        );
        Ok(stats)
    }
}
