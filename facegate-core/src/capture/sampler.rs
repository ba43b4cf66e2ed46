use image::imageops::{self, FilterType};
use tracing::trace;

use super::{CaptureHandle, Frame};

/// Produces one still frame per call from the current state of a stream.
///
/// Sampling is synchronous and does not throttle; `None` means the device
/// has nothing displayable yet and the caller should try again later.
pub trait FrameSampler: Send + Sync {
    fn sample(&self, handle: &CaptureHandle) -> Option<Frame>;
}

/// Default sampler: copies the device snapshot, optionally downscaled.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotSampler {
    max_edge: Option<u32>,
}

impl SnapshotSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Downscale frames whose longer edge exceeds `max_edge` pixels.
    pub fn with_max_edge(max_edge: u32) -> Self {
        Self {
            max_edge: Some(max_edge.max(1)),
        }
    }
}

impl FrameSampler for SnapshotSampler {
    fn sample(&self, handle: &CaptureHandle) -> Option<Frame> {
        let pixels = handle.device().snapshot(handle.stream_id())?;
        let (w, h) = pixels.dimensions();
        if w == 0 || h == 0 {
            trace!(stream = %handle.stream_id(), "Stream not ready");
            return None;
        }

        let pixels = match self.max_edge {
            Some(max) if w.max(h) > max => {
                let scale = max as f64 / w.max(h) as f64;
                let nw = ((w as f64 * scale).round() as u32).max(1);
                let nh = ((h as f64 * scale).round() as u32).max(1);
                imageops::resize(&pixels, nw, nh, FilterType::Triangle)
            }
            _ => pixels,
        };
        Some(Frame::new(pixels))
    }
}
