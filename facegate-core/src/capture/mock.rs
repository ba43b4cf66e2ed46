//! Mock camera for testing.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use image::{Rgb, RgbImage};

use super::{CaptureDevice, StreamConstraints, StreamId};
use crate::error::{FacegateError, Result};

#[derive(Debug, Default)]
struct CameraState {
    next_stream: u64,
    /// Live streams and how many snapshots each has served.
    live: HashMap<StreamId, u64>,
    acquisitions: u64,
    release_calls: u64,
    snapshots: u64,
}

/// Synthetic camera producing deterministic gradient frames.
///
/// Counts every acquire, release and snapshot call so tests can assert on
/// the device lifecycle.
#[derive(Debug)]
pub struct MockCamera {
    state: Mutex<CameraState>,
    unavailable: Option<String>,
    warmup: u64,
    width: u32,
    height: u32,
}

impl MockCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: Mutex::new(CameraState::default()),
            unavailable: None,
            warmup: 0,
            width,
            height,
        }
    }

    /// A camera whose every acquisition fails with `reason`.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Serve `frames` not-ready snapshots at the start of each stream.
    pub fn with_warmup(mut self, frames: u64) -> Self {
        self.warmup = frames;
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Number of streams currently open.
    pub fn live_streams(&self) -> usize {
        self.lock().live.len()
    }

    pub fn acquisitions(&self) -> u64 {
        self.lock().acquisitions
    }

    /// Every call to `release`, including redundant ones.
    pub fn release_calls(&self) -> u64 {
        self.lock().release_calls
    }

    /// Every call to `snapshot`, including not-ready ones.
    pub fn snapshots(&self) -> u64 {
        self.lock().snapshots
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CameraState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new(64, 48)
    }
}

#[async_trait]
impl CaptureDevice for MockCamera {
    async fn acquire(&self, _constraints: &StreamConstraints) -> Result<StreamId> {
        if let Some(reason) = &self.unavailable {
            return Err(FacegateError::DeviceUnavailable(reason.clone()));
        }
        let mut state = self.lock();
        if !state.live.is_empty() {
            return Err(FacegateError::DeviceUnavailable("device busy".into()));
        }
        state.next_stream += 1;
        state.acquisitions += 1;
        let stream = StreamId(state.next_stream);
        state.live.insert(stream, 0);
        Ok(stream)
    }

    fn release(&self, stream: StreamId) {
        let mut state = self.lock();
        state.release_calls += 1;
        state.live.remove(&stream);
    }

    fn snapshot(&self, stream: StreamId) -> Option<RgbImage> {
        let mut state = self.lock();
        state.snapshots += 1;
        let served = state.live.get_mut(&stream)?;
        *served += 1;
        if *served <= self.warmup {
            return None;
        }
        let tick = *served as u8;
        Some(RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb([x as u8, y as u8, tick.wrapping_mul(17)])
        }))
    }

    fn label(&self) -> String {
        format!("mock-camera {}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let camera = MockCamera::default();
        let stream = camera.acquire(&StreamConstraints::default()).await.unwrap();
        camera.release(stream);
        camera.release(stream);
        camera.release(StreamId(999));
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(camera.release_calls(), 3);
    }

    #[tokio::test]
    async fn test_snapshot_of_released_stream_is_none() {
        let camera = MockCamera::default();
        let stream = camera.acquire(&StreamConstraints::default()).await.unwrap();
        assert!(camera.snapshot(stream).is_some());
        camera.release(stream);
        assert!(camera.snapshot(stream).is_none());
    }

    #[tokio::test]
    async fn test_unavailable_camera_never_opens() {
        let camera = MockCamera::unavailable("no device");
        assert!(camera.acquire(&StreamConstraints::default()).await.is_err());
        assert_eq!(camera.acquisitions(), 0);
    }
}
