//! Capture devices and the handles that own their live streams.
//!
//! A [`CaptureDevice`] hands out at most one live stream at a time. The
//! stream is wrapped in a [`CaptureHandle`], which releases it exactly once:
//! either through [`CaptureHandle::release`] or when the handle is dropped.
//! A [`FrameSampler`] turns the current stream state into an immutable
//! [`Frame`].
//!
//! ## Implementations
//!
//! - [`MockCamera`] - synthetic frames with call counters (testing)
//! - [`FileCamera`] - replays still images from a directory

mod file;
mod frame;
mod mock;
mod sampler;

pub use file::FileCamera;
pub use frame::{Frame, JPEG_DATA_URL_PREFIX};
pub use mock::MockCamera;
pub use sampler::{FrameSampler, SnapshotSampler};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;
use tracing::{debug, instrument};

use crate::error::{FacegateError, Result};

/// Identifier of one live stream on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    /// Front camera, pointed at the user.
    #[default]
    User,
    Environment,
}

/// Stream preferences passed to [`CaptureDevice::acquire`].
///
/// Devices treat these as hints, not guarantees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: Facing,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            facing: Facing::User,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// Hardware (or simulated) video source.
///
/// Implementations must be thread-safe (`Send + Sync`) and must not leave a
/// partially acquired stream behind when `acquire` fails.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Open a stream. Fails with [`FacegateError::DeviceUnavailable`] when
    /// permission is denied, no device exists, or the device is busy.
    async fn acquire(&self, constraints: &StreamConstraints) -> Result<StreamId>;

    /// Stop every underlying track of `stream`. Idempotent.
    fn release(&self, stream: StreamId);

    /// Current displayable picture of a live stream, or `None` if the stream
    /// has not produced one yet.
    fn snapshot(&self, stream: StreamId) -> Option<RgbImage>;

    /// Human-readable device label for logs.
    fn label(&self) -> String;
}

/// Exclusive ownership of one live stream.
///
/// Never cloned or shared; dropping the handle releases the stream.
pub struct CaptureHandle {
    device: Arc<dyn CaptureDevice>,
    stream: StreamId,
    released: bool,
}

impl CaptureHandle {
    /// Acquire a stream from `device`.
    ///
    /// Any acquisition failure is reported as `DeviceUnavailable`.
    #[instrument(level = "debug", skip_all, fields(device = %device.label()))]
    pub async fn acquire(
        device: Arc<dyn CaptureDevice>,
        constraints: &StreamConstraints,
    ) -> Result<Self> {
        let stream = device.acquire(constraints).await.map_err(|e| match e {
            FacegateError::DeviceUnavailable(reason) => FacegateError::DeviceUnavailable(reason),
            other => FacegateError::DeviceUnavailable(other.to_string()),
        })?;
        debug!(%stream, "Capture stream acquired");
        Ok(Self {
            device,
            stream,
            released: false,
        })
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream
    }

    pub fn device(&self) -> &dyn CaptureDevice {
        self.device.as_ref()
    }

    /// Release the stream now instead of at drop.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.device.release(self.stream);
            debug!(stream = %self.stream, "Capture stream released");
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("device", &self.device.label())
            .field("stream", &self.stream)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_releases_once_on_explicit_release() {
        let camera = Arc::new(MockCamera::default());
        let handle = CaptureHandle::acquire(camera.clone(), &StreamConstraints::default())
            .await
            .unwrap();
        assert_eq!(camera.live_streams(), 1);

        handle.release();
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(camera.release_calls(), 1);
    }

    #[tokio::test]
    async fn test_handle_releases_on_drop() {
        let camera = Arc::new(MockCamera::default());
        {
            let _handle = CaptureHandle::acquire(camera.clone(), &StreamConstraints::default())
                .await
                .unwrap();
            assert_eq!(camera.live_streams(), 1);
        }
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(camera.release_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_acquire_leaves_nothing_live() {
        let camera = Arc::new(MockCamera::unavailable("permission denied"));
        let err = CaptureHandle::acquire(camera.clone(), &StreamConstraints::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FacegateError::DeviceUnavailable(ref r) if r.contains("permission")));
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(camera.release_calls(), 0);
    }

    #[tokio::test]
    async fn test_device_is_exclusive() {
        let camera = Arc::new(MockCamera::default());
        let first = CaptureHandle::acquire(camera.clone(), &StreamConstraints::default())
            .await
            .unwrap();
        let second = CaptureHandle::acquire(camera.clone(), &StreamConstraints::default()).await;
        assert!(matches!(second, Err(FacegateError::DeviceUnavailable(_))));

        drop(first);
        assert!(
            CaptureHandle::acquire(camera.clone(), &StreamConstraints::default())
                .await
                .is_ok()
        );
    }

    #[test]
    fn test_default_constraints_prefer_front_camera() {
        let c = StreamConstraints::default();
        assert_eq!(c.facing, Facing::User);
        assert_eq!((c.ideal_width, c.ideal_height), (1280, 720));
    }
}
