//! Single-shot face capture for account registration.
//!
//! No polling loop and no remote call: open the device, wait for the user's
//! trigger, take one frame, release the device.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::capture::{
    CaptureDevice, CaptureHandle, Frame, FrameSampler, SnapshotSampler, StreamConstraints,
    JPEG_DATA_URL_PREFIX,
};
use crate::error::{FacegateError, Result};

/// How long a capture waits for the first displayable frame.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captured enrollment picture, handed to registration as an opaque payload.
#[derive(Clone, PartialEq, Eq)]
pub struct EnrollmentImage {
    jpeg: Vec<u8>,
    width: u32,
    height: u32,
    captured_at: DateTime<Utc>,
}

impl EnrollmentImage {
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        Ok(Self {
            jpeg: frame.to_jpeg()?,
            width: frame.width(),
            height: frame.height(),
            captured_at: frame.captured_at(),
        })
    }

    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    /// `data:image/jpeg;base64,...` form sent to the account API.
    pub fn to_data_url(&self) -> String {
        let mut url = String::from(JPEG_DATA_URL_PREFIX);
        base64::engine::general_purpose::STANDARD.encode_string(&self.jpeg, &mut url);
        url
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

impl std::fmt::Debug for EnrollmentImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrollmentImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("jpeg_bytes", &self.jpeg.len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// Opens previews for single-shot captures.
pub struct EnrollmentCapture {
    device: Arc<dyn CaptureDevice>,
    sampler: Arc<dyn FrameSampler>,
    constraints: StreamConstraints,
    ready_timeout: Duration,
}

impl EnrollmentCapture {
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self {
            device,
            sampler: Arc::new(SnapshotSampler::new()),
            constraints: StreamConstraints::default(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    pub fn with_sampler(mut self, sampler: Arc<dyn FrameSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_constraints(mut self, constraints: StreamConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_ready_timeout(mut self, ready_timeout: Duration) -> Self {
        self.ready_timeout = ready_timeout;
        self
    }

    /// Acquire the device. The returned preview holds the stream until it
    /// captures or is dropped.
    #[instrument(level = "info", skip(self), fields(device = %self.device.label()))]
    pub async fn open(&self) -> Result<EnrollmentPreview> {
        let handle = CaptureHandle::acquire(Arc::clone(&self.device), &self.constraints).await?;
        info!(stream = %handle.stream_id(), "Enrollment preview open");
        Ok(EnrollmentPreview {
            handle,
            sampler: Arc::clone(&self.sampler),
            ready_timeout: self.ready_timeout,
        })
    }

    /// Open a preview, wait for `trigger`, then capture.
    pub async fn capture_on<F>(&self, trigger: F) -> Result<EnrollmentImage>
    where
        F: Future<Output = ()>,
    {
        let preview = self.open().await?;
        trigger.await;
        preview.capture().await
    }
}

/// Live stream awaiting the user's capture trigger.
pub struct EnrollmentPreview {
    handle: CaptureHandle,
    sampler: Arc<dyn FrameSampler>,
    ready_timeout: Duration,
}

impl EnrollmentPreview {
    /// Current frame for rendering, if the stream has one.
    pub fn peek(&self) -> Option<Frame> {
        self.sampler.sample(&self.handle)
    }

    /// Take one frame and release the stream.
    ///
    /// Waits up to the ready timeout for the stream to produce a
    /// displayable frame; the stream is released on every path.
    #[instrument(level = "info", skip(self), fields(stream = %self.handle.stream_id()))]
    pub async fn capture(self) -> Result<EnrollmentImage> {
        let sampler = Arc::clone(&self.sampler);
        let handle = &self.handle;
        let waited = timeout(self.ready_timeout, async {
            let mut ticker = interval(READY_POLL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Some(frame) = sampler.sample(handle) {
                    return frame;
                }
            }
        })
        .await;
        self.handle.release();

        let frame = waited.map_err(|_| {
            warn!("No displayable frame before timeout");
            FacegateError::FrameNotReady(format!(
                "camera produced no frame within {} ms",
                self.ready_timeout.as_millis()
            ))
        })?;
        debug!(width = frame.width(), height = frame.height(), "Enrollment frame captured");
        EnrollmentImage::from_frame(&frame)
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;
    use crate::capture::MockCamera;

    #[tokio::test(start_paused = true)]
    async fn test_capture_waits_for_warmup() {
        let camera = Arc::new(MockCamera::default().with_warmup(3));
        let capture = EnrollmentCapture::new(camera.clone());

        let preview = capture.open().await.unwrap();
        assert_eq!(camera.live_streams(), 1);
        let image = preview.capture().await.unwrap();

        assert_eq!(camera.live_streams(), 0);
        assert_eq!(camera.snapshots(), 4);
        assert!(image.to_data_url().starts_with(JPEG_DATA_URL_PREFIX));
        assert_eq!((image.width(), image.height()), (64, 48));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_times_out_and_releases() {
        let camera = Arc::new(MockCamera::default().with_warmup(u64::MAX));
        let capture = EnrollmentCapture::new(camera.clone()).with_ready_timeout(Duration::from_secs(1));

        let err = capture.open().await.unwrap().capture().await.unwrap_err();
        assert!(matches!(err, FacegateError::FrameNotReady(_)));
        assert_eq!(camera.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_dropped_preview_releases() {
        let camera = Arc::new(MockCamera::default());
        let preview = EnrollmentCapture::new(camera.clone()).open().await.unwrap();
        assert!(preview.peek().is_some());
        drop(preview);
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(camera.release_calls(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_device() {
        let camera = Arc::new(MockCamera::unavailable("permission denied"));
        let err = EnrollmentCapture::new(camera).open().await.err().unwrap();
        assert!(matches!(err, FacegateError::DeviceUnavailable(ref r) if r == "permission denied"));
    }

    #[tokio::test]
    async fn test_capture_on_trigger() {
        let camera = Arc::new(MockCamera::default());
        let capture = EnrollmentCapture::new(camera.clone());
        let (tx, rx) = oneshot::channel::<()>();
        tx.send(()).unwrap();

        let image = capture
            .capture_on(async {
                let _ = rx.await;
            })
            .await
            .unwrap();
        assert!(!image.jpeg().is_empty());
        assert_eq!(camera.acquisitions(), 1);
        assert_eq!(camera.live_streams(), 0);
    }
}
