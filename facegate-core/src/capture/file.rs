//! Camera substitute that replays still images from disk.
//!
//! Useful on machines without a camera and for reproducible demos: every
//! snapshot returns the next image of the directory, in file-name order,
//! wrapping around at the end.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use image::RgbImage;
use tracing::{debug, instrument, warn};

use super::{CaptureDevice, StreamConstraints, StreamId};
use crate::error::{FacegateError, Result};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

struct OpenStream {
    id: StreamId,
    frames: Vec<RgbImage>,
    cursor: usize,
}

pub struct FileCamera {
    dir: PathBuf,
    next_stream: AtomicU64,
    open: Mutex<Option<OpenStream>>,
}

impl FileCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_stream: AtomicU64::new(0),
            open: Mutex::new(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        FacegateError::DeviceUnavailable(format!(
            "cannot open frame directory {}: {e}",
            dir.display()
        ))
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

fn load(path: &Path, constraints: &StreamConstraints) -> Option<RgbImage> {
    match image::open(path) {
        Ok(img) => {
            let (w, h) = (constraints.ideal_width, constraints.ideal_height);
            let img = if img.width() > w || img.height() > h {
                img.thumbnail(w, h)
            } else {
                img
            };
            Some(img.to_rgb8())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unreadable frame");
            None
        }
    }
}

/// Decode every image of `dir`. Blocking; runs on the blocking pool.
fn load_frames(dir: &Path, constraints: &StreamConstraints) -> Result<Vec<RgbImage>> {
    let frames: Vec<RgbImage> = list_images(dir)?
        .iter()
        .filter_map(|path| load(path, constraints))
        .collect();
    if frames.is_empty() {
        return Err(FacegateError::DeviceUnavailable(format!(
            "no readable images in {}",
            dir.display()
        )));
    }
    Ok(frames)
}

#[async_trait]
impl CaptureDevice for FileCamera {
    #[instrument(level = "debug", skip_all, fields(dir = %self.dir.display()))]
    async fn acquire(&self, constraints: &StreamConstraints) -> Result<StreamId> {
        if self
            .open
            .lock()
            .map(|open| open.is_some())
            .unwrap_or(true)
        {
            return Err(FacegateError::DeviceUnavailable("device busy".into()));
        }

        let dir = self.dir.clone();
        let wanted = constraints.clone();
        let frames = tokio::task::spawn_blocking(move || load_frames(&dir, &wanted))
            .await
            .map_err(|e| FacegateError::TaskFailed(format!("frame loading panicked: {e}")))??;
        debug!(frames = frames.len(), "Loaded frames");

        let id = StreamId(self.next_stream.fetch_add(1, Ordering::Relaxed) + 1);
        let mut open = self
            .open
            .lock()
            .map_err(|_| FacegateError::DeviceUnavailable("device state poisoned".into()))?;
        if open.is_some() {
            return Err(FacegateError::DeviceUnavailable("device busy".into()));
        }
        *open = Some(OpenStream {
            id,
            frames,
            cursor: 0,
        });
        Ok(id)
    }

    fn release(&self, stream: StreamId) {
        if let Ok(mut open) = self.open.lock() {
            if open.as_ref().map(|s| s.id) == Some(stream) {
                *open = None;
            }
        }
    }

    fn snapshot(&self, stream: StreamId) -> Option<RgbImage> {
        let mut open = self.open.lock().ok()?;
        let current = open.as_mut().filter(|s| s.id == stream)?;
        let frame = current.frames[current.cursor % current.frames.len()].clone();
        current.cursor = current.cursor.wrapping_add(1);
        Some(frame)
    }

    fn label(&self) -> String {
        format!("file-camera {}", self.dir.display())
    }
}
