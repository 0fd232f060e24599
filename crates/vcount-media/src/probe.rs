//! Video duration probing and frame-count estimation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Frame rate assumed for estimates; the real rate is only known server-side.
pub const DEFAULT_ASSUMED_FPS: f64 = 25.0;

/// Probe configuration.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Frame rate used for the estimate
    pub assumed_fps: f64,
    /// Upper bound on one metadata load
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            assumed_fps: DEFAULT_ASSUMED_FPS,
            timeout: Duration::from_secs(15),
        }
    }
}

impl ProbeConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            assumed_fps: std::env::var("VCOUNT_ASSUMED_FPS")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|fps| *fps > 0.0)
                .unwrap_or(DEFAULT_ASSUMED_FPS),
            timeout: Duration::from_secs(
                std::env::var("VCOUNT_PROBE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(15),
            ),
        }
    }
}

/// Coarse, client-side frame count for a video.
///
/// This is an estimate to be overwritten: it seeds the progress denominator
/// only until the backend reports an authoritative total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameEstimate {
    pub duration_seconds: f64,
    pub assumed_frame_rate: f64,
    pub estimated_total_frames: u64,
}

impl FrameEstimate {
    pub fn from_duration(duration_seconds: f64, assumed_frame_rate: f64) -> Self {
        Self {
            duration_seconds,
            assumed_frame_rate,
            estimated_total_frames: (duration_seconds * assumed_frame_rate).floor() as u64,
        }
    }
}

/// Temporary handle on a media file, valid until released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHandle {
    pub id: u64,
    pub path: PathBuf,
}

/// Platform facility for loading media metadata.
///
/// Every handle returned by `open` must be passed to `release` exactly once.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    fn open(&self, path: &Path) -> MediaResult<MediaHandle>;

    /// Duration of the media in seconds.
    async fn duration(&self, handle: &MediaHandle) -> MediaResult<f64>;

    fn release(&self, handle: &MediaHandle);
}

/// Releases its handle when dropped, on success and failure paths alike.
struct HandleGuard<'a> {
    source: &'a dyn MetadataSource,
    handle: MediaHandle,
}

impl<'a> HandleGuard<'a> {
    fn open(source: &'a dyn MetadataSource, path: &Path) -> MediaResult<Self> {
        let handle = source.open(path)?;
        Ok(Self { source, handle })
    }
}

impl Drop for HandleGuard<'_> {
    fn drop(&mut self) {
        self.source.release(&self.handle);
    }
}

/// Fail unless `path` names an existing regular file.
///
/// Needs no metadata facility, so it runs even when no probe is configured.
pub async fn ensure_readable(path: impl AsRef<Path>) -> MediaResult<()> {
    let path = path.as_ref();
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(MediaError::invalid_video(format!(
            "{} is not a file",
            path.display()
        ))),
        Err(_) => Err(MediaError::FileNotFound(path.to_path_buf())),
    }
}

/// Extracts duration and a frame estimate from a local video.
#[derive(Clone)]
pub struct VideoProbe {
    source: Arc<dyn MetadataSource>,
    config: ProbeConfig,
}

impl VideoProbe {
    pub fn new(source: Arc<dyn MetadataSource>, config: ProbeConfig) -> Self {
        Self { source, config }
    }

    /// Probe backed by the `ffprobe` binary.
    pub fn ffprobe(config: ProbeConfig) -> Self {
        let source = Arc::new(FfprobeSource::new(config.timeout));
        Self::new(source, config)
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Load metadata and compute the advisory frame estimate.
    pub async fn probe(&self, path: impl AsRef<Path>) -> MediaResult<FrameEstimate> {
        let path = path.as_ref();
        let guard = HandleGuard::open(self.source.as_ref(), path)?;
        let duration = self.source.duration(&guard.handle).await?;
        drop(guard);

        if !duration.is_finite() || duration <= 0.0 {
            return Err(MediaError::invalid_video(format!(
                "unusable duration {} for {}",
                duration,
                path.display()
            )));
        }

        let estimate = FrameEstimate::from_duration(duration, self.config.assumed_fps);
        debug!(
            path = %path.display(),
            duration_secs = estimate.duration_seconds,
            estimated_frames = estimate.estimated_total_frames,
            "Probed video"
        );
        Ok(estimate)
    }
}

impl std::fmt::Debug for VideoProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoProbe")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// FFprobe JSON output, format section only.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Metadata source running `ffprobe` on the file.
pub struct FfprobeSource {
    timeout: Duration,
    next_id: AtomicU64,
}

impl FfprobeSource {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl MetadataSource for FfprobeSource {
    fn open(&self, path: &Path) -> MediaResult<MediaHandle> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

        Ok(MediaHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            path: path.to_path_buf(),
        })
    }

    async fn duration(&self, handle: &MediaHandle) -> MediaResult<f64> {
        let run = Command::new("ffprobe")
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(&handle.path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| MediaError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            return Err(MediaError::ffprobe_failed(
                "FFprobe failed",
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
            ));
        }

        parse_duration(&output.stdout)
    }

    fn release(&self, handle: &MediaHandle) {
        debug!(handle = handle.id, path = %handle.path.display(), "Released media handle");
    }
}

/// Extract the container duration from ffprobe JSON.
fn parse_duration(stdout: &[u8]) -> MediaResult<f64> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;
    probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| MediaError::invalid_video("no duration in container metadata"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Records open/release calls and returns a scripted duration.
    struct CountingSource {
        duration: Option<f64>,
        opened: AtomicUsize,
        released: AtomicUsize,
    }

    impl CountingSource {
        fn new(duration: Option<f64>) -> Arc<Self> {
            Arc::new(Self {
                duration,
                opened: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MetadataSource for CountingSource {
        fn open(&self, path: &Path) -> MediaResult<MediaHandle> {
            let id = self.opened.fetch_add(1, Ordering::SeqCst) as u64;
            Ok(MediaHandle {
                id,
                path: path.to_path_buf(),
            })
        }

        async fn duration(&self, _handle: &MediaHandle) -> MediaResult<f64> {
            self.duration
                .ok_or_else(|| MediaError::invalid_video("unreadable"))
        }

        fn release(&self, _handle: &MediaHandle) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_probe_estimates_frames() {
        let source = CountingSource::new(Some(30.5));
        let probe = VideoProbe::new(source.clone(), ProbeConfig::default());

        let estimate = probe.probe("clip.mp4").await.unwrap();
        assert_eq!(estimate.assumed_frame_rate, 25.0);
        assert_eq!(estimate.estimated_total_frames, 762);
        assert_eq!(source.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_probe_releases_handle_on_failure() {
        let source = CountingSource::new(None);
        let probe = VideoProbe::new(source.clone(), ProbeConfig::default());

        assert!(matches!(
            probe.probe("broken.mp4").await,
            Err(MediaError::InvalidVideo(_))
        ));
        assert_eq!(source.opened.load(Ordering::SeqCst), 1);
        assert_eq!(source.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_probe_rejects_zero_duration() {
        let source = CountingSource::new(Some(0.0));
        let probe = VideoProbe::new(source.clone(), ProbeConfig::default());

        assert!(probe.probe("empty.mp4").await.is_err());
        assert_eq!(source.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ffprobe_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let probe = VideoProbe::ffprobe(ProbeConfig::default());

        let result = probe.probe(dir.path().join("missing.mp4")).await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }

    #[test]
    fn test_estimate_floors_partial_frames() {
        let estimate = FrameEstimate::from_duration(10.03, 25.0);
        assert_eq!(estimate.estimated_total_frames, 250);
    }

    #[tokio::test]
    async fn test_ensure_readable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"data").unwrap();

        assert!(ensure_readable(&file).await.is_ok());
        assert!(matches!(
            ensure_readable(dir.path().join("missing.mp4")).await,
            Err(MediaError::FileNotFound(_))
        ));
        assert!(matches!(
            ensure_readable(dir.path()).await,
            Err(MediaError::InvalidVideo(_))
        ));
    }

    #[test]
    fn test_parse_duration() {
        let json = br#"{"format": {"duration": "12.480000", "size": "1024"}}"#;
        assert!((parse_duration(json).unwrap() - 12.48).abs() < 1e-9);

        let json = br#"{"format": {}}"#;
        assert!(matches!(parse_duration(json), Err(MediaError::InvalidVideo(_))));
    }
}
