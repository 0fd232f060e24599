//! Local video metadata probing.
//!
//! Provides a coarse frame-count estimate for a video before upload. The
//! estimate only seeds the progress denominator until the backend reports
//! its own total.

pub mod error;
pub mod probe;

pub use error::{MediaError, MediaLoadError, MediaResult};
pub use probe::{
    ensure_readable, FfprobeSource, FrameEstimate, MediaHandle, MetadataSource, ProbeConfig, VideoProbe,
    DEFAULT_ASSUMED_FPS,
};
