//! # Device Frames
//!
//! A frame here is an owned reference to a device surface plus the
//! metadata the filters care about. Dropping a frame is the release: an
//! optional hook runs exactly once, which is how pool-backed output frames
//! return their surface slot without the holder knowing about the pool.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::vaproc::SurfaceId;

/// Chroma layouts this pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Chroma {
    Nv12,
    P010,
    I420,
}

impl Chroma {
    /// Whether the layout is native to the hardware video-processing
    /// entry point.
    pub fn is_hardware(self) -> bool {
        matches!(self, Chroma::Nv12 | Chroma::P010)
    }
}

/// Geometry and chroma layout of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub chroma: Chroma,
}

impl VideoFormat {
    pub fn new(width: u32, height: u32, chroma: Chroma) -> Self {
        Self { width, height, chroma }
    }

    /// Same geometry and chroma layout. Filtering never converts.
    pub fn is_similar(&self, other: &VideoFormat) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.chroma == other.chroma
    }
}

/// Timing and field metadata carried from source to destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameMeta {
    pub pts_us: i64,
    pub duration_us: i64,
    pub interlaced: bool,
    pub top_field_first: bool,
}

type ReleaseFn = Box<dyn FnOnce(SurfaceId) + Send>;

/// An owned device frame. The surface identifier stays valid for as long
/// as the frame is alive; whoever created the frame decides what release
/// means through the hook.
pub struct Frame {
    surface: SurfaceId,
    pub meta: FrameMeta,
    release: Option<ReleaseFn>,
}

impl Frame {
    pub fn new(surface: SurfaceId, meta: FrameMeta) -> Self {
        Self { surface, meta, release: None }
    }

    /// A frame whose release runs `release` with the surface id.
    pub fn with_release(
        surface: SurfaceId,
        meta: FrameMeta,
        release: impl FnOnce(SurfaceId) + Send + 'static,
    ) -> Self {
        Self { surface, meta, release: Some(Box::new(release)) }
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// Copy timing and field flags from `src`, keeping our surface.
    pub fn copy_meta_from(&mut self, src: &Frame) {
        self.meta = src.meta;
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.surface);
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("surface", &self.surface)
            .field("meta", &self.meta)
            .field("pooled", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn release_hook_runs_exactly_once_on_drop() {
        let released = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&released);
        let frame = Frame::with_release(SurfaceId(7), FrameMeta::default(), move |sid| {
            assert_eq!(sid, SurfaceId(7));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(frame);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn meta_copy_preserves_surface() {
        let src = Frame::new(
            SurfaceId(1),
            FrameMeta { pts_us: 40_000, duration_us: 20_000, interlaced: true, top_field_first: true },
        );
        let mut dest = Frame::new(SurfaceId(2), FrameMeta::default());
        dest.copy_meta_from(&src);
        assert_eq!(dest.meta, src.meta);
        assert_eq!(dest.surface(), SurfaceId(2));
    }

    #[test]
    fn format_similarity_requires_geometry_and_chroma() {
        let a = VideoFormat::new(1920, 1080, Chroma::Nv12);
        assert!(a.is_similar(&a));
        assert!(!a.is_similar(&VideoFormat::new(1280, 720, Chroma::Nv12)));
        assert!(!a.is_similar(&VideoFormat::new(1920, 1080, Chroma::I420)));
    }
}
