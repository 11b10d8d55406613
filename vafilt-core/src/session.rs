//! # Filter Session
//!
//! Owns the acceleration-context resources for one filter instance:
//! output surfaces and their pool, the video-processing configuration,
//! the execution context, and the filter-parameter buffer. Resources are
//! acquired in a strict order and released in exactly the reverse order,
//! on the error path of `open` as well as on drop. Partially-initialized
//! state is tracked with the invalid-handle sentinel so teardown is
//! always safe.

use std::sync::Arc;

use crate::error::FilterError;
use crate::frame::VideoFormat;
use crate::pool::SurfacePool;
use crate::vaproc::{
    BufferId, ConfigId, ContextId, FilterParams, FilterType, PipelineCaps, SurfaceId,
    VideoProcBackend,
};

/// Output pool depth. Three destination surfaces keep one frame in flight
/// downstream, one rendering and one free.
pub const OUTPUT_POOL_SIZE: usize = 3;

/// Filter-specific hook run during open, after the context exists, to
/// produce the initial driver parameter blob.
pub type InitParamsFn<'a> =
    &'a mut dyn FnMut(&dyn VideoProcBackend, ContextId) -> Result<FilterParams, FilterError>;

/// Optional hook consuming the pipeline capability query result (used by
/// deinterlacing to size its reference history).
pub type UseCapsFn<'a> = &'a mut dyn FnMut(&PipelineCaps) -> Result<(), FilterError>;

/// Resources acquired so far during `open`, torn down in reverse order if
/// a later step fails.
#[derive(Default)]
struct Partial {
    surfaces: Vec<SurfaceId>,
    config: ConfigId,
    context: ContextId,
    filter_buf: BufferId,
}

impl Partial {
    fn unwind(self, backend: &dyn VideoProcBackend) {
        if self.filter_buf.is_valid() {
            backend.destroy_buffer(self.filter_buf);
        }
        if self.context.is_valid() {
            backend.destroy_context(self.context);
        }
        if self.config.is_valid() {
            backend.destroy_config(self.config);
        }
        if !self.surfaces.is_empty() {
            backend.destroy_surfaces(&self.surfaces);
        }
    }
}

/// One active filter instance's driver resources.
pub struct Session {
    backend: Arc<dyn VideoProcBackend>,
    format: VideoFormat,
    filter: FilterType,
    surfaces: Vec<SurfaceId>,
    config: ConfigId,
    context: ContextId,
    filter_buf: BufferId,
    pool: SurfacePool,
    fast_pipeline: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("format", &self.format)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open a session for `filter`.
    ///
    /// Format compatibility is a configuration precondition and is checked
    /// before any resource is allocated. After that, each acquisition step
    /// may fail independently; failure unwinds only what was acquired, in
    /// reverse order, and no resource leaks on any exit path.
    pub fn open(
        backend: Arc<dyn VideoProcBackend>,
        filter: FilterType,
        in_fmt: &VideoFormat,
        out_fmt: &VideoFormat,
        init_params: InitParamsFn<'_>,
        use_caps: Option<UseCapsFn<'_>>,
    ) -> Result<Session, FilterError> {
        if !out_fmt.chroma.is_hardware() {
            return Err(FilterError::Unsupported(format!(
                "output chroma {:?} is not hardware-native",
                out_fmt.chroma
            )));
        }
        if !out_fmt.is_similar(in_fmt) {
            return Err(FilterError::Unsupported(format!(
                "input {}x{} {:?} and output {}x{} {:?} formats differ",
                in_fmt.width, in_fmt.height, in_fmt.chroma,
                out_fmt.width, out_fmt.height, out_fmt.chroma
            )));
        }

        let mut partial = Partial::default();
        match Self::open_steps(&backend, filter, out_fmt, init_params, use_caps, &mut partial) {
            Ok((pool, fast_pipeline)) => {
                tracing::debug!(
                    ?filter,
                    width = out_fmt.width,
                    height = out_fmt.height,
                    fast_pipeline,
                    "filter session open"
                );
                Ok(Session {
                    backend,
                    format: *out_fmt,
                    filter,
                    surfaces: std::mem::take(&mut partial.surfaces),
                    config: partial.config,
                    context: partial.context,
                    filter_buf: partial.filter_buf,
                    pool,
                    fast_pipeline,
                })
            }
            Err(err) => {
                tracing::warn!(?filter, error = %err, "filter session open failed");
                partial.unwind(backend.as_ref());
                Err(err)
            }
        }
    }

    fn open_steps(
        backend: &Arc<dyn VideoProcBackend>,
        filter: FilterType,
        fmt: &VideoFormat,
        init_params: InitParamsFn<'_>,
        use_caps: Option<UseCapsFn<'_>>,
        partial: &mut Partial,
    ) -> Result<(SurfacePool, bool), FilterError> {
        partial.surfaces =
            backend.create_surfaces(fmt.width, fmt.height, OUTPUT_POOL_SIZE)?;
        let pool = SurfacePool::new(partial.surfaces.clone());

        partial.config = backend.create_config()?;

        partial.context =
            backend.create_context(partial.config, fmt.width, fmt.height, pool.surfaces())?;

        // Absence of the requested filter type is a hard failure, never a
        // fallback to another filter.
        if !backend.supports_filter(partial.context, filter)? {
            return Err(FilterError::Unsupported(format!(
                "driver does not expose the {filter:?} filter"
            )));
        }

        let params = init_params(backend.as_ref(), partial.context)?;
        partial.filter_buf = backend.create_filter_buffer(partial.context, &params)?;

        let caps = backend.query_pipeline_caps(partial.context, partial.filter_buf)?;
        let fast_pipeline = caps.fast_pipeline;

        if let Some(use_caps) = use_caps {
            use_caps(&caps)?;
        }

        Ok((pool, fast_pipeline))
    }

    pub fn backend(&self) -> &dyn VideoProcBackend {
        self.backend.as_ref()
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn filter_buffer(&self) -> BufferId {
        self.filter_buf
    }

    pub fn pool(&self) -> &SurfacePool {
        &self.pool
    }

    pub fn fast_pipeline(&self) -> bool {
        self.fast_pipeline
    }

    pub fn format(&self) -> &VideoFormat {
        &self.format
    }

    /// JSON snapshot for logging and diagnostics.
    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "backend": self.backend.name(),
            "filter": format!("{:?}", self.filter),
            "width": self.format.width,
            "height": self.format.height,
            "chroma": format!("{:?}", self.format.chroma),
            "pool_size": self.pool.capacity(),
            "fast_pipeline": self.fast_pipeline,
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Exact reverse of acquisition order.
        if self.filter_buf.is_valid() {
            self.backend.destroy_buffer(self.filter_buf);
        }
        if self.context.is_valid() {
            self.backend.destroy_context(self.context);
        }
        if self.config.is_valid() {
            self.backend.destroy_config(self.config);
        }
        if !self.surfaces.is_empty() {
            self.backend.destroy_surfaces(&self.surfaces);
        }
        tracing::debug!(filter = ?self.filter, "filter session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Chroma;
    use crate::mock::MockBackend;

    fn fmt() -> VideoFormat {
        VideoFormat::new(1920, 1080, Chroma::Nv12)
    }

    fn denoise_init(
        backend: &dyn VideoProcBackend,
        ctx: ContextId,
    ) -> Result<FilterParams, FilterError> {
        let range = backend.query_filter_range(ctx, FilterType::NoiseReduction)?;
        Ok(FilterParams::Value { filter: FilterType::NoiseReduction, value: range.default })
    }

    fn open_denoise(backend: &Arc<MockBackend>) -> Result<Session, FilterError> {
        let backend = Arc::clone(backend) as Arc<dyn VideoProcBackend>;
        Session::open(
            backend,
            FilterType::NoiseReduction,
            &fmt(),
            &fmt(),
            &mut denoise_init,
            None,
        )
    }

    #[test]
    fn open_acquires_in_order_and_close_reverses_it() {
        let backend = Arc::new(MockBackend::new());
        let session = open_denoise(&backend).unwrap();
        assert!(session.filter_buffer().is_valid());
        assert_eq!(session.pool().capacity(), OUTPUT_POOL_SIZE);
        drop(session);

        let log = backend.log();
        let open_ops: Vec<&str> = log.iter().map(|s| s.as_str()).take(6).collect();
        assert_eq!(
            open_ops,
            [
                "create_surfaces",
                "create_config",
                "create_context",
                "supports_filter",
                "query_filter_range",
                "create_filter_buffer",
            ]
        );
        let close_ops: Vec<&str> =
            log.iter().map(|s| s.as_str()).rev().take(4).rev().collect();
        assert_eq!(
            close_ops,
            ["destroy_buffer", "destroy_context", "destroy_config", "destroy_surfaces"]
        );
        assert_eq!(backend.live_surface_count(), 0);
        assert_eq!(backend.live_buffer_count(), 0);
    }

    #[test]
    fn format_mismatch_is_rejected_before_any_allocation() {
        let backend = Arc::new(MockBackend::new());
        let other = VideoFormat::new(1280, 720, Chroma::Nv12);
        let err = Session::open(
            Arc::clone(&backend) as Arc<dyn VideoProcBackend>,
            FilterType::NoiseReduction,
            &fmt(),
            &other,
            &mut denoise_init,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, FilterError::Unsupported(_)));
        assert!(backend.log().is_empty());
    }

    #[test]
    fn software_chroma_is_rejected() {
        let backend = Arc::new(MockBackend::new());
        let sw = VideoFormat::new(1920, 1080, Chroma::I420);
        let err = Session::open(
            Arc::clone(&backend) as Arc<dyn VideoProcBackend>,
            FilterType::NoiseReduction,
            &sw,
            &sw,
            &mut denoise_init,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, FilterError::Unsupported(_)));
        assert!(backend.log().is_empty());
    }

    #[test]
    fn context_failure_unwinds_surfaces_and_config() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_on("create_context");
        let err = open_denoise(&backend).unwrap_err();
        assert!(matches!(err, FilterError::Driver(_)));
        assert_eq!(backend.live_surface_count(), 0);
        assert_eq!(backend.live_buffer_count(), 0);

        let log = backend.log();
        let tail: Vec<&str> = log.iter().map(|s| s.as_str()).rev().take(2).rev().collect();
        assert_eq!(tail, ["destroy_config", "destroy_surfaces"]);
    }

    #[test]
    fn unsupported_filter_is_a_hard_failure() {
        let backend = Arc::new(MockBackend::new());
        backend.caps.lock().supported.retain(|f| *f != FilterType::NoiseReduction);
        let err = open_denoise(&backend).unwrap_err();
        assert!(matches!(err, FilterError::Unsupported(_)));
        assert_eq!(backend.live_surface_count(), 0);
    }

    #[test]
    fn pipeline_caps_failure_unwinds_the_filter_buffer_too() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_on("query_pipeline_caps");
        let err = open_denoise(&backend).unwrap_err();
        assert!(matches!(err, FilterError::Driver(_)));
        assert_eq!(backend.live_buffer_count(), 0);
        assert_eq!(backend.live_surface_count(), 0);
    }

    #[test]
    fn describe_reports_backend_and_pool() {
        let backend = Arc::new(MockBackend::new());
        let session = open_denoise(&backend).unwrap();
        let info = session.describe();
        assert_eq!(info["backend"], "mock");
        assert_eq!(info["pool_size"], OUTPUT_POOL_SIZE);
    }
}
