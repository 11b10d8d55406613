//! # Frame Pipeline Executor
//!
//! The per-frame submission protocol shared by every filter: acquire a
//! destination from the output pool, copy metadata, refresh the filter
//! parameter buffer, then build and submit a transient pipeline buffer
//! inside a begin/end rendering pass. All-or-nothing: a failure after
//! pool acquisition releases the destination and any pipeline buffer and
//! reports the driver error; no partial output is ever returned.

use std::time::Duration;

use crate::error::{DriverError, FilterError};
use crate::frame::Frame;
use crate::session::Session;
use crate::vaproc::{FilterParams, PipelineParams};

/// Per-filter specialization points of the execute protocol. A closed set
/// of implementors (adjust, basic, deinterlace); every method defaults to
/// a no-op.
pub trait FilterStage {
    /// Mutate the mapped filter-parameter values in place. This is where
    /// the latest sigma snapshot is read.
    fn update_params(&mut self, _params: &mut FilterParams) {}

    /// Runs after the rendering pass begins, before the pipeline buffer is
    /// built. Deinterlacing materializes its reference arrays here.
    fn prepare_surfaces(&mut self) {}

    /// Last chance to extend the pipeline descriptor (field flags,
    /// reference arrays) before submission.
    fn update_pipeline(&mut self, _pipeline: &mut PipelineParams) {}
}

/// Run one frame through the session's filter.
///
/// On success the returned destination frame is owned by the caller; the
/// executor keeps no reference to it. Source ownership is not taken - the
/// caller (or the deinterlace history) remains responsible for `src`.
pub fn run_pipeline(
    session: &Session,
    src: &Frame,
    stage: &mut dyn FilterStage,
) -> Result<Frame, FilterError> {
    let dest = session
        .pool()
        .try_acquire()
        .ok_or(FilterError::PoolExhausted)?;
    finish(session, src, dest, stage)
}

/// Like [`run_pipeline`], but waits up to `timeout` for a free output
/// surface instead of failing immediately. For callers that prefer
/// backpressure over a dropped frame.
pub fn run_pipeline_waiting(
    session: &Session,
    src: &Frame,
    stage: &mut dyn FilterStage,
    timeout: Duration,
) -> Result<Frame, FilterError> {
    let dest = session
        .pool()
        .acquire(timeout)
        .ok_or(FilterError::PoolExhausted)?;
    finish(session, src, dest, stage)
}

fn finish(
    session: &Session,
    src: &Frame,
    mut dest: Frame,
    stage: &mut dyn FilterStage,
) -> Result<Frame, FilterError> {
    dest.copy_meta_from(src);

    match submit(session, src, &dest, stage) {
        Ok(()) => Ok(dest),
        Err(err) => {
            // Dropping dest returns its surface to the pool.
            tracing::warn!(error = %err, pts = src.meta.pts_us, "frame dropped");
            Err(err.into())
        }
    }
}

fn submit(
    session: &Session,
    src: &Frame,
    dest: &Frame,
    stage: &mut dyn FilterStage,
) -> Result<(), DriverError> {
    let backend = session.backend();

    backend.edit_filter_params(session.filter_buffer(), &mut |params| {
        stage.update_params(params)
    })?;

    backend.begin_picture(session.context(), dest.surface())?;

    stage.prepare_surfaces();

    let mut pipeline = PipelineParams::default();
    pipeline.source = src.surface();
    pipeline.filters = vec![session.filter_buffer()];
    pipeline.fast = session.fast_pipeline();
    stage.update_pipeline(&mut pipeline);

    let pipeline_buf = backend.create_pipeline_buffer(session.context(), &pipeline)?;

    let submitted = backend
        .render_picture(session.context(), pipeline_buf)
        .and_then(|_| backend.end_picture(session.context()));

    // Transient by contract: the pipeline buffer never outlives the call.
    backend.destroy_buffer(pipeline_buf);

    submitted
}
