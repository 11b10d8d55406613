//! # Deinterlace Filter
//!
//! Temporal filter driving the hardware deinterlacer. Keeps a fixed-size
//! sliding window of recently submitted frames sized by the driver's
//! reference-frame capacities (`backward + 1 + forward`); until the
//! window fills, frames are buffered and no output is produced. Once
//! steady, every submission evicts and releases exactly one frame, and
//! the forward/backward reference-surface arrays are rebuilt around the
//! fixed "current" position for each rendering pass.
//!
//! Unlike the other filters, this one owns its source frames for as long
//! as they sit in the window.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::FilterError;
use crate::frame::{Frame, VideoFormat};
use crate::render::{run_pipeline, FilterStage};
use crate::session::Session;
use crate::vaproc::{
    ContextId, DeintAlgorithm, FieldOrder, FilterParams, FilterType, PipelineCaps,
    PipelineParams, SurfaceId, VideoProcBackend,
};

struct ModeEntry {
    name: &'static str,
    algorithm: DeintAlgorithm,
}

/// Selection table, in fallback preference order. The two motion-based
/// algorithms intentionally share the "x" name (first match wins), kept
/// for compatibility with the historical control surface.
const DEINT_MODES: [ModeEntry; 4] = [
    ModeEntry { name: "x", algorithm: DeintAlgorithm::MotionAdaptive },
    ModeEntry { name: "x", algorithm: DeintAlgorithm::MotionCompensated },
    ModeEntry { name: "bob", algorithm: DeintAlgorithm::Bob },
    ModeEntry { name: "mean", algorithm: DeintAlgorithm::Weave },
];

#[derive(Debug, Clone, Default)]
pub struct DeinterlaceConfig {
    /// Requested algorithm name; `None` or `"auto"` picks the first
    /// supported entry of the preference table.
    pub mode: Option<String>,
}

/// Sliding window over recently submitted frames, oldest first. The
/// "current" frame sits at a fixed offset equal to the forward-reference
/// count.
pub struct History {
    frames: VecDeque<Frame>,
    capacity: usize,
    current: usize,
}

impl History {
    pub fn new(forward: usize, backward: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            capacity: backward + 1 + forward,
            current: forward,
        }
    }

    /// Admit a frame, evicting (and thereby releasing) the oldest one
    /// first if the window is full.
    pub fn push(&mut self, frame: Frame) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// Full window: every push from now on yields exactly one output.
    pub fn is_steady(&self) -> bool {
        self.frames.len() == self.capacity
    }

    pub fn current(&self) -> Option<&Frame> {
        self.frames.get(self.current)
    }

    /// Older-than-current surfaces, closest to current first.
    pub fn forward_surfaces(&self, out: &mut Vec<SurfaceId>) {
        out.clear();
        for i in 0..self.current {
            let idx = self.current - 1 - i;
            if let Some(frame) = self.frames.get(idx) {
                out.push(frame.surface());
            }
        }
    }

    /// Newer-than-current surfaces, closest to current first.
    pub fn backward_surfaces(&self, out: &mut Vec<SurfaceId>) {
        out.clear();
        for i in 0..self.capacity - self.current - 1 {
            let idx = self.current + 1 + i;
            if let Some(frame) = self.frames.get(idx) {
                out.push(frame.surface());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Pick the algorithm at open time. An explicitly requested name that the
/// hardware supports wins; otherwise fall back through the preference
/// table, logging whether this was a fallback or a default selection.
fn select_algorithm(
    requested: Option<&str>,
    caps: &[DeintAlgorithm],
) -> Result<DeintAlgorithm, FilterError> {
    if let Some(name) = requested {
        for mode in &DEINT_MODES {
            if mode.name == name && caps.contains(&mode.algorithm) {
                tracing::debug!(mode = mode.name, "using requested deinterlace method");
                return Ok(mode.algorithm);
            }
        }
    }

    for mode in &DEINT_MODES {
        if caps.contains(&mode.algorithm) {
            match requested {
                Some(name) => tracing::info!(
                    requested = name,
                    fallback = mode.name,
                    "requested deinterlace algorithm not available, falling back"
                ),
                None => tracing::debug!(mode = mode.name, "using default deinterlace method"),
            }
            return Ok(mode.algorithm);
        }
    }

    // Upstream capability negotiation should make this unreachable: a
    // driver advertising the deinterlace filter reports at least one
    // algorithm. Fail explicitly rather than proceed with no algorithm.
    tracing::error!("no deinterlacing algorithm available");
    Err(FilterError::Unsupported(
        "no deinterlacing algorithm available".into(),
    ))
}

/// Hardware deinterlacer instance.
///
/// Field order: `history` precedes `session` so buffered frames are
/// released before the session tears down the driver context.
pub struct DeinterlaceFilter {
    history: History,
    forward: Vec<SurfaceId>,
    backward: Vec<SurfaceId>,
    session: Session,
}

impl std::fmt::Debug for DeinterlaceFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeinterlaceFilter")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl DeinterlaceFilter {
    pub fn open(
        backend: Arc<dyn VideoProcBackend>,
        in_fmt: &VideoFormat,
        out_fmt: &VideoFormat,
        config: &DeinterlaceConfig,
    ) -> Result<Self, FilterError> {
        let requested = config.mode.as_deref().filter(|m| *m != "auto");
        let mut history_slot: Option<History> = None;

        let session = {
            let slot = &mut history_slot;
            let mut init = |backend: &dyn VideoProcBackend,
                            ctx: ContextId|
             -> Result<FilterParams, FilterError> {
                let caps = backend.query_deint_caps(ctx)?;
                let algorithm = select_algorithm(requested, &caps)?;
                Ok(FilterParams::Deinterlacing { algorithm })
            };
            let mut use_caps = |caps: &PipelineCaps| -> Result<(), FilterError> {
                *slot = Some(History::new(
                    caps.num_forward_references as usize,
                    caps.num_backward_references as usize,
                ));
                Ok(())
            };
            Session::open(
                backend,
                FilterType::Deinterlacing,
                in_fmt,
                out_fmt,
                &mut init,
                Some(&mut use_caps),
            )?
        };

        let history = history_slot.ok_or_else(|| {
            FilterError::Unsupported("deinterlace history was not initialised".into())
        })?;
        tracing::debug!(
            window = history.capacity(),
            "deinterlace reference window sized"
        );

        Ok(Self { history, forward: Vec::new(), backward: Vec::new(), session })
    }

    /// Submit one source frame. Returns `None` while the reference window
    /// is still filling; once steady, returns one progressive output per
    /// submission. The source frame is retained in the window; the oldest
    /// buffered frame is released on each steady-state push.
    pub fn process(&mut self, src: Frame) -> Result<Option<Frame>, FilterError> {
        self.history.push(src);
        if !self.history.is_steady() {
            return Ok(None);
        }

        let Self { history, forward, backward, session } = self;
        let Some(current) = history.current() else {
            return Ok(None);
        };

        let mut stage = DeintStage {
            history,
            forward,
            backward,
            top_field_first: current.meta.top_field_first,
        };
        let mut dest = run_pipeline(session, current, &mut stage)?;

        // Interlacing has been removed from the output.
        dest.meta.interlaced = false;
        Ok(Some(dest))
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

struct DeintStage<'a> {
    history: &'a History,
    forward: &'a mut Vec<SurfaceId>,
    backward: &'a mut Vec<SurfaceId>,
    top_field_first: bool,
}

impl FilterStage for DeintStage<'_> {
    fn prepare_surfaces(&mut self) {
        self.history.forward_surfaces(self.forward);
        self.history.backward_surfaces(self.backward);
    }

    fn update_pipeline(&mut self, pipeline: &mut PipelineParams) {
        pipeline.field_order = if self.top_field_first {
            FieldOrder::TopFieldFirst
        } else {
            FieldOrder::BottomFieldFirst
        };
        pipeline.forward_references = self.forward.clone();
        pipeline.backward_references = self.backward.clone();
    }
}
