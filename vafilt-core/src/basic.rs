//! # Basic Filters (Denoise / Sharpen)
//!
//! One implementation behind two invocation names. A single sigma
//! parameter, direct affine mapping into the driver range, control name
//! derived from the invocation name plus a `-sigma` suffix.

use std::sync::Arc;

use crate::controls::ControlSet;
use crate::error::FilterError;
use crate::frame::{Frame, VideoFormat};
use crate::render::{run_pipeline, FilterStage};
use crate::session::Session;
use crate::sigma::{Range, SigmaParameter};
use crate::vaproc::{ContextId, FilterParams, FilterType, VideoProcBackend};

/// Which of the two single-sigma filters this instance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicKind {
    Denoise,
    Sharpen,
}

impl BasicKind {
    pub fn invocation_name(self) -> &'static str {
        match self {
            BasicKind::Denoise => "denoise",
            BasicKind::Sharpen => "sharpen",
        }
    }

    /// Invocation name plus the fixed `-sigma` suffix.
    pub fn control_name(self) -> &'static str {
        match self {
            BasicKind::Denoise => "denoise-sigma",
            BasicKind::Sharpen => "sharpen-sigma",
        }
    }

    fn filter_type(self) -> FilterType {
        match self {
            BasicKind::Denoise => FilterType::NoiseReduction,
            BasicKind::Sharpen => FilterType::Sharpening,
        }
    }

    fn control_range(self) -> Range {
        Range::new(0.0, 2.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BasicConfig {
    /// Initial normalized strength.
    pub sigma: f32,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self { sigma: 1.0 }
    }
}

/// Denoise or sharpen filter instance.
pub struct BasicFilter {
    kind: BasicKind,
    sigma: Arc<SigmaParameter>,
    session: Session,
}

impl BasicFilter {
    pub fn open(
        backend: Arc<dyn VideoProcBackend>,
        kind: BasicKind,
        in_fmt: &VideoFormat,
        out_fmt: &VideoFormat,
        config: &BasicConfig,
    ) -> Result<Self, FilterError> {
        let mut sigma_slot: Option<Arc<SigmaParameter>> = None;

        let session = {
            let slot = &mut sigma_slot;
            let mut init = |backend: &dyn VideoProcBackend,
                            ctx: ContextId|
             -> Result<FilterParams, FilterError> {
                let drv_range = backend.query_filter_range(ctx, kind.filter_type())?;
                let param = SigmaParameter::new(
                    kind.control_range(),
                    None,
                    drv_range.into(),
                    config.sigma,
                );
                let value = param.driver_value();
                *slot = Some(Arc::new(param));
                Ok(FilterParams::Value { filter: kind.filter_type(), value })
            };
            Session::open(backend, kind.filter_type(), in_fmt, out_fmt, &mut init, None)?
        };

        let sigma = sigma_slot.ok_or_else(|| {
            FilterError::Unsupported(format!(
                "{} parameters were not initialised",
                kind.invocation_name()
            ))
        })?;

        Ok(Self { kind, sigma, session })
    }

    pub fn kind(&self) -> BasicKind {
        self.kind
    }

    pub fn controls(&self) -> ControlSet {
        let mut set = ControlSet::new();
        set.insert(self.kind.control_name(), Arc::clone(&self.sigma));
        set
    }

    pub fn process(&mut self, src: Frame) -> Result<Frame, FilterError> {
        let mut stage = BasicStage { sigma: &self.sigma };
        run_pipeline(&self.session, &src, &mut stage)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

struct BasicStage<'a> {
    sigma: &'a SigmaParameter,
}

impl FilterStage for BasicStage<'_> {
    fn update_params(&mut self, params: &mut FilterParams) {
        if let FilterParams::Value { value, .. } = params {
            *value = self.sigma.driver_value();
        }
    }
}
