//! # Adjust Filter
//!
//! Multi-channel color balance: contrast, brightness, hue and saturation,
//! each an independent sigma parameter, each present only if the hardware
//! exposes the channel. The driver parameter buffer always holds exactly
//! one entry per available channel, enumerated in a fixed order.
//!
//! Contrast and saturation pass through a perceptual compression of the
//! normalized range before the affine driver mapping, matching the
//! reference software adjust filter's scale.

use std::sync::Arc;

use crate::controls::ControlSet;
use crate::error::FilterError;
use crate::frame::{Frame, VideoFormat};
use crate::render::{run_pipeline, FilterStage};
use crate::session::Session;
use crate::sigma::{Range, SigmaParameter};
use crate::vaproc::{
    ColorBalanceMode, ColorBalanceParam, ContextId, FilterParams, FilterType, VideoProcBackend,
};

const NUM_CHANNELS: usize = 4;

struct ChannelSpec {
    mode: ColorBalanceMode,
    name: &'static str,
    control_range: Range,
    adapt_range: Option<Range>,
}

/// Stable enumeration order; the parameter buffer follows it.
const CHANNELS: [ChannelSpec; NUM_CHANNELS] = [
    ChannelSpec {
        mode: ColorBalanceMode::Contrast,
        name: "contrast",
        control_range: Range::new(0.0, 2.0),
        adapt_range: Some(Range::new(0.0, 0.35)),
    },
    ChannelSpec {
        mode: ColorBalanceMode::Brightness,
        name: "brightness",
        control_range: Range::new(0.0, 2.0),
        adapt_range: None,
    },
    ChannelSpec {
        mode: ColorBalanceMode::Hue,
        name: "hue",
        control_range: Range::new(-180.0, 180.0),
        adapt_range: None,
    },
    ChannelSpec {
        mode: ColorBalanceMode::Saturation,
        name: "saturation",
        control_range: Range::new(0.0, 3.0),
        adapt_range: Some(Range::new(0.0, 1.0)),
    },
];

/// Initial normalized values, typically inherited from the host
/// configuration store.
#[derive(Debug, Clone, Copy)]
pub struct AdjustConfig {
    pub contrast: f32,
    pub brightness: f32,
    pub hue: f32,
    pub saturation: f32,
}

impl Default for AdjustConfig {
    fn default() -> Self {
        Self { contrast: 1.0, brightness: 1.0, hue: 0.0, saturation: 1.0 }
    }
}

impl AdjustConfig {
    fn value(&self, index: usize) -> f32 {
        match index {
            0 => self.contrast,
            1 => self.brightness,
            2 => self.hue,
            _ => self.saturation,
        }
    }
}

/// Color balance filter instance.
pub struct AdjustFilter {
    sigma: [Option<Arc<SigmaParameter>>; NUM_CHANNELS],
    session: Session,
}

impl AdjustFilter {
    pub fn open(
        backend: Arc<dyn VideoProcBackend>,
        in_fmt: &VideoFormat,
        out_fmt: &VideoFormat,
        config: &AdjustConfig,
    ) -> Result<Self, FilterError> {
        let mut sigma: [Option<Arc<SigmaParameter>>; NUM_CHANNELS] = Default::default();

        let session = {
            let sigma = &mut sigma;
            let mut init = |backend: &dyn VideoProcBackend,
                            ctx: ContextId|
             -> Result<FilterParams, FilterError> {
                let caps = backend.query_color_balance_caps(ctx)?;
                let mut entries = Vec::new();
                for (i, channel) in CHANNELS.iter().enumerate() {
                    // Channels the hardware does not report are silently
                    // omitted from state and buffer alike.
                    let Some(cap) = caps.iter().find(|c| c.mode == channel.mode) else {
                        continue;
                    };
                    let param = SigmaParameter::new(
                        channel.control_range,
                        channel.adapt_range,
                        cap.range.into(),
                        config.value(i),
                    );
                    entries.push(ColorBalanceParam {
                        mode: channel.mode,
                        value: param.driver_value(),
                    });
                    sigma[i] = Some(Arc::new(param));
                }
                tracing::debug!(channels = entries.len(), "color balance channels available");
                Ok(FilterParams::ColorBalance(entries))
            };
            Session::open(
                backend,
                FilterType::ColorBalance,
                in_fmt,
                out_fmt,
                &mut init,
                None,
            )?
        };

        Ok(Self { sigma, session })
    }

    /// Dispatch table over the available channels, by canonical name.
    pub fn controls(&self) -> ControlSet {
        let mut set = ControlSet::new();
        for (i, channel) in CHANNELS.iter().enumerate() {
            if let Some(param) = &self.sigma[i] {
                set.insert(channel.name, Arc::clone(param));
            }
        }
        set
    }

    /// Filter one frame. Source ownership is consumed; the returned
    /// destination belongs to the caller.
    pub fn process(&mut self, src: Frame) -> Result<Frame, FilterError> {
        let mut stage = AdjustStage { sigma: &self.sigma };
        run_pipeline(&self.session, &src, &mut stage)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

struct AdjustStage<'a> {
    sigma: &'a [Option<Arc<SigmaParameter>>; NUM_CHANNELS],
}

impl FilterStage for AdjustStage<'_> {
    fn update_params(&mut self, params: &mut FilterParams) {
        let FilterParams::ColorBalance(entries) = params else {
            return;
        };
        // One entry per available channel, in the fixed channel order.
        let mut entries = entries.iter_mut();
        for param in self.sigma.iter().flatten() {
            if let Some(entry) = entries.next() {
                entry.value = param.driver_value();
            }
        }
    }
}
