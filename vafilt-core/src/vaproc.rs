//! # Video-Processing Driver Boundary
//!
//! Everything the filter core asks of the acceleration driver, expressed
//! as opaque handles plus one trait. Handles are driver-assigned integer
//! identifiers validated against an explicit invalid sentinel; a session
//! is usable only while every required handle is valid.
//!
//! The production implementation lives in [`crate::libva`]; tests run
//! against an in-memory mock.

use serde::{Deserialize, Serialize};

use crate::error::DriverError;

const INVALID_ID: u32 = u32::MAX;

/// Driver identifier of a device-resident image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u32);

/// Driver identifier of a video-processing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigId(pub u32);

/// Driver identifier of an execution context bound to output surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u32);

/// Driver identifier of a parameter or pipeline buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

macro_rules! impl_handle {
    ($name:ident) => {
        impl $name {
            pub const INVALID: $name = $name(INVALID_ID);

            pub fn is_valid(self) -> bool {
                self.0 != INVALID_ID
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }
    };
}

impl_handle!(SurfaceId);
impl_handle!(ConfigId);
impl_handle!(ContextId);
impl_handle!(BufferId);

/// Driver-reported value range for one filter capability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub step: f32,
}

/// Video-processing filter stages this core drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterType {
    ColorBalance,
    NoiseReduction,
    Sharpening,
    Deinterlacing,
}

/// Color balance channels, in the driver's enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorBalanceMode {
    Contrast,
    Brightness,
    Hue,
    Saturation,
}

/// Hardware deinterlacing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeintAlgorithm {
    MotionAdaptive,
    MotionCompensated,
    Bob,
    Weave,
}

/// One supported color balance channel and its native range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorBalanceCap {
    pub mode: ColorBalanceMode,
    pub range: ValueRange,
}

/// Result of the pipeline capability query made at session open.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PipelineCaps {
    /// Hardware supports the accelerated single-filter pipeline.
    pub fast_pipeline: bool,
    /// Reference-frame capacities consumed by temporal filters.
    pub num_forward_references: u32,
    pub num_backward_references: u32,
}

/// One entry of a color balance parameter buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorBalanceParam {
    pub mode: ColorBalanceMode,
    pub value: f32,
}

/// Contents of a session's filter-parameter buffer. The variant is fixed
/// at buffer creation; per-frame updates mutate only the values.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterParams {
    /// Sized exactly to the hardware-available channels, in a stable order.
    ColorBalance(Vec<ColorBalanceParam>),
    /// Single-sigma filters (denoise, sharpen).
    Value { filter: FilterType, value: f32 },
    /// Deinterlacing algorithm selection; field flags travel in the
    /// pipeline buffer instead.
    Deinterlacing { algorithm: DeintAlgorithm },
}

impl FilterParams {
    /// Number of driver parameter entries this buffer holds.
    pub fn num_entries(&self) -> usize {
        match self {
            FilterParams::ColorBalance(entries) => entries.len(),
            FilterParams::Value { .. } | FilterParams::Deinterlacing { .. } => 1,
        }
    }
}

/// Field order submitted with an interlaced source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldOrder {
    #[default]
    TopFieldFirst,
    BottomFieldFirst,
}

/// Transient per-frame pipeline descriptor: one source surface, the
/// session's filter-parameter buffer, and the reference arrays for
/// temporal filters. Created zeroed, filled, submitted, destroyed within
/// one frame.
#[derive(Debug, Clone, Default)]
pub struct PipelineParams {
    pub source: SurfaceId,
    pub filters: Vec<BufferId>,
    pub fast: bool,
    pub field_order: FieldOrder,
    pub forward_references: Vec<SurfaceId>,
    pub backward_references: Vec<SurfaceId>,
}

/// The protocol this core imposes on the acceleration driver.
///
/// Implementations wrap one device/display; sessions borrow it through an
/// `Arc` and never outlive it. Destroy operations are infallible by
/// contract so teardown can run on every failure path.
pub trait VideoProcBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn create_surfaces(
        &self,
        width: u32,
        height: u32,
        count: usize,
    ) -> Result<Vec<SurfaceId>, DriverError>;
    fn destroy_surfaces(&self, surfaces: &[SurfaceId]);

    fn create_config(&self) -> Result<ConfigId, DriverError>;
    fn destroy_config(&self, config: ConfigId);

    fn create_context(
        &self,
        config: ConfigId,
        width: u32,
        height: u32,
        targets: &[SurfaceId],
    ) -> Result<ContextId, DriverError>;
    fn destroy_context(&self, context: ContextId);

    /// Whether the context's video-processing entry point exposes `filter`.
    fn supports_filter(&self, context: ContextId, filter: FilterType)
        -> Result<bool, DriverError>;

    fn query_color_balance_caps(
        &self,
        context: ContextId,
    ) -> Result<Vec<ColorBalanceCap>, DriverError>;

    /// Native value range of a single-capability filter.
    fn query_filter_range(
        &self,
        context: ContextId,
        filter: FilterType,
    ) -> Result<ValueRange, DriverError>;

    fn query_deint_caps(&self, context: ContextId) -> Result<Vec<DeintAlgorithm>, DriverError>;

    fn create_filter_buffer(
        &self,
        context: ContextId,
        params: &FilterParams,
    ) -> Result<BufferId, DriverError>;

    /// Map the filter-parameter buffer for writing, hand the contents to
    /// `edit`, unmap. The map/unmap pair never outlives this call.
    fn edit_filter_params(
        &self,
        buffer: BufferId,
        edit: &mut dyn FnMut(&mut FilterParams),
    ) -> Result<(), DriverError>;

    fn query_pipeline_caps(
        &self,
        context: ContextId,
        filter_buf: BufferId,
    ) -> Result<PipelineCaps, DriverError>;

    fn begin_picture(&self, context: ContextId, target: SurfaceId) -> Result<(), DriverError>;

    fn create_pipeline_buffer(
        &self,
        context: ContextId,
        params: &PipelineParams,
    ) -> Result<BufferId, DriverError>;

    fn render_picture(&self, context: ContextId, pipeline_buf: BufferId)
        -> Result<(), DriverError>;

    fn end_picture(&self, context: ContextId) -> Result<(), DriverError>;

    fn destroy_buffer(&self, buffer: BufferId);
}
