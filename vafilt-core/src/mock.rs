//! # In-Memory Mock Driver
//!
//! Test double for [`VideoProcBackend`]: allocates integer handles from a
//! counter, records every trait call by name, keeps buffer contents so
//! tests can inspect what was submitted, and supports one-shot failure
//! injection per operation name.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::DriverError;
use crate::vaproc::{
    BufferId, ColorBalanceCap, ColorBalanceMode, ConfigId, ContextId, DeintAlgorithm,
    FilterParams, FilterType, PipelineCaps, PipelineParams, SurfaceId, ValueRange,
    VideoProcBackend,
};

/// Capability surface the mock advertises; tests mutate it before open.
pub struct MockCaps {
    pub color_balance: Vec<ColorBalanceCap>,
    pub filter_ranges: HashMap<FilterType, ValueRange>,
    pub deint: Vec<DeintAlgorithm>,
    pub supported: Vec<FilterType>,
    pub pipeline: PipelineCaps,
}

impl Default for MockCaps {
    fn default() -> Self {
        let range = ValueRange { min: 0.0, max: 100.0, default: 50.0, step: 1.0 };
        let mut filter_ranges = HashMap::new();
        filter_ranges.insert(FilterType::NoiseReduction, range);
        filter_ranges.insert(FilterType::Sharpening, range);
        Self {
            color_balance: [
                ColorBalanceMode::Contrast,
                ColorBalanceMode::Brightness,
                ColorBalanceMode::Hue,
                ColorBalanceMode::Saturation,
            ]
            .iter()
            .map(|&mode| ColorBalanceCap { mode, range })
            .collect(),
            filter_ranges,
            deint: vec![
                DeintAlgorithm::MotionAdaptive,
                DeintAlgorithm::MotionCompensated,
                DeintAlgorithm::Bob,
                DeintAlgorithm::Weave,
            ],
            supported: vec![
                FilterType::ColorBalance,
                FilterType::NoiseReduction,
                FilterType::Sharpening,
                FilterType::Deinterlacing,
            ],
            pipeline: PipelineCaps {
                fast_pipeline: true,
                num_forward_references: 1,
                num_backward_references: 1,
            },
        }
    }
}

enum MockBuffer {
    Filter(FilterParams),
    Pipeline(PipelineParams),
}

/// One frame as seen by the driver at `render_picture`.
#[derive(Clone)]
pub struct Submission {
    pub pipeline: PipelineParams,
    pub filter_params: FilterParams,
    pub target: SurfaceId,
}

#[derive(Default)]
struct MockState {
    next_id: u32,
    live_surfaces: Vec<u32>,
    buffers: HashMap<u32, MockBuffer>,
    log: Vec<String>,
    fail: Option<&'static str>,
    begin_target: Option<SurfaceId>,
    submissions: Vec<Submission>,
    created: Vec<FilterParams>,
}

pub struct MockBackend {
    pub caps: Mutex<MockCaps>,
    state: Mutex<MockState>,
}

/// Opt-in log output for test runs, honoring `RUST_LOG`:
/// `RUST_LOG=vafilt_core=debug cargo test -- --nocapture`.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl MockBackend {
    pub fn new() -> Self {
        init_test_logging();
        Self { caps: Mutex::new(MockCaps::default()), state: Mutex::new(MockState::default()) }
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }

    /// Make the named operation fail until [`clear_fail`](Self::clear_fail).
    pub fn fail_on(&self, op: &'static str) {
        self.state.lock().fail = Some(op);
    }

    pub fn clear_fail(&self) {
        self.state.lock().fail = None;
    }

    pub fn live_surface_count(&self) -> usize {
        self.state.lock().live_surfaces.len()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Everything rendered so far, in submission order.
    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().submissions.clone()
    }

    /// Initial contents of every filter-parameter buffer, in creation order.
    pub fn created_filter_params(&self) -> Vec<FilterParams> {
        self.state.lock().created.clone()
    }

    /// Log the call; fail if injection targets it.
    fn enter(&self, op: &'static str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.log.push(op.to_string());
        if state.fail == Some(op) {
            return Err(DriverError::new(op, -1));
        }
        Ok(())
    }

    fn fresh_id(&self) -> u32 {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        id
    }
}

impl VideoProcBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn create_surfaces(
        &self,
        _width: u32,
        _height: u32,
        count: usize,
    ) -> Result<Vec<SurfaceId>, DriverError> {
        self.enter("create_surfaces")?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            let id = self.fresh_id();
            self.state.lock().live_surfaces.push(id);
            out.push(SurfaceId(id));
        }
        Ok(out)
    }

    fn destroy_surfaces(&self, surfaces: &[SurfaceId]) {
        let mut state = self.state.lock();
        state.log.push("destroy_surfaces".to_string());
        state
            .live_surfaces
            .retain(|id| !surfaces.iter().any(|s| s.0 == *id));
    }

    fn create_config(&self) -> Result<ConfigId, DriverError> {
        self.enter("create_config")?;
        Ok(ConfigId(self.fresh_id()))
    }

    fn destroy_config(&self, _config: ConfigId) {
        self.state.lock().log.push("destroy_config".to_string());
    }

    fn create_context(
        &self,
        _config: ConfigId,
        _width: u32,
        _height: u32,
        _targets: &[SurfaceId],
    ) -> Result<ContextId, DriverError> {
        self.enter("create_context")?;
        Ok(ContextId(self.fresh_id()))
    }

    fn destroy_context(&self, _context: ContextId) {
        self.state.lock().log.push("destroy_context".to_string());
    }

    fn supports_filter(
        &self,
        _context: ContextId,
        filter: FilterType,
    ) -> Result<bool, DriverError> {
        self.enter("supports_filter")?;
        Ok(self.caps.lock().supported.contains(&filter))
    }

    fn query_color_balance_caps(
        &self,
        _context: ContextId,
    ) -> Result<Vec<ColorBalanceCap>, DriverError> {
        self.enter("query_color_balance_caps")?;
        Ok(self.caps.lock().color_balance.clone())
    }

    fn query_filter_range(
        &self,
        _context: ContextId,
        filter: FilterType,
    ) -> Result<ValueRange, DriverError> {
        self.enter("query_filter_range")?;
        self.caps
            .lock()
            .filter_ranges
            .get(&filter)
            .copied()
            .ok_or_else(|| DriverError::new("query_filter_range", -2))
    }

    fn query_deint_caps(&self, _context: ContextId) -> Result<Vec<DeintAlgorithm>, DriverError> {
        self.enter("query_deint_caps")?;
        Ok(self.caps.lock().deint.clone())
    }

    fn create_filter_buffer(
        &self,
        _context: ContextId,
        params: &FilterParams,
    ) -> Result<BufferId, DriverError> {
        self.enter("create_filter_buffer")?;
        let id = self.fresh_id();
        let mut state = self.state.lock();
        state.created.push(params.clone());
        state.buffers.insert(id, MockBuffer::Filter(params.clone()));
        Ok(BufferId(id))
    }

    fn edit_filter_params(
        &self,
        buffer: BufferId,
        edit: &mut dyn FnMut(&mut FilterParams),
    ) -> Result<(), DriverError> {
        self.enter("edit_filter_params")?;
        let mut state = self.state.lock();
        match state.buffers.get_mut(&buffer.0) {
            Some(MockBuffer::Filter(params)) => {
                edit(params);
                Ok(())
            }
            _ => Err(DriverError::new("edit_filter_params", -2)),
        }
    }

    fn query_pipeline_caps(
        &self,
        _context: ContextId,
        _filter_buf: BufferId,
    ) -> Result<PipelineCaps, DriverError> {
        self.enter("query_pipeline_caps")?;
        Ok(self.caps.lock().pipeline)
    }

    fn begin_picture(&self, _context: ContextId, target: SurfaceId) -> Result<(), DriverError> {
        self.enter("begin_picture")?;
        self.state.lock().begin_target = Some(target);
        Ok(())
    }

    fn create_pipeline_buffer(
        &self,
        _context: ContextId,
        params: &PipelineParams,
    ) -> Result<BufferId, DriverError> {
        self.enter("create_pipeline_buffer")?;
        let id = self.fresh_id();
        self.state
            .lock()
            .buffers
            .insert(id, MockBuffer::Pipeline(params.clone()));
        Ok(BufferId(id))
    }

    fn render_picture(
        &self,
        _context: ContextId,
        pipeline_buf: BufferId,
    ) -> Result<(), DriverError> {
        self.enter("render_picture")?;
        let mut state = self.state.lock();
        let Some(MockBuffer::Pipeline(pipeline)) = state.buffers.get(&pipeline_buf.0) else {
            return Err(DriverError::new("render_picture", -2));
        };
        let pipeline = pipeline.clone();
        let filter_params = pipeline
            .filters
            .first()
            .and_then(|buf| match state.buffers.get(&buf.0) {
                Some(MockBuffer::Filter(params)) => Some(params.clone()),
                _ => None,
            })
            .ok_or_else(|| DriverError::new("render_picture", -3))?;
        let target = state
            .begin_target
            .ok_or_else(|| DriverError::new("render_picture", -4))?;
        state.submissions.push(Submission { pipeline, filter_params, target });
        Ok(())
    }

    fn end_picture(&self, _context: ContextId) -> Result<(), DriverError> {
        self.enter("end_picture")?;
        self.state.lock().begin_target = None;
        Ok(())
    }

    fn destroy_buffer(&self, buffer: BufferId) {
        let mut state = self.state.lock();
        state.log.push("destroy_buffer".to_string());
        state.buffers.remove(&buffer.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_injection_is_scoped_to_one_operation() {
        let mock = MockBackend::new();
        mock.fail_on("create_config");
        assert!(mock.create_surfaces(64, 64, 2).is_ok());
        assert!(mock.create_config().is_err());
        mock.clear_fail();
        assert!(mock.create_config().is_ok());
    }

    #[test]
    fn handle_accounting_tracks_live_resources() {
        let mock = MockBackend::new();
        let surfaces = mock.create_surfaces(64, 64, 3).unwrap();
        assert_eq!(mock.live_surface_count(), 3);
        mock.destroy_surfaces(&surfaces);
        assert_eq!(mock.live_surface_count(), 0);

        let ctx = ContextId(0);
        let buf = mock
            .create_filter_buffer(
                ctx,
                &FilterParams::Value { filter: FilterType::Sharpening, value: 1.0 },
            )
            .unwrap();
        assert_eq!(mock.live_buffer_count(), 1);
        mock.destroy_buffer(buf);
        assert_eq!(mock.live_buffer_count(), 0);
    }
}
