//! # Runtime Parameter Channel
//!
//! Interactive tuning path: a per-session dispatch table from control name
//! to the sigma parameter it mutates, built once at filter open from the
//! channels the hardware actually exposes. Writes are clamped, adapted,
//! mapped and stored atomically by the parameter itself; the rendering
//! path picks the new value up at the next parameter-buffer fill, with no
//! stronger ordering guarantee than that.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::FilterError;
use crate::sigma::SigmaParameter;

/// Name -> parameter dispatch table for one filter instance.
#[derive(Default)]
pub struct ControlSet {
    controls: HashMap<String, Arc<SigmaParameter>>,
}

impl ControlSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, param: Arc<SigmaParameter>) {
        self.controls.insert(name.into(), param);
    }

    /// Apply a control change. Fails if the name is unknown here, which
    /// covers both misspelled names and channels the hardware does not
    /// expose (those never enter the table).
    pub fn set(&self, name: &str, value: f32) -> Result<(), FilterError> {
        let param = self
            .controls
            .get(name)
            .ok_or_else(|| FilterError::UnknownControl(name.to_string()))?;
        param.set_normalized(value);
        tracing::debug!(control = name, value, "control updated");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.controls.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.controls.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }
}
