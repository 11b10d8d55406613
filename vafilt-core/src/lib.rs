//! # VAFILT Core
//!
//! Hardware-accelerated video post-processing filters on top of the
//! VA-API video-processing entry point: color balance, denoise, sharpen
//! and deinterlace, with pooled output surfaces and lock-free runtime
//! parameter updates.

// ============================================================================
// Driver Boundary
// ============================================================================
pub mod error;
pub mod vaproc;

#[cfg(target_os = "linux")]
pub mod libva;

// ============================================================================
// Frames / Surfaces
// ============================================================================
pub mod frame;
pub mod pool;

// ============================================================================
// Session / Execution
// ============================================================================
pub mod render;
pub mod session;

// ============================================================================
// Parameters / Controls
// ============================================================================
pub mod controls;
pub mod sigma;

// ============================================================================
// Filters
// ============================================================================
pub mod adjust;
pub mod basic;
pub mod deinterlace;

// ============================================================================
// Test Support
// ============================================================================
#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Version
// ============================================================================
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
