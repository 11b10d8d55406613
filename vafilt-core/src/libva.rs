// LIBVA BACKEND - VA-API Video Processing (Linux)
//
// Production implementation of the driver boundary on top of the VA-API
// video-processing entry point. Loads libva.so at runtime - no
// compile-time dependency - and talks to whatever driver backs the DRM
// render node (Intel, AMD, NVIDIA with nouveau).
//
// Pipeline:
// 1. Load libva and libva-drm
// 2. Open DRM render node, initialize the VA display
// 3. Create a VideoProc config/context pair per filter session
// 4. Query filter and pipeline capabilities
// 5. Submit per-frame pipeline buffers

use std::collections::HashMap;
use std::ffi::c_void;
use std::os::raw::{c_char, c_int, c_uint};
use std::ptr;
use std::sync::OnceLock;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, FilterError};
use crate::vaproc::{
    BufferId, ColorBalanceCap, ColorBalanceMode, ConfigId, ContextId, DeintAlgorithm,
    FieldOrder, FilterParams, FilterType, PipelineCaps, PipelineParams, SurfaceId, ValueRange,
    VideoProcBackend,
};

// ============================================================================
// VA-API Types (from va/va.h, va/va_vpp.h)
// ============================================================================

type VAStatus = c_int;
type VADisplay = *mut c_void;
type VAConfigID = c_uint;
type VAContextID = c_uint;
type VASurfaceID = c_uint;
type VABufferID = c_uint;
type VAProfile = c_int;
type VAEntrypoint = c_int;

const VA_STATUS_SUCCESS: VAStatus = 0;

const VA_PROFILE_NONE: VAProfile = -1;
const VA_ENTRYPOINT_VIDEO_PROC: VAEntrypoint = 10;

const VA_RT_FORMAT_YUV420: c_uint = 0x0000_0001;

// Buffer types
const VA_PROC_PIPELINE_PARAMETER_BUFFER_TYPE: c_int = 41;
const VA_PROC_FILTER_PARAMETER_BUFFER_TYPE: c_int = 42;

// VAProcFilterType
const VA_PROC_FILTER_NOISE_REDUCTION: c_int = 1;
const VA_PROC_FILTER_DEINTERLACING: c_int = 2;
const VA_PROC_FILTER_SHARPENING: c_int = 3;
const VA_PROC_FILTER_COLOR_BALANCE: c_int = 4;
// VAProcFilterCount; the query array must span the whole enum or drivers
// advertising more filters fail with MAX_NUM_EXCEEDED.
const VA_PROC_FILTER_COUNT: usize = 10;

// VAProcColorBalanceType
const VA_PROC_COLOR_BALANCE_NONE: c_int = 0;
const VA_PROC_COLOR_BALANCE_HUE: c_int = 1;
const VA_PROC_COLOR_BALANCE_SATURATION: c_int = 2;
const VA_PROC_COLOR_BALANCE_BRIGHTNESS: c_int = 3;
const VA_PROC_COLOR_BALANCE_CONTRAST: c_int = 4;
const VA_PROC_COLOR_BALANCE_COUNT: usize = 10;

// VAProcDeinterlacingType
const VA_PROC_DEINTERLACING_BOB: c_int = 1;
const VA_PROC_DEINTERLACING_WEAVE: c_int = 2;
const VA_PROC_DEINTERLACING_MOTION_ADAPTIVE: c_int = 3;
const VA_PROC_DEINTERLACING_MOTION_COMPENSATED: c_int = 4;
const VA_PROC_DEINTERLACING_COUNT: usize = 6;

// Pipeline filter flags
const VA_FRAME_PICTURE: c_uint = 0x0000_0000;
const VA_BOTTOM_FIELD: c_uint = 0x0000_0002;
const VA_PROC_PIPELINE_FAST: c_uint = 0x0000_0002;

// ============================================================================
// VA-API Structures
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct VAProcFilterValueRange {
    min_value: f32,
    max_value: f32,
    default_value: f32,
    step: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct VAProcFilterCap {
    filter_type: c_int,
    range: VAProcFilterValueRange,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct VAProcFilterCapColorBalance {
    attrib: c_int,
    range: VAProcFilterValueRange,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct VAProcFilterCapDeinterlacing {
    algorithm: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct VAProcFilterParameterBuffer {
    filter_type: c_int,
    value: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct VAProcFilterParameterBufferColorBalance {
    filter_type: c_int,
    attrib: c_int,
    value: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct VAProcFilterParameterBufferDeinterlacing {
    filter_type: c_int,
    algorithm: c_int,
    flags: c_uint,
}

/// Leading fields of VAProcPipelineParameterBuffer; the reserved tail pads
/// the struct out to at least the header's size so vaCreateBuffer copies a
/// full element.
#[repr(C)]
struct VAProcPipelineParameterBuffer {
    surface: VASurfaceID,
    surface_region: *const c_void,
    surface_color_standard: c_int,
    output_region: *const c_void,
    output_background_color: c_uint,
    output_color_standard: c_int,
    pipeline_flags: c_uint,
    filter_flags: c_uint,
    filters: *const VABufferID,
    num_filters: c_uint,
    forward_references: *const VASurfaceID,
    num_forward_references: c_uint,
    backward_references: *const VASurfaceID,
    num_backward_references: c_uint,
    va_reserved: [c_uint; 32],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct VAProcPipelineCaps {
    pipeline_flags: c_uint,
    filter_flags: c_uint,
    num_forward_references: c_uint,
    num_backward_references: c_uint,
    va_reserved: [c_uint; 32],
}

impl Default for VAProcPipelineCaps {
    fn default() -> Self {
        unsafe { std::mem::zeroed() }
    }
}

// ============================================================================
// Library Path Detection
// ============================================================================

fn get_libva_path() -> &'static str {
    for path in &[
        "libva.so.2",
        "/usr/lib/x86_64-linux-gnu/libva.so.2",
        "/usr/lib/libva.so.2",
        "/usr/lib64/libva.so.2",
    ] {
        if std::path::Path::new(path).exists() || !path.contains('/') {
            return path;
        }
    }
    "libva.so.2"
}

fn get_libva_drm_path() -> &'static str {
    for path in &[
        "libva-drm.so.2",
        "/usr/lib/x86_64-linux-gnu/libva-drm.so.2",
        "/usr/lib/libva-drm.so.2",
        "/usr/lib64/libva-drm.so.2",
    ] {
        if std::path::Path::new(path).exists() || !path.contains('/') {
            return path;
        }
    }
    "libva-drm.so.2"
}

// ============================================================================
// Function Types
// ============================================================================

type VaGetDisplayDrmFn = unsafe extern "C" fn(c_int) -> VADisplay;
type VaInitializeFn = unsafe extern "C" fn(VADisplay, *mut c_int, *mut c_int) -> VAStatus;
type VaTerminateFn = unsafe extern "C" fn(VADisplay) -> VAStatus;
type VaCreateConfigFn = unsafe extern "C" fn(VADisplay, VAProfile, VAEntrypoint, *mut c_void, c_int, *mut VAConfigID) -> VAStatus;
type VaDestroyConfigFn = unsafe extern "C" fn(VADisplay, VAConfigID) -> VAStatus;
type VaCreateSurfacesFn = unsafe extern "C" fn(VADisplay, c_uint, c_uint, c_uint, *mut VASurfaceID, c_uint, *mut c_void, c_uint) -> VAStatus;
type VaDestroySurfacesFn = unsafe extern "C" fn(VADisplay, *mut VASurfaceID, c_int) -> VAStatus;
type VaCreateContextFn = unsafe extern "C" fn(VADisplay, VAConfigID, c_int, c_int, c_int, *mut VASurfaceID, c_int, *mut VAContextID) -> VAStatus;
type VaDestroyContextFn = unsafe extern "C" fn(VADisplay, VAContextID) -> VAStatus;
type VaQueryVideoProcFiltersFn = unsafe extern "C" fn(VADisplay, VAContextID, *mut c_int, *mut c_uint) -> VAStatus;
type VaQueryVideoProcFilterCapsFn = unsafe extern "C" fn(VADisplay, VAContextID, c_int, *mut c_void, *mut c_uint) -> VAStatus;
type VaQueryVideoProcPipelineCapsFn = unsafe extern "C" fn(VADisplay, VAContextID, *mut VABufferID, c_uint, *mut VAProcPipelineCaps) -> VAStatus;
type VaCreateBufferFn = unsafe extern "C" fn(VADisplay, VAContextID, c_int, c_uint, c_uint, *mut c_void, *mut VABufferID) -> VAStatus;
type VaDestroyBufferFn = unsafe extern "C" fn(VADisplay, VABufferID) -> VAStatus;
type VaMapBufferFn = unsafe extern "C" fn(VADisplay, VABufferID, *mut *mut c_void) -> VAStatus;
type VaUnmapBufferFn = unsafe extern "C" fn(VADisplay, VABufferID) -> VAStatus;
type VaBeginPictureFn = unsafe extern "C" fn(VADisplay, VAContextID, VASurfaceID) -> VAStatus;
type VaRenderPictureFn = unsafe extern "C" fn(VADisplay, VAContextID, *mut VABufferID, c_int) -> VAStatus;
type VaEndPictureFn = unsafe extern "C" fn(VADisplay, VAContextID) -> VAStatus;

// ============================================================================
// Loaded Functions Container
// ============================================================================

struct VaLibrary {
    _libva: libloading::Library,
    _libva_drm: libloading::Library,

    va_get_display_drm: VaGetDisplayDrmFn,
    va_initialize: VaInitializeFn,
    va_terminate: VaTerminateFn,
    va_create_config: VaCreateConfigFn,
    va_destroy_config: VaDestroyConfigFn,
    va_create_surfaces: VaCreateSurfacesFn,
    va_destroy_surfaces: VaDestroySurfacesFn,
    va_create_context: VaCreateContextFn,
    va_destroy_context: VaDestroyContextFn,
    va_query_video_proc_filters: VaQueryVideoProcFiltersFn,
    va_query_video_proc_filter_caps: VaQueryVideoProcFilterCapsFn,
    va_query_video_proc_pipeline_caps: VaQueryVideoProcPipelineCapsFn,
    va_create_buffer: VaCreateBufferFn,
    va_destroy_buffer: VaDestroyBufferFn,
    va_map_buffer: VaMapBufferFn,
    va_unmap_buffer: VaUnmapBufferFn,
    va_begin_picture: VaBeginPictureFn,
    va_render_picture: VaRenderPictureFn,
    va_end_picture: VaEndPictureFn,
}

unsafe impl Send for VaLibrary {}
unsafe impl Sync for VaLibrary {}

static VA_LIB: OnceLock<Option<VaLibrary>> = OnceLock::new();

fn load_va_library() -> Option<&'static VaLibrary> {
    VA_LIB
        .get_or_init(|| unsafe {
            let libva = match libloading::Library::new(get_libva_path()) {
                Ok(lib) => lib,
                Err(e) => {
                    tracing::warn!("Failed to load libva: {}", e);
                    return None;
                }
            };
            let libva_drm = match libloading::Library::new(get_libva_drm_path()) {
                Ok(lib) => lib,
                Err(e) => {
                    tracing::warn!("Failed to load libva-drm: {}", e);
                    return None;
                }
            };

            let va_initialize: VaInitializeFn = *libva.get(b"vaInitialize\0").ok()?;
            let va_terminate: VaTerminateFn = *libva.get(b"vaTerminate\0").ok()?;
            let va_create_config: VaCreateConfigFn = *libva.get(b"vaCreateConfig\0").ok()?;
            let va_destroy_config: VaDestroyConfigFn = *libva.get(b"vaDestroyConfig\0").ok()?;
            let va_create_surfaces: VaCreateSurfacesFn = *libva.get(b"vaCreateSurfaces\0").ok()?;
            let va_destroy_surfaces: VaDestroySurfacesFn =
                *libva.get(b"vaDestroySurfaces\0").ok()?;
            let va_create_context: VaCreateContextFn = *libva.get(b"vaCreateContext\0").ok()?;
            let va_destroy_context: VaDestroyContextFn =
                *libva.get(b"vaDestroyContext\0").ok()?;
            let va_query_video_proc_filters: VaQueryVideoProcFiltersFn =
                *libva.get(b"vaQueryVideoProcFilters\0").ok()?;
            let va_query_video_proc_filter_caps: VaQueryVideoProcFilterCapsFn =
                *libva.get(b"vaQueryVideoProcFilterCaps\0").ok()?;
            let va_query_video_proc_pipeline_caps: VaQueryVideoProcPipelineCapsFn =
                *libva.get(b"vaQueryVideoProcPipelineCaps\0").ok()?;
            let va_create_buffer: VaCreateBufferFn = *libva.get(b"vaCreateBuffer\0").ok()?;
            let va_destroy_buffer: VaDestroyBufferFn = *libva.get(b"vaDestroyBuffer\0").ok()?;
            let va_map_buffer: VaMapBufferFn = *libva.get(b"vaMapBuffer\0").ok()?;
            let va_unmap_buffer: VaUnmapBufferFn = *libva.get(b"vaUnmapBuffer\0").ok()?;
            let va_begin_picture: VaBeginPictureFn = *libva.get(b"vaBeginPicture\0").ok()?;
            let va_render_picture: VaRenderPictureFn = *libva.get(b"vaRenderPicture\0").ok()?;
            let va_end_picture: VaEndPictureFn = *libva.get(b"vaEndPicture\0").ok()?;

            let va_get_display_drm: VaGetDisplayDrmFn =
                *libva_drm.get(b"vaGetDisplayDRM\0").ok()?;

            tracing::info!("VA-API library loaded successfully");

            Some(VaLibrary {
                _libva: libva,
                _libva_drm: libva_drm,
                va_get_display_drm,
                va_initialize,
                va_terminate,
                va_create_config,
                va_destroy_config,
                va_create_surfaces,
                va_destroy_surfaces,
                va_create_context,
                va_destroy_context,
                va_query_video_proc_filters,
                va_query_video_proc_filter_caps,
                va_query_video_proc_pipeline_caps,
                va_create_buffer,
                va_destroy_buffer,
                va_map_buffer,
                va_unmap_buffer,
                va_begin_picture,
                va_render_picture,
                va_end_picture,
            })
        })
        .as_ref()
}

/// Check if the VA-API video-processing backend can be loaded.
pub fn vpp_available() -> bool {
    load_va_library().is_some()
}

/// Snapshot of what the VideoProc entry point offers on this machine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VppCapabilities {
    pub available: bool,
    pub api_version: String,
    pub filters: Vec<FilterType>,
    pub color_balance: Vec<ColorBalanceCap>,
    pub deinterlacing: Vec<DeintAlgorithm>,
    pub pipeline: PipelineCaps,
}

/// Probe the default render node and report its video-processing
/// capabilities. Never fails: anything that cannot be queried is reported
/// as unavailable or empty.
pub fn vpp_capabilities() -> VppCapabilities {
    let mut caps = VppCapabilities::default();

    let Ok(backend) = LibvaBackend::new() else {
        return caps;
    };
    let Ok(config) = backend.create_config() else {
        return caps;
    };
    let context = match backend.create_context(config, 320, 240, &[]) {
        Ok(context) => context,
        Err(_) => {
            backend.destroy_config(config);
            return caps;
        }
    };

    for filter in [
        FilterType::ColorBalance,
        FilterType::NoiseReduction,
        FilterType::Sharpening,
        FilterType::Deinterlacing,
    ] {
        if backend.supports_filter(context, filter).unwrap_or(false) {
            caps.filters.push(filter);
        }
    }
    if caps.filters.contains(&FilterType::ColorBalance) {
        caps.color_balance = backend.query_color_balance_caps(context).unwrap_or_default();
    }
    if caps.filters.contains(&FilterType::Deinterlacing) {
        caps.deinterlacing = backend.query_deint_caps(context).unwrap_or_default();
        // Pipeline capabilities need a filter buffer to query against.
        if let Some(&algorithm) = caps.deinterlacing.first() {
            if let Ok(buf) = backend
                .create_filter_buffer(context, &FilterParams::Deinterlacing { algorithm })
            {
                caps.pipeline = backend.query_pipeline_caps(context, buf).unwrap_or_default();
                backend.destroy_buffer(buf);
            }
        }
    }

    let (major, minor) = backend.api_version();
    caps.api_version = format!("VA-API {}.{}", major, minor);
    caps.available = true;

    backend.destroy_context(context);
    backend.destroy_config(config);
    caps
}

// ============================================================================
// Type Mapping
// ============================================================================

fn va_filter_type(filter: FilterType) -> c_int {
    match filter {
        FilterType::ColorBalance => VA_PROC_FILTER_COLOR_BALANCE,
        FilterType::NoiseReduction => VA_PROC_FILTER_NOISE_REDUCTION,
        FilterType::Sharpening => VA_PROC_FILTER_SHARPENING,
        FilterType::Deinterlacing => VA_PROC_FILTER_DEINTERLACING,
    }
}

fn va_color_balance_attrib(mode: ColorBalanceMode) -> c_int {
    match mode {
        ColorBalanceMode::Contrast => VA_PROC_COLOR_BALANCE_CONTRAST,
        ColorBalanceMode::Brightness => VA_PROC_COLOR_BALANCE_BRIGHTNESS,
        ColorBalanceMode::Hue => VA_PROC_COLOR_BALANCE_HUE,
        ColorBalanceMode::Saturation => VA_PROC_COLOR_BALANCE_SATURATION,
    }
}

fn color_balance_mode_from_va(attrib: c_int) -> Option<ColorBalanceMode> {
    match attrib {
        VA_PROC_COLOR_BALANCE_CONTRAST => Some(ColorBalanceMode::Contrast),
        VA_PROC_COLOR_BALANCE_BRIGHTNESS => Some(ColorBalanceMode::Brightness),
        VA_PROC_COLOR_BALANCE_HUE => Some(ColorBalanceMode::Hue),
        VA_PROC_COLOR_BALANCE_SATURATION => Some(ColorBalanceMode::Saturation),
        _ => None,
    }
}

fn va_deint_algorithm(algorithm: DeintAlgorithm) -> c_int {
    match algorithm {
        DeintAlgorithm::MotionAdaptive => VA_PROC_DEINTERLACING_MOTION_ADAPTIVE,
        DeintAlgorithm::MotionCompensated => VA_PROC_DEINTERLACING_MOTION_COMPENSATED,
        DeintAlgorithm::Bob => VA_PROC_DEINTERLACING_BOB,
        DeintAlgorithm::Weave => VA_PROC_DEINTERLACING_WEAVE,
    }
}

fn deint_algorithm_from_va(algorithm: c_int) -> Option<DeintAlgorithm> {
    match algorithm {
        VA_PROC_DEINTERLACING_MOTION_ADAPTIVE => Some(DeintAlgorithm::MotionAdaptive),
        VA_PROC_DEINTERLACING_MOTION_COMPENSATED => Some(DeintAlgorithm::MotionCompensated),
        VA_PROC_DEINTERLACING_BOB => Some(DeintAlgorithm::Bob),
        VA_PROC_DEINTERLACING_WEAVE => Some(DeintAlgorithm::Weave),
        _ => None,
    }
}

fn range_from_va(range: VAProcFilterValueRange) -> ValueRange {
    ValueRange {
        min: range.min_value,
        max: range.max_value,
        default: range.default_value,
        step: range.step,
    }
}

// ============================================================================
// Backend
// ============================================================================

/// Per-buffer host-side state kept alive until the buffer is destroyed.
enum BufferState {
    /// Mirror of the filter-parameter contents, so per-frame edits can be
    /// serialized back into the mapped driver memory.
    Filter(FilterParams),
    /// Arrays the pipeline descriptor points into; vaCreateBuffer copies
    /// the struct but not the arrays, so they must outlive rendering.
    Pipeline {
        _filters: Vec<VABufferID>,
        _forward: Vec<VASurfaceID>,
        _backward: Vec<VASurfaceID>,
    },
}

/// VA-API implementation of the driver boundary. One instance wraps one
/// DRM render node and its VA display.
pub struct LibvaBackend {
    lib: &'static VaLibrary,
    display: VADisplay,
    drm_fd: c_int,
    version: (c_int, c_int),
    buffers: Mutex<HashMap<VABufferID, BufferState>>,
}

// The VA display handle is documented thread-safe; host-side buffer state
// is guarded by the mutex.
unsafe impl Send for LibvaBackend {}
unsafe impl Sync for LibvaBackend {}

impl LibvaBackend {
    /// Open the default DRM render node and initialize a VA display on it.
    pub fn new() -> Result<Self, FilterError> {
        let lib = load_va_library()
            .ok_or_else(|| FilterError::Unsupported("VA-API not available".into()))?;

        unsafe {
            let drm_fd =
                libc::open(b"/dev/dri/renderD128\0".as_ptr() as *const c_char, libc::O_RDWR);
            if drm_fd < 0 {
                return Err(FilterError::Allocation("failed to open DRM render node".into()));
            }

            let display = (lib.va_get_display_drm)(drm_fd);
            if display.is_null() {
                libc::close(drm_fd);
                return Err(FilterError::Allocation("failed to get VA display".into()));
            }

            let mut major = 0;
            let mut minor = 0;
            let status = (lib.va_initialize)(display, &mut major, &mut minor);
            if status != VA_STATUS_SUCCESS {
                libc::close(drm_fd);
                return Err(DriverError::new("vaInitialize", status).into());
            }

            tracing::info!("VA-API {}.{} display initialized", major, minor);

            Ok(Self {
                lib,
                display,
                drm_fd,
                version: (major, minor),
                buffers: Mutex::new(HashMap::new()),
            })
        }
    }

    /// VA-API version reported by the display at initialization.
    pub fn api_version(&self) -> (i32, i32) {
        self.version
    }

    fn check(op: &'static str, status: VAStatus) -> Result<(), DriverError> {
        if status == VA_STATUS_SUCCESS {
            Ok(())
        } else {
            Err(DriverError::new(op, status))
        }
    }

    /// Serialize the model into the driver's element layout.
    fn encode_filter_params(params: &FilterParams) -> (Vec<u8>, c_uint, c_uint) {
        match params {
            FilterParams::ColorBalance(entries) => {
                let mut elems: Vec<VAProcFilterParameterBufferColorBalance> = entries
                    .iter()
                    .map(|entry| VAProcFilterParameterBufferColorBalance {
                        filter_type: VA_PROC_FILTER_COLOR_BALANCE,
                        attrib: va_color_balance_attrib(entry.mode),
                        value: entry.value,
                    })
                    .collect();
                if elems.is_empty() {
                    // No channel available: submit one inert element rather
                    // than a zero-sized buffer.
                    elems.push(VAProcFilterParameterBufferColorBalance {
                        filter_type: VA_PROC_FILTER_COLOR_BALANCE,
                        attrib: VA_PROC_COLOR_BALANCE_NONE,
                        value: 0.0,
                    });
                }
                let size = std::mem::size_of::<VAProcFilterParameterBufferColorBalance>();
                let count = elems.len();
                let bytes = unsafe {
                    std::slice::from_raw_parts(elems.as_ptr() as *const u8, size * count)
                }
                .to_vec();
                (bytes, size as c_uint, count as c_uint)
            }
            FilterParams::Value { filter, value } => {
                let elem = VAProcFilterParameterBuffer {
                    filter_type: va_filter_type(*filter),
                    value: *value,
                };
                let size = std::mem::size_of::<VAProcFilterParameterBuffer>();
                let bytes = unsafe {
                    std::slice::from_raw_parts(&elem as *const _ as *const u8, size)
                }
                .to_vec();
                (bytes, size as c_uint, 1)
            }
            FilterParams::Deinterlacing { algorithm } => {
                let elem = VAProcFilterParameterBufferDeinterlacing {
                    filter_type: VA_PROC_FILTER_DEINTERLACING,
                    algorithm: va_deint_algorithm(*algorithm),
                    flags: 0,
                };
                let size = std::mem::size_of::<VAProcFilterParameterBufferDeinterlacing>();
                let bytes = unsafe {
                    std::slice::from_raw_parts(&elem as *const _ as *const u8, size)
                }
                .to_vec();
                (bytes, size as c_uint, 1)
            }
        }
    }
}

impl VideoProcBackend for LibvaBackend {
    fn name(&self) -> &'static str {
        "vaapi"
    }

    fn create_surfaces(
        &self,
        width: u32,
        height: u32,
        count: usize,
    ) -> Result<Vec<SurfaceId>, DriverError> {
        let mut ids = vec![0 as VASurfaceID; count];
        let status = unsafe {
            (self.lib.va_create_surfaces)(
                self.display,
                VA_RT_FORMAT_YUV420,
                width,
                height,
                ids.as_mut_ptr(),
                count as c_uint,
                ptr::null_mut(),
                0,
            )
        };
        Self::check("vaCreateSurfaces", status)?;
        Ok(ids.into_iter().map(SurfaceId).collect())
    }

    fn destroy_surfaces(&self, surfaces: &[SurfaceId]) {
        let mut ids: Vec<VASurfaceID> = surfaces.iter().map(|s| s.0).collect();
        unsafe {
            (self.lib.va_destroy_surfaces)(self.display, ids.as_mut_ptr(), ids.len() as c_int);
        }
    }

    fn create_config(&self) -> Result<ConfigId, DriverError> {
        let mut config: VAConfigID = 0;
        let status = unsafe {
            (self.lib.va_create_config)(
                self.display,
                VA_PROFILE_NONE,
                VA_ENTRYPOINT_VIDEO_PROC,
                ptr::null_mut(),
                0,
                &mut config,
            )
        };
        Self::check("vaCreateConfig", status)?;
        Ok(ConfigId(config))
    }

    fn destroy_config(&self, config: ConfigId) {
        unsafe {
            (self.lib.va_destroy_config)(self.display, config.0);
        }
    }

    fn create_context(
        &self,
        config: ConfigId,
        width: u32,
        height: u32,
        targets: &[SurfaceId],
    ) -> Result<ContextId, DriverError> {
        let mut ids: Vec<VASurfaceID> = targets.iter().map(|s| s.0).collect();
        let mut context: VAContextID = 0;
        let status = unsafe {
            (self.lib.va_create_context)(
                self.display,
                config.0,
                width as c_int,
                height as c_int,
                0,
                ids.as_mut_ptr(),
                ids.len() as c_int,
                &mut context,
            )
        };
        Self::check("vaCreateContext", status)?;
        Ok(ContextId(context))
    }

    fn destroy_context(&self, context: ContextId) {
        unsafe {
            (self.lib.va_destroy_context)(self.display, context.0);
        }
    }

    fn supports_filter(
        &self,
        context: ContextId,
        filter: FilterType,
    ) -> Result<bool, DriverError> {
        let mut filters = [0 as c_int; VA_PROC_FILTER_COUNT];
        let mut count = filters.len() as c_uint;
        let status = unsafe {
            (self.lib.va_query_video_proc_filters)(
                self.display,
                context.0,
                filters.as_mut_ptr(),
                &mut count,
            )
        };
        Self::check("vaQueryVideoProcFilters", status)?;
        let wanted = va_filter_type(filter);
        Ok(filters[..count as usize].contains(&wanted))
    }

    fn query_color_balance_caps(
        &self,
        context: ContextId,
    ) -> Result<Vec<ColorBalanceCap>, DriverError> {
        let mut caps =
            [VAProcFilterCapColorBalance::default(); VA_PROC_COLOR_BALANCE_COUNT];
        let mut count = caps.len() as c_uint;
        let status = unsafe {
            (self.lib.va_query_video_proc_filter_caps)(
                self.display,
                context.0,
                VA_PROC_FILTER_COLOR_BALANCE,
                caps.as_mut_ptr() as *mut c_void,
                &mut count,
            )
        };
        Self::check("vaQueryVideoProcFilterCaps", status)?;
        Ok(caps[..count as usize]
            .iter()
            .filter_map(|cap| {
                color_balance_mode_from_va(cap.attrib).map(|mode| ColorBalanceCap {
                    mode,
                    range: range_from_va(cap.range),
                })
            })
            .collect())
    }

    fn query_filter_range(
        &self,
        context: ContextId,
        filter: FilterType,
    ) -> Result<ValueRange, DriverError> {
        let mut cap = VAProcFilterCap::default();
        let mut count: c_uint = 1;
        let status = unsafe {
            (self.lib.va_query_video_proc_filter_caps)(
                self.display,
                context.0,
                va_filter_type(filter),
                &mut cap as *mut _ as *mut c_void,
                &mut count,
            )
        };
        Self::check("vaQueryVideoProcFilterCaps", status)?;
        Ok(range_from_va(cap.range))
    }

    fn query_deint_caps(&self, context: ContextId) -> Result<Vec<DeintAlgorithm>, DriverError> {
        let mut caps = [VAProcFilterCapDeinterlacing::default(); VA_PROC_DEINTERLACING_COUNT];
        let mut count = caps.len() as c_uint;
        let status = unsafe {
            (self.lib.va_query_video_proc_filter_caps)(
                self.display,
                context.0,
                VA_PROC_FILTER_DEINTERLACING,
                caps.as_mut_ptr() as *mut c_void,
                &mut count,
            )
        };
        Self::check("vaQueryVideoProcFilterCaps", status)?;
        Ok(caps[..count as usize]
            .iter()
            .filter_map(|cap| deint_algorithm_from_va(cap.algorithm))
            .collect())
    }

    fn create_filter_buffer(
        &self,
        context: ContextId,
        params: &FilterParams,
    ) -> Result<BufferId, DriverError> {
        let (mut bytes, size, count) = Self::encode_filter_params(params);
        let mut buffer: VABufferID = 0;
        let status = unsafe {
            (self.lib.va_create_buffer)(
                self.display,
                context.0,
                VA_PROC_FILTER_PARAMETER_BUFFER_TYPE,
                size,
                count,
                bytes.as_mut_ptr() as *mut c_void,
                &mut buffer,
            )
        };
        Self::check("vaCreateBuffer", status)?;
        self.buffers
            .lock()
            .insert(buffer, BufferState::Filter(params.clone()));
        Ok(BufferId(buffer))
    }

    fn edit_filter_params(
        &self,
        buffer: BufferId,
        edit: &mut dyn FnMut(&mut FilterParams),
    ) -> Result<(), DriverError> {
        let mut buffers = self.buffers.lock();
        let Some(BufferState::Filter(params)) = buffers.get_mut(&buffer.0) else {
            return Err(DriverError::new("vaMapBuffer", -1));
        };
        edit(params);
        let (bytes, _size, _count) = Self::encode_filter_params(params);

        unsafe {
            let mut mapped: *mut c_void = ptr::null_mut();
            let status = (self.lib.va_map_buffer)(self.display, buffer.0, &mut mapped);
            Self::check("vaMapBuffer", status)?;
            ptr::copy_nonoverlapping(bytes.as_ptr(), mapped as *mut u8, bytes.len());
            let status = (self.lib.va_unmap_buffer)(self.display, buffer.0);
            Self::check("vaUnmapBuffer", status)?;
        }
        Ok(())
    }

    fn query_pipeline_caps(
        &self,
        context: ContextId,
        filter_buf: BufferId,
    ) -> Result<PipelineCaps, DriverError> {
        let mut filters = [filter_buf.0];
        let mut caps = VAProcPipelineCaps::default();
        let status = unsafe {
            (self.lib.va_query_video_proc_pipeline_caps)(
                self.display,
                context.0,
                filters.as_mut_ptr(),
                1,
                &mut caps,
            )
        };
        Self::check("vaQueryVideoProcPipelineCaps", status)?;
        Ok(PipelineCaps {
            fast_pipeline: caps.pipeline_flags & VA_PROC_PIPELINE_FAST != 0,
            num_forward_references: caps.num_forward_references,
            num_backward_references: caps.num_backward_references,
        })
    }

    fn begin_picture(&self, context: ContextId, target: SurfaceId) -> Result<(), DriverError> {
        let status =
            unsafe { (self.lib.va_begin_picture)(self.display, context.0, target.0) };
        Self::check("vaBeginPicture", status)
    }

    fn create_pipeline_buffer(
        &self,
        context: ContextId,
        params: &PipelineParams,
    ) -> Result<BufferId, DriverError> {
        let filters: Vec<VABufferID> = params.filters.iter().map(|b| b.0).collect();
        let forward: Vec<VASurfaceID> =
            params.forward_references.iter().map(|s| s.0).collect();
        let backward: Vec<VASurfaceID> =
            params.backward_references.iter().map(|s| s.0).collect();

        // Field order is conveyed through the pipeline descriptor's
        // filter_flags (VA_BOTTOM_FIELD). The deinterlacing parameter
        // buffer's VA_DEINTERLACING_BOTTOM_FIELD_FIRST flag is left zero;
        // this differs from drivers fed per-frame deinterlacing flags.
        let filter_flags = match params.field_order {
            FieldOrder::TopFieldFirst => VA_FRAME_PICTURE,
            FieldOrder::BottomFieldFirst => VA_BOTTOM_FIELD,
        };
        let pipeline_flags = if params.fast { VA_PROC_PIPELINE_FAST } else { 0 };

        let mut desc = VAProcPipelineParameterBuffer {
            surface: params.source.0,
            surface_region: ptr::null(),
            surface_color_standard: 0,
            output_region: ptr::null(),
            output_background_color: 0,
            output_color_standard: 0,
            pipeline_flags,
            filter_flags,
            filters: filters.as_ptr(),
            num_filters: filters.len() as c_uint,
            forward_references: forward.as_ptr(),
            num_forward_references: forward.len() as c_uint,
            backward_references: backward.as_ptr(),
            num_backward_references: backward.len() as c_uint,
            va_reserved: [0; 32],
        };

        let mut buffer: VABufferID = 0;
        let status = unsafe {
            (self.lib.va_create_buffer)(
                self.display,
                context.0,
                VA_PROC_PIPELINE_PARAMETER_BUFFER_TYPE,
                std::mem::size_of::<VAProcPipelineParameterBuffer>() as c_uint,
                1,
                &mut desc as *mut _ as *mut c_void,
                &mut buffer,
            )
        };
        Self::check("vaCreateBuffer", status)?;

        // The descriptor holds raw pointers into these arrays; pin them
        // until the buffer is destroyed after rendering.
        self.buffers.lock().insert(
            buffer,
            BufferState::Pipeline { _filters: filters, _forward: forward, _backward: backward },
        );
        Ok(BufferId(buffer))
    }

    fn render_picture(
        &self,
        context: ContextId,
        pipeline_buf: BufferId,
    ) -> Result<(), DriverError> {
        let mut buffers = [pipeline_buf.0];
        let status = unsafe {
            (self.lib.va_render_picture)(self.display, context.0, buffers.as_mut_ptr(), 1)
        };
        Self::check("vaRenderPicture", status)
    }

    fn end_picture(&self, context: ContextId) -> Result<(), DriverError> {
        let status = unsafe { (self.lib.va_end_picture)(self.display, context.0) };
        Self::check("vaEndPicture", status)
    }

    fn destroy_buffer(&self, buffer: BufferId) {
        self.buffers.lock().remove(&buffer.0);
        unsafe {
            (self.lib.va_destroy_buffer)(self.display, buffer.0);
        }
    }
}

impl Drop for LibvaBackend {
    fn drop(&mut self) {
        unsafe {
            (self.lib.va_terminate)(self.display);
            libc::close(self.drm_fd);
        }
    }
}
