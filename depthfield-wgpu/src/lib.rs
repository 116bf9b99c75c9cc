//! Depth-of-field renderer on WebGPU.
//!
//! Usable as a Rust library through [`DepthOfFieldPipeline`], or as a cdylib
//! through the `df_*` C entry points below. Every C entry point returns `0`
//! on success and `-1` on failure; the failure message is then available
//! from [`df_last_error`].

pub mod animator;
pub mod backend;
pub mod camera;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
mod handle;
pub mod passes;
pub mod pipeline;
pub mod render_targets;
pub mod renderer;

pub use animator::{Instance, InstanceAnimator};
pub use backend::{DepthOfFieldPipeline, HEADLESS_FORMAT};
pub use camera::OrbitCamera;
pub use config::{
    CameraConfig, OutputMode, PipelineConfig, PreviewAnchor, PreviewConfig, SceneConfig, SceneLayout,
    ShaderSources,
};
pub use depthfield_gpu_shared::coc::DepthOfFieldParams;
pub use error::{DofError, DofResult};

use std::ffi::CString;
use std::os::raw::c_char;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use handle::HandleStore;

struct BackendSlot {
    pipeline: DepthOfFieldPipeline,
    last_error: Option<CString>,
}

static BACKENDS: LazyLock<Mutex<HandleStore<BackendSlot>>> =
    LazyLock::new(|| Mutex::new(HandleStore::new()));

/// Error from the last failed initialization; reported for handle 0.
static INIT_ERROR: Mutex<Option<CString>> = Mutex::new(None);

fn backends() -> MutexGuard<'static, HandleStore<BackendSlot>> {
    BACKENDS.lock().unwrap_or_else(PoisonError::into_inner)
}

fn to_c_string(message: &str) -> CString {
    CString::new(message.replace('\0', " ")).unwrap_or_default()
}

/// Run `f` against a live backend, recording any error in its slot.
fn with_backend(backend: u64, f: impl FnOnce(&mut DepthOfFieldPipeline) -> DofResult<()>) -> i32 {
    let mut backends = backends();
    let Some(slot) = backends.get_mut(backend) else {
        return -1;
    };
    match f(&mut slot.pipeline) {
        Ok(()) => {
            slot.last_error = None;
            0
        }
        Err(e) => {
            log::error!("{e}");
            slot.last_error = Some(to_c_string(&e.to_string()));
            -1
        }
    }
}

fn register(result: DofResult<DepthOfFieldPipeline>) -> u64 {
    match result {
        Ok(pipeline) => {
            *INIT_ERROR.lock().unwrap_or_else(PoisonError::into_inner) = None;
            backends().insert(BackendSlot {
                pipeline,
                last_error: None,
            })
        }
        Err(e) => {
            log::error!("Depth-of-field initialization failed: {e}");
            *INIT_ERROR.lock().unwrap_or_else(PoisonError::into_inner) = Some(to_c_string(&e.to_string()));
            0
        }
    }
}

// ============================================================
// Window handle wrappers for raw-window-handle integration
// ============================================================

/// X11 window + display pair.
#[cfg(target_os = "linux")]
struct X11WindowHandle {
    window: u64,
    display: *mut std::ffi::c_void,
}

#[cfg(target_os = "linux")]
unsafe impl Send for X11WindowHandle {}
#[cfg(target_os = "linux")]
unsafe impl Sync for X11WindowHandle {}

#[cfg(target_os = "linux")]
impl raw_window_handle::HasWindowHandle for X11WindowHandle {
    fn window_handle(&self) -> Result<raw_window_handle::WindowHandle<'_>, raw_window_handle::HandleError> {
        let raw = raw_window_handle::RawWindowHandle::Xlib(raw_window_handle::XlibWindowHandle::new(self.window as _));
        Ok(unsafe { raw_window_handle::WindowHandle::borrow_raw(raw) })
    }
}

#[cfg(target_os = "linux")]
impl raw_window_handle::HasDisplayHandle for X11WindowHandle {
    fn display_handle(&self) -> Result<raw_window_handle::DisplayHandle<'_>, raw_window_handle::HandleError> {
        let raw = raw_window_handle::RawDisplayHandle::Xlib(raw_window_handle::XlibDisplayHandle::new(
            std::ptr::NonNull::new(self.display),
            0,
        ));
        Ok(unsafe { raw_window_handle::DisplayHandle::borrow_raw(raw) })
    }
}

#[cfg(target_os = "windows")]
struct Win32WindowHandle {
    hwnd: *mut std::ffi::c_void,
}

#[cfg(target_os = "windows")]
unsafe impl Send for Win32WindowHandle {}
#[cfg(target_os = "windows")]
unsafe impl Sync for Win32WindowHandle {}

#[cfg(target_os = "windows")]
impl raw_window_handle::HasWindowHandle for Win32WindowHandle {
    fn window_handle(&self) -> Result<raw_window_handle::WindowHandle<'_>, raw_window_handle::HandleError> {
        let hwnd = std::num::NonZeroIsize::new(self.hwnd as isize).ok_or(raw_window_handle::HandleError::Unavailable)?;
        let raw = raw_window_handle::RawWindowHandle::Win32(raw_window_handle::Win32WindowHandle::new(hwnd));
        Ok(unsafe { raw_window_handle::WindowHandle::borrow_raw(raw) })
    }
}

#[cfg(target_os = "windows")]
impl raw_window_handle::HasDisplayHandle for Win32WindowHandle {
    fn display_handle(&self) -> Result<raw_window_handle::DisplayHandle<'_>, raw_window_handle::HandleError> {
        let raw = raw_window_handle::RawDisplayHandle::Windows(raw_window_handle::WindowsDisplayHandle::new());
        Ok(unsafe { raw_window_handle::DisplayHandle::borrow_raw(raw) })
    }
}

// ============================================================
// FFI: Lifecycle
// ============================================================

/// Create a pipeline presenting to a native window with the default scene.
///
/// On Linux: `window_handle` is the X11 Window, `display_handle` the X11 Display*.
/// On Windows: `window_handle` is the HWND, `display_handle` is unused.
///
/// Returns a backend handle (> 0) on success, 0 on failure.
#[no_mangle]
pub extern "C" fn df_initialize(
    window_handle: u64,
    display_handle: *mut std::ffi::c_void,
    width: i32,
    height: i32,
) -> u64 {
    let _ = env_logger::try_init();
    let (w, h) = (width.max(1) as u32, height.max(1) as u32);

    #[cfg(target_os = "linux")]
    let result = DepthOfFieldPipeline::new(
        X11WindowHandle {
            window: window_handle,
            display: display_handle,
        },
        w,
        h,
        PipelineConfig::default(),
    );

    #[cfg(target_os = "windows")]
    let result = {
        let _ = display_handle;
        DepthOfFieldPipeline::new(
            Win32WindowHandle {
                hwnd: window_handle as *mut std::ffi::c_void,
            },
            w,
            h,
            PipelineConfig::default(),
        )
    };

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    let result: DofResult<DepthOfFieldPipeline> = {
        let _ = (window_handle, display_handle, w, h);
        Err(DofError::context("unsupported platform"))
    };

    register(result)
}

/// Create an offscreen pipeline with the default scene. Returns a handle or 0.
#[no_mangle]
pub extern "C" fn df_initialize_headless(width: i32, height: i32) -> u64 {
    let _ = env_logger::try_init();
    register(DepthOfFieldPipeline::new_headless(
        width.max(1) as u32,
        height.max(1) as u32,
        PipelineConfig::default(),
    ))
}

/// Release every GPU resource owned by `backend`.
#[no_mangle]
pub extern "C" fn df_shutdown(backend: u64) {
    if let Some(slot) = backends().remove(backend) {
        slot.pipeline.destroy();
    }
}

#[no_mangle]
pub extern "C" fn df_resize(backend: u64, width: i32, height: i32) -> i32 {
    with_backend(backend, |p| p.on_resize(width.max(0) as u32, height.max(0) as u32))
}

/// Render one frame at `elapsed_ms` since the host's clock origin.
#[no_mangle]
pub extern "C" fn df_tick(backend: u64, elapsed_ms: f64) -> i32 {
    with_backend(backend, |p| p.tick(elapsed_ms))
}

// ============================================================
// FFI: Parameters
// ============================================================

#[no_mangle]
pub extern "C" fn df_set_clip_planes(backend: u64, z_near: f32, z_far: f32) -> i32 {
    with_backend(backend, |p| {
        p.set_clip_planes(z_near, z_far);
        Ok(())
    })
}

/// Set all four focus distances at once.
#[no_mangle]
pub extern "C" fn df_set_dof_thresholds(
    backend: u64,
    near_blurry: f32,
    near_sharp: f32,
    far_sharp: f32,
    far_blurry: f32,
) -> i32 {
    with_backend(backend, |p| {
        p.set_near_blurry(near_blurry);
        p.set_near_sharp(near_sharp);
        p.set_far_sharp(far_sharp);
        p.set_far_blurry(far_blurry);
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn df_set_max_coc_radius(backend: u64, radius: f32) -> i32 {
    with_backend(backend, |p| {
        p.set_max_coc_radius(radius);
        Ok(())
    })
}

/// `mode` is an [`OutputMode`] index (0 = result … 5 = CoC).
#[no_mangle]
pub extern "C" fn df_set_output_mode(backend: u64, mode: u32) -> i32 {
    with_backend(backend, |p| {
        let mode = OutputMode::from_index(mode)
            .ok_or_else(|| DofError::InvalidArgument(format!("unknown output mode {mode}")))?;
        p.set_output_mode(mode);
        Ok(())
    })
}

/// Replace the preview list with `count` output mode indices.
#[no_mangle]
pub extern "C" fn df_set_previews(backend: u64, modes: *const u32, count: u32) -> i32 {
    let indices: &[u32] = if modes.is_null() || count == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(modes, count as usize) }
    };
    with_backend(backend, |p| {
        let modes = indices
            .iter()
            .map(|&i| {
                OutputMode::from_index(i).ok_or_else(|| DofError::InvalidArgument(format!("unknown output mode {i}")))
            })
            .collect::<DofResult<Vec<_>>>()?;
        p.set_previews(&modes);
        Ok(())
    })
}

/// `anchor`: 0 bottom-left, 1 top-left, 2 bottom-right, 3 top-right.
#[no_mangle]
pub extern "C" fn df_set_preview_anchor(backend: u64, anchor: u32) -> i32 {
    with_backend(backend, |p| {
        let anchor = match anchor {
            0 => PreviewAnchor::BottomLeft,
            1 => PreviewAnchor::TopLeft,
            2 => PreviewAnchor::BottomRight,
            3 => PreviewAnchor::TopRight,
            other => return Err(DofError::InvalidArgument(format!("unknown preview anchor {other}"))),
        };
        p.set_preview_anchor(anchor);
        Ok(())
    })
}

/// Preview edge length as a fraction of the surface.
#[no_mangle]
pub extern "C" fn df_set_preview_size(backend: u64, fraction: f32) -> i32 {
    with_backend(backend, |p| {
        p.set_preview_size(fraction);
        Ok(())
    })
}

/// Upload an equirectangular environment map of `width * height` RGBA8 texels.
#[no_mangle]
pub extern "C" fn df_set_environment(backend: u64, width: u32, height: u32, rgba: *const u8) -> i32 {
    if rgba.is_null() {
        return with_backend(backend, |_| Err(DofError::InvalidArgument("environment pointer is null".into())));
    }
    let len = width as usize * height as usize * 4;
    let data = unsafe { std::slice::from_raw_parts(rgba, len) };
    with_backend(backend, |p| p.set_environment(width, height, data))
}

// ============================================================
// FFI: Pointer input
// ============================================================

#[no_mangle]
pub extern "C" fn df_pointer_down(backend: u64, x: f32, y: f32) -> i32 {
    with_backend(backend, |p| {
        p.pointer_down(x, y);
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn df_pointer_move(backend: u64, x: f32, y: f32) -> i32 {
    with_backend(backend, |p| {
        p.pointer_move(x, y);
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn df_pointer_up(backend: u64) -> i32 {
    with_backend(backend, |p| {
        p.pointer_up();
        Ok(())
    })
}

// ============================================================
// FFI: Readback and errors
// ============================================================

/// Copy the last headless frame into `out` (`width * height * 4` bytes).
#[no_mangle]
pub extern "C" fn df_read_output(backend: u64, out: *mut u8, len: usize) -> i32 {
    with_backend(backend, |p| {
        let pixels = p.read_output()?;
        if out.is_null() || len < pixels.len() {
            return Err(DofError::InvalidArgument(format!(
                "output buffer holds {len} bytes, frame needs {}",
                pixels.len()
            )));
        }
        unsafe { std::ptr::copy_nonoverlapping(pixels.as_ptr(), out, pixels.len()) };
        Ok(())
    })
}

/// Last error message for `backend`, or for the last failed initialization
/// when `backend` is 0. Null when there is none. The pointer stays valid
/// until the next call on the same handle.
#[no_mangle]
pub extern "C" fn df_last_error(backend: u64) -> *const c_char {
    if backend == 0 {
        return INIT_ERROR
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(std::ptr::null(), |e| e.as_ptr());
    }
    backends()
        .get(backend)
        .and_then(|slot| slot.last_error.as_ref())
        .map_or(std::ptr::null(), |e| e.as_ptr())
}
