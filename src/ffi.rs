// C-compatible FFI bindings for the native host (Swift/Objective-C/JNI shims).
//
// Safety requirements:
// - Pointers may be null; null inputs are ignored and null outputs skipped
// - Non-null buffers must have room for the documented number of floats
// - String parameters must be null-terminated UTF-8
//
// Every entry point drives the process-wide engine, so there are no handles
// to create or destroy.

use std::ffi::{CStr, c_char};
use std::sync::OnceLock;

use log::{LevelFilter, warn};

use crate::bridge::EngineReadback;
use crate::config::EngineConfig;
use crate::native::{AudioRenderer, GlobalEngine, NativeEngine};

// Logger subsystem identifier
#[cfg(feature = "ios")]
const LOG_SUBSYSTEM: &str = "com.junobridge.engine";

// ═══════════════════════════════════════════════════════════════════════════
// Logger Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize logging.
///
/// With the `ios` feature this installs unified logging that shows up in
/// Console.app and Xcode's debug console. Otherwise `env_logger` is used and
/// honors `RUST_LOG`. Calling it more than once is harmless.
#[unsafe(no_mangle)]
pub extern "C" fn juno_init_logger() {
    #[cfg(feature = "ios")]
    oslog::OsLogger::new(LOG_SUBSYSTEM)
        .level_filter(LevelFilter::Debug)
        .init()
        .ok();

    #[cfg(not(feature = "ios"))]
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .try_init()
        .ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// FFI Result Types
// ═══════════════════════════════════════════════════════════════════════════

/// Readback data from the engine (for meters/displays).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JunoReadback {
    pub frames_rendered: u64,
    pub active_voices: u32,
    pub peak_left: f32,
    pub peak_right: f32,
    pub running: bool,
}

impl From<EngineReadback> for JunoReadback {
    fn from(r: EngineReadback) -> Self {
        Self {
            frames_rendered: r.frames_rendered,
            active_voices: r.active_voices as u32,
            peak_left: r.output_peaks[0],
            peak_right: r.output_peaks[1],
            running: r.running,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════

/// Get the default configuration values.
#[unsafe(no_mangle)]
pub extern "C" fn juno_default_config() -> EngineConfig {
    EngineConfig::default()
}

/// Replace the engine configuration. Takes effect on the next start.
///
/// # Safety
/// `config` must point to a valid `EngineConfig` or be NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn juno_configure(config: *const EngineConfig) {
    if config.is_null() {
        return;
    }
    let config = unsafe { *config };
    GlobalEngine::engine().configure(config);
}

// ═══════════════════════════════════════════════════════════════════════════
// Native Entry Points
// ═══════════════════════════════════════════════════════════════════════════

/// Start the engine. Returns `false` if the arguments are rejected.
#[unsafe(no_mangle)]
pub extern "C" fn juno_native_start(sample_rate: i32, block_size: i32) -> bool {
    GlobalEngine.native_start(sample_rate, block_size)
}

#[unsafe(no_mangle)]
pub extern "C" fn juno_native_stop() {
    GlobalEngine.native_stop();
}

#[unsafe(no_mangle)]
pub extern "C" fn juno_native_note_on(note: i32, velocity: f32) {
    GlobalEngine.native_note_on(note, velocity);
}

#[unsafe(no_mangle)]
pub extern "C" fn juno_native_note_off(note: i32) {
    GlobalEngine.native_note_off(note);
}

/// Polyphonic key pressure (0-1) for a held note.
#[unsafe(no_mangle)]
pub extern "C" fn juno_native_aftertouch(note: i32, pressure: f32) {
    GlobalEngine::engine().aftertouch(note, pressure);
}

/// Set a parameter by its string id (e.g. "cutoff").
///
/// # Safety
/// `parameter_id` must be a valid null-terminated string or NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn juno_native_set_param(parameter_id: *const c_char, value: f32) {
    if parameter_id.is_null() {
        return;
    }
    let id = unsafe { CStr::from_ptr(parameter_id) };
    match id.to_str() {
        Ok(id) => GlobalEngine.native_set_param(id, value),
        Err(_) => warn!("parameter id is not UTF-8"),
    }
}

/// Load the first patch of a Juno-106 SysEx dump.
///
/// Returns `false` if the data does not parse or the engine is stopped.
///
/// # Safety
/// `data` must point to `length` readable bytes or be NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn juno_native_load_sysex(data: *const u8, length: usize) -> bool {
    if data.is_null() || length == 0 {
        return false;
    }
    let bytes = unsafe { std::slice::from_raw_parts(data, length) };
    match GlobalEngine::engine().load_sysex(bytes) {
        Ok(_) => true,
        Err(e) => {
            warn!("sysex load failed: {e}");
            false
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Audio Rendering
// ═══════════════════════════════════════════════════════════════════════════

fn renderer() -> &'static AudioRenderer {
    static RENDERER: OnceLock<AudioRenderer> = OnceLock::new();
    RENDERER.get_or_init(|| GlobalEngine::engine().renderer())
}

/// Render audio to separate left/right buffers.
///
/// If the engine is stopped or busy, the buffers are filled with silence.
///
/// # Safety
/// - Must be called from the audio thread
/// - Output buffers must be valid and have space for `frames` samples
#[unsafe(no_mangle)]
pub unsafe extern "C" fn juno_native_render(
    frames: u32,
    output_left: *mut f32,
    output_right: *mut f32,
) {
    let total_frames = frames as usize;

    if output_left.is_null() || output_right.is_null() {
        if !output_left.is_null() {
            unsafe { std::ptr::write_bytes(output_left, 0, total_frames) };
        }
        if !output_right.is_null() {
            unsafe { std::ptr::write_bytes(output_right, 0, total_frames) };
        }
        return;
    }

    let left = unsafe { std::slice::from_raw_parts_mut(output_left, total_frames) };
    let right = unsafe { std::slice::from_raw_parts_mut(output_right, total_frames) };
    renderer().render(left, right);
}

/// Render audio to an interleaved stereo buffer.
///
/// Output format: [L0, R0, L1, R1, L2, R2, ...]
///
/// # Safety
/// - `output` must have space for `frames * 2` floats
#[unsafe(no_mangle)]
pub unsafe extern "C" fn juno_native_render_interleaved(frames: u32, output: *mut f32) {
    if output.is_null() {
        return;
    }
    let out = unsafe { std::slice::from_raw_parts_mut(output, frames as usize * 2) };
    renderer().render_interleaved(out);
}

/// Current meters and status.
#[unsafe(no_mangle)]
pub extern "C" fn juno_native_get_readback() -> JunoReadback {
    GlobalEngine::engine().readback().into()
}
