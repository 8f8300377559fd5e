//! WebAssembly bindings via wasm-bindgen for browser integration.
//!
//! This module is only compiled when the `web` feature is enabled.
//!
//! # Usage
//!
//! Build with wasm-pack:
//! ```bash
//! wasm-pack build --target web --features web
//! ```
//!
//! # JavaScript Example
//!
//! ```javascript
//! import init, { juno_init, WebJunoEngine } from './junobridge.js';
//!
//! await init();
//! juno_init();
//!
//! const engine = new WebJunoEngine();
//! engine.start(sampleRate, 128);
//! engine.note_on(60, 0.8);
//!
//! // In the AudioWorklet's process():
//! engine.render(interleaved);
//! ```

use wasm_bindgen::prelude::*;

use crate::config::EngineConfig;
use crate::module::JunoEngineModule;
use crate::native::{AudioRenderer, JunoAudioEngine};

// ═══════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the wasm module. Call this once before using any other functions.
/// Sets up panic hooks and console logging.
#[wasm_bindgen]
pub fn juno_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Engine
// ═══════════════════════════════════════════════════════════════════════════

/// A self-contained Juno engine for one AudioWorklet.
#[wasm_bindgen]
pub struct WebJunoEngine {
    module: JunoEngineModule<JunoAudioEngine>,
    renderer: AudioRenderer,
}

#[wasm_bindgen]
impl WebJunoEngine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WebJunoEngine {
        Self::with_engine(JunoAudioEngine::default())
    }

    /// Create an engine with explicit polyphony and block limit.
    pub fn with_limits(polyphony: u32, max_block_size: u32) -> WebJunoEngine {
        Self::with_engine(JunoAudioEngine::new(EngineConfig {
            polyphony,
            max_block_size,
            ..EngineConfig::default()
        }))
    }

    /// Start the engine. Throws `JUNO_START_FAILED: ...` on failure.
    pub fn start(&self, sample_rate: i32, block_size: i32) -> Result<bool, JsValue> {
        self.module
            .try_start(sample_rate, block_size)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn stop(&self) {
        self.module.stop();
    }

    pub fn note_on(&self, note: i32, velocity: f64) {
        self.module.note_on(note, velocity);
    }

    pub fn note_off(&self, note: i32) {
        self.module.note_off(note);
    }

    pub fn set_parameter(&self, parameter_id: &str, value: f64) {
        self.module.set_parameter(parameter_id, value);
    }

    /// Polyphonic key pressure (0-1) for a held note.
    pub fn aftertouch(&self, note: i32, pressure: f64) {
        self.module.engine().aftertouch(note, pressure as f32);
    }

    /// Load the first patch of a Juno-106 SysEx dump.
    pub fn load_sysex(&self, data: &[u8]) -> bool {
        match self.module.engine().load_sysex(data) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("sysex load failed: {e}");
                false
            }
        }
    }

    /// Render interleaved stereo: [L0, R0, L1, R1, ...].
    pub fn render(&self, output: &mut [f32]) {
        self.renderer.render_interleaved(output);
    }

    /// Render planar stereo into two channel buffers.
    pub fn render_planar(&self, left: &mut [f32], right: &mut [f32]) {
        self.renderer.render(left, right);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Readback
    // ─────────────────────────────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.module.engine().is_running()
    }

    pub fn active_voices(&self) -> u32 {
        self.module.engine().readback().active_voices as u32
    }

    pub fn peak_left(&self) -> f32 {
        self.module.engine().readback().output_peaks[0]
    }

    pub fn peak_right(&self) -> f32 {
        self.module.engine().readback().output_peaks[1]
    }
}

impl WebJunoEngine {
    fn with_engine(engine: JunoAudioEngine) -> WebJunoEngine {
        let renderer = engine.renderer();
        Self {
            module: JunoEngineModule::new(engine),
            renderer,
        }
    }
}

impl Default for WebJunoEngine {
    fn default() -> Self {
        Self::new()
    }
}
