// src/native.rs
//
// The native engine behind the host entry points.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, TryLockError};

use log::{debug, info, warn};

use crate::bridge::{ControlHandle, EngineHandle, EngineReadback, create_bridge};
use crate::config::{EngineConfig, StartError};
use crate::engine::JunoDspEngine;
use crate::parameter::ParamId;
use crate::patch::{self, JunoPatch, PatchError};

/// The fixed native entry points the host bridge calls into.
///
/// Implementations use interior mutability: the host may call from any
/// thread and never holds a mutable reference.
pub trait NativeEngine: Send + Sync {
    fn native_start(&self, sample_rate: i32, block_size: i32) -> bool;
    fn native_stop(&self);
    fn native_note_on(&self, note: i32, velocity: f32);
    fn native_note_off(&self, note: i32);
    fn native_set_param(&self, parameter_id: &str, value: f32);
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("engine is not running")]
    NotRunning,
}

/// Audio-thread state: the engine handle plus interleave scratch space.
struct AudioSide {
    handle: EngineHandle,
    scratch_left: Vec<f32>,
    scratch_right: Vec<f32>,
}

type SharedAudio = Arc<Mutex<Option<AudioSide>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Non-blocking lock for the audio thread. `None` while contended.
fn try_lock<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

/// Polyphonic Juno engine driven through the native entry points.
pub struct JunoAudioEngine {
    config: Mutex<EngineConfig>,
    control: Mutex<Option<ControlHandle>>,
    audio: SharedAudio,
}

impl Default for JunoAudioEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl JunoAudioEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Mutex::new(config),
            control: Mutex::new(None),
            audio: Arc::new(Mutex::new(None)),
        }
    }

    /// Replace the configuration. Takes effect on the next `start`.
    pub fn configure(&self, config: EngineConfig) {
        *lock(&self.config) = config;
    }

    pub fn config(&self) -> EngineConfig {
        *lock(&self.config)
    }

    pub fn is_running(&self) -> bool {
        lock(&self.control).is_some()
    }

    /// Build the DSP engine and open the bridge.
    ///
    /// Starting a running engine is a no-op.
    pub fn start(&self, sample_rate: i32, block_size: i32) -> Result<(), StartError> {
        let mut control = lock(&self.control);
        if control.is_some() {
            debug!("start: already running");
            return Ok(());
        }

        let config = self.config();
        let stream = config.validate(sample_rate, block_size)?;

        let dsp = JunoDspEngine::new(
            stream.sample_rate as f32,
            config.polyphony as usize,
            config.output_gain,
        );
        let capacity = config.event_capacity as usize;
        let (handle, audio) = create_bridge(dsp, stream.block_size, capacity);

        *lock(&*self.audio) = Some(AudioSide {
            handle: audio,
            scratch_left: vec![0.0; stream.block_size],
            scratch_right: vec![0.0; stream.block_size],
        });
        *control = Some(handle);

        info!(
            "engine started: {} Hz, {} frames, {} voices",
            stream.sample_rate, stream.block_size, config.polyphony
        );
        Ok(())
    }

    /// Close the bridge and drop the audio side.
    ///
    /// The control lock is held until the audio side is gone, so a
    /// concurrent `start` cannot install an engine that is then torn down.
    pub fn stop(&self) {
        let mut control = lock(&self.control);
        let Some(handle) = control.take() else {
            return;
        };
        handle.shutdown();
        lock(&*self.audio).take();
        drop(control);
        info!("engine stopped");
    }

    fn with_control<R>(
        &self,
        what: &str,
        f: impl FnOnce(&mut ControlHandle) -> R,
    ) -> Option<R> {
        match lock(&self.control).as_mut() {
            Some(control) => Some(f(control)),
            None => {
                debug!("{what} dropped: engine stopped");
                None
            }
        }
    }

    pub fn note_on(&self, note: i32, velocity: f32) {
        let Some(note) = midi_note(note) else {
            warn!("note on {note} outside MIDI range");
            return;
        };
        // NaN maps to 0
        let velocity = velocity.max(0.0).min(1.0);
        self.with_control("note on", |c| {
            debug!("note on {note} vel {velocity}");
            c.note_on(note, velocity)
        });
    }

    pub fn note_off(&self, note: i32) {
        let Some(note) = midi_note(note) else {
            warn!("note off {note} outside MIDI range");
            return;
        };
        self.with_control("note off", |c| {
            debug!("note off {note}");
            c.note_off(note)
        });
    }

    pub fn all_notes_off(&self) {
        self.with_control("all notes off", |c| c.all_notes_off());
    }

    /// Polyphonic key pressure for a held note. Pressure is clamped to 0-1.
    pub fn aftertouch(&self, note: i32, pressure: f32) {
        let Some(note) = midi_note(note) else {
            warn!("aftertouch {note} outside MIDI range");
            return;
        };
        // NaN maps to 0
        let pressure = pressure.max(0.0).min(1.0);
        self.with_control("aftertouch", |c| c.aftertouch(note, pressure));
    }

    /// Non-finite values are dropped: they would stick in filter state.
    pub fn set_parameter(&self, parameter_id: &str, value: f32) {
        let param = match parameter_id.parse::<ParamId>() {
            Ok(param) => param,
            Err(e) => {
                warn!("{e}");
                return;
            }
        };
        if !value.is_finite() {
            warn!("{param} value {value} is not finite");
            return;
        }
        self.with_control("set parameter", |c| c.set_param(param, value));
    }

    /// Last value set for `param` since the last start, if running.
    pub fn parameter(&self, param: ParamId) -> Option<f32> {
        lock(&self.control).as_ref().map(|c| c.param(param))
    }

    /// Apply every setting of a patch.
    pub fn load_patch(&self, patch: &JunoPatch) -> Result<(), LoadError> {
        self.with_control("patch", |c| {
            for (param, value) in patch.settings() {
                c.set_param(param, value);
            }
        })
        .ok_or(LoadError::NotRunning)?;

        info!(
            "loaded patch {} (checksum {})",
            patch.patch_number,
            if patch.checksum_valid { "ok" } else { "mismatch" }
        );
        Ok(())
    }

    /// Parse SysEx data and apply its first patch.
    pub fn load_sysex(&self, data: &[u8]) -> Result<JunoPatch, LoadError> {
        let mut patches = patch::parse_bank(data)?;
        if patches.len() > 1 {
            debug!("sysex holds {} patches, loading the first", patches.len());
        }
        let first = patches.swap_remove(0);
        if !first.checksum_valid {
            warn!("patch {} checksum mismatch", first.patch_number);
        }
        self.load_patch(&first)?;
        Ok(first)
    }

    /// Handle for the audio callback.
    pub fn renderer(&self) -> AudioRenderer {
        AudioRenderer {
            audio: Arc::clone(&self.audio),
        }
    }

    pub fn readback(&self) -> EngineReadback {
        lock(&self.control)
            .as_ref()
            .map(ControlHandle::readback)
            .unwrap_or_default()
    }
}

fn midi_note(note: i32) -> Option<u8> {
    u8::try_from(note).ok().filter(|n| *n <= 127)
}

impl NativeEngine for JunoAudioEngine {
    fn native_start(&self, sample_rate: i32, block_size: i32) -> bool {
        match self.start(sample_rate, block_size) {
            Ok(()) => true,
            Err(e) => {
                warn!("engine start failed: {e}");
                false
            }
        }
    }

    fn native_stop(&self) {
        self.stop();
    }

    fn native_note_on(&self, note: i32, velocity: f32) {
        self.note_on(note, velocity);
    }

    fn native_note_off(&self, note: i32) {
        self.note_off(note);
    }

    fn native_set_param(&self, parameter_id: &str, value: f32) {
        self.set_parameter(parameter_id, value);
    }
}

// ═══════════════════════════════════════════════════════════════════
// AudioRenderer - Audio Callback API
// ═══════════════════════════════════════════════════════════════════

/// Cloneable handle for the host audio callback.
///
/// Renders silence when the engine is stopped or while the control side is
/// starting or stopping it.
#[derive(Clone)]
pub struct AudioRenderer {
    audio: SharedAudio,
}

impl AudioRenderer {
    /// Render planar stereo. Returns `false` if silence was written instead.
    pub fn render(&self, left: &mut [f32], right: &mut [f32]) -> bool {
        let Some(mut guard) = try_lock(&*self.audio) else {
            left.fill(0.0);
            right.fill(0.0);
            return false;
        };
        match guard.as_mut() {
            Some(side) => {
                side.handle.render(left, right);
                true
            }
            None => {
                left.fill(0.0);
                right.fill(0.0);
                false
            }
        }
    }

    /// Render interleaved stereo `[L0, R0, L1, R1, ...]`.
    pub fn render_interleaved(&self, output: &mut [f32]) -> bool {
        let Some(mut guard) = try_lock(&*self.audio) else {
            output.fill(0.0);
            return false;
        };
        match guard.as_mut() {
            Some(AudioSide {
                handle,
                scratch_left,
                scratch_right,
            }) => {
                handle.render_interleaved(output, scratch_left, scratch_right);
                true
            }
            None => {
                output.fill(0.0);
                false
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// GlobalEngine - Process-wide Instance
// ═══════════════════════════════════════════════════════════════════

static ENGINE: OnceLock<JunoAudioEngine> = OnceLock::new();

/// Entry points backed by the process-wide engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalEngine;

impl GlobalEngine {
    /// The process-wide engine, created on first use.
    pub fn engine() -> &'static JunoAudioEngine {
        ENGINE.get_or_init(JunoAudioEngine::default)
    }
}

impl NativeEngine for GlobalEngine {
    fn native_start(&self, sample_rate: i32, block_size: i32) -> bool {
        Self::engine().native_start(sample_rate, block_size)
    }

    fn native_stop(&self) {
        Self::engine().native_stop();
    }

    fn native_note_on(&self, note: i32, velocity: f32) {
        Self::engine().native_note_on(note, velocity);
    }

    fn native_note_off(&self, note: i32) {
        Self::engine().native_note_off(note);
    }

    fn native_set_param(&self, parameter_id: &str, value: f32) {
        Self::engine().native_set_param(parameter_id, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{ROLAND_ID, SYSEX_END, SYSEX_START};

    fn render(engine: &JunoAudioEngine, frames: usize) -> f32 {
        let mut l = vec![0.0; frames];
        let mut r = vec![0.0; frames];
        engine.renderer().render(&mut l, &mut r);
        l.iter().chain(r.iter()).fold(0.0_f32, |p, s| p.max(s.abs()))
    }

    #[test]
    fn start_validates_arguments() {
        let engine = JunoAudioEngine::default();
        assert!(!engine.native_start(0, 256));
        assert!(!engine.native_start(48_000, 0));
        assert!(!engine.is_running());

        assert!(engine.native_start(48_000, 256));
        assert!(engine.is_running());
        assert!(engine.readback().running);
    }

    #[test]
    fn start_twice_keeps_running_engine() {
        let engine = JunoAudioEngine::default();
        assert!(engine.native_start(48_000, 256));
        engine.native_note_on(60, 1.0);
        assert!(engine.native_start(44_100, 128));
        render(&engine, 256);
        assert_eq!(engine.readback().active_voices, 1);
    }

    #[test]
    fn notes_make_sound_once_started() {
        let engine = JunoAudioEngine::default();
        engine.native_note_on(60, 1.0);
        assert_eq!(render(&engine, 256), 0.0);

        engine.native_start(48_000, 256);
        engine.native_note_on(60, 1.0);
        assert!(render(&engine, 2_048) > 0.0);
        assert_eq!(engine.readback().frames_rendered, 2_048);
    }

    #[test]
    fn stop_silences_and_allows_restart() {
        let engine = JunoAudioEngine::default();
        engine.native_start(48_000, 256);
        engine.native_note_on(64, 1.0);
        engine.native_stop();
        engine.native_stop();

        assert!(!engine.is_running());
        assert_eq!(render(&engine, 256), 0.0);
        assert_eq!(engine.readback(), EngineReadback::default());

        assert!(engine.native_start(48_000, 256));
        assert_eq!(engine.readback().frames_rendered, 0);
    }

    #[test]
    fn invalid_input_is_dropped() {
        let engine = JunoAudioEngine::default();
        engine.native_start(48_000, 256);
        engine.native_note_on(-1, 1.0);
        engine.native_note_on(128, 1.0);
        engine.native_set_param("volume", 1.0);
        render(&engine, 256);
        assert_eq!(engine.readback().active_voices, 0);
        assert_eq!(engine.parameter(ParamId::Cutoff), Some(1000.0));
    }

    #[test]
    fn parameters_are_tracked() {
        let engine = JunoAudioEngine::default();
        assert_eq!(engine.parameter(ParamId::Cutoff), None);
        engine.native_start(48_000, 256);
        engine.native_set_param("cutoff", 2_500.0);
        engine.native_set_param("chorusMode", 2.0);
        assert_eq!(engine.parameter(ParamId::Cutoff), Some(2_500.0));
        assert_eq!(engine.parameter(ParamId::ChorusMode), Some(2.0));
    }

    #[test]
    fn non_finite_parameters_do_not_poison_the_filter() {
        let engine = JunoAudioEngine::default();
        engine.native_start(48_000, 256);
        engine.native_note_on(60, 1.0);
        engine.native_set_param("cutoff", f32::NAN);
        engine.native_set_param("resonance", f32::INFINITY);
        assert_eq!(engine.parameter(ParamId::Cutoff), Some(1000.0));
        render(&engine, 512);

        engine.native_set_param("cutoff", 1_200.0);
        engine.native_note_off(60);
        engine.native_note_on(60, 1.0);

        let mut l = vec![0.0; 2_048];
        let mut r = vec![0.0; 2_048];
        engine.renderer().render(&mut l, &mut r);
        assert!(l.iter().chain(r.iter()).all(|s| s.is_finite()));
        assert!(l.iter().any(|s| *s != 0.0));
        assert!(engine.readback().output_peaks[0].is_finite());
    }

    #[test]
    fn aftertouch_is_validated_and_reaches_voices() {
        let engine = JunoAudioEngine::default();
        engine.aftertouch(60, 1.0);

        engine.native_start(48_000, 256);
        engine.native_note_on(60, 1.0);
        engine.aftertouch(-3, 1.0);
        engine.aftertouch(60, f32::NAN);
        engine.aftertouch(60, 4.0);
        assert!(render(&engine, 512).is_finite());
        assert_eq!(engine.readback().active_voices, 1);
    }

    #[test]
    fn concurrent_start_and_stop_stay_consistent() {
        let engine = Arc::new(JunoAudioEngine::default());
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    for n in 0..200 {
                        if (i + n) % 2 == 0 {
                            engine.start(48_000, 64).unwrap();
                        } else {
                            engine.stop();
                        }
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        let has_audio = lock(&*engine.audio).is_some();
        assert_eq!(engine.is_running(), has_audio);

        engine.start(48_000, 64).unwrap();
        engine.native_note_on(60, 1.0);
        assert!(render(&engine, 256) > 0.0);
    }

    #[test]
    fn configured_polyphony_limits_voices() {
        let engine = JunoAudioEngine::new(EngineConfig {
            polyphony: 2,
            ..Default::default()
        });
        engine.native_start(48_000, 128);
        for note in [60, 64, 67] {
            engine.native_note_on(note, 1.0);
        }
        render(&engine, 128);
        assert_eq!(engine.readback().active_voices, 2);
    }

    #[test]
    fn sysex_loads_into_running_engine() {
        let mut msg = vec![SYSEX_START, ROLAND_ID, 0x30, 0x07, 0x00];
        msg.extend_from_slice(&[64; 16]);
        msg.extend_from_slice(&[0x40, 0x10, 0x00, SYSEX_END]);
        msg[23] = patch::checksum(&msg);

        let engine = JunoAudioEngine::default();
        assert!(matches!(
            engine.load_sysex(&msg),
            Err(LoadError::NotRunning)
        ));

        engine.native_start(48_000, 256);
        let loaded = engine.load_sysex(&msg).unwrap();
        assert_eq!(loaded.patch_number, 7);
        assert_eq!(engine.parameter(ParamId::ChorusMode), Some(1.0));
        assert_eq!(engine.parameter(ParamId::HpfStep), Some(2.0));

        assert!(matches!(
            engine.load_sysex(&msg[..10]),
            Err(LoadError::Patch(_))
        ));
    }

    #[test]
    fn interleaved_render_fills_both_channels() {
        let engine = JunoAudioEngine::default();
        engine.native_start(48_000, 64);
        engine.native_set_param("chorusMode", 0.0);
        engine.native_note_on(69, 1.0);

        let mut out = vec![0.0; 1_000];
        assert!(engine.renderer().render_interleaved(&mut out));
        assert!(out.iter().any(|s| *s != 0.0));
        for frame in out.chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn contended_renderer_outputs_silence() {
        let engine = JunoAudioEngine::default();
        engine.native_start(48_000, 64);
        engine.native_note_on(60, 1.0);

        let _held = lock(&*engine.audio);
        let mut l = vec![1.0; 64];
        let mut r = vec![1.0; 64];
        assert!(!engine.renderer().render(&mut l, &mut r));
        assert!(l.iter().all(|s| *s == 0.0));
    }
}
