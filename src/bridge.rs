//! Thread-safe bridge between the control thread and the audio engine.
//!
//! This module provides the communication layer that allows host calls
//! (note on/off, parameter changes) to reach the real-time engine safely.
//!
//! # Architecture
//!
//! - **Control thread** owns [`ControlHandle`] with the last parameter values
//! - **Audio thread** owns [`EngineHandle`] with the [`JunoDspEngine`]
//! - Events travel over a bounded channel; readback uses atomics
//!
//! # Usage
//!
//! ```ignore
//! let (control, engine) = create_bridge(dsp, 256, 1024);
//!
//! // Control thread: send events
//! control.note_on(60, 0.8);
//!
//! // Audio thread: apply events and render
//! engine.render(&mut left, &mut right);
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    mpsc::{self, Receiver, SyncSender, TrySendError},
};

use log::warn;

use crate::audio_buffer::StereoBuffer;
use crate::engine::JunoDspEngine;
use crate::event::Event;
use crate::parameter::{ParamId, ParameterStore};

/// Snapshot of engine state for meters and status displays.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineReadback {
    pub frames_rendered: u64,
    pub active_voices: usize,
    /// Absolute peak of the last rendered block, [left, right].
    pub output_peaks: [f32; 2],
    pub running: bool,
}

/// Handle for the control thread to communicate with the engine.
///
/// All methods are safe to call from the host's UI/JS thread.
pub struct ControlHandle {
    /// Last value written per parameter.
    params: ParameterStore,

    /// Channel to send events to the engine.
    event_tx: SyncSender<Event>,

    /// Shared readback state (updated by engine, read by control).
    readback: Arc<SharedReadback>,
}

/// Handle for the audio thread containing the engine and its event queue.
pub struct EngineHandle {
    engine: JunoDspEngine,

    /// Channel to receive events from control.
    event_rx: Receiver<Event>,

    /// Frames rendered between event polls.
    block_size: usize,

    /// Shared readback state (written by engine).
    readback: Arc<SharedReadback>,
}

/// Lock-free shared state for engine -> control readback.
struct SharedReadback {
    frames_rendered: AtomicU64,
    active_voices: AtomicU64,
    /// Peaks stored as f32 bits (no AtomicF32 in std)
    peak_left_bits: AtomicU32,
    peak_right_bits: AtomicU32,
    running: AtomicBool,
}

impl SharedReadback {
    fn new() -> Self {
        Self {
            frames_rendered: AtomicU64::new(0),
            active_voices: AtomicU64::new(0),
            peak_left_bits: AtomicU32::new(0.0_f32.to_bits()),
            peak_right_bits: AtomicU32::new(0.0_f32.to_bits()),
            running: AtomicBool::new(false),
        }
    }
}

/// Create a linked pair of handles for control and audio.
///
/// `block_size` bounds how many frames are rendered before pending events
/// are picked up again; `capacity` bounds the event queue.
pub fn create_bridge(
    engine: JunoDspEngine,
    block_size: usize,
    capacity: usize,
) -> (ControlHandle, EngineHandle) {
    let (event_tx, event_rx) = mpsc::sync_channel(capacity);
    let readback = Arc::new(SharedReadback::new());
    readback.running.store(true, Ordering::Relaxed);

    let control = ControlHandle {
        params: ParameterStore::new(),
        event_tx,
        readback: Arc::clone(&readback),
    };

    let audio = EngineHandle {
        engine,
        event_rx,
        block_size: block_size.max(1),
        readback,
    };

    (control, audio)
}

// ═══════════════════════════════════════════════════════════════════
// ControlHandle - Control Thread API
// ═══════════════════════════════════════════════════════════════════

impl ControlHandle {
    /// Queue an event for the engine.
    ///
    /// Returns `false` if the queue is full or the engine is gone; the event
    /// is dropped in both cases.
    pub fn send(&self, event: Event) -> bool {
        match self.event_tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!("event queue full, dropping {event:?}");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn note_on(&self, note: u8, velocity: f32) -> bool {
        self.send(Event::NoteOn { note, velocity })
    }

    pub fn note_off(&self, note: u8) -> bool {
        self.send(Event::NoteOff { note })
    }

    pub fn all_notes_off(&self) -> bool {
        self.send(Event::AllNotesOff)
    }

    pub fn aftertouch(&self, note: u8, pressure: f32) -> bool {
        self.send(Event::Aftertouch { note, pressure })
    }

    /// Record and forward a parameter change.
    pub fn set_param(&mut self, param: ParamId, value: f32) -> bool {
        self.params.set(param, value);
        self.send(Event::SetParam { param, value })
    }

    /// Last value set for `param`, or its default.
    pub fn param(&self, param: ParamId) -> f32 {
        self.params.get(param)
    }

    /// Get the current engine readback state.
    pub fn readback(&self) -> EngineReadback {
        EngineReadback {
            frames_rendered: self.readback.frames_rendered.load(Ordering::Relaxed),
            active_voices: self.readback.active_voices.load(Ordering::Relaxed) as usize,
            output_peaks: [
                f32::from_bits(self.readback.peak_left_bits.load(Ordering::Relaxed)),
                f32::from_bits(self.readback.peak_right_bits.load(Ordering::Relaxed)),
            ],
            running: self.readback.running.load(Ordering::Relaxed),
        }
    }

    /// Mark the link as stopped; the audio side renders silence afterwards.
    pub fn shutdown(&self) {
        self.readback.running.store(false, Ordering::Release);
    }
}

impl Drop for ControlHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ═══════════════════════════════════════════════════════════════════
// EngineHandle - Audio Thread API
// ═══════════════════════════════════════════════════════════════════

impl EngineHandle {
    /// Apply every pending event. Returns how many were applied.
    pub fn process_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            self.engine.apply_event(&event);
            applied += 1;
        }
        applied
    }

    /// Render planar stereo into `left` and `right`.
    ///
    /// Events are applied before each chunk of at most `block_size` frames.
    /// After `shutdown` the buffers are filled with silence.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        if !self.is_running() {
            StereoBuffer::new(left, right).clear();
            self.publish_peaks([0.0, 0.0]);
            return;
        }

        let frames = left.len().min(right.len());
        let peaks = self.render_chunks(left, right);
        self.finish_block(frames, peaks);
    }

    /// Render into an interleaved `[L0, R0, L1, R1, ...]` buffer.
    ///
    /// `scratch_left`/`scratch_right` must be at least `block_size` long.
    /// A trailing odd sample is zeroed. Readback covers the whole buffer.
    pub fn render_interleaved(
        &mut self,
        output: &mut [f32],
        scratch_left: &mut [f32],
        scratch_right: &mut [f32],
    ) {
        let total = output.len() / 2;
        let step = self
            .block_size
            .min(scratch_left.len())
            .min(scratch_right.len());

        if !self.is_running() || step == 0 {
            output.fill(0.0);
            self.publish_peaks([0.0, 0.0]);
            return;
        }

        let mut peaks = [0.0_f32; 2];
        let mut offset = 0;
        while offset < total {
            let chunk = (total - offset).min(step);
            let (l, r) = (&mut scratch_left[..chunk], &mut scratch_right[..chunk]);
            let [pl, pr] = self.render_chunks(l, r);
            peaks = [peaks[0].max(pl), peaks[1].max(pr)];

            let dst = &mut output[offset * 2..(offset + chunk) * 2];
            StereoBuffer::new(l, r).interleave_into(dst);
            offset += chunk;
        }
        if let Some(last) = output.get_mut(total * 2) {
            *last = 0.0;
        }

        self.finish_block(total, peaks);
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.readback.running.load(Ordering::Acquire)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Get a reference to the engine.
    pub fn engine(&self) -> &JunoDspEngine {
        &self.engine
    }

    /// Get a mutable reference to the engine.
    pub fn engine_mut(&mut self) -> &mut JunoDspEngine {
        &mut self.engine
    }

    /// Render in chunks of at most `block_size`, applying events before each.
    /// Returns the peaks over everything rendered.
    fn render_chunks(&mut self, left: &mut [f32], right: &mut [f32]) -> [f32; 2] {
        let mut output = StereoBuffer::new(left, right);
        let total = output.frames();
        let mut peaks = [0.0_f32; 2];
        let mut offset = 0;

        while offset < total {
            let chunk = (total - offset).min(self.block_size);
            self.process_events();

            let mut slice = StereoBuffer::new(
                &mut output.left[offset..offset + chunk],
                &mut output.right[offset..offset + chunk],
            );
            self.engine.render(&mut slice);

            let [l, r] = slice.peaks();
            peaks = [peaks[0].max(l), peaks[1].max(r)];
            offset += chunk;
        }
        peaks
    }

    fn finish_block(&self, frames: usize, peaks: [f32; 2]) {
        self.readback
            .frames_rendered
            .fetch_add(frames as u64, Ordering::Relaxed);
        self.publish_peaks(peaks);
        self.sync_readback();
    }

    fn publish_peaks(&self, peaks: [f32; 2]) {
        self.readback
            .peak_left_bits
            .store(peaks[0].to_bits(), Ordering::Relaxed);
        self.readback
            .peak_right_bits
            .store(peaks[1].to_bits(), Ordering::Relaxed);
    }

    /// Sync readback state from engine.
    fn sync_readback(&self) {
        self.readback
            .active_voices
            .store(self.engine.active_voices() as u64, Ordering::Relaxed);
    }
}
