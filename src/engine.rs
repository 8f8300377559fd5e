// src/engine.rs

use log::trace;

use crate::audio_buffer::StereoBuffer;
use crate::dsp::{BbdChorus, ChorusMode, HighPassFilter};
use crate::event::Event;
use crate::parameter::ParamId;
use crate::voice_allocator::VoiceAllocator;

/// Real-time polyphonic synth engine.
///
/// This struct runs exclusively on the audio thread.
/// It must be deterministic, allocation-free, and lock-free.
pub struct JunoDspEngine {
    /// Voice pool
    voices: VoiceAllocator,

    /// Master section: HPF, then chorus
    hpf: HighPassFilter,
    chorus: BbdChorus,

    sample_rate: f32,
    output_gain: f32,
}

impl JunoDspEngine {
    pub fn new(sample_rate: f32, polyphony: usize, output_gain: f32) -> Self {
        let mut hpf = HighPassFilter::new(sample_rate);
        hpf.set_step(ParamId::HpfStep.default_value() as u8);
        let mut chorus = BbdChorus::new(sample_rate);
        chorus.set_mode(ChorusMode::from_value(ParamId::ChorusMode.default_value()));

        Self {
            voices: VoiceAllocator::new(polyphony, sample_rate),
            hpf,
            chorus,
            sample_rate,
            output_gain,
        }
    }

    /// Apply an event immediately.
    #[inline]
    pub fn apply_event(&mut self, event: &Event) {
        match *event {
            Event::NoteOn { note, velocity } => {
                let voice = self.voices.note_on(note, velocity);
                trace!("note on {note} -> voice {voice:?}");
            }

            Event::NoteOff { note } => {
                self.voices.note_off(note);
            }

            Event::SetParam { param, value } => self.set_param(param, value),

            Event::Aftertouch { note, pressure } => {
                self.voices.aftertouch(note, pressure);
            }

            Event::AllNotesOff => self.voices.release_all(),
        }
    }

    fn set_param(&mut self, param: ParamId, value: f32) {
        match param {
            ParamId::ChorusMode => self.chorus.set_mode(ChorusMode::from_value(value)),
            ParamId::HpfStep => self.hpf.set_step(value.round().clamp(0.0, 3.0) as u8),
            _ => self.voices.set_param(param, value),
        }
    }

    /// Render into the whole buffer.
    ///
    /// Called once per audio block from the audio callback.
    /// It must not allocate or block.
    pub fn render(&mut self, output: &mut StereoBuffer) {
        for frame in 0..output.frames() {
            let mono = self.hpf.process(self.voices.process());
            let (left, right) = self.chorus.process(mono);
            output.write(frame, left * self.output_gain, right * self.output_gain);
        }
    }

    /// Silence every voice and clear filter/delay state.
    pub fn reset(&mut self) {
        self.voices.reset();
        self.hpf.reset();
        self.chorus.reset();
    }

    pub fn active_voices(&self) -> usize {
        self.voices.active_count()
    }

    pub fn polyphony(&self) -> usize {
        self.voices.capacity()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn chorus_mode(&self) -> ChorusMode {
        self.chorus.mode()
    }

    pub fn hpf_step(&self) -> u8 {
        self.hpf.step()
    }

    pub fn voices(&self) -> &VoiceAllocator {
        &self.voices
    }
}
