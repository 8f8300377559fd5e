// src/voice.rs
//
// One polyphonic voice: PWM ramp DCO + sub, ladder VCF, ADSR, LFO.

use std::f32::consts::TAU;

use crate::dsp::NonlinearVcf;
use crate::parameter::ParamId;

pub type VoiceId = usize;

/// Level below which a releasing voice is considered silent.
const SILENCE_THRESHOLD: f32 = 1e-4;
const MIN_ENV_TIME: f32 = 0.0005;

/// Cutoff modulation works on a 20 Hz .. 20 kHz log scale (three decades).
const MOD_MIN_HZ: f32 = 20.0;
const MOD_DECADES: f32 = 3.0;

/// Cutoff offset at full aftertouch pressure, in units of the modulation scale.
const AFTERTOUCH_DEPTH: f32 = 0.5;

// ═══════════════════════════════════════════════════════════════════
// Envelope
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Linear attack, exponential decay and release.
#[derive(Debug, Clone)]
pub struct Envelope {
    stage: EnvelopeStage,
    level: f32,
    sample_rate: f32,

    attack: f32,
    decay: f32,
    sustain: f32,
    release: f32,
}

impl Envelope {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            stage: EnvelopeStage::Idle,
            level: 0.0,
            sample_rate,
            attack: ParamId::Attack.default_value(),
            decay: ParamId::Decay.default_value(),
            sustain: ParamId::Sustain.default_value(),
            release: ParamId::Release.default_value(),
        }
    }

    pub fn gate_on(&mut self) {
        self.level = 0.0;
        self.stage = EnvelopeStage::Attack;
    }

    pub fn gate_off(&mut self) {
        if self.stage != EnvelopeStage::Idle {
            self.stage = EnvelopeStage::Release;
        }
    }

    pub fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
    }

    #[inline]
    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    #[inline]
    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn set_attack(&mut self, seconds: f32) {
        self.attack = seconds.max(MIN_ENV_TIME);
    }

    pub fn set_decay(&mut self, seconds: f32) {
        self.decay = seconds.max(MIN_ENV_TIME);
    }

    pub fn set_sustain(&mut self, level: f32) {
        self.sustain = level.clamp(0.0, 1.0);
    }

    pub fn set_release(&mut self, seconds: f32) {
        self.release = seconds.max(MIN_ENV_TIME);
    }

    #[inline]
    fn coeff(&self, seconds: f32) -> f32 {
        (-1.0 / (seconds * self.sample_rate).max(1.0)).exp()
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => 0.0,

            EnvelopeStage::Attack => {
                self.level += 1.0 / (self.attack * self.sample_rate).max(1.0);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeStage::Decay;
                }
                self.level
            }

            EnvelopeStage::Decay => {
                let coeff = self.coeff(self.decay);
                self.level = self.sustain + (self.level - self.sustain) * coeff;
                if (self.level - self.sustain).abs() < SILENCE_THRESHOLD {
                    self.level = self.sustain;
                    self.stage = EnvelopeStage::Sustain;
                }
                self.level
            }

            EnvelopeStage::Sustain => {
                self.level = self.sustain;
                self.level
            }

            EnvelopeStage::Release => {
                self.level *= self.coeff(self.release);
                if self.level < SILENCE_THRESHOLD {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
                self.level
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Voice
// ═══════════════════════════════════════════════════════════════════

pub struct JunoVoice {
    pub id: VoiceId,
    sample_rate: f32,

    note: Option<u8>,
    gate: bool,
    velocity: f32,
    frequency: f32,

    phase: f32,
    sub_phase: f32,
    lfo_phase: f32,
    aftertouch: f32,

    cutoff: f32,
    resonance: f32,
    pwm_depth: f32,
    sub_level: f32,
    env_mod: f32,
    lfo_rate: f32,
    lfo_mod: f32,

    envelope: Envelope,
    filter: NonlinearVcf,
}

impl JunoVoice {
    pub fn new(id: VoiceId, sample_rate: f32) -> Self {
        Self {
            id,
            sample_rate,
            note: None,
            gate: false,
            velocity: 0.0,
            frequency: 0.0,
            phase: 0.0,
            sub_phase: 0.0,
            lfo_phase: 0.0,
            aftertouch: 0.0,
            cutoff: ParamId::Cutoff.default_value(),
            resonance: ParamId::Resonance.default_value(),
            pwm_depth: ParamId::PwmDepth.default_value(),
            sub_level: ParamId::SubLevel.default_value(),
            env_mod: ParamId::EnvMod.default_value(),
            lfo_rate: ParamId::LfoRate.default_value(),
            lfo_mod: ParamId::LfoMod.default_value(),
            envelope: Envelope::new(sample_rate),
            filter: NonlinearVcf::new(sample_rate),
        }
    }

    pub fn note_on(&mut self, note: u8, velocity: f32) {
        self.note = Some(note);
        self.gate = true;
        self.velocity = velocity;
        self.frequency = note_to_hz(note);
        self.phase = 0.0;
        self.sub_phase = 0.0;
        self.aftertouch = 0.0;
        self.envelope.gate_on();
    }

    /// Key pressure (0-1) while the voice holds `note`.
    pub fn aftertouch(&mut self, note: u8, pressure: f32) -> bool {
        if self.gate && self.note == Some(note) {
            self.aftertouch = pressure.clamp(0.0, 1.0);
            return true;
        }
        false
    }

    /// Release the voice if it is holding `note`.
    pub fn note_off(&mut self, note: u8) -> bool {
        if self.gate && self.note == Some(note) {
            self.gate = false;
            self.envelope.gate_off();
            return true;
        }
        false
    }

    pub fn release(&mut self) {
        self.gate = false;
        self.envelope.gate_off();
    }

    /// Still audible (gated or releasing).
    #[inline]
    pub fn is_active(&self) -> bool {
        self.envelope.stage() != EnvelopeStage::Idle
    }

    #[inline]
    pub fn is_gated(&self) -> bool {
        self.gate
    }

    #[inline]
    pub fn note(&self) -> Option<u8> {
        self.note
    }

    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    #[inline]
    pub fn envelope_level(&self) -> f32 {
        self.envelope.level()
    }

    pub fn set_param(&mut self, id: ParamId, value: f32) {
        match id {
            ParamId::Cutoff => self.cutoff = value,
            ParamId::Resonance => self.resonance = value,
            ParamId::Attack => self.envelope.set_attack(value),
            ParamId::Decay => self.envelope.set_decay(value),
            ParamId::Sustain => self.envelope.set_sustain(value),
            ParamId::Release => self.envelope.set_release(value),
            ParamId::PwmDepth => self.pwm_depth = value,
            ParamId::SubLevel => self.sub_level = value,
            ParamId::EnvMod => self.env_mod = value.clamp(-1.0, 1.0),
            ParamId::LfoRate => self.lfo_rate = value.max(0.0),
            ParamId::LfoMod => self.lfo_mod = value.clamp(0.0, 1.0),
            // Master section
            ParamId::ChorusMode | ParamId::HpfStep => {}
        }
    }

    pub fn reset(&mut self) {
        self.note = None;
        self.gate = false;
        self.phase = 0.0;
        self.sub_phase = 0.0;
        self.lfo_phase = 0.0;
        self.aftertouch = 0.0;
        self.envelope.reset();
        self.filter.reset();
    }

    /// Render one mono sample.
    #[inline]
    pub fn process(&mut self) -> f32 {
        if !self.is_active() {
            return 0.0;
        }

        let env = self.envelope.next();
        if !self.is_active() {
            self.note = None;
            return 0.0;
        }

        let (inc, lfo_inc) = if self.sample_rate > 0.0 {
            (self.frequency / self.sample_rate, self.lfo_rate / self.sample_rate)
        } else {
            (0.0, 0.0)
        };

        let lfo = (self.lfo_phase * TAU).sin();
        self.lfo_phase = (self.lfo_phase + lfo_inc).fract();

        self.phase += inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.sub_phase = (self.sub_phase + inc * 0.5).fract();

        let width = self.pwm_depth.clamp(0.05, 0.95);
        let osc = if self.phase < width {
            -1.0 + (self.phase / width) * 2.0
        } else {
            1.0 - ((self.phase - width) / (1.0 - width)) * 2.0
        };
        let square = if self.sub_phase < 0.5 { 1.0 } else { -1.0 };
        let sub = square * self.sub_level;

        let amount = env * self.env_mod + lfo * self.lfo_mod + self.aftertouch * AFTERTOUCH_DEPTH;
        let cutoff = modulated_cutoff(self.cutoff, amount);

        let filtered = self.filter.process(osc + sub, cutoff, self.resonance);
        filtered * env * self.velocity
    }
}

/// Shift `base_hz` by `amount` on the modulation scale, clamped to its range.
#[inline]
pub fn modulated_cutoff(base_hz: f32, amount: f32) -> f32 {
    if amount == 0.0 {
        return base_hz;
    }
    let norm = (base_hz.max(MOD_MIN_HZ) / MOD_MIN_HZ).log10() / MOD_DECADES;
    let norm = (norm + amount).clamp(0.0, 1.0);
    MOD_MIN_HZ * 10.0_f32.powf(norm * MOD_DECADES)
}

#[inline]
pub fn note_to_hz(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48_000.0;

    #[test]
    fn note_frequencies() {
        assert!((note_to_hz(69) - 440.0).abs() < 1e-3);
        assert!((note_to_hz(57) - 220.0).abs() < 1e-3);
        assert!((note_to_hz(60) - 261.6256).abs() < 1e-2);
    }

    #[test]
    fn envelope_runs_through_stages() {
        let mut env = Envelope::new(SR);
        env.set_attack(0.001);
        env.set_decay(0.001);
        env.set_sustain(0.5);
        env.set_release(0.001);

        env.gate_on();
        assert_eq!(env.stage(), EnvelopeStage::Attack);

        for _ in 0..50 {
            env.next();
        }
        assert_eq!(env.stage(), EnvelopeStage::Decay);

        for _ in 0..1_000 {
            env.next();
        }
        assert_eq!(env.stage(), EnvelopeStage::Sustain);
        assert_eq!(env.level(), 0.5);

        env.gate_off();
        for _ in 0..1_000 {
            env.next();
        }
        assert_eq!(env.stage(), EnvelopeStage::Idle);
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn envelope_times_are_floored() {
        let mut env = Envelope::new(SR);
        env.set_attack(0.0);
        env.gate_on();
        // 0.5ms at 48kHz is 24 samples
        for _ in 0..23 {
            env.next();
        }
        assert_eq!(env.stage(), EnvelopeStage::Attack);
        env.next();
        env.next();
        assert_ne!(env.stage(), EnvelopeStage::Attack);
    }

    #[test]
    fn voice_produces_sound_then_goes_idle() {
        let mut voice = JunoVoice::new(0, SR);
        voice.set_param(ParamId::Release, 0.001);
        voice.note_on(60, 1.0);
        assert!(voice.is_active());

        let peak = (0..4_800).map(|_| voice.process().abs()).fold(0.0, f32::max);
        assert!(peak > 0.05, "peak {peak}");

        assert!(voice.note_off(60));
        for _ in 0..4_800 {
            voice.process();
        }
        assert!(!voice.is_active());
        assert_eq!(voice.note(), None);
        assert_eq!(voice.process(), 0.0);
    }

    #[test]
    fn note_off_ignores_other_notes() {
        let mut voice = JunoVoice::new(0, SR);
        voice.note_on(60, 0.8);
        assert!(!voice.note_off(61));
        assert!(voice.is_gated());
    }

    #[test]
    fn cutoff_modulation_on_log_scale() {
        assert_eq!(modulated_cutoff(1000.0, 0.0), 1000.0);
        // one decade up and down
        assert!((modulated_cutoff(200.0, 1.0 / 3.0) - 2_000.0).abs() < 1.0);
        assert!((modulated_cutoff(2_000.0, -1.0 / 3.0) - 200.0).abs() < 0.1);
        assert!((modulated_cutoff(1000.0, 5.0) - 20_000.0).abs() < 1.0);
        assert!((modulated_cutoff(1000.0, -5.0) - 20.0).abs() < 1e-3);
    }

    fn rms(voice: &mut JunoVoice, samples: usize) -> f32 {
        let sum: f32 = (0..samples).map(|_| voice.process().powi(2)).sum();
        (sum / samples as f32).sqrt()
    }

    fn dull_voice(id: VoiceId) -> JunoVoice {
        let mut voice = JunoVoice::new(id, SR);
        voice.set_param(ParamId::Cutoff, 100.0);
        voice.set_param(ParamId::EnvMod, 0.0);
        voice.set_param(ParamId::LfoMod, 0.0);
        voice
    }

    #[test]
    fn envelope_opens_filter() {
        let mut plain = dull_voice(0);
        let mut swept = dull_voice(1);
        swept.set_param(ParamId::EnvMod, 0.8);
        plain.note_on(60, 1.0);
        swept.note_on(60, 1.0);
        assert!(rms(&mut swept, 4_800) > rms(&mut plain, 4_800) * 1.5);
    }

    #[test]
    fn aftertouch_opens_filter_for_held_note_only() {
        let mut plain = dull_voice(0);
        let mut pressed = dull_voice(1);
        plain.note_on(60, 1.0);
        pressed.note_on(60, 1.0);
        assert!(!pressed.aftertouch(61, 1.0));
        assert!(pressed.aftertouch(60, 1.0));
        assert!(rms(&mut pressed, 4_800) > rms(&mut plain, 4_800) * 1.5);

        // retrigger clears pressure
        pressed.note_on(60, 1.0);
        assert_eq!(pressed.aftertouch, 0.0);
        pressed.note_off(60);
        assert!(!pressed.aftertouch(60, 1.0));
    }

    #[test]
    fn lfo_moves_cutoff() {
        let mut still = dull_voice(0);
        let mut wobble = dull_voice(1);
        wobble.set_param(ParamId::LfoMod, 1.0);
        wobble.set_param(ParamId::LfoRate, 20.0);
        still.note_on(60, 1.0);
        wobble.note_on(60, 1.0);
        let differs = (0..4_800).any(|_| (still.process() - wobble.process()).abs() > 1e-3);
        assert!(differs);
    }

    #[test]
    fn velocity_scales_output() {
        let mut loud = JunoVoice::new(0, SR);
        let mut quiet = JunoVoice::new(1, SR);
        loud.note_on(48, 1.0);
        quiet.note_on(48, 0.25);
        for _ in 0..2_000 {
            let a = loud.process();
            let b = quiet.process();
            assert!((a * 0.25 - b).abs() < 1e-5);
        }
    }
}
