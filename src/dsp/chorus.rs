// src/dsp/chorus.rs
//
// Bucket-brigade style stereo chorus (Juno modes I and II).

use std::f32::consts::TAU;

const MAX_DELAY_SECONDS: f32 = 0.050;

const LFO_RATE_LEFT: f32 = 0.6;
const LFO_RATE_RIGHT: f32 = 1.2;

const DRY_MIX: f32 = 0.7;
const WET_MIX: f32 = 0.6;

/// Clock noise riding on the delay line.
const NOISE_AMOUNT: f32 = 0.003;
const NOISE_SEED: u32 = 0x1234_5678;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChorusMode {
    Off,
    #[default]
    I,
    II,
}

impl ChorusMode {
    /// Map a host value (0 = off, 1 = I, 2 = II). Anything else is off.
    pub fn from_value(value: f32) -> Self {
        match value.round() as i32 {
            1 => ChorusMode::I,
            2 => ChorusMode::II,
            _ => ChorusMode::Off,
        }
    }

    pub fn as_value(self) -> f32 {
        match self {
            ChorusMode::Off => 0.0,
            ChorusMode::I => 1.0,
            ChorusMode::II => 2.0,
        }
    }

    /// (base delay, modulation depth) in seconds.
    fn timing(self) -> (f32, f32) {
        match self {
            ChorusMode::II => (0.020, 0.008),
            _ => (0.012, 0.004),
        }
    }
}

pub struct BbdChorus {
    sample_rate: f32,
    mode: ChorusMode,
    buffer: Vec<f32>,
    write_index: usize,
    lfo_phase_left: f32,
    lfo_phase_right: f32,
    noise_state: u32,
}

impl BbdChorus {
    pub fn new(sample_rate: f32) -> Self {
        let len = (MAX_DELAY_SECONDS * sample_rate.max(0.0)) as usize + 4;
        Self {
            sample_rate,
            mode: ChorusMode::default(),
            buffer: vec![0.0; len],
            write_index: 0,
            lfo_phase_left: 0.0,
            lfo_phase_right: 0.5,
            noise_state: NOISE_SEED,
        }
    }

    pub fn set_mode(&mut self, mode: ChorusMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> ChorusMode {
        self.mode
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_index = 0;
        self.lfo_phase_left = 0.0;
        self.lfo_phase_right = 0.5;
    }

    /// Process one mono sample into a stereo pair.
    #[inline]
    pub fn process(&mut self, input: f32) -> (f32, f32) {
        if self.mode == ChorusMode::Off || self.sample_rate <= 0.0 {
            return (input, input);
        }

        let (base, depth) = self.mode.timing();

        let lfo_left = (TAU * self.lfo_phase_left).sin();
        let lfo_right = (TAU * self.lfo_phase_right).sin();

        let wet_left = self.read_delayed(base + depth * lfo_left);
        let wet_right = self.read_delayed(base + depth * lfo_right);

        let noise = NOISE_AMOUNT * self.white_noise();
        self.write(input + noise);

        let inv_sr = 1.0 / self.sample_rate;
        self.lfo_phase_left = (self.lfo_phase_left + LFO_RATE_LEFT * inv_sr).fract();
        self.lfo_phase_right = (self.lfo_phase_right + LFO_RATE_RIGHT * inv_sr).fract();

        (
            DRY_MIX * input + WET_MIX * wet_left,
            DRY_MIX * input + WET_MIX * wet_right,
        )
    }

    #[inline]
    fn write(&mut self, x: f32) {
        self.buffer[self.write_index] = x;
        self.write_index = (self.write_index + 1) % self.buffer.len();
    }

    #[inline]
    fn read_delayed(&self, delay_seconds: f32) -> f32 {
        let len = self.buffer.len();
        let delay = (delay_seconds * self.sample_rate).clamp(0.0, (len - 2) as f32);

        let mut read_pos = self.write_index as f32 - delay;
        if read_pos < 0.0 {
            read_pos += len as f32;
        }

        let idx0 = read_pos as usize % len;
        let idx1 = (idx0 + 1) % len;
        let frac = read_pos.fract();

        let s0 = self.buffer[idx0];
        let s1 = self.buffer[idx1];
        s0 + (s1 - s0) * frac
    }

    /// xorshift32 mapped to -1..1
    #[inline]
    fn white_noise(&mut self) -> f32 {
        let mut x = self.noise_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.noise_state = x;

        let bits = (x & 0x007F_FFFF) | 0x3F80_0000;
        (f32::from_bits(bits) - 1.5) * 2.0
    }
}
