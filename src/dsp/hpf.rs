// src/dsp/hpf.rs
//
// Juno-style stepped highpass (one-pole).

use std::f32::consts::PI;

/// Cutoff per HPF switch position. Step 0 bypasses the filter.
const STEP_CUTOFFS: [f32; 4] = [0.0, 80.0, 160.0, 360.0];

pub struct HighPassFilter {
    sample_rate: f32,
    step: u8,
    coeff: f32,
    prev_input: f32,
    prev_output: f32,
}

impl HighPassFilter {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            step: 0,
            coeff: 1.0,
            prev_input: 0.0,
            prev_output: 0.0,
        }
    }

    /// Select a switch position; values above 3 are clamped.
    pub fn set_step(&mut self, step: u8) {
        self.step = step.min(3);
        let cutoff = STEP_CUTOFFS[self.step as usize];
        self.coeff = if cutoff > 0.0 && self.sample_rate > 0.0 {
            let rc = 1.0 / (2.0 * PI * cutoff);
            let dt = 1.0 / self.sample_rate;
            rc / (rc + dt)
        } else {
            1.0
        };
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn reset(&mut self) {
        self.prev_input = 0.0;
        self.prev_output = 0.0;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        if self.step == 0 {
            return input;
        }
        let out = self.coeff * (self.prev_output + input - self.prev_input);
        self.prev_input = input;
        self.prev_output = out;
        out
    }
}
