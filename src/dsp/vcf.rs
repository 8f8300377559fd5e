// src/dsp/vcf.rs
//
// Four-pole ladder-style lowpass with soft saturation.

use std::f32::consts::PI;

const MIN_CUTOFF_HZ: f32 = 20.0;
const MAX_CUTOFF_RATIO: f32 = 0.45;
const MAX_RESONANCE: f32 = 1.2;

/// Feedback gain at resonance 1.0; self-oscillation starts around there.
const FEEDBACK_SCALE: f32 = 3.5;

pub struct NonlinearVcf {
    sample_rate: f32,
    stages: [f32; 4],
}

impl NonlinearVcf {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            stages: [0.0; 4],
        }
    }

    pub fn reset(&mut self) {
        self.stages = [0.0; 4];
    }

    /// Filter one sample.
    ///
    /// `cutoff_hz` is clamped to 20 Hz .. 0.45 * sample rate,
    /// `resonance` to 0 .. 1.2.
    #[inline]
    pub fn process(&mut self, input: f32, cutoff_hz: f32, resonance: f32) -> f32 {
        if self.sample_rate <= 0.0 {
            return input;
        }

        let cutoff = cutoff_hz.clamp(MIN_CUTOFF_HZ, self.sample_rate * MAX_CUTOFF_RATIO);
        let resonance = resonance.clamp(0.0, MAX_RESONANCE);

        let fc = cutoff / self.sample_rate;
        let g = 1.0 - (-2.0 * PI * fc).exp();

        let feedback = resonance * FEEDBACK_SCALE;
        let mut x = soft_clip(input - feedback * self.stages[3]);

        for stage in &mut self.stages {
            *stage += g * (x - *stage);
            x = *stage;
        }

        soft_clip(self.stages[3])
    }
}

#[inline]
fn soft_clip(x: f32) -> f32 {
    (x * 1.5).tanh()
}
