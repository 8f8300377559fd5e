// src/dsp/scaler.rs
//
// Juno-106 slider (0-127) to engine unit conversions.

const SLIDER_MAX: f32 = 127.0;

const CUTOFF_MIN_HZ: f32 = 50.0;
const CUTOFF_MAX_HZ: f32 = 15_000.0;

const ENV_MIN_SECONDS: f32 = 0.0015;
const ATTACK_MAX_SECONDS: f32 = 3.0;
const DECAY_MAX_SECONDS: f32 = 12.0;

const LFO_MIN_HZ: f32 = 0.5;
const LFO_MAX_HZ: f32 = 30.0;

/// Slider position as 0..=1.
#[inline]
pub fn normalize(value: u8) -> f32 {
    value as f32 / SLIDER_MAX
}

#[inline]
fn log_interp(value: u8, min: f32, max: f32) -> f32 {
    let t = normalize(value);
    (min.ln() + (max.ln() - min.ln()) * t).exp()
}

/// VCF cutoff: 50 Hz to 15 kHz on a log curve.
pub fn vcf_cutoff_to_hz(value: u8) -> f32 {
    log_interp(value, CUTOFF_MIN_HZ, CUTOFF_MAX_HZ)
}

/// Envelope times: attack 1.5 ms to 3 s, decay/release 1.5 ms to 12 s.
pub fn envelope_time_to_seconds(value: u8, is_attack: bool) -> f32 {
    let max = if is_attack {
        ATTACK_MAX_SECONDS
    } else {
        DECAY_MAX_SECONDS
    };
    log_interp(value, ENV_MIN_SECONDS, max)
}

/// LFO rate: 0.5 to 30 Hz.
pub fn lfo_rate_to_hz(value: u8) -> f32 {
    log_interp(value, LFO_MIN_HZ, LFO_MAX_HZ)
}
