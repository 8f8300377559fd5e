// src/parameter.rs
//
// Parameter identifiers shared by the control side and the voices.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A synth parameter addressable by its host-facing string id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    /// VCF cutoff in Hz
    Cutoff,
    /// VCF resonance (0-1.2, self-oscillates near 1)
    Resonance,
    /// Envelope attack in seconds
    Attack,
    /// Envelope decay time constant in seconds
    Decay,
    /// Envelope sustain level (0-1)
    Sustain,
    /// Envelope release time constant in seconds
    Release,
    /// Pulse width of the DCO ramp (0-1)
    PwmDepth,
    /// Sub-oscillator level (0-1)
    SubLevel,
    /// Envelope to VCF amount (-1..1, negative inverts)
    EnvMod,
    /// Per-voice LFO rate in Hz
    LfoRate,
    /// LFO to VCF amount (0-1)
    LfoMod,
    /// Chorus mode: 0 = off, 1 = I, 2 = II
    ChorusMode,
    /// HPF step: 0-3
    HpfStep,
}

impl ParamId {
    pub const ALL: [ParamId; 13] = [
        ParamId::Cutoff,
        ParamId::Resonance,
        ParamId::Attack,
        ParamId::Decay,
        ParamId::Sustain,
        ParamId::Release,
        ParamId::PwmDepth,
        ParamId::SubLevel,
        ParamId::EnvMod,
        ParamId::LfoRate,
        ParamId::LfoMod,
        ParamId::ChorusMode,
        ParamId::HpfStep,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ParamId::Cutoff => "cutoff",
            ParamId::Resonance => "resonance",
            ParamId::Attack => "attack",
            ParamId::Decay => "decay",
            ParamId::Sustain => "sustain",
            ParamId::Release => "release",
            ParamId::PwmDepth => "pwmDepth",
            ParamId::SubLevel => "subLevel",
            ParamId::EnvMod => "envMod",
            ParamId::LfoRate => "lfoRate",
            ParamId::LfoMod => "lfoMod",
            ParamId::ChorusMode => "chorusMode",
            ParamId::HpfStep => "hpf",
        }
    }

    /// Value a freshly started engine uses.
    pub fn default_value(self) -> f32 {
        match self {
            ParamId::Cutoff => 1000.0,
            ParamId::Resonance => 0.1,
            ParamId::Attack => 0.01,
            ParamId::Decay => 0.2,
            ParamId::Sustain => 1.0,
            ParamId::Release => 0.5,
            ParamId::PwmDepth => 0.5,
            ParamId::SubLevel => 0.0,
            ParamId::EnvMod => 0.5,
            ParamId::LfoRate => 4.0,
            ParamId::LfoMod => 0.2,
            ParamId::ChorusMode => 1.0,
            ParamId::HpfStep => 0.0,
        }
    }

    /// Parameters handled by the master section rather than the voices.
    pub fn is_global(self) -> bool {
        matches!(self, ParamId::ChorusMode | ParamId::HpfStep)
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a host passes a parameter id the engine does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown parameter id `{0}`")]
pub struct ParseParamError(pub String);

impl FromStr for ParamId {
    type Err = ParseParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParamId::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParseParamError(s.to_string()))
    }
}

/// Last value written for each parameter (control side only).
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    values: HashMap<ParamId, f32>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn set(&mut self, id: ParamId, value: f32) {
        self.values.insert(id, value);
    }

    /// Last value set, or the parameter's default.
    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        self.get_or(id, id.default_value())
    }

    #[inline]
    pub fn get_or(&self, id: ParamId, default: f32) -> f32 {
        self.values.get(&id).copied().unwrap_or(default)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
