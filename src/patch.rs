// src/patch.rs
//
// Juno-106 patch dumps: single 25-byte SysEx messages and `.106` banks.

use std::fs;
use std::path::Path;

use crate::dsp::ChorusMode;
use crate::dsp::scaler;
use crate::parameter::ParamId;

pub const SYSEX_MESSAGE_SIZE: usize = 25;
pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;
pub const ROLAND_ID: u8 = 0x41;

const SLIDER_OFFSET: usize = 5;
const SWITCH_1: usize = 21;
const SWITCH_2: usize = 22;
const CHECKSUM: usize = 23;

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("cannot read patch bank: {0}")]
    Io(#[from] std::io::Error),

    #[error("patch data is empty")]
    Empty,

    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("message is not framed by F0 .. F7")]
    Framing,

    #[error("manufacturer id {0:#04x} is not Roland")]
    NotRoland(u8),
}

/// Front-panel switch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Switches {
    pub range_16: bool,
    pub range_8: bool,
    pub range_4: bool,
    pub pulse_on: bool,
    pub saw_on: bool,
    pub chorus_on: bool,
    /// Level II when set, level I otherwise.
    pub chorus_level_2: bool,
    pub pwm_source_lfo: bool,
    pub vcf_env_positive: bool,
    /// ENV when set, GATE otherwise.
    pub vca_mode_env: bool,
    /// 0-3
    pub hpf: u8,
}

impl Default for Switches {
    fn default() -> Self {
        Self {
            range_16: false,
            range_8: false,
            range_4: false,
            pulse_on: false,
            saw_on: false,
            chorus_on: false,
            chorus_level_2: false,
            pwm_source_lfo: true,
            vcf_env_positive: true,
            vca_mode_env: true,
            hpf: 0,
        }
    }
}

impl Switches {
    /// Decode the two switch bytes. Chorus bits and every `sw2` flag are
    /// active-low.
    pub fn decode(sw1: u8, sw2: u8) -> Self {
        Self {
            range_16: sw1 & 0x01 != 0,
            range_8: sw1 & 0x02 != 0,
            range_4: sw1 & 0x04 != 0,
            pulse_on: sw1 & 0x08 != 0,
            saw_on: sw1 & 0x10 != 0,
            chorus_on: sw1 & 0x20 == 0,
            chorus_level_2: sw1 & 0x40 == 0,
            pwm_source_lfo: sw2 & 0x01 == 0,
            vcf_env_positive: sw2 & 0x02 == 0,
            vca_mode_env: sw2 & 0x04 == 0,
            hpf: (sw2 >> 3) & 0x03,
        }
    }

    pub fn chorus_mode(&self) -> ChorusMode {
        match (self.chorus_on, self.chorus_level_2) {
            (false, _) => ChorusMode::Off,
            (true, false) => ChorusMode::I,
            (true, true) => ChorusMode::II,
        }
    }
}

/// One Juno-106 patch with raw 0-127 slider values.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JunoPatch {
    pub lfo_rate: u8,
    pub lfo_delay: u8,
    pub dco_lfo_mod: u8,
    pub dco_pwm_depth: u8,
    pub dco_noise_level: u8,
    pub vcf_cutoff: u8,
    pub vcf_resonance: u8,
    pub vcf_env_mod: u8,
    pub vcf_lfo_mod: u8,
    pub vcf_key_follow: u8,
    pub vca_level: u8,
    pub env_attack: u8,
    pub env_decay: u8,
    pub env_sustain: u8,
    pub env_release: u8,
    pub dco_sub_level: u8,

    pub switches: Switches,

    pub midi_channel: u8,
    pub patch_number: u8,
    pub checksum_valid: bool,
}

impl JunoPatch {
    /// Engine parameter values for this patch.
    pub fn settings(&self) -> [(ParamId, f32); 13] {
        let env_mod = scaler::normalize(self.vcf_env_mod);
        let env_mod = if self.switches.vcf_env_positive {
            env_mod
        } else {
            -env_mod
        };

        [
            (ParamId::Cutoff, scaler::vcf_cutoff_to_hz(self.vcf_cutoff)),
            (ParamId::Resonance, scaler::normalize(self.vcf_resonance)),
            (
                ParamId::Attack,
                scaler::envelope_time_to_seconds(self.env_attack, true),
            ),
            (
                ParamId::Decay,
                scaler::envelope_time_to_seconds(self.env_decay, false),
            ),
            (ParamId::Sustain, scaler::normalize(self.env_sustain)),
            (
                ParamId::Release,
                scaler::envelope_time_to_seconds(self.env_release, false),
            ),
            (ParamId::PwmDepth, scaler::normalize(self.dco_pwm_depth)),
            (ParamId::SubLevel, scaler::normalize(self.dco_sub_level)),
            (ParamId::EnvMod, env_mod),
            (ParamId::LfoRate, scaler::lfo_rate_to_hz(self.lfo_rate)),
            (ParamId::LfoMod, scaler::normalize(self.vcf_lfo_mod)),
            (ParamId::ChorusMode, self.switches.chorus_mode().as_value()),
            (ParamId::HpfStep, f32::from(self.switches.hpf)),
        ]
    }
}

/// Roland checksum over the slider and switch bytes.
pub fn checksum(message: &[u8]) -> u8 {
    let sum: u32 = message[SLIDER_OFFSET..=SWITCH_2]
        .iter()
        .map(|b| u32::from(b & 0x7F))
        .sum();
    ((128 - (sum & 0x7F)) & 0x7F) as u8
}

/// Parse a single 25-byte patch message.
///
/// A checksum mismatch is reported through `checksum_valid`, not as an error.
pub fn parse_sysex(message: &[u8]) -> Result<JunoPatch, PatchError> {
    if message.len() != SYSEX_MESSAGE_SIZE {
        return Err(PatchError::Length {
            expected: SYSEX_MESSAGE_SIZE,
            actual: message.len(),
        });
    }
    if message[0] != SYSEX_START || message[SYSEX_MESSAGE_SIZE - 1] != SYSEX_END {
        return Err(PatchError::Framing);
    }
    if message[1] != ROLAND_ID {
        return Err(PatchError::NotRoland(message[1]));
    }

    let s = &message[SLIDER_OFFSET..SLIDER_OFFSET + 16];

    Ok(JunoPatch {
        lfo_rate: s[0],
        lfo_delay: s[1],
        dco_lfo_mod: s[2],
        dco_pwm_depth: s[3],
        dco_noise_level: s[4],
        vcf_cutoff: s[5],
        vcf_resonance: s[6],
        vcf_env_mod: s[7],
        vcf_lfo_mod: s[8],
        vcf_key_follow: s[9],
        vca_level: s[10],
        env_attack: s[11],
        env_decay: s[12],
        env_sustain: s[13],
        env_release: s[14],
        dco_sub_level: s[15],
        switches: Switches::decode(message[SWITCH_1], message[SWITCH_2]),
        midi_channel: message[2] & 0x0F,
        patch_number: message[3] & 0x7F,
        checksum_valid: checksum(message) == message[CHECKSUM] & 0x7F,
    })
}

/// Parse a buffer of back-to-back patch messages.
pub fn parse_bank(data: &[u8]) -> Result<Vec<JunoPatch>, PatchError> {
    if data.is_empty() {
        return Err(PatchError::Empty);
    }
    if data.len() % SYSEX_MESSAGE_SIZE != 0 {
        return Err(PatchError::Length {
            expected: data.len().next_multiple_of(SYSEX_MESSAGE_SIZE),
            actual: data.len(),
        });
    }

    data.chunks_exact(SYSEX_MESSAGE_SIZE)
        .map(parse_sysex)
        .collect()
}

/// Read and parse a `.106` bank file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<JunoPatch>, PatchError> {
    let data = fs::read(path)?;
    parse_bank(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sliders: [u8; 16], sw1: u8, sw2: u8) -> Vec<u8> {
        let mut msg = vec![SYSEX_START, ROLAND_ID, 0x30, 0x05, 0x00];
        msg.extend_from_slice(&sliders);
        msg.extend_from_slice(&[sw1, sw2, 0x00, SYSEX_END]);
        msg[CHECKSUM] = checksum(&msg);
        msg
    }

    fn sliders() -> [u8; 16] {
        std::array::from_fn(|i| (i as u8) * 8)
    }

    #[test]
    fn parses_sliders_and_metadata() {
        let patch = parse_sysex(&message(sliders(), 0, 0)).unwrap();
        assert_eq!(patch.lfo_rate, 0);
        assert_eq!(patch.vcf_cutoff, 40);
        assert_eq!(patch.env_release, 112);
        assert_eq!(patch.dco_sub_level, 120);
        assert_eq!(patch.midi_channel, 0);
        assert_eq!(patch.patch_number, 5);
        assert!(patch.checksum_valid);
    }

    #[test]
    fn bad_checksum_is_not_fatal() {
        let mut msg = message(sliders(), 0, 0);
        msg[CHECKSUM] ^= 0x01;
        let patch = parse_sysex(&msg).unwrap();
        assert!(!patch.checksum_valid);
    }

    #[test]
    fn rejects_malformed_messages() {
        let good = message(sliders(), 0, 0);

        assert!(matches!(
            parse_sysex(&good[..24]),
            Err(PatchError::Length {
                expected: 25,
                actual: 24
            })
        ));

        let mut bad_end = good.clone();
        bad_end[24] = 0x00;
        assert!(matches!(parse_sysex(&bad_end), Err(PatchError::Framing)));

        let mut yamaha = good.clone();
        yamaha[1] = 0x43;
        assert!(matches!(
            parse_sysex(&yamaha),
            Err(PatchError::NotRoland(0x43))
        ));
    }

    #[test]
    fn switch_bits_are_decoded() {
        // 8', saw, chorus on at level I
        let sw = Switches::decode(0b0101_0010, 0b0001_0111);
        assert!(!sw.range_16);
        assert!(sw.range_8);
        assert!(sw.saw_on);
        assert!(!sw.pulse_on);
        assert!(sw.chorus_on);
        assert!(!sw.chorus_level_2);
        assert!(!sw.pwm_source_lfo);
        assert!(!sw.vcf_env_positive);
        assert!(!sw.vca_mode_env);
        assert_eq!(sw.hpf, 2);
        assert_eq!(sw.chorus_mode(), ChorusMode::I);

        assert_eq!(Switches::decode(0x20, 0).chorus_mode(), ChorusMode::Off);
        assert_eq!(Switches::decode(0x00, 0).chorus_mode(), ChorusMode::II);
    }

    #[test]
    fn bank_splits_messages() {
        let mut data = message(sliders(), 0, 0);
        data.extend(message([127; 16], 0x60, 0x18));
        let bank = parse_bank(&data).unwrap();
        assert_eq!(bank.len(), 2);
        assert_eq!(bank[1].vcf_cutoff, 127);
        assert_eq!(bank[1].switches.hpf, 3);

        assert!(matches!(parse_bank(&[]), Err(PatchError::Empty)));
        assert!(matches!(
            parse_bank(&data[..30]),
            Err(PatchError::Length { actual: 30, .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            parse_file("/nonexistent/bank.106"),
            Err(PatchError::Io(_))
        ));
    }

    #[test]
    fn settings_cover_every_parameter() {
        let patch = parse_sysex(&message([127; 16], 0x20, 0x08)).unwrap();
        let settings = patch.settings();
        for id in ParamId::ALL {
            assert!(settings.iter().any(|(p, _)| *p == id), "{id} missing");
        }

        let get = |id| settings.iter().find(|(p, _)| *p == id).map(|(_, v)| *v);
        assert_eq!(get(ParamId::Sustain), Some(1.0));
        assert_eq!(get(ParamId::ChorusMode), Some(0.0));
        assert_eq!(get(ParamId::HpfStep), Some(1.0));
        assert!(get(ParamId::Cutoff).is_some_and(|hz| (hz - 15_000.0).abs() < 1.0));
        assert!(get(ParamId::LfoRate).is_some_and(|hz| (hz - 30.0).abs() < 0.01));
        assert_eq!(get(ParamId::LfoMod), Some(1.0));
        assert_eq!(get(ParamId::EnvMod), Some(1.0));
    }

    #[test]
    fn env_polarity_switch_inverts_env_mod() {
        // LFO rate at 0, env mod at 127
        let mut sl = [0; 16];
        sl[7] = 127;
        let negative = parse_sysex(&message(sl, 0x20, 0x02)).unwrap();
        assert!(!negative.switches.vcf_env_positive);
        let env_mod = negative
            .settings()
            .into_iter()
            .find(|(p, _)| *p == ParamId::EnvMod)
            .map(|(_, v)| v);
        assert_eq!(env_mod, Some(-1.0));

        let lfo_rate = negative
            .settings()
            .into_iter()
            .find(|(p, _)| *p == ParamId::LfoRate)
            .map(|(_, v)| v);
        assert!(lfo_rate.is_some_and(|hz| (hz - 0.5).abs() < 1e-4));
    }
}
