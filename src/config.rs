// src/config.rs
//
// Engine configuration shared by the Rust API and the C ABI.

// Default audio configuration
pub const DEFAULT_POLYPHONY: u32 = 8;
pub const DEFAULT_MAX_BLOCK: u32 = 4096;
pub const DEFAULT_MIN_SAMPLE_RATE: u32 = 8_000;
pub const DEFAULT_MAX_SAMPLE_RATE: u32 = 192_000;
pub const DEFAULT_EVENT_CAPACITY: u32 = 1024;
pub const DEFAULT_OUTPUT_GAIN: f32 = 0.7;

/// Configuration applied when the engine starts.
///
/// Sample rate and block size are not part of it: the host passes them to
/// `start` on every launch.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Number of simultaneous voices.
    pub polyphony: u32,
    /// Largest block the host may ask for in one `start`.
    pub max_block_size: u32,
    /// Lowest accepted sample rate in Hz.
    pub min_sample_rate: u32,
    /// Highest accepted sample rate in Hz.
    pub max_sample_rate: u32,
    /// Pending control events before new ones are dropped.
    pub event_capacity: u32,
    /// Linear gain on the master output.
    pub output_gain: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            polyphony: DEFAULT_POLYPHONY,
            max_block_size: DEFAULT_MAX_BLOCK,
            min_sample_rate: DEFAULT_MIN_SAMPLE_RATE,
            max_sample_rate: DEFAULT_MAX_SAMPLE_RATE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            output_gain: DEFAULT_OUTPUT_GAIN,
        }
    }
}

/// Why the engine refused to start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error("sample rate {rate} Hz outside {min}..={max} Hz")]
    SampleRate { rate: i32, min: u32, max: u32 },

    #[error("block size {size} outside 1..={max} frames")]
    BlockSize { size: i32, max: u32 },

    #[error("polyphony must be at least one voice")]
    NoVoices,

    #[error("event queue capacity must be non-zero")]
    NoEventCapacity,
}

/// Arguments validated by `EngineConfig::validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    pub sample_rate: u32,
    pub block_size: usize,
}

impl EngineConfig {
    /// Check host-provided stream arguments against this configuration.
    pub fn validate(&self, sample_rate: i32, block_size: i32) -> Result<StreamParams, StartError> {
        if self.polyphony == 0 {
            return Err(StartError::NoVoices);
        }
        if self.event_capacity == 0 {
            return Err(StartError::NoEventCapacity);
        }

        let rate = u32::try_from(sample_rate)
            .ok()
            .filter(|r| (self.min_sample_rate..=self.max_sample_rate).contains(r))
            .ok_or(StartError::SampleRate {
                rate: sample_rate,
                min: self.min_sample_rate,
                max: self.max_sample_rate,
            })?;

        let block = u32::try_from(block_size)
            .ok()
            .filter(|b| (1..=self.max_block_size).contains(b))
            .ok_or(StartError::BlockSize {
                size: block_size,
                max: self.max_block_size,
            })?;

        Ok(StreamParams {
            sample_rate: rate,
            block_size: block as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_rates() {
        let cfg = EngineConfig::default();
        for rate in [22_050, 44_100, 48_000, 96_000, 192_000] {
            assert_eq!(
                cfg.validate(rate, 256),
                Ok(StreamParams {
                    sample_rate: rate as u32,
                    block_size: 256
                })
            );
        }
    }

    #[test]
    fn rejects_out_of_range_arguments() {
        let cfg = EngineConfig::default();
        assert!(matches!(
            cfg.validate(0, 256),
            Err(StartError::SampleRate { rate: 0, .. })
        ));
        assert!(matches!(
            cfg.validate(-48_000, 256),
            Err(StartError::SampleRate { .. })
        ));
        assert!(matches!(
            cfg.validate(384_000, 256),
            Err(StartError::SampleRate { .. })
        ));
        assert!(matches!(
            cfg.validate(48_000, 0),
            Err(StartError::BlockSize { size: 0, .. })
        ));
        assert!(matches!(
            cfg.validate(48_000, 8192),
            Err(StartError::BlockSize { .. })
        ));
    }

    #[test]
    fn rejects_empty_voice_pool() {
        let cfg = EngineConfig {
            polyphony: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(48_000, 256), Err(StartError::NoVoices));
    }

    #[test]
    fn error_messages_name_the_limit() {
        let err = EngineConfig::default().validate(48_000, -1).unwrap_err();
        assert_eq!(err.to_string(), "block size -1 outside 1..=4096 frames");
    }
}
