//! 流配置

use crate::audio::format::{StreamFormat, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE};

/// 参考配置：每次迭代的帧数
pub const DEFAULT_FRAMES_PER_PERIOD: usize = 128;

/// 单次迭代缓冲区的字节上限（样本区与暂存区各占这么多）
pub const MAX_PERIOD_BYTES: usize = 64 * 1024 * 1024;

/// 配置错误
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("frames per period must be at least 1")]
    ZeroFrames,
    #[error("channel count must be at least 1")]
    ZeroChannels,
    #[error("sample rate must be non-zero")]
    ZeroRate,
    #[error("{frames} frames per period exceed the {max}-byte buffer limit")]
    PeriodTooLarge { frames: usize, max: usize },
}

/// 流配置
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// 请求的采样率（设备可能就近选择）
    pub sample_rate: u32,
    pub channels: u16,
    /// 每次循环迭代传输的帧数
    pub frames_per_period: usize,
    /// 是否 mlock 帧缓冲区
    pub lock_memory: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            frames_per_period: DEFAULT_FRAMES_PER_PERIOD,
            lock_memory: false,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_per_period == 0 {
            return Err(ConfigError::ZeroFrames);
        }
        if self.channels == 0 {
            return Err(ConfigError::ZeroChannels);
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroRate);
        }

        let period_bytes = self
            .frames_per_period
            .checked_mul(self.format().bytes_per_frame());
        if !matches!(period_bytes, Some(n) if n <= MAX_PERIOD_BYTES) {
            return Err(ConfigError::PeriodTooLarge {
                frames: self.frames_per_period,
                max: MAX_PERIOD_BYTES,
            });
        }
        Ok(())
    }

    /// 请求的流格式
    pub fn format(&self) -> StreamFormat {
        StreamFormat::new(self.sample_rate, self.channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_config_default() {
        let config = StreamConfig::default();
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.channels, 2);
        assert_eq!(config.frames_per_period, 128);
        assert!(!config.lock_memory);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = StreamConfig {
            frames_per_period: 0,
            ..StreamConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroFrames));

        let config = StreamConfig {
            channels: 0,
            ..StreamConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroChannels));

        let config = StreamConfig {
            sample_rate: 0,
            ..StreamConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroRate));
    }

    #[test]
    fn test_validate_rejects_oversized_period() {
        // frames × 4 字节在 usize 上溢出
        let config = StreamConfig {
            frames_per_period: 1 << (usize::BITS - 1),
            ..StreamConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PeriodTooLarge { .. })
        ));

        let config = StreamConfig {
            frames_per_period: MAX_PERIOD_BYTES / 4 + 1,
            ..StreamConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PeriodTooLarge { .. })
        ));

        let config = StreamConfig {
            frames_per_period: MAX_PERIOD_BYTES / 4,
            ..StreamConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.format().bytes_per_frame(), 4);
    }
}
