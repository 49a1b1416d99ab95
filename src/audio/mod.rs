//! 音频核心模块
//!
//! 包含：
//! - Device: PCM 设备抽象和故障分类
//! - Format: 流格式和样本编解码
//! - Frame Buffer: 固定容量的交织帧缓冲区
//! - Stats: 流统计
//! - ALSA: Linux PCM 后端

#[cfg(target_os = "linux")]
pub mod alsa_pcm;
pub mod device;
pub mod format;
pub mod frame_buffer;
pub mod stats;

#[cfg(target_os = "linux")]
pub use alsa_pcm::{AlsaPcm, AlsaStream, SetupError};
pub use device::{Direction, FaultKind, PcmDevice, PcmFault};
pub use format::StreamFormat;
pub use frame_buffer::FrameBuffer;
pub use stats::{StatsReport, StreamStats};
