//! pcm-relay
//!
//! 在 PCM 设备和 raw 16-bit 文件之间实时搬运交织帧：
//! - capture：设备 → 文件
//! - playback：文件 → 设备
//!
//! 单线程阻塞循环，协作式关闭，瞬态错误只恢复一次

pub mod audio;
pub mod cli;
pub mod config;
pub mod engine;
pub mod shutdown;

pub use audio::{Direction, FrameBuffer, PcmDevice, PcmFault, StreamFormat};
pub use config::StreamConfig;
pub use engine::{Completion, Route, StreamEngine, StreamError};
pub use shutdown::{ShutdownError, ShutdownSignal};
