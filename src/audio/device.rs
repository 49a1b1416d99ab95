//! PCM 设备抽象
//!
//! 引擎只通过 `PcmDevice` 接触硬件：
//! - 阻塞式交织读写，返回实际传输的帧数
//! - 失败时返回 `PcmFault`，由引擎决定是否调用一次 `recover`

use std::fmt;

/// ALSA 挂起错误码（Linux 专有）
#[cfg(target_os = "linux")]
pub const ESTRPIPE: i32 = libc::ESTRPIPE;
#[cfg(not(target_os = "linux"))]
pub const ESTRPIPE: i32 = 86;

/// 流方向
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// 设备 → 文件
    Capture,
    /// 文件 → 设备
    Playback,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capture => write!(f, "capture"),
            Self::Playback => write!(f, "playback"),
        }
    }
}

/// 设备报告的故障类别
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultKind {
    /// 播放 underrun / 录音 overrun
    Xrun,
    /// 设备挂起，需要先 resume
    Suspended,
    /// 系统调用被信号打断
    Interrupted,
    /// 其他错误，通常无法恢复
    Other,
}

impl FaultKind {
    /// 是否属于可以尝试 reset 的瞬态故障
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xrun => write!(f, "xrun"),
            Self::Suspended => write!(f, "suspended"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::Other => write!(f, "device error"),
        }
    }
}

/// 设备读写或恢复失败
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{op}: {kind} (errno {errno})")]
pub struct PcmFault {
    pub kind: FaultKind,
    /// 正数 errno
    pub errno: i32,
    /// 失败的操作名
    pub op: &'static str,
}

impl PcmFault {
    pub fn new(op: &'static str, errno: i32) -> Self {
        Self {
            kind: Self::classify(errno),
            errno,
            op,
        }
    }

    /// 按 errno 分类
    pub fn classify(errno: i32) -> FaultKind {
        match errno {
            libc::EPIPE => FaultKind::Xrun,
            ESTRPIPE => FaultKind::Suspended,
            libc::EINTR => FaultKind::Interrupted,
            _ => FaultKind::Other,
        }
    }
}

/// 已协商完毕、可直接传输的 PCM 流
///
/// 所有调用都阻塞当前线程。缓冲区是交织样本，帧数 = 样本数 / channels
pub trait PcmDevice {
    /// 流方向（协商时确定）
    fn direction(&self) -> Direction;

    /// 每帧声道数
    fn channels(&self) -> usize;

    /// 读取最多 `buf.len() / channels` 帧，返回实际读取帧数
    fn read_frames(&mut self, buf: &mut [i16]) -> Result<usize, PcmFault>;

    /// 写入 `buf.len() / channels` 帧，返回设备接受的帧数
    fn write_frames(&mut self, buf: &[i16]) -> Result<usize, PcmFault>;

    /// 针对 `fault` 做一次恢复动作（xrun: re-prepare；suspend: 等待 resume 后 re-prepare）
    ///
    /// 只调用一次，不在内部循环重试
    fn recover(&mut self, fault: &PcmFault) -> Result<(), PcmFault>;
}
