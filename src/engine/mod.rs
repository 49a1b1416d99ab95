//! 流引擎
//!
//! 在 PCM 设备和文件之间搬运固定大小的交织帧，两个方向共用一个循环：
//! - 录音：设备 → 缓冲区 → 文件
//! - 播放：文件 → 缓冲区 → 设备
//!
//! 核心规则：关闭请求优先于一切错误恢复。
//! 每次触碰设备之前、每个错误处理分支上都检查关闭标志；
//! 每次设备故障只尝试一次恢复，恢复失败即致命

use std::io::{self, Read, Write};

use crate::audio::{Direction, FrameBuffer, PcmDevice, PcmFault, StreamStats};
use crate::shutdown::ShutdownSignal;

/// 方向相关的 I/O 能力对
pub enum Route<'a, D: PcmDevice + ?Sized> {
    /// 设备读 + 文件写
    Capture {
        device: &'a mut D,
        sink: &'a mut dyn Write,
    },
    /// 文件读 + 设备写
    Playback {
        source: &'a mut dyn Read,
        device: &'a mut D,
    },
}

impl<D: PcmDevice + ?Sized> Route<'_, D> {
    pub fn direction(&self) -> Direction {
        match self {
            Self::Capture { .. } => Direction::Capture,
            Self::Playback { .. } => Direction::Playback,
        }
    }

    fn device(&self) -> &D {
        match self {
            Self::Capture { device, .. } | Self::Playback { device, .. } => device,
        }
    }
}

/// 成功结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// 收到关闭请求
    Shutdown,
    /// 播放输入耗尽
    EndOfInput,
}

/// 流错误
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("{direction} stream could not be recovered from {trigger}: {fault}")]
    Unrecovered {
        direction: Direction,
        /// 触发恢复的故障
        trigger: PcmFault,
        /// 恢复本身的失败
        fault: PcmFault,
    },
    #[error("{direction} file I/O failed: {source}")]
    File {
        direction: Direction,
        #[source]
        source: io::Error,
    },
    #[error("device reported {frames} frames for a {capacity}-frame buffer")]
    Overflow { frames: usize, capacity: usize },
    #[error("{route} route given a device negotiated for {device}")]
    DirectionMismatch { route: Direction, device: Direction },
    #[error("buffer carries {buffer} channels but device streams {device}")]
    ChannelMismatch { buffer: usize, device: usize },
}

/// 单次迭代的走向
enum Flow {
    Continue,
    Done(Completion),
}

/// 流引擎
///
/// 单线程、同步：所有设备和文件调用都阻塞当前线程
pub struct StreamEngine<'s> {
    shutdown: &'s ShutdownSignal,
    stats: StreamStats,
}

impl<'s> StreamEngine<'s> {
    pub fn new(shutdown: &'s ShutdownSignal) -> Self {
        Self {
            shutdown,
            stats: StreamStats::new(),
        }
    }

    /// 本次（或上次）运行的统计
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// 运行直到输入耗尽、致命错误或关闭请求
    ///
    /// 帧容量由 `buffer` 决定。不报告失败前已传输的进度
    pub fn run<D: PcmDevice + ?Sized>(
        &mut self,
        mut route: Route<'_, D>,
        buffer: &mut FrameBuffer,
    ) -> Result<Completion, StreamError> {
        Self::check_route(&route, buffer)?;

        let direction = route.direction();
        self.stats.reset();

        log::info!(
            "Starting {} loop: {} frames x {} channels per iteration",
            direction,
            buffer.capacity_frames(),
            buffer.channels()
        );

        loop {
            self.stats.record_iteration();

            let step = match &mut route {
                Route::Capture { device, sink } => {
                    self.capture_step(&mut **device, &mut **sink, buffer)
                }
                Route::Playback { source, device } => {
                    self.playback_step(&mut **source, &mut **device, buffer)
                }
            };

            match step {
                Ok(Flow::Continue) => {}
                Ok(Flow::Done(completion)) => {
                    log::info!(
                        "{} loop finished ({:?}) after {} frames",
                        direction,
                        completion,
                        self.stats.frames_transferred()
                    );
                    return Ok(completion);
                }
                Err(e) => {
                    log::error!("{} loop stopped: {}", direction, e);
                    return Err(e);
                }
            }
        }
    }

    fn check_route<D: PcmDevice + ?Sized>(
        route: &Route<'_, D>,
        buffer: &FrameBuffer,
    ) -> Result<(), StreamError> {
        let device = route.device();

        if device.direction() != route.direction() {
            return Err(StreamError::DirectionMismatch {
                route: route.direction(),
                device: device.direction(),
            });
        }
        if device.channels() != buffer.channels() {
            return Err(StreamError::ChannelMismatch {
                buffer: buffer.channels(),
                device: device.channels(),
            });
        }
        Ok(())
    }

    /// 录音：检查关闭 → 读设备 → 追加到文件
    fn capture_step<D: PcmDevice + ?Sized>(
        &mut self,
        device: &mut D,
        sink: &mut dyn Write,
        buffer: &mut FrameBuffer,
    ) -> Result<Flow, StreamError> {
        if self.shutdown.is_requested() {
            return Ok(Flow::Done(Completion::Shutdown));
        }

        self.stats.record_device_call();
        let frames = match device.read_frames(buffer.samples_mut()) {
            Ok(frames) => frames,
            // 失败的读取没有产出数据，恢复成功后直接进入下一轮
            Err(fault) => return self.handle_fault(device, fault),
        };

        let capacity = buffer.capacity_frames();
        if frames > capacity {
            return Err(StreamError::Overflow { frames, capacity });
        }

        buffer
            .write_frames(frames, sink)
            .map_err(|source| StreamError::File {
                direction: Direction::Capture,
                source,
            })?;
        self.stats.add_frames(frames);

        Ok(Flow::Continue)
    }

    /// 播放：读文件 → 检查关闭 → 写设备
    fn playback_step<D: PcmDevice + ?Sized>(
        &mut self,
        source: &mut dyn Read,
        device: &mut D,
        buffer: &mut FrameBuffer,
    ) -> Result<Flow, StreamError> {
        let samples = buffer
            .fill_from(source)
            .map_err(|source| StreamError::File {
                direction: Direction::Playback,
                source,
            })?;
        if samples == 0 {
            return Ok(Flow::Done(Completion::EndOfInput));
        }

        let channels = buffer.channels();
        let frames = samples / channels;
        if samples % channels != 0 {
            log::warn!(
                "Dropping {} trailing sample(s) that do not form a whole frame",
                samples % channels
            );
        }
        if frames == 0 {
            return Ok(Flow::Done(Completion::EndOfInput));
        }

        let chunk = buffer.frames(frames);
        let mut offset = 0;

        // 设备少收的部分继续写，保证不丢样本
        while offset < frames {
            if self.shutdown.is_requested() {
                return Ok(Flow::Done(Completion::Shutdown));
            }

            self.stats.record_device_call();
            match device.write_frames(&chunk[offset * channels..]) {
                Ok(0) => {
                    log::warn!(
                        "Device accepted no frames, dropping {} frame(s)",
                        frames - offset
                    );
                    break;
                }
                Ok(written) => {
                    let written = written.min(frames - offset);
                    self.stats.add_frames(written);
                    offset += written;
                    if offset < frames {
                        self.stats.record_short_write();
                    }
                }
                // 本块剩余部分丢弃，恢复后从下一次文件读取继续
                Err(fault) => return self.handle_fault(device, fault),
            }
        }

        Ok(Flow::Continue)
    }

    /// 故障处理：检查关闭 → 一次恢复 → 检查关闭 → 致命
    fn handle_fault<D: PcmDevice + ?Sized>(
        &mut self,
        device: &mut D,
        fault: PcmFault,
    ) -> Result<Flow, StreamError> {
        self.stats.record_fault(fault.kind);

        if self.shutdown.is_requested() {
            log::debug!("Shutdown requested while handling {}", fault);
            return Ok(Flow::Done(Completion::Shutdown));
        }

        let direction = device.direction();
        if fault.kind.is_transient() {
            log::warn!("{} {}, recovering", direction, fault);
        } else {
            log::error!("{} {}, attempting recovery", direction, fault);
        }

        match device.recover(&fault) {
            Ok(()) => {
                self.stats.record_recovery();
                log::info!("{} stream recovered", direction);
                Ok(Flow::Continue)
            }
            Err(failure) => {
                // 关闭请求可能在恢复期间到达
                if self.shutdown.is_requested() {
                    log::debug!("Shutdown requested during recovery: {}", failure);
                    return Ok(Flow::Done(Completion::Shutdown));
                }
                Err(StreamError::Unrecovered {
                    direction,
                    trigger: fault,
                    fault: failure,
                })
            }
        }
    }
}
