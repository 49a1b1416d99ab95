//! ALSA PCM 后端
//!
//! 协商顺序：open → hw_params_any → RW interleaved → S16_LE → rate near → channels
//! → commit → prepare。任何一步失败都是一次性的 SetupError。
//!
//! 注意：set_rate_near 可能选择与请求不同的采样率，raw 文件不记录它，
//! 这里只在日志里报告

use alsa::pcm::{Access, Format, HwParams, IO, PCM};
use alsa::{Direction as AlsaDirection, ValueOr};

use super::device::{Direction, PcmDevice, PcmFault};
use super::format::StreamFormat;
use crate::config::StreamConfig;

/// 设备打开或参数协商失败
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("cannot open audio device '{device}': {source}")]
    Open {
        device: String,
        #[source]
        source: alsa::Error,
    },
    #[error("{step} failed: {source}")]
    Negotiate {
        step: &'static str,
        #[source]
        source: alsa::Error,
    },
}

fn step(step: &'static str) -> impl FnOnce(alsa::Error) -> SetupError {
    move |source| SetupError::Negotiate { step, source }
}

fn alsa_direction(direction: Direction) -> AlsaDirection {
    match direction {
        Direction::Capture => AlsaDirection::Capture,
        Direction::Playback => AlsaDirection::Playback,
    }
}

/// 已准备好的 PCM 句柄
///
/// drop 时释放：播放方向先 drain，再关闭
pub struct AlsaPcm {
    pcm: PCM,
    name: String,
    direction: Direction,
    format: StreamFormat,
}

impl AlsaPcm {
    /// 打开并协商 PCM 设备
    pub fn open(
        device: &str,
        direction: Direction,
        config: &StreamConfig,
    ) -> Result<Self, SetupError> {
        let pcm = PCM::new(device, alsa_direction(direction), false).map_err(|source| {
            SetupError::Open {
                device: device.to_string(),
                source,
            }
        })?;

        let rate = Self::negotiate(&pcm, config)?;
        pcm.prepare().map_err(step("snd_pcm_prepare"))?;

        if rate != config.sample_rate {
            log::warn!(
                "Device '{}' runs at {} Hz instead of the requested {} Hz; \
                 the raw file does not record the rate",
                device,
                rate,
                config.sample_rate
            );
        }
        log::info!(
            "Opened {} device '{}': {} Hz, {} ch, S16_LE",
            direction,
            device,
            rate,
            config.channels
        );

        Ok(Self {
            pcm,
            name: device.to_string(),
            direction,
            format: StreamFormat::new(rate, config.channels),
        })
    }

    fn negotiate(pcm: &PCM, config: &StreamConfig) -> Result<u32, SetupError> {
        let hwp = HwParams::any(pcm).map_err(step("snd_pcm_hw_params_any"))?;
        hwp.set_access(Access::RWInterleaved)
            .map_err(step("snd_pcm_hw_params_set_access"))?;
        hwp.set_format(Format::S16LE)
            .map_err(step("snd_pcm_hw_params_set_format"))?;
        let rate = hwp
            .set_rate_near(config.sample_rate, ValueOr::Nearest)
            .map_err(step("snd_pcm_hw_params_set_rate_near"))?;
        hwp.set_channels(u32::from(config.channels))
            .map_err(step("snd_pcm_hw_params_set_channels"))?;
        pcm.hw_params(&hwp).map_err(step("snd_pcm_hw_params"))?;
        Ok(rate)
    }

    /// 实际协商到的采样率
    pub fn negotiated_rate(&self) -> u32 {
        self.format.sample_rate
    }

    /// 协商后的流格式
    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// 获取可传输的流
    pub fn stream(&self) -> Result<AlsaStream<'_>, SetupError> {
        let io = self.pcm.io_i16().map_err(step("snd_pcm_io_i16"))?;
        Ok(AlsaStream {
            pcm: &self.pcm,
            io,
            direction: self.direction,
            channels: self.format.samples_per_frame(),
            pending: None,
        })
    }
}

impl Drop for AlsaPcm {
    fn drop(&mut self) {
        if self.direction == Direction::Playback {
            if let Err(e) = self.pcm.drain() {
                log::warn!("Failed to drain '{}': {}", self.name, e);
            }
        }
        // PCM 自身的 drop 调用 snd_pcm_close
        log::debug!("Closing {} device '{}'", self.direction, self.name);
    }
}

/// 借用 `AlsaPcm` 的阻塞交织 i16 流
pub struct AlsaStream<'a> {
    pcm: &'a PCM,
    io: IO<'a, i16>,
    direction: Direction,
    channels: usize,
    // 最近一次读写失败的原始错误，交给 snd_pcm_recover
    pending: Option<alsa::Error>,
}

impl AlsaStream<'_> {
    fn fault(&mut self, op: &'static str, err: alsa::Error) -> PcmFault {
        let errno = err.errno();
        self.pending = Some(err);
        PcmFault::new(op, errno)
    }
}

impl PcmDevice for AlsaStream<'_> {
    fn direction(&self) -> Direction {
        self.direction
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn read_frames(&mut self, buf: &mut [i16]) -> Result<usize, PcmFault> {
        match self.io.readi(buf) {
            Ok(frames) => Ok(frames),
            Err(e) => Err(self.fault("snd_pcm_readi", e)),
        }
    }

    fn write_frames(&mut self, buf: &[i16]) -> Result<usize, PcmFault> {
        match self.io.writei(buf) {
            Ok(frames) => Ok(frames),
            Err(e) => Err(self.fault("snd_pcm_writei", e)),
        }
    }

    fn recover(&mut self, fault: &PcmFault) -> Result<(), PcmFault> {
        // snd_pcm_recover: EPIPE → prepare；ESTRPIPE → 等待 resume，失败再 prepare
        let result = match self.pending.take() {
            Some(err) => self.pcm.try_recover(err, true),
            None => {
                log::debug!("No pending ALSA error for {}, re-preparing", fault);
                self.pcm.prepare()
            }
        };
        result.map_err(|e| PcmFault::new("snd_pcm_recover", e.errno()))
    }
}
