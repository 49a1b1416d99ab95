//! 两个可执行文件共用的命令行入口
//!
//! `audio-capture <DEVICE> <FILE>` / `audio-playback <DEVICE> <FILE>`
//!
//! 顺序：信号处理器 → 打开文件 → 协商设备 → 流循环 → 释放（设备先于文件）

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;

use crate::audio::Direction;
use crate::config::{StreamConfig, DEFAULT_FRAMES_PER_PERIOD};
use crate::shutdown::ShutdownSignal;

/// Stream raw S16_LE stereo PCM between an ALSA device and a file
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// ALSA PCM device name (e.g. "default", "hw:0,0")
    #[arg(value_name = "DEVICE")]
    pub device: String,

    /// Raw headerless PCM file (S16_LE, 2 channels, 44100 Hz)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Frames transferred per loop iteration
    #[arg(long, default_value_t = DEFAULT_FRAMES_PER_PERIOD)]
    pub frames: usize,

    /// Lock the frame buffer in memory
    #[arg(long)]
    pub lock_memory: bool,

    /// Show verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// 由命令行生成流配置
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            frames_per_period: self.frames,
            lock_memory: self.lock_memory,
            ..StreamConfig::default()
        }
    }
}

/// 调用方持有的文件通道
enum FileChannel {
    Sink(BufWriter<File>),
    Source(BufReader<File>),
}

impl FileChannel {
    fn open(direction: Direction, path: &Path) -> anyhow::Result<Self> {
        match direction {
            Direction::Capture => {
                let file = File::create(path).with_context(|| {
                    format!("Unable to open {} for writing", path.display())
                })?;
                Ok(Self::Sink(BufWriter::new(file)))
            }
            Direction::Playback => {
                let file = File::open(path).with_context(|| {
                    format!("Unable to open {} for reading", path.display())
                })?;
                Ok(Self::Source(BufReader::new(file)))
            }
        }
    }

    /// 关闭前把缓冲的录音数据刷到磁盘
    fn finish(self) -> io::Result<()> {
        match self {
            Self::Sink(mut w) => w.flush(),
            Self::Source(_) => Ok(()),
        }
    }
}

/// 初始化日志（默认 warn，--verbose 为 info）
fn init_logging(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// 可执行文件入口
///
/// 参数个数不对时 clap 打印用法到 stderr 并以非零码退出，不会触碰设备
pub fn run(direction: Direction) -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.stream_config();
    config.validate()?;

    let shutdown = ShutdownSignal::new();
    shutdown
        .install()
        .context("Unable to setup signal handler")?;

    stream(direction, &cli, &config, &shutdown)
}

#[cfg(target_os = "linux")]
fn stream(
    direction: Direction,
    cli: &Cli,
    config: &StreamConfig,
    shutdown: &ShutdownSignal,
) -> anyhow::Result<()> {
    use crate::audio::{AlsaPcm, FrameBuffer};
    use crate::engine::{Route, StreamEngine};

    let mut file = FileChannel::open(direction, &cli.file)?;

    let pcm = AlsaPcm::open(&cli.device, direction, config)
        .with_context(|| format!("Unable to initialize audio {} device", direction))?;
    let mut device = pcm
        .stream()
        .with_context(|| format!("Unable to start audio {} stream", direction))?;

    let mut buffer = FrameBuffer::new(config.frames_per_period, pcm.format());
    if config.lock_memory {
        buffer.lock_memory();
    }

    let mut engine = StreamEngine::new(shutdown);
    let result = match &mut file {
        FileChannel::Sink(sink) => engine.run(
            Route::Capture {
                device: &mut device,
                sink,
            },
            &mut buffer,
        ),
        FileChannel::Source(source) => engine.run(
            Route::Playback {
                source,
                device: &mut device,
            },
            &mut buffer,
        ),
    };

    log::info!(
        "\n{}",
        engine.stats().report(direction, pcm.negotiated_rate())
    );

    // 先释放设备（播放会 drain），再关闭文件
    drop(device);
    drop(pcm);
    let flushed = file.finish();
    result.with_context(|| format!("Fatal error occurred during {}", direction))?;
    flushed.with_context(|| format!("Unable to finish writing {}", cli.file.display()))?;

    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn stream(
    direction: Direction,
    cli: &Cli,
    _config: &StreamConfig,
    _shutdown: &ShutdownSignal,
) -> anyhow::Result<()> {
    anyhow::bail!(
        "no PCM backend for {} on '{}': ALSA is only available on Linux",
        direction,
        cli.device
    )
}
