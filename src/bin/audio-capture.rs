//! 录音：ALSA 设备 → raw S16_LE 文件
//!
//! 用法：audio-capture <DEVICE> <FILE>

use pcm_relay::Direction;

fn main() -> anyhow::Result<()> {
    pcm_relay::cli::run(Direction::Capture)
}
