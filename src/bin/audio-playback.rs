//! 播放：raw S16_LE 文件 → ALSA 设备
//!
//! 用法：audio-playback <DEVICE> <FILE>

use pcm_relay::Direction;

fn main() -> anyhow::Result<()> {
    pcm_relay::cli::run(Direction::Playback)
}
