//! 流格式和样本编解码
//!
//! 文件格式：无头 raw PCM，signed 16-bit little-endian，交织
//! - 帧 = 每声道一个样本：LRLRLR...
//! - 采样率不写入文件，消费者需要在带外约定

/// 参考配置：采样率
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
/// 参考配置：声道数
pub const DEFAULT_CHANNELS: u16 = 2;
/// 唯一支持的位深
pub const BITS_PER_SAMPLE: u16 = 16;

/// 流格式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, DEFAULT_CHANNELS)
    }
}

impl StreamFormat {
    /// 创建 16-bit 流格式
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: BITS_PER_SAMPLE,
        }
    }

    /// 每帧的样本数（= 声道数）
    #[inline]
    pub fn samples_per_frame(&self) -> usize {
        self.channels as usize
    }

    /// 每帧的字节数
    #[inline]
    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    /// 每样本的字节数
    #[inline]
    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    /// 将 little-endian 字节解码为 i16 样本
    ///
    /// 只解码完整的样本，末尾不足一个样本的字节被忽略。
    /// 返回写入 `output` 的样本数
    pub fn bytes_to_samples(&self, bytes: &[u8], output: &mut [i16]) -> usize {
        let mut count = 0;
        for (slot, chunk) in output.iter_mut().zip(bytes.chunks_exact(2)) {
            *slot = i16::from_le_bytes([chunk[0], chunk[1]]);
            count += 1;
        }
        count
    }

    /// 将 i16 样本编码为 little-endian 字节
    ///
    /// 返回写入 `output` 的字节数
    pub fn samples_to_bytes(&self, samples: &[i16], output: &mut [u8]) -> usize {
        let mut written = 0;
        for (&sample, chunk) in samples.iter().zip(output.chunks_exact_mut(2)) {
            chunk.copy_from_slice(&sample.to_le_bytes());
            written += 2;
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_format() {
        let format = StreamFormat::default();
        assert_eq!(format.sample_rate, 44_100);
        assert_eq!(format.samples_per_frame(), 2);
        assert_eq!(format.bytes_per_sample(), 2);
        assert_eq!(format.bytes_per_frame(), 4);
    }

    #[test]
    fn test_little_endian_layout() {
        let format = StreamFormat::default();

        let samples = [0x1234i16, -2];
        let mut bytes = [0u8; 4];
        assert_eq!(format.samples_to_bytes(&samples, &mut bytes), 4);
        assert_eq!(bytes, [0x34, 0x12, 0xFE, 0xFF]);

        let mut decoded = [0i16; 2];
        assert_eq!(format.bytes_to_samples(&bytes, &mut decoded), 2);
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_odd_trailing_byte_ignored() {
        let format = StreamFormat::default();

        // 负数 + 一个孤立字节
        let bytes = [0x00, 0xC0, 0x7F];
        let mut samples = [0i16; 4];
        assert_eq!(format.bytes_to_samples(&bytes, &mut samples), 1);
        assert_eq!(samples[0], -16384);
    }

    #[test]
    fn test_output_bounds_respected() {
        let format = StreamFormat::default();

        let samples = [1i16, 2, 3];
        let mut bytes = [0u8; 4];
        // 输出只够放两个样本
        assert_eq!(format.samples_to_bytes(&samples, &mut bytes), 4);
        assert_eq!(bytes, [1, 0, 2, 0]);
    }
}
