//! 固定容量帧缓冲区
//!
//! 一次循环迭代的传输单元：
//! - 零分配：样本区和字节暂存区都在初始化时预分配，循环中从不扩容
//! - 只解释实际传输的部分：调用方给出帧数，缓冲区只编码/解码这么多
//! - 内存锁定：可选 mlock 防止 page fault

use std::io::{self, ErrorKind, Read, Write};

use super::format::StreamFormat;

/// 交织 i16 帧缓冲区
pub struct FrameBuffer {
    samples: Box<[i16]>,
    // 文件侧的 little-endian 暂存区，大小 = 样本数 × 2
    bytes: Box<[u8]>,
    frames: usize,
    format: StreamFormat,
    memory_locked: bool,
}

impl FrameBuffer {
    /// 创建容量为 `frames` 帧的缓冲区
    ///
    /// 容量 = frames × channels 个样本，之后不再改变
    pub fn new(frames: usize, format: StreamFormat) -> Self {
        assert!(frames > 0, "frame capacity must be non-zero");
        assert!(format.channels > 0, "channel count must be non-zero");

        let byte_count = match frames.checked_mul(format.bytes_per_frame()) {
            Some(n) if n <= isize::MAX as usize => n,
            _ => panic!("frame capacity {} overflows the buffer size", frames),
        };
        let sample_count = frames * format.samples_per_frame();
        Self {
            samples: vec![0i16; sample_count].into_boxed_slice(),
            bytes: vec![0u8; byte_count].into_boxed_slice(),
            frames,
            format,
            memory_locked: false,
        }
    }

    /// 帧容量
    #[inline]
    pub fn capacity_frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.format.samples_per_frame()
    }

    #[inline]
    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// 整个样本区（设备读取的目标）
    #[inline]
    pub fn samples_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    /// 前 `frames` 帧的样本
    #[inline]
    pub fn frames(&self, frames: usize) -> &[i16] {
        &self.samples[..frames * self.channels()]
    }

    /// 将前 `frames` 帧按原顺序追加到 sink
    ///
    /// 恰好写入 frames × channels 个样本
    pub fn write_frames<W: Write + ?Sized>(&mut self, frames: usize, sink: &mut W) -> io::Result<()> {
        debug_assert!(frames <= self.frames, "frame count exceeds capacity");

        let samples = &self.samples[..frames * self.channels()];
        let len = self.format.samples_to_bytes(samples, &mut self.bytes);
        sink.write_all(&self.bytes[..len])
    }

    /// 从 source 填充缓冲区，语义同 fread
    ///
    /// 反复读取直到缓冲区满或 EOF，返回解码出的完整样本数（0 = 输入耗尽）
    pub fn fill_from<R: Read + ?Sized>(&mut self, source: &mut R) -> io::Result<usize> {
        let mut filled = 0;
        while filled < self.bytes.len() {
            match source.read(&mut self.bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        let bytes_per_sample = self.format.bytes_per_sample();
        if filled % bytes_per_sample != 0 {
            log::warn!(
                "Dropping {} trailing byte(s) that do not form a whole sample",
                filled % bytes_per_sample
            );
        }

        Ok(self.format.bytes_to_samples(&self.bytes[..filled], &mut self.samples))
    }

    /// 锁定缓冲区内存，防止被换页
    ///
    /// 返回是否成功锁定；失败不影响使用
    pub fn lock_memory(&mut self) -> bool {
        if self.memory_locked {
            return true;
        }

        let regions = self.regions();
        for (i, &(ptr, len)) in regions.iter().enumerate() {
            let result = unsafe { libc::mlock(ptr, len) };
            if result != 0 {
                log::warn!(
                    "Failed to lock frame buffer memory: {}",
                    io::Error::last_os_error()
                );
                for &(ptr, len) in &regions[..i] {
                    unsafe {
                        libc::munlock(ptr, len);
                    }
                }
                return false;
            }
        }

        self.memory_locked = true;
        log::debug!(
            "Frame buffer memory locked: {} bytes",
            regions.iter().map(|&(_, len)| len).sum::<usize>()
        );
        true
    }

    /// 解锁缓冲区内存
    pub fn unlock_memory(&mut self) {
        if !self.memory_locked {
            return;
        }

        for (ptr, len) in self.regions() {
            unsafe {
                libc::munlock(ptr, len);
            }
        }

        self.memory_locked = false;
        log::debug!("Frame buffer memory unlocked");
    }

    fn regions(&self) -> [(*const libc::c_void, usize); 2] {
        [
            (
                self.samples.as_ptr() as *const libc::c_void,
                std::mem::size_of_val(&*self.samples),
            ),
            (self.bytes.as_ptr() as *const libc::c_void, self.bytes.len()),
        ]
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        self.unlock_memory();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// 每次只给几个字节的 reader，模拟短读
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_capacity() {
        let buffer = FrameBuffer::new(128, StreamFormat::default());
        assert_eq!(buffer.capacity_frames(), 128);
        assert_eq!(buffer.samples.len(), 256);
        assert_eq!(buffer.bytes.len(), 512);
        assert_eq!(buffer.channels(), 2);
    }

    #[test]
    #[should_panic(expected = "frame capacity must be non-zero")]
    fn test_zero_capacity_rejected() {
        let _ = FrameBuffer::new(0, StreamFormat::default());
    }

    #[test]
    #[should_panic(expected = "overflows the buffer size")]
    fn test_oversized_capacity_rejected() {
        let _ = FrameBuffer::new(1 << (usize::BITS - 1), StreamFormat::default());
    }

    #[test]
    fn test_write_frames_only_transferred_part() {
        let mut buffer = FrameBuffer::new(4, StreamFormat::default());
        for (i, s) in buffer.samples_mut().iter_mut().enumerate() {
            *s = i as i16 + 1;
        }

        let mut out = Vec::new();
        buffer.write_frames(2, &mut out).unwrap();
        assert_eq!(out, [1, 0, 2, 0, 3, 0, 4, 0]);
    }

    #[test]
    fn test_write_zero_frames() {
        let mut buffer = FrameBuffer::new(4, StreamFormat::default());
        let mut out = Vec::new();
        buffer.write_frames(0, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_fill_stops_at_capacity() {
        let mut buffer = FrameBuffer::new(2, StreamFormat::default());
        let data: Vec<u8> = (0..20).collect();
        let mut source = Cursor::new(data);

        assert_eq!(buffer.fill_from(&mut source).unwrap(), 4);
        assert_eq!(buffer.frames(2), [0x0100, 0x0302, 0x0504, 0x0706]);
        assert_eq!(source.position(), 8);
    }

    #[test]
    fn test_fill_accumulates_short_reads() {
        let mut buffer = FrameBuffer::new(2, StreamFormat::default());
        let data = [1u8, 0, 2, 0, 3, 0, 4, 0];
        let mut source = Trickle { data: &data, step: 3 };

        assert_eq!(buffer.fill_from(&mut source).unwrap(), 4);
        assert_eq!(buffer.frames(2), [1, 2, 3, 4]);
    }

    #[test]
    fn test_fill_eof() {
        let mut buffer = FrameBuffer::new(2, StreamFormat::default());
        let mut source = Cursor::new(Vec::<u8>::new());
        assert_eq!(buffer.fill_from(&mut source).unwrap(), 0);
    }

    #[test]
    fn test_fill_drops_odd_byte() {
        let mut buffer = FrameBuffer::new(2, StreamFormat::default());
        let mut source = Cursor::new(vec![5u8, 0, 6, 0, 7]);
        assert_eq!(buffer.fill_from(&mut source).unwrap(), 2);
    }

    #[test]
    fn test_unlock_without_lock_is_noop() {
        let mut buffer = FrameBuffer::new(2, StreamFormat::default());
        buffer.unlock_memory();
        assert!(!buffer.memory_locked);
    }
}
