//! 流统计模块
//!
//! 只在引擎线程内更新，单线程，无需原子操作。
//! 统计不影响循环的成功/失败结果

use super::device::{Direction, FaultKind};

/// 单次运行的计数器
#[derive(Debug, Default)]
pub struct StreamStats {
    iterations: u64,
    device_calls: u64,
    frames_transferred: u64,
    xruns: u64,
    suspends: u64,
    interrupts: u64,
    other_faults: u64,
    recoveries: u64,
    short_writes: u64,
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_iteration(&mut self) {
        self.iterations += 1;
    }

    #[inline]
    pub fn record_device_call(&mut self) {
        self.device_calls += 1;
    }

    #[inline]
    pub fn add_frames(&mut self, frames: usize) {
        self.frames_transferred += frames as u64;
    }

    #[inline]
    pub fn record_fault(&mut self, kind: FaultKind) {
        match kind {
            FaultKind::Xrun => self.xruns += 1,
            FaultKind::Suspended => self.suspends += 1,
            FaultKind::Interrupted => self.interrupts += 1,
            FaultKind::Other => self.other_faults += 1,
        }
    }

    #[inline]
    pub fn record_recovery(&mut self) {
        self.recoveries += 1;
    }

    #[inline]
    pub fn record_short_write(&mut self) {
        self.short_writes += 1;
    }

    #[inline]
    pub fn frames_transferred(&self) -> u64 {
        self.frames_transferred
    }

    #[inline]
    pub fn recoveries(&self) -> u64 {
        self.recoveries
    }

    /// 故障总数
    pub fn fault_count(&self) -> u64 {
        self.xruns + self.suspends + self.interrupts + self.other_faults
    }

    /// 生成报告
    pub fn report(&self, direction: Direction, sample_rate: u32) -> StatsReport {
        let duration_secs = if sample_rate > 0 {
            self.frames_transferred as f64 / sample_rate as f64
        } else {
            0.0
        };

        StatsReport {
            direction,
            iterations: self.iterations,
            device_calls: self.device_calls,
            frames_transferred: self.frames_transferred,
            duration_secs,
            xruns: self.xruns,
            suspends: self.suspends,
            interrupts: self.interrupts,
            other_faults: self.other_faults,
            recoveries: self.recoveries,
            short_writes: self.short_writes,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 统计报告
#[derive(Debug)]
pub struct StatsReport {
    pub direction: Direction,
    pub iterations: u64,
    pub device_calls: u64,
    pub frames_transferred: u64,
    /// 按名义采样率换算的时长
    pub duration_secs: f64,
    pub xruns: u64,
    pub suspends: u64,
    pub interrupts: u64,
    pub other_faults: u64,
    pub recoveries: u64,
    pub short_writes: u64,
}

impl std::fmt::Display for StatsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Stream Statistics ({})", self.direction)?;
        writeln!(f, "===================")?;
        writeln!(f, "Iterations: {}", self.iterations)?;
        writeln!(f, "Device calls: {}", self.device_calls)?;
        writeln!(
            f,
            "Frames transferred: {} ({:.2} s)",
            self.frames_transferred, self.duration_secs
        )?;
        writeln!(f)?;

        writeln!(f, "Faults:")?;
        writeln!(f, "  Xrun: {}", self.xruns)?;
        writeln!(f, "  Suspend: {}", self.suspends)?;
        writeln!(f, "  Interrupted: {}", self.interrupts)?;
        writeln!(f, "  Other: {}", self.other_faults)?;
        writeln!(f, "Recoveries: {}", self.recoveries)?;

        if self.direction == Direction::Playback {
            writeln!(f, "Short writes: {}", self.short_writes)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_counters() {
        let mut stats = StreamStats::new();
        stats.record_fault(FaultKind::Xrun);
        stats.record_fault(FaultKind::Xrun);
        stats.record_fault(FaultKind::Suspended);
        stats.record_fault(FaultKind::Other);
        stats.record_recovery();

        assert_eq!(stats.fault_count(), 4);
        let report = stats.report(Direction::Capture, 44_100);
        assert_eq!(report.xruns, 2);
        assert_eq!(report.suspends, 1);
        assert_eq!(report.other_faults, 1);
        assert_eq!(report.recoveries, 1);
    }

    #[test]
    fn test_duration_from_frames() {
        let mut stats = StreamStats::new();
        stats.add_frames(44_100);
        stats.add_frames(22_050);

        let report = stats.report(Direction::Playback, 44_100);
        assert_eq!(report.frames_transferred, 66_150);
        assert!((report.duration_secs - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_report_display() {
        let mut stats = StreamStats::new();
        stats.record_short_write();

        let capture = stats.report(Direction::Capture, 44_100).to_string();
        assert!(capture.starts_with("Stream Statistics (capture)"));
        assert!(!capture.contains("Short writes"));

        let playback = stats.report(Direction::Playback, 44_100).to_string();
        assert!(playback.contains("Short writes: 1"));
    }

    #[test]
    fn test_reset() {
        let mut stats = StreamStats::new();
        stats.add_frames(10);
        stats.record_device_call();
        stats.reset();
        assert_eq!(stats.frames_transferred(), 0);
        assert_eq!(stats.report(Direction::Capture, 44_100).device_calls, 0);
    }
}
