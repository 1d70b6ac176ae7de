//! 批次采集窗口
//!
//! 同步照片没有"拍完了"的信号，只能根据每次轮询看到的未处理照片数量推断：
//! 数量稳定（没有继续增长）超过 settle 时长后，认为这一批已经到齐。

use std::time::Duration;

use tokio::time::Instant;

/// 一次轮询后的决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionDecision {
    /// 没有新照片
    Idle,
    /// 上一批还在处理，跳过本次轮询
    Busy,
    /// 照片还可能继续到达
    Waiting { found: usize, seconds_left: u64 },
    /// 开始处理前 `count` 张
    Dispatch { count: usize },
}

impl AcquisitionDecision {
    pub fn status_text(&self) -> Option<String> {
        match self {
            AcquisitionDecision::Waiting {
                found,
                seconds_left,
            } => Some(format!(
                "Found {} photo{}, waiting up to {}s for more",
                found,
                if *found == 1 { "" } else { "s" },
                seconds_left
            )),
            AcquisitionDecision::Dispatch { count } => {
                Some(format!("Processing {} photo{}...", count, if *count == 1 { "" } else { "s" }))
            }
            AcquisitionDecision::Idle | AcquisitionDecision::Busy => None,
        }
    }
}

/// 采集窗口状态
#[derive(Debug, Clone)]
pub struct AcquisitionWindow {
    settle: Duration,
    max_photos: usize,
    first_detected_at: Option<Instant>,
    last_unprocessed_count: usize,
    dispatching: bool,
}

impl AcquisitionWindow {
    pub fn new(settle: Duration, max_photos: usize) -> Self {
        Self {
            settle,
            max_photos,
            first_detected_at: None,
            last_unprocessed_count: 0,
            dispatching: false,
        }
    }

    /// 处理一次轮询结果
    ///
    /// # 参数
    /// - `found`: 本次会话开始后尚未处理的照片数量
    /// - `expected`: 用户点击设定的预计数量（0 表示未设定）
    /// - `now`: 当前时间
    pub fn observe(&mut self, found: usize, expected: usize, now: Instant) -> AcquisitionDecision {
        if self.dispatching {
            return AcquisitionDecision::Busy;
        }
        if found == 0 {
            return AcquisitionDecision::Idle;
        }

        let first_detected_at = match self.first_detected_at {
            // 第一次发现
            None => return self.restart_settle(found, now),
            // 数量增长，重新计时
            Some(_) if found > self.last_unprocessed_count => {
                return self.restart_settle(found, now)
            }
            Some(at) => at,
        };

        // 数量减少（照片被删除）时只更新计数，不重新计时
        self.last_unprocessed_count = found;

        let elapsed = now.saturating_duration_since(first_detected_at);
        if elapsed < self.settle {
            return AcquisitionDecision::Waiting {
                found,
                seconds_left: (self.settle - elapsed).as_millis().div_ceil(1000) as u64,
            };
        }

        let effective_expected = if expected > 0 {
            expected
        } else {
            found.min(self.max_photos)
        };
        let count = found.min(effective_expected);

        self.reset();
        self.dispatching = true;
        AcquisitionDecision::Dispatch { count }
    }

    fn restart_settle(&mut self, found: usize, now: Instant) -> AcquisitionDecision {
        self.first_detected_at = Some(now);
        self.last_unprocessed_count = found;
        AcquisitionDecision::Waiting {
            found,
            seconds_left: self.settle.as_millis().div_ceil(1000) as u64,
        }
    }

    /// 批次处理结束，允许下一次派发
    pub fn finish_dispatch(&mut self) {
        self.dispatching = false;
    }

    pub fn is_dispatching(&self) -> bool {
        self.dispatching
    }

    /// 清空计时和计数（新会话或派发后）
    pub fn reset(&mut self) {
        self.first_detected_at = None;
        self.last_unprocessed_count = 0;
    }

    pub fn first_detected_at(&self) -> Option<Instant> {
        self.first_detected_at
    }

    pub fn last_unprocessed_count(&self) -> usize {
        self.last_unprocessed_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTLE: Duration = Duration::from_secs(5);

    fn window() -> AcquisitionWindow {
        AcquisitionWindow::new(SETTLE, 10)
    }

    #[test]
    fn test_zero_found_is_noop() {
        let mut window = window();
        assert_eq!(window.observe(0, 3, Instant::now()), AcquisitionDecision::Idle);
        assert!(window.first_detected_at().is_none());
    }

    #[test]
    fn test_plateau_dispatches_after_settle() {
        let t0 = Instant::now();
        let mut window = window();

        assert_eq!(
            window.observe(2, 0, t0),
            AcquisitionDecision::Waiting {
                found: 2,
                seconds_left: 5
            }
        );
        assert_eq!(
            window.observe(2, 0, t0 + Duration::from_secs(5)),
            AcquisitionDecision::Dispatch { count: 2 }
        );
        assert!(window.first_detected_at().is_none());
        assert_eq!(window.last_unprocessed_count(), 0);
    }

    #[test]
    fn test_never_dispatches_before_settle() {
        let t0 = Instant::now();
        let mut window = window();

        window.observe(3, 0, t0);
        let decision = window.observe(3, 0, t0 + Duration::from_millis(4999));
        assert_eq!(
            decision,
            AcquisitionDecision::Waiting {
                found: 3,
                seconds_left: 1
            }
        );
    }

    #[test]
    fn test_growth_restarts_settle_timer() {
        let t0 = Instant::now();
        let mut window = window();

        window.observe(1, 0, t0);
        window.observe(2, 0, t0 + Duration::from_secs(4));
        // 距第一次发现已 6 秒，但距增长只有 2 秒
        assert!(matches!(
            window.observe(2, 0, t0 + Duration::from_secs(6)),
            AcquisitionDecision::Waiting { found: 2, .. }
        ));
        assert_eq!(
            window.observe(2, 0, t0 + Duration::from_secs(9)),
            AcquisitionDecision::Dispatch { count: 2 }
        );
    }

    #[test]
    fn test_dispatch_respects_expected_count() {
        let t0 = Instant::now();

        // 预计比实际少：只处理预计数量
        let mut window = window();
        window.observe(4, 2, t0);
        assert_eq!(
            window.observe(4, 2, t0 + SETTLE),
            AcquisitionDecision::Dispatch { count: 2 }
        );

        // 预计比实际多：不再等待，处理已到的
        let mut window = AcquisitionWindow::new(SETTLE, 10);
        window.observe(2, 5, t0);
        assert_eq!(
            window.observe(2, 5, t0 + SETTLE),
            AcquisitionDecision::Dispatch { count: 2 }
        );

        // 未设定预计数量时最多处理上限张
        let mut window = AcquisitionWindow::new(SETTLE, 10);
        window.observe(14, 0, t0);
        assert_eq!(
            window.observe(14, 0, t0 + SETTLE),
            AcquisitionDecision::Dispatch { count: 10 }
        );
    }

    #[test]
    fn test_busy_until_dispatch_finished() {
        let t0 = Instant::now();
        let mut window = window();

        window.observe(1, 0, t0);
        window.observe(1, 0, t0 + SETTLE);
        assert!(window.is_dispatching());
        assert_eq!(
            window.observe(3, 0, t0 + Duration::from_secs(6)),
            AcquisitionDecision::Busy
        );

        window.finish_dispatch();
        assert!(matches!(
            window.observe(3, 0, t0 + Duration::from_secs(7)),
            AcquisitionDecision::Waiting { found: 3, .. }
        ));
    }
}
