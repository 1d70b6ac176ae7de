//! 点击计数
//!
//! 用户在 5 秒滚动窗口内连续点击，点击次数就是"预计拍了几张"。
//! 每次点击都会重新开始倒计时；窗口关闭后计数冻结，直到下一次点击或重置。

use std::time::Duration;

use tokio::time::Instant;

/// 点击计数状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapStatus {
    /// 窗口打开中
    Open { count: usize, seconds_left: u64 },
    /// 窗口已关闭，计数冻结
    Closed { count: usize },
}

impl TapStatus {
    pub fn count(&self) -> usize {
        match self {
            TapStatus::Open { count, .. } | TapStatus::Closed { count } => *count,
        }
    }

    pub fn status_text(&self) -> String {
        match self {
            TapStatus::Open {
                count,
                seconds_left,
            } => format!(
                "Expecting {} photo{} ({}s to add more)",
                count,
                plural(*count),
                seconds_left
            ),
            TapStatus::Closed { count } => {
                format!("Expecting {} photo{}", count, plural(*count))
            }
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// 点击计数器
#[derive(Debug, Clone)]
pub struct TapExpectationCounter {
    count: usize,
    max: usize,
    window: Duration,
    deadline: Option<Instant>,
}

impl TapExpectationCounter {
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            count: 0,
            max,
            window,
            deadline: None,
        }
    }

    /// 记录一次点击：计数 +1（不超过上限），并重新开始倒计时
    pub fn tap(&mut self, now: Instant) -> TapStatus {
        self.count = (self.count + 1).min(self.max);
        self.deadline = Some(now + self.window);
        TapStatus::Open {
            count: self.count,
            seconds_left: ceil_secs(self.window),
        }
    }

    /// 每秒调用一次，到期时关闭窗口
    pub fn tick(&mut self, now: Instant) -> TapStatus {
        match self.deadline {
            Some(deadline) if now < deadline => TapStatus::Open {
                count: self.count,
                seconds_left: ceil_secs(deadline - now),
            },
            _ => {
                self.deadline = None;
                TapStatus::Closed { count: self.count }
            }
        }
    }

    /// 关闭窗口，保留计数（会话结束时使用）
    pub fn close(&mut self) {
        self.deadline = None;
    }

    /// 下一次需要 tick 的时刻：剩余秒数减一时，最后一次正好在到期时
    pub fn next_tick(&self, now: Instant) -> Option<Instant> {
        let deadline = self.deadline?;
        if now >= deadline {
            return Some(now);
        }
        let whole = ceil_secs(deadline - now).saturating_sub(1);
        Some(deadline - Duration::from_secs(whole))
    }

    /// 清零并关闭窗口
    pub fn reset(&mut self) {
        self.count = 0;
        self.deadline = None;
    }

    pub fn expected(&self) -> usize {
        self.count
    }

    pub fn is_open(&self) -> bool {
        self.deadline.is_some()
    }

    /// 窗口剩余秒数（不改变状态）
    pub fn seconds_left(&self, now: Instant) -> Option<u64> {
        self.deadline
            .filter(|d| now < *d)
            .map(|d| ceil_secs(d - now))
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let millis = duration.as_millis() as u64;
    millis.div_ceil(1000)
}
