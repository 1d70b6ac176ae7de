//! 朗读队列
//!
//! 答案列表加一个游标。朗读循环每读完一条（按固定间隔估计朗读时长）
//! 只有在游标没有被外部改动时才前进，避免暂停 / 重新开始之后被过期的前进覆盖。
//! 每次进入朗读状态都会换一个 epoch，旧循环凭 epoch 判断自己已经过期。

use serde::Serialize;

use crate::models::AnswerItem;

/// 朗读状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadoutState {
    Idle,
    Reading,
    Paused,
    Finished,
}

/// `toggle` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// 已暂停，调用方需要停止朗读
    Paused,
    /// 开始（或继续）朗读，调用方需要以此 epoch 启动朗读循环
    Started { epoch: u64 },
    /// 队列为空
    Empty,
}

/// `advance` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// 继续读下一条
    Next,
    /// 全部读完
    Finished,
    /// 游标在等待期间被改动，本次前进作废
    Stale,
}

/// 朗读队列
#[derive(Debug, Clone)]
pub struct ReadoutQueue {
    items: Vec<AnswerItem>,
    index: usize,
    state: ReadoutState,
    epoch: u64,
}

impl Default for ReadoutQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadoutQueue {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: 0,
            state: ReadoutState::Idle,
            epoch: 0,
        }
    }

    /// 替换为新一批答案，游标归零
    pub fn replace(&mut self, items: Vec<AnswerItem>) {
        self.items = items;
        self.index = 0;
        self.state = ReadoutState::Idle;
        self.epoch += 1;
    }

    /// 朗读中 → 暂停；暂停 / 空闲 / 读完 → 朗读（读完时从头开始）
    pub fn toggle(&mut self) -> ToggleOutcome {
        if self.state == ReadoutState::Reading {
            self.state = ReadoutState::Paused;
            self.epoch += 1;
            return ToggleOutcome::Paused;
        }

        if self.items.is_empty() {
            return ToggleOutcome::Empty;
        }

        if self.index >= self.items.len() {
            self.index = 0;
        }
        ToggleOutcome::Started {
            epoch: self.enter_reading(),
        }
    }

    /// 从第一条重新开始；队列为空时返回 None 且不改变状态
    pub fn restart(&mut self) -> Option<u64> {
        if self.items.is_empty() {
            return None;
        }
        self.index = 0;
        Some(self.enter_reading())
    }

    fn enter_reading(&mut self) -> u64 {
        self.state = ReadoutState::Reading;
        self.epoch += 1;
        self.epoch
    }

    /// 当前要朗读的条目；epoch 过期或不在朗读状态时返回 None
    pub fn current(&self, epoch: u64) -> Option<(usize, &AnswerItem)> {
        if self.state != ReadoutState::Reading || self.epoch != epoch {
            return None;
        }
        self.items.get(self.index).map(|item| (self.index, item))
    }

    /// 读完 `from_index` 后前进一条
    pub fn advance(&mut self, from_index: usize, epoch: u64) -> AdvanceOutcome {
        if self.state != ReadoutState::Reading || self.epoch != epoch || self.index != from_index {
            return AdvanceOutcome::Stale;
        }

        self.index += 1;
        if self.index >= self.items.len() {
            self.index = self.items.len();
            self.state = ReadoutState::Finished;
            AdvanceOutcome::Finished
        } else {
            AdvanceOutcome::Next
        }
    }

    /// 停止朗读并回到空闲（会话结束时使用）
    pub fn stop(&mut self) {
        self.state = ReadoutState::Idle;
        self.epoch += 1;
    }

    pub fn state(&self) -> ReadoutState {
        self.state
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[AnswerItem] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(n: usize) -> AnswerItem {
        AnswerItem {
            source_id: "img".to_string(),
            spoken_text: format!("Question {}: {}", n, n * 2),
            explanation_text: String::new(),
        }
    }

    fn queue(n: usize) -> ReadoutQueue {
        let mut q = ReadoutQueue::new();
        q.replace((1..=n).map(item).collect());
        q
    }

    #[test]
    fn test_toggle_empty_is_noop() {
        let mut q = ReadoutQueue::new();
        assert_eq!(q.toggle(), ToggleOutcome::Empty);
        assert_eq!(q.state(), ReadoutState::Idle);
        assert_eq!(q.restart(), None);
        assert_eq!(q.state(), ReadoutState::Idle);
    }

    #[test]
    fn test_reads_through_to_finished() {
        let mut q = queue(2);
        let ToggleOutcome::Started { epoch } = q.toggle() else {
            panic!("expected start");
        };

        assert_eq!(q.current(epoch).map(|(i, _)| i), Some(0));
        assert_eq!(q.advance(0, epoch), AdvanceOutcome::Next);
        assert_eq!(q.current(epoch).unwrap().1.spoken_text, "Question 2: 4");
        assert_eq!(q.advance(1, epoch), AdvanceOutcome::Finished);
        assert_eq!(q.state(), ReadoutState::Finished);
        assert_eq!(q.index(), 2);
        assert!(q.current(epoch).is_none());
    }

    #[test]
    fn test_pause_and_resume_from_same_index() {
        let mut q = queue(3);
        let ToggleOutcome::Started { epoch } = q.toggle() else {
            panic!("expected start");
        };
        q.advance(0, epoch);

        assert_eq!(q.toggle(), ToggleOutcome::Paused);
        assert_eq!(q.state(), ReadoutState::Paused);
        // 暂停前排队的前进作废
        assert_eq!(q.advance(1, epoch), AdvanceOutcome::Stale);
        assert_eq!(q.index(), 1);

        let ToggleOutcome::Started { epoch: resumed } = q.toggle() else {
            panic!("expected resume");
        };
        assert_ne!(resumed, epoch);
        assert_eq!(q.current(resumed).map(|(i, _)| i), Some(1));
    }

    #[test]
    fn test_restart_during_wait_is_not_clobbered() {
        let mut q = queue(3);
        let ToggleOutcome::Started { epoch } = q.toggle() else {
            panic!("expected start");
        };
        q.advance(0, epoch);
        q.advance(1, epoch);

        // 第 3 条朗读等待期间用户重新开始
        let restarted = q.restart().unwrap();
        assert_eq!(q.index(), 0);
        assert_eq!(q.advance(2, epoch), AdvanceOutcome::Stale);
        assert_eq!(q.index(), 0);
        assert_eq!(q.state(), ReadoutState::Reading);
        assert_eq!(q.current(restarted).map(|(i, _)| i), Some(0));
    }

    #[test]
    fn test_toggle_on_finished_restarts_from_zero() {
        let mut q = queue(1);
        let ToggleOutcome::Started { epoch } = q.toggle() else {
            panic!("expected start");
        };
        assert_eq!(q.advance(0, epoch), AdvanceOutcome::Finished);

        let ToggleOutcome::Started { epoch } = q.toggle() else {
            panic!("expected restart");
        };
        assert_eq!(q.index(), 0);
        assert_eq!(q.state(), ReadoutState::Reading);
        assert!(q.current(epoch).is_some());
    }

    #[test]
    fn test_replace_invalidates_running_loop() {
        let mut q = queue(2);
        let ToggleOutcome::Started { epoch } = q.toggle() else {
            panic!("expected start");
        };
        q.replace(vec![item(9)]);
        assert_eq!(q.state(), ReadoutState::Idle);
        assert_eq!(q.advance(0, epoch), AdvanceOutcome::Stale);
        assert_eq!(q.len(), 1);
    }
}
