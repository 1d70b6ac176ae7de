use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::readout::ReadoutState;

/// 照片来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhotoSource {
    /// 眼镜拍摄后同步到照片库，轮询获取
    GlassesSync,
    /// 手机直接拍摄，主动推送
    DirectCapture,
}

impl std::fmt::Display for PhotoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhotoSource::GlassesSync => write!(f, "眼镜同步"),
            PhotoSource::DirectCapture => write!(f, "直接拍摄"),
        }
    }
}

/// 会话基本信息
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub started_at: DateTime<Utc>,
    pub is_active: bool,
    pub source: PhotoSource,
}

impl Session {
    pub fn start(source: PhotoSource) -> Self {
        Self {
            started_at: Utc::now(),
            is_active: true,
            source,
        }
    }
}

/// 会话状态快照，UI 只订阅它，不参与状态机
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    pub expected_count: usize,
    /// 点击窗口剩余秒数，窗口关闭时为 None
    pub tap_seconds_left: Option<u64>,
    pub held_captures: usize,
    pub processed_count: usize,
    pub processing: bool,
    pub answers_total: usize,
    pub readout_state: ReadoutState,
    pub readout_index: usize,
    pub status_text: String,
}
