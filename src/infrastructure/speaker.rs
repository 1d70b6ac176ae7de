//! 朗读能力
//!
//! `speak` / `stop` 都不阻塞调用方，朗读在后台进行。

use std::process::Stdio;
use std::sync::Mutex;

use tokio::process::{Child, Command};
use tracing::{info, warn};

/// 朗读引擎
pub trait Speaker: Send + Sync {
    /// 开始朗读，打断正在进行的朗读
    fn speak(&self, text: &str);

    /// 立即停止朗读
    fn stop(&self);
}

/// 只写日志的朗读器，没有配置外部朗读程序时使用
#[derive(Debug, Default)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&self, text: &str) {
        info!("🔊 {}", text);
        println!("🔊 {}", text);
    }

    fn stop(&self) {
        info!("🔇 停止朗读");
    }
}

/// 调用外部朗读程序（如 `espeak`、`say`）
///
/// 只发送终止信号，不等待进程退出，回收交给 tokio。
/// 需要在 tokio 运行时内调用。
pub struct CommandSpeaker {
    program: String,
    current: Mutex<Option<Child>>,
}

impl CommandSpeaker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            current: Mutex::new(None),
        }
    }

    fn kill_current(current: &mut Option<Child>) {
        if let Some(mut child) = current.take() {
            // 进程可能已经自然结束
            if let Err(e) = child.start_kill() {
                warn!("终止朗读进程失败: {}", e);
            }
        }
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&self, text: &str) {
        let Ok(mut current) = self.current.lock() else {
            warn!("朗读进程锁已损坏");
            return;
        };
        Self::kill_current(&mut current);

        match Command::new(&self.program)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => *current = Some(child),
            Err(e) => warn!("启动朗读程序 {} 失败: {}", self.program, e),
        }
    }

    fn stop(&self) {
        if let Ok(mut current) = self.current.lock() {
            Self::kill_current(&mut current);
        }
    }
}

impl Drop for CommandSpeaker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_does_not_panic() {
        let speaker = CommandSpeaker::new("definitely-not-a-tts-program");
        speaker.speak("Question 1: 42");
        speaker.stop();
        assert!(speaker.current.lock().unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_returns_without_waiting_for_exit() {
        // 用 `sleep 30` 模拟一段很长的朗读
        let speaker = CommandSpeaker::new("sleep");
        speaker.speak("30");

        let started = std::time::Instant::now();
        speaker.stop();
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert!(speaker.current.lock().unwrap().is_none());

        speaker.speak("30");
        speaker.speak("30");
        assert!(speaker.current.lock().unwrap().is_some());
        speaker.stop();
    }
}
