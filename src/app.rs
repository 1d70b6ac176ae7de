//! 命令行应用
//!
//! 组装各层能力，开始一个眼镜同步会话，把标准输入的命令映射到会话操作上。

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::infrastructure::{CommandSpeaker, FolderPhotoLibrary, LogSpeaker, PhotoLibrary, Speaker};
use crate::models::PhotoSource;
use crate::orchestrator::{SessionController, SessionSettings};
use crate::services::{ChatBackend, LlmService, SolveService};
use crate::utils::logging::{init_log_file, log_startup};

/// 标准输入命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Tap,
    Reset,
    Toggle,
    Restart,
    Start,
    End,
    Status,
    Answers,
    Help,
    Quit,
}

impl Command {
    pub fn parse(input: &str) -> Option<Self> {
        let command = match input.trim().to_lowercase().as_str() {
            "tap" | "t" => Command::Tap,
            "reset" => Command::Reset,
            "toggle" | "p" | "" => Command::Toggle,
            "restart" | "r" => Command::Restart,
            "start" => Command::Start,
            "end" => Command::End,
            "status" | "s" => Command::Status,
            "answers" | "a" => Command::Answers,
            "help" | "h" | "?" => Command::Help,
            "quit" | "q" | "exit" => Command::Quit,
            _ => return None,
        };
        Some(command)
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    controller: SessionController,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        if config.llm_api_key.is_empty() {
            warn!("⚠️ 未设置 LLM_API_KEY，解题请求可能失败");
        }

        let backend: Arc<dyn ChatBackend> = Arc::new(LlmService::new(&config));
        let solver = Arc::new(SolveService::new(backend));
        let library: Arc<dyn PhotoLibrary> = Arc::new(FolderPhotoLibrary::new(&config.photo_folder));
        let speaker: Arc<dyn Speaker> = match config.speech_command.as_deref().map(str::trim) {
            Some(program) if !program.is_empty() => {
                info!("🔊 使用外部朗读程序: {}", program);
                Arc::new(CommandSpeaker::new(program))
            }
            _ => Arc::new(LogSpeaker),
        };

        let controller = SessionController::new(
            solver,
            Some(library),
            speaker,
            SessionSettings::from_config(&config),
        );

        Ok(Self { config, controller })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        self.controller.start_session(PhotoSource::GlassesSync).await?;
        let watcher = self.spawn_status_watcher();

        print_help();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let Some(command) = Command::parse(&line) else {
                println!("未知命令: {}（输入 help 查看命令）", line.trim());
                continue;
            };

            if command == Command::Quit {
                break;
            }
            self.execute(command).await;
        }

        if self.controller.current_state().await.session.is_some_and(|s| s.is_active) {
            if let Err(e) = self.controller.end_session().await {
                warn!("结束会话失败: {}", e);
            }
        }
        self.controller.shutdown().await;
        watcher.abort();

        info!("👋 程序退出，答案记录: {}", self.config.output_log_file);
        Ok(())
    }

    async fn execute(&self, command: Command) {
        match command {
            Command::Tap => {
                self.controller.tap_expected().await;
            }
            Command::Reset => self.controller.reset_expected().await,
            Command::Toggle => self.controller.toggle_reading().await,
            Command::Restart => self.controller.restart_reading().await,
            Command::Start => {
                if let Err(e) = self.controller.start_session(PhotoSource::GlassesSync).await {
                    warn!("开始会话失败: {}", e);
                }
            }
            Command::End => {
                if let Err(e) = self.controller.end_session().await {
                    warn!("结束会话失败: {}", e);
                }
            }
            Command::Status => {
                let snapshot = self.controller.current_state().await;
                match serde_json::to_string_pretty(&snapshot) {
                    Ok(json) => println!("{}", json),
                    Err(e) => warn!("序列化状态失败: {}", e),
                }
            }
            Command::Answers => {
                let answers = self.controller.answers().await;
                if answers.is_empty() {
                    println!("还没有答案");
                }
                for (i, answer) in answers.iter().enumerate() {
                    println!("{}. {}", i + 1, answer.spoken_text);
                }
            }
            Command::Help => print_help(),
            Command::Quit => {}
        }
    }

    /// 状态文字变化时打印
    fn spawn_status_watcher(&self) -> JoinHandle<()> {
        let mut events = self.controller.subscribe();
        tokio::spawn(async move {
            let mut last_status = String::new();
            loop {
                match events.recv().await {
                    Ok(snapshot) => {
                        if snapshot.status_text != last_status {
                            info!("📣 {}", snapshot.status_text);
                            last_status = snapshot.status_text;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("状态推送落后，跳过 {} 条", skipped);
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        })
    }
}

fn print_help() {
    println!("命令:");
    println!("  tap (t)       预计照片数量 +1");
    println!("  reset         预计数量清零");
    println!("  toggle (p)    朗读 / 暂停（直接回车也可以）");
    println!("  restart (r)   从第一条重新朗读");
    println!("  start         开始新会话");
    println!("  end           结束会话");
    println!("  status (s)    查看当前状态");
    println!("  answers (a)   列出全部答案");
    println!("  quit (q)      退出");
}
