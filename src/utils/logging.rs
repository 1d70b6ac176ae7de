/// 日志工具模块
///
/// 提供日志初始化、格式化和答案记录的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::AnswerItem;

/// 初始化 tracing 日志
///
/// `RUST_LOG` 优先；否则默认 `info`，详细模式下为 `debug`。
/// 重复初始化（例如测试中）不会报错。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n答题记录 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 追加一批答案到日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
/// - `batch_num`: 批次编号
/// - `answers`: 本批答案
pub fn append_answer_log(log_file_path: &str, batch_num: usize, answers: &[AnswerItem]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;

    writeln!(
        file,
        "{}\n第 {} 批 - {}\n{}",
        "─".repeat(60),
        batch_num,
        chrono::Local::now().format("%H:%M:%S"),
        "─".repeat(60)
    )?;
    for (i, answer) in answers.iter().enumerate() {
        writeln!(file, "{}. [{}] {}", i + 1, answer.source_id, answer.spoken_text)?;
        if !answer.explanation_text.trim().is_empty() {
            writeln!(file, "   {}", answer.explanation_text.trim())?;
        }
    }
    writeln!(file)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 拍照读题模式");
    info!("📁 同步目录: {}", config.photo_folder);
    info!(
        "⏱️ 轮询间隔: {}s / 稳定等待: {}s / 最多 {} 张",
        config.poll_interval_secs, config.settle_secs, config.max_photos
    );
    info!("🤖 模型: {}", config.llm_model_name);
    info!("{}", "=".repeat(60));
}

/// 记录批次开始信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `count`: 本批照片数量
/// - `source`: 照片来源（仅用于显示）
pub fn log_batch_start(batch_num: usize, count: usize, source: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {} 批", batch_num);
    info!("📷 本批照片: {} 张 ({})", count, source);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `answered`: 得到答案的照片数量
/// - `total`: 本批照片数量
/// - `answers`: 答案条数
pub fn log_batch_complete(batch_num: usize, answered: usize, total: usize, answers: usize) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 第 {} 批完成: 照片 {}/{}，答案 {} 条",
        batch_num, answered, total, answers
    );
    info!("{}", "─".repeat(60));
}

/// 打印会话统计信息
///
/// # 参数
/// - `batches`: 处理批次数
/// - `processed`: 已处理照片数
/// - `log_file_path`: 日志文件路径
pub fn log_session_summary(batches: usize, processed: usize, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 会话结束统计");
    info!(
        "结束时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("📦 批次: {}", batches);
    info!("📷 已处理照片: {}", processed);
    info!("{}", "=".repeat(60));
    info!("\n答案已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
