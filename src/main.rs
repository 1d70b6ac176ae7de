use anyhow::Result;
use photo_question_reader::utils::logging;
use photo_question_reader::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置（第一个参数为配置文件路径）
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path)?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    App::initialize(config).await?.run().await
}
