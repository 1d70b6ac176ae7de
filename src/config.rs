use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 同步照片的轮询间隔（秒）
    pub poll_interval_secs: u64,
    /// 照片数量稳定多久后开始处理（秒）
    pub settle_secs: u64,
    /// 一次会话最多处理的照片数量
    pub max_photos: usize,
    /// 点击计数窗口长度（秒）
    pub tap_window_secs: u64,
    /// 朗读每条答案后的等待时间（毫秒）
    pub speech_pacing_ms: u64,
    /// 眼镜同步照片的目录
    pub photo_folder: String,
    /// 处理完成后是否自动开始朗读
    pub auto_read_after_processing: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 外部朗读程序（如 `espeak`、`say`），为空时只写日志
    pub speech_command: Option<String>,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            settle_secs: 5,
            max_photos: 10,
            tap_window_secs: 5,
            speech_pacing_ms: 2000,
            photo_folder: "synced_photos".to_string(),
            auto_read_after_processing: true,
            verbose_logging: false,
            output_log_file: "answers.txt".to_string(),
            speech_command: None,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            llm_temperature: 0.2,
            llm_max_tokens: 2048,
        }
    }
}

impl Config {
    /// 读取配置：TOML 文件（可选）→ 环境变量覆盖
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let base = if path.exists() {
            Self::from_toml_file(path)?
        } else {
            Self::default()
        };
        Ok(base.with_env_overrides())
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(self) -> Self {
        let base = self;
        Self {
            poll_interval_secs: env_parse("POLL_INTERVAL_SECS").unwrap_or(base.poll_interval_secs),
            settle_secs: env_parse("SETTLE_SECS").unwrap_or(base.settle_secs),
            max_photos: env_parse("MAX_PHOTOS").unwrap_or(base.max_photos),
            tap_window_secs: env_parse("TAP_WINDOW_SECS").unwrap_or(base.tap_window_secs),
            speech_pacing_ms: env_parse("SPEECH_PACING_MS").unwrap_or(base.speech_pacing_ms),
            photo_folder: std::env::var("PHOTO_FOLDER").unwrap_or(base.photo_folder),
            auto_read_after_processing: env_parse("AUTO_READ_AFTER_PROCESSING").unwrap_or(base.auto_read_after_processing),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(base.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(base.output_log_file),
            speech_command: std::env::var("SPEECH_COMMAND").ok().or(base.speech_command),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(base.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(base.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(base.llm_model_name),
            llm_temperature: env_parse("LLM_TEMPERATURE").unwrap_or(base.llm_temperature),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS").unwrap_or(base.llm_max_tokens),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn settle_duration(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn tap_window(&self) -> Duration {
        Duration::from_secs(self.tap_window_secs)
    }

    pub fn speech_pacing(&self) -> Duration {
        Duration::from_millis(self.speech_pacing_ms)
    }
}

fn env_parse<T: std::str::FromStr>(var_name: &str) -> Option<T> {
    let value = std::env::var(var_name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            let err = ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            };
            tracing::warn!("{}，使用默认值", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "settle_secs = 8\nphoto_folder = \"/tmp/glasses\"").unwrap();

        let config = Config::from_toml_file(file.path()).unwrap();
        assert_eq!(config.settle_secs, 8);
        assert_eq!(config.photo_folder, "/tmp/glasses");
        assert_eq!(config.max_photos, 10);
        assert_eq!(config.speech_pacing(), Duration::from_secs(2));
    }

    #[test]
    fn test_bad_toml_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "settle_secs = \"soon\"").unwrap();

        let err = Config::from_toml_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseFailed { .. }));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load("definitely/not/here.toml").unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.tap_window(), Duration::from_secs(5));
    }
}
