use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 解题（OCR + LLM）错误
    #[error("解题错误: {0}")]
    Solve(#[from] SolveError),
    /// 照片来源错误
    #[error("照片错误: {0}")]
    Photo(#[from] PhotoError),
    /// 会话操作错误
    #[error("会话错误: {0}")]
    Session(#[from] SessionError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 解题错误
///
/// 只有 `Transport` 会作为硬错误传给调用方；`Parse` 在 SolveService 内部
/// 触发重试和兜底，不会原样暴露给用户。
#[derive(Debug, Error)]
pub enum SolveError {
    /// 网络 / 连接失败
    #[error("请求失败 ({model}): {source}")]
    Transport {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 收到了回复，但无法解析为题目结构
    #[error("无法解析回复: {reason}")]
    Parse { raw: String, reason: String },
    /// 没有可用的文字或图片
    #[error("没有可识别的输入")]
    EmptyInput,
}

impl SolveError {
    pub fn is_transport(&self) -> bool {
        matches!(self, SolveError::Transport { .. })
    }
}

/// 照片来源错误
#[derive(Debug, Error)]
pub enum PhotoError {
    /// 没有照片访问权限
    #[error("没有访问照片的权限: {path}")]
    PermissionDenied { path: String },
    /// 照片目录不存在
    #[error("照片目录不存在: {path}")]
    FolderNotFound { path: String },
    /// 读取失败
    #[error("读取照片失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PhotoError {
    /// 按 io 错误类型归类
    pub fn from_io(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => PhotoError::PermissionDenied { path },
            std::io::ErrorKind::NotFound => PhotoError::FolderNotFound { path },
            _ => PhotoError::Io { path, source },
        }
    }
}

/// 会话操作错误
#[derive(Debug, Error)]
pub enum SessionError {
    /// 当前没有进行中的会话
    #[error("没有进行中的会话")]
    NoActiveSession,
    /// 拍摄的照片数量已达上限
    #[error("已达到照片上限 ({max} 张)")]
    CaptureLimitReached { max: usize },
    /// 操作与当前照片来源不符
    #[error("当前照片来源不支持该操作: {operation}")]
    WrongSource { operation: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl SolveError {
    /// 创建请求失败错误
    pub fn transport(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        SolveError::Transport {
            model: model.into(),
            source: Box::new(source),
        }
    }

    /// 创建解析失败错误，保留原始回复
    pub fn parse(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        SolveError::Parse {
            raw: raw.into(),
            reason: reason.into(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
