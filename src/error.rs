//! 定义了整个 `lyric-visuals` 库的错误类型 `LyricVisualsError`。

use std::io;
use thiserror::Error;

use crate::selector::types::SelectError;

/// `lyric-visuals` 库的通用错误枚举。
#[derive(Error, Debug)]
pub enum LyricVisualsError {
    /// 通用的 anyhow 错误
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    /// 网络请求失败 (源自 `reqwest::Error`)
    #[error("网络请求失败: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// JSON 解析失败 (源自 `serde_json::Error`)
    #[error("JSON 解析失败: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Base64 解码失败 (源自 `base64::DecodeError`)
    #[error("Base64 解码失败: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// I/O 错误 (源自 `io::Error`)
    #[error("I/O 错误: {0}")]
    Io(#[from] io::Error),

    /// 配置自相矛盾，必须在任何处理开始前修正
    #[error("配置无效: {0}")]
    Config(String),

    /// 嵌入模型调用失败或返回了意外的结果
    #[error("嵌入计算失败: {0}")]
    Embedding(String),

    /// 输入数据不符合约定（时间戳倒置、字段缺失等）
    #[error("输入数据无效: {0}")]
    InvalidInput(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// `LyricVisualsError` 的 `Result` 类型别名，方便在函数签名中使用。
pub type Result<T> = std::result::Result<T, LyricVisualsError>;

impl From<SelectError> for LyricVisualsError {
    fn from(err: SelectError) -> Self {
        match err {
            SelectError::EmbeddingCountMismatch { expected, actual } => Self::Internal(format!(
                "查询向量数量与词组数量不一致: 期望 {expected}, 实际 {actual}"
            )),
            SelectError::Internal(s) => Self::Internal(s),
        }
    }
}
