//! 定义了歌词转写结果的数据结构，即带时间戳的单词序列。

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{LyricVisualsError, Result};

/// 代表转写结果中的一个单词及其演唱时间区间。
///
/// 由上游的语音/音乐识别服务产出，加载后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// 单词文本。
    pub text: String,
    /// 开始时间，相对于歌曲开始的绝对时间（秒）。
    pub start: f64,
    /// 结束时间，相对于歌曲开始的绝对时间（秒）。
    pub end: f64,
}

impl Word {
    /// 单词的演唱时长（秒）。
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// 校验单词序列是否满足约定：每个单词 `start < end`，
/// 且整个序列按时间排列、互不重叠。
///
/// # 返回
/// 序列不满足约定时返回 `LyricVisualsError::InvalidInput`。
pub fn validate_words(words: &[Word]) -> Result<()> {
    let mut previous_end = f64::NEG_INFINITY;
    for (index, word) in words.iter().enumerate() {
        if word.text.trim().is_empty() {
            return Err(LyricVisualsError::InvalidInput(format!(
                "第 {index} 个单词的文本为空"
            )));
        }
        if word.start < 0.0 || word.start >= word.end {
            return Err(LyricVisualsError::InvalidInput(format!(
                "第 {index} 个单词 '{}' 的时间区间无效: [{}, {}]",
                word.text, word.start, word.end
            )));
        }
        if word.start < previous_end {
            return Err(LyricVisualsError::InvalidInput(format!(
                "第 {index} 个单词 '{}' 与前一个单词的时间区间重叠",
                word.text
            )));
        }
        previous_end = word.end;
    }
    Ok(())
}

/// 从 `words.json` 内容中加载单词序列。
///
/// 采用宽容策略：整体必须是合法的 JSON 数组，但数组中不符合约定的
/// 单条记录（字段缺失、时间戳倒置、与前一个单词重叠）只会被丢弃并
/// 记录警告，不会让整次加载失败。
pub fn load_words(content: &str) -> Result<Vec<Word>> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(content)?;
    let mut words: Vec<Word> = Vec::with_capacity(raw.len());
    let mut previous_end = f64::NEG_INFINITY;

    for (index, value) in raw.into_iter().enumerate() {
        let word: Word = match serde_json::from_value(value) {
            Ok(word) => word,
            Err(e) => {
                warn!("已丢弃第 {index} 条无法解析的单词记录: {e}");
                continue;
            }
        };
        if word.text.trim().is_empty() || word.start < 0.0 || word.start >= word.end {
            warn!(
                "已丢弃第 {index} 个时间区间无效的单词 '{}': [{}, {}]",
                word.text, word.start, word.end
            );
            continue;
        }
        if word.start < previous_end {
            warn!(
                "已丢弃第 {index} 个与前一单词时间重叠的单词 '{}'",
                word.text
            );
            continue;
        }
        previous_end = word.end;
        words.push(word);
    }

    Ok(words)
}
