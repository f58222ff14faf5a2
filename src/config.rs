//! 选配引擎的配置项及其校验逻辑。

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{LyricVisualsError, Result};

/// 控制整条选配流水线的配置。
///
/// 所有字段都有与上游编排层约定一致的默认值，可以直接使用
/// `SelectionConfig::default()`，也可以通过 [`SelectionConfig::from_json`]
/// 从编排层下发的 JSON 中加载。
///
/// 时长边界之间的约束（`min <= target <= max`）属于致命配置错误，
/// 会在引擎构造时立刻被 [`SelectionConfig::validate`] 拒绝，
/// 而不会等到处理中途才暴露。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// 候选描述中每命中一个关键词，相关度乘以的倍数。
    pub keyword_boost: f32,
    /// 近期复用惩罚量，从候选的最终得分中扣除。
    pub diversity_penalty: f32,
    /// 复用惩罚的回溯窗口：最近多少次分配内用过的候选会被惩罚。
    pub recency_window: usize,
    /// 合并片段的理想时长（秒）。
    pub target_clip_duration: f64,
    /// 合并片段的最小时长（秒）。只有序列末尾的片段允许低于它。
    pub min_clip_duration: f64,
    /// 合并片段的硬性时长上限（秒）。
    pub max_clip_duration: f64,
    /// 允许两个相邻词组合并画面所需的最低关键词 Jaccard 相似度。
    pub semantic_coherence_threshold: f32,
    /// 单词之间超过该间隔（秒）即切分新词组。
    pub gap_threshold: f64,
    /// 单个词组最多容纳的单词数。
    pub max_words_per_group: usize,
    /// 是否启用片段合并。关闭后每个词组分配直接产出一个镜头。
    pub consolidation_enabled: bool,
    /// 相关度下限。最佳候选得分低于它时该词组视为无法填充。
    /// 非正数表示不启用下限。
    pub min_relevance_floor: f32,
    /// 缩略图下载的并发上限。
    pub max_concurrent_downloads: usize,
    /// 缩略图向量余弦相似度超过该值时，靠后的候选会被当作
    /// 近似重复素材剔除。大于 1.0 表示不启用去重。
    pub dedup_similarity_threshold: f32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            keyword_boost: 2.0,
            diversity_penalty: 0.1,
            recency_window: 3,
            target_clip_duration: 8.0,
            min_clip_duration: 4.0,
            max_clip_duration: 15.0,
            semantic_coherence_threshold: 0.7,
            gap_threshold: 0.3,
            max_words_per_group: 8,
            consolidation_enabled: true,
            min_relevance_floor: 0.0,
            max_concurrent_downloads: 10,
            dedup_similarity_threshold: 0.98,
        }
    }
}

impl SelectionConfig {
    /// 校验配置内部是否自洽。
    ///
    /// # 返回
    /// 配置矛盾时返回 `LyricVisualsError::Config`，这是整个库中
    /// 唯一会在任何处理开始之前直接抛出的错误类别。
    pub fn validate(&self) -> Result<()> {
        if self.min_clip_duration <= 0.0 || self.max_clip_duration <= 0.0 {
            return Err(LyricVisualsError::Config(format!(
                "片段时长必须为正数: min={}, max={}",
                self.min_clip_duration, self.max_clip_duration
            )));
        }
        if self.min_clip_duration > self.max_clip_duration {
            return Err(LyricVisualsError::Config(format!(
                "min_clip_duration ({}) 不能大于 max_clip_duration ({})",
                self.min_clip_duration, self.max_clip_duration
            )));
        }
        if self.target_clip_duration < self.min_clip_duration
            || self.target_clip_duration > self.max_clip_duration
        {
            return Err(LyricVisualsError::Config(format!(
                "target_clip_duration ({}) 必须位于 [{}, {}] 区间内",
                self.target_clip_duration, self.min_clip_duration, self.max_clip_duration
            )));
        }
        if self.gap_threshold < 0.0 {
            return Err(LyricVisualsError::Config(format!(
                "gap_threshold ({}) 不能为负数",
                self.gap_threshold
            )));
        }
        if self.max_words_per_group == 0 {
            return Err(LyricVisualsError::Config(
                "max_words_per_group 不能为 0".to_string(),
            ));
        }
        if self.keyword_boost <= 0.0 {
            return Err(LyricVisualsError::Config(format!(
                "keyword_boost ({}) 必须为正数",
                self.keyword_boost
            )));
        }
        if self.diversity_penalty < 0.0 {
            return Err(LyricVisualsError::Config(format!(
                "diversity_penalty ({}) 不能为负数",
                self.diversity_penalty
            )));
        }
        if self.max_concurrent_downloads == 0 {
            return Err(LyricVisualsError::Config(
                "max_concurrent_downloads 不能为 0".to_string(),
            ));
        }
        Ok(())
    }

    /// 从编排层下发的 JSON 字符串中加载并校验配置。
    ///
    /// 缺失的字段会回退到默认值。
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        info!("选配配置加载完成: {:?}", config);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SelectionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_duration_bounds_rejected() {
        let config = SelectionConfig {
            min_clip_duration: 16.0,
            target_clip_duration: 16.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LyricVisualsError::Config(_))
        ));
    }

    #[test]
    fn test_target_outside_bounds_rejected() {
        let config = SelectionConfig {
            target_clip_duration: 20.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LyricVisualsError::Config(_))
        ));
    }

    #[test]
    fn test_from_json_with_partial_fields() {
        let config = SelectionConfig::from_json(r#"{"recency_window": 5}"#).unwrap();
        assert_eq!(config.recency_window, 5);
        assert_eq!(config.max_words_per_group, 8);
    }

    #[test]
    fn test_from_json_rejects_contradictory_config() {
        let result = SelectionConfig::from_json(r#"{"min_clip_duration": 30.0}"#);
        assert!(result.is_err());
    }
}
