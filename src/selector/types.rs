//! 定义了选配流水线内部流转的核心数据类型。

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{media::MediaCandidate, transcript::Word};

//=============================================================================
// 1. 错误枚举
//=============================================================================

/// 纯计算核心内部的错误。
///
/// 这些错误都源自调用方传参不一致，属于编程错误而非数据问题，
/// 在门面层会被转换为 [`crate::error::LyricVisualsError::Internal`]。
#[derive(Error, Debug)]
pub enum SelectError {
    /// 查询向量数量与词组数量不一致。
    #[error("查询向量数量与词组数量不一致: 期望 {expected}, 实际 {actual}")]
    EmbeddingCountMismatch {
        /// 期望的向量数量（等于词组数量）。
        expected: usize,
        /// 实际收到的向量数量。
        actual: usize,
    },
    /// 其它内部逻辑错误。
    #[error("内部错误: {0}")]
    Internal(String),
}

//=============================================================================
// 2. 词组与分配
//=============================================================================

/// 代表一段语义连贯的歌词词组，是视觉匹配的基本单位。
///
/// 由 [`crate::selector::grouper`] 从连续的单词序列切分而来。
/// 切分器只负责时间与原文；`topic` 与 `key_terms` 由调用方
/// （LLM 或启发式收集器）在匹配之前补全。创建后不再原地修改，
/// 需要补全时通过 [`PhraseGroup::enriched`] 复制出新值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseGroup {
    /// 词组编号，从 1 开始按时间顺序递增。
    pub id: u32,
    /// 词组的主题概括。切分器产出时为空字符串。
    pub topic: String,
    /// 词组的关键词集合。使用有序集合以保证序列化结果稳定。
    #[serde(default)]
    pub key_terms: BTreeSet<String>,
    /// 词组覆盖的原文片段。
    pub phrases: Vec<String>,
    /// 词组包含的原始单词及其时间戳。
    ///
    /// 字幕渲染依赖这份原始时间信息，镜头合并永远不会触碰它。
    pub words: Vec<Word>,
    /// 词组开始时间（秒）。
    pub start_time: f64,
    /// 词组结束时间（秒）。
    pub end_time: f64,
}

impl PhraseGroup {
    /// 词组时长（秒）。
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// 词组的完整原文，由成员单词按顺序拼接而成。
    #[must_use]
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 复制出一个补全了主题与关键词的新词组。
    #[must_use]
    pub fn enriched(&self, topic: impl Into<String>, key_terms: BTreeSet<String>) -> Self {
        Self {
            topic: topic.into(),
            key_terms,
            ..self.clone()
        }
    }

    /// 构造嵌入查询文本：`topic + " " + 关键词列表`。
    #[must_use]
    pub fn query_text(&self) -> String {
        let terms = self
            .key_terms
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        if terms.is_empty() {
            self.topic.clone()
        } else {
            format!("{} {}", self.topic, terms)
        }
    }
}

/// 代表一次词组到候选素材的匹配结果。
///
/// 候选池为空或最佳得分低于下限时 `candidate` 为 `None`，
/// 该词组由下游直接跳过，不会让整条流水线失败。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedAssignment {
    /// 被匹配的词组。
    pub phrase_group: PhraseGroup,
    /// 选中的候选素材。
    pub candidate: Option<MediaCandidate>,
    /// 关键词加成后的相关度得分。
    pub relevance_score: f32,
    /// 实际扣除的多样性惩罚量（未触发惩罚时为 0）。
    pub diversity_penalty: f32,
    /// 最终得分 = `relevance_score - diversity_penalty`。
    pub final_score: f32,
}

//=============================================================================
// 3. 合并片段
//=============================================================================

/// 代表若干连续词组合并后的一个播放片段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedClip {
    /// 片段编号，从 1 开始按时间顺序递增。
    pub id: u32,
    /// 按时间顺序排列的成员词组。永不为空。
    pub member_groups: Vec<PhraseGroup>,
    /// 片段使用的素材，始终沿用第一个成员词组匹配到的候选。
    pub candidate: MediaCandidate,
    /// 片段开始时间，等于第一个成员词组的开始时间。
    pub start_time: f64,
    /// 片段结束时间，等于最后一个成员词组的结束时间。
    pub end_time: f64,
    /// 片段时长（秒）。
    pub duration: f64,
    /// 按顺序收集的成员词组主题。
    pub topics: Vec<String>,
    /// 所有成员词组关键词的并集，用于后续的相似度判断。
    pub key_terms: BTreeSet<String>,
}

//=============================================================================
// 4. 诊断报告
//=============================================================================

/// 一个无法填充的词组及其原因。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnfillableGroup {
    /// 词组编号。
    pub group_id: u32,
    /// 词组主题，便于人工排查。
    pub topic: String,
    /// 无法填充的原因。
    pub reason: String,
}

/// 一个在准备阶段被剔除的候选素材及其原因。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedCandidate {
    /// 候选素材的 URL。
    pub url: String,
    /// 被剔除的原因。
    pub reason: String,
}

/// 一次选配运行的诊断报告。
///
/// 与最终方案一同返回：调用方拿到的要么是"可能偏短但有效的方案 +
/// 这份报告"，要么是在任何处理开始前抛出的配置错误，
/// 绝不会是悄悄损坏的半成品。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    /// 没有匹配到素材、被排除在最终方案之外的词组。
    pub unfillable_groups: Vec<UnfillableGroup>,
    /// 在准备阶段被剔除的候选素材。
    pub dropped_candidates: Vec<DroppedCandidate>,
}

impl SelectionReport {
    /// 报告是否为空（没有任何需要关注的事项）。
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unfillable_groups.is_empty() && self.dropped_candidates.is_empty()
    }
}
