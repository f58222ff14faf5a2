#![warn(missing_docs)]

//! # Lyric Visuals RS
//!
//! 一个为歌词同步视频挑选并编排视觉素材的 Rust 库。
//!
//! 给定带时间戳的歌词转写、带描述的候选素材池以及一个文本/图像
//! 联合嵌入模型，本库会：
//!
//! - **词组切分**: 把逐词转写按停顿、标点与长度切分为语义连贯的词组。
//! - **素材匹配**: 用嵌入相关度为每个词组挑选素材，并以 MMR 式的
//!   多样性惩罚避免画面重复（主题延续时允许沿用同一素材）。
//! - **片段合并**: 把零碎的逐词组分配合并为节奏合适的播放片段，
//!   同时完整保留每个词组的单词时间戳，字幕渲染不受镜头切点影响。
//!
//! ## 构建方案
//!
//! ```rust,no_run
//! use lyric_visuals_rs::{SelectionConfig, VisualSyncEngine};
//! use lyric_visuals_rs::embedding::clip_server::ClipServerEmbedder;
//! use lyric_visuals_rs::model::{media, transcript};
//!
//! async {
//!     let embedder = ClipServerEmbedder::new("http://127.0.0.1:9123");
//!     let engine =
//!         VisualSyncEngine::new(Box::new(embedder), SelectionConfig::default()).unwrap();
//!
//!     let words = transcript::load_words(r#"[{"text":"hello","start":0.0,"end":0.5}]"#).unwrap();
//!     let candidates = media::load_candidates("[]").unwrap();
//!
//!     let groups = engine.group_words(&words);
//!     let pool = engine.prepare_candidates(&candidates).await.unwrap();
//!     let outcome = engine.build_plan(&groups, &pool).await.unwrap();
//!     println!("共 {} 个镜头", outcome.plan.shots.len());
//! };
//! ```
//!
//! 嵌入模型通过 [`embedding::TextImageEmbedder`] 注入，测试中可以
//! 替换为确定性的假实现；相同输入与配置下，方案的序列化结果
//! 逐字节一致。

pub mod config;
pub mod embedding;
pub mod error;
pub mod model;
pub mod pool;
pub mod selector;

use tracing::{info, warn};

pub use crate::{
    config::SelectionConfig,
    error::{LyricVisualsError, Result},
    selector::planner::PlanOutcome,
};

use crate::{
    embedding::TextImageEmbedder,
    model::{media::MediaCandidate, transcript::Word},
    pool::CandidatePool,
    selector::types::PhraseGroup,
};

// ==========================================================
//  顶层 API
// ==========================================================

/// 顶层选配引擎，是与本库交互的主要入口点。
///
/// 引擎持有进程级的嵌入模型句柄与一份校验过的配置；两者都在
/// 构造时显式传入，库内没有任何模块级全局状态。
pub struct VisualSyncEngine {
    embedder: Box<dyn TextImageEmbedder>,
    config: SelectionConfig,
    client: reqwest::Client,
}

impl VisualSyncEngine {
    /// 创建一个新的选配引擎。
    ///
    /// # 参数
    /// * `embedder` - 文本/图像联合嵌入实现。
    /// * `config` - 选配配置。
    ///
    /// # 返回
    /// 配置自相矛盾时返回 `LyricVisualsError::Config`，
    /// 这发生在任何处理开始之前。
    pub fn new(embedder: Box<dyn TextImageEmbedder>, config: SelectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            embedder,
            config,
            client: reqwest::Client::new(),
        })
    }

    /// 当前生效的配置。
    #[must_use]
    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// 把单词序列切分为词组。
    ///
    /// 输入不满足时间约定（倒置、重叠）时记录警告并返回空列表，
    /// 与空输入一样不视为错误：残缺的歌词应当产出空方案，
    /// 而不是让整条流水线失败。
    #[must_use]
    pub fn group_words(&self, words: &[Word]) -> Vec<PhraseGroup> {
        if words.is_empty() {
            return Vec::new();
        }
        if let Err(e) = model::transcript::validate_words(words) {
            warn!("单词序列不符合约定，返回空词组列表: {e}");
            return Vec::new();
        }
        selector::group_words(
            words,
            self.config.gap_threshold,
            self.config.max_words_per_group,
        )
    }

    /// 准备候选素材池：并发获取缩略图并批量计算嵌入。
    pub async fn prepare_candidates(
        &self,
        candidates: &[MediaCandidate],
    ) -> Result<CandidatePool> {
        pool::prepare_candidates(&self.client, self.embedder.as_ref(), candidates, &self.config)
            .await
    }

    /// 为词组序列构建最终的同步视觉方案。
    ///
    /// 唯一的异步环节是对全部查询文本的一次批量嵌入调用，
    /// 其后的匹配、合并与装配都是纯同步计算。
    ///
    /// 没有补全主题与关键词的词组会在此处套用启发式兜底
    /// （以词组原文作为主题、从原文提取关键词）。
    pub async fn build_plan(
        &self,
        groups: &[PhraseGroup],
        pool: &CandidatePool,
    ) -> Result<PlanOutcome> {
        if groups.is_empty() {
            warn!("词组列表为空，返回空方案");
            return Ok(PlanOutcome {
                plan: model::plan::SynchronizedPlan::default(),
                report: selector::types::SelectionReport {
                    dropped_candidates: pool.dropped.clone(),
                    ..Default::default()
                },
            });
        }

        let groups: Vec<PhraseGroup> = groups
            .iter()
            .map(|group| {
                if group.topic.is_empty() && group.key_terms.is_empty() {
                    let text = group.text();
                    group.enriched(text.clone(), selector::extract_key_terms(&text))
                } else {
                    group.clone()
                }
            })
            .collect();

        let query_texts: Vec<String> = groups.iter().map(PhraseGroup::query_text).collect();
        let query_embeddings = self.embedder.embed_texts(&query_texts).await?;

        info!(
            "开始为 {} 个词组在 {} 个候选中选配素材...",
            groups.len(),
            pool.len()
        );
        let outcome = selector::build_plan(&groups, pool, &query_embeddings, &self.config)?;
        Ok(outcome)
    }
}
