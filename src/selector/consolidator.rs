//! 将逐词组的素材分配合并为时长合适的播放片段。
//!
//! 词组往往只有一两秒，直接逐词组切换画面会让成片剪辑感过强。
//! 合并器在不破坏字幕时间轴的前提下（成员词组原样保留），
//! 把连续且语义相近的分配合并为更长的片段。

use std::collections::BTreeSet;

use tracing::debug;

use crate::{
    config::SelectionConfig,
    model::media::MediaCandidate,
    selector::types::{ConsolidatedClip, MatchedAssignment, PhraseGroup},
};

/// 计算两个关键词集合的 Jaccard 相似度。
///
/// 任一集合为空时返回 `0.0`。
fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f32 / union as f32
}

/// 合并过程中的累积状态。
struct ClipBuilder {
    member_groups: Vec<PhraseGroup>,
    candidate: MediaCandidate,
    key_terms: BTreeSet<String>,
}

impl ClipBuilder {
    fn start(group: &PhraseGroup, candidate: MediaCandidate) -> Self {
        Self {
            member_groups: vec![group.clone()],
            candidate,
            key_terms: group.key_terms.clone(),
        }
    }

    fn start_time(&self) -> f64 {
        self.member_groups[0].start_time
    }

    fn end_time(&self) -> f64 {
        self.member_groups[self.member_groups.len() - 1].end_time
    }

    fn duration(&self) -> f64 {
        self.end_time() - self.start_time()
    }

    fn absorb(&mut self, group: &PhraseGroup) {
        self.key_terms.extend(group.key_terms.iter().cloned());
        self.member_groups.push(group.clone());
    }

    fn finish(self, id: u32) -> ConsolidatedClip {
        let start_time = self.start_time();
        let end_time = self.end_time();
        ConsolidatedClip {
            id,
            start_time,
            end_time,
            duration: end_time - start_time,
            candidate: self.candidate,
            topics: self
                .member_groups
                .iter()
                .map(|g| g.topic.clone())
                .collect(),
            key_terms: self.key_terms,
            member_groups: self.member_groups,
        }
    }
}

/// 从左到右贪心地合并相邻分配。
///
/// 对每个后续分配计算：
/// * `projected`: 合并后片段的总时长；
/// * `similarity`: 当前片段关键词并集与下一词组关键词的
///   Jaccard 相似度。
///
/// 当且仅当 `projected <= max_clip_duration`，且满足
/// "当前片段仍短于 `min_clip_duration`（强制合并）"或
/// "当前片段短于 `target_clip_duration` 且
/// `similarity >= semantic_coherence_threshold`"之一时合并；
/// 否则封闭当前片段并开启新片段。
///
/// 合并后片段的素材始终沿用第一个成员词组匹配到的候选，
/// 不会重新匹配；关键词取所有成员的并集，供后续相似度判断。
///
/// 没有匹配到素材的分配会被直接跳过（匹配阶段已记录诊断）。
/// 空输入产出空列表。
pub fn consolidate(
    assignments: &[MatchedAssignment],
    config: &SelectionConfig,
) -> Vec<ConsolidatedClip> {
    let mut clips: Vec<ConsolidatedClip> = Vec::new();
    let mut current: Option<ClipBuilder> = None;

    for assignment in assignments {
        let group = &assignment.phrase_group;
        let Some(candidate) = assignment.candidate.as_ref() else {
            debug!("词组 #{} 没有匹配到素材，跳过合并", group.id);
            continue;
        };

        let Some(mut builder) = current.take() else {
            current = Some(ClipBuilder::start(group, candidate.clone()));
            continue;
        };

        let projected = group.end_time - builder.start_time();
        let similarity = jaccard(&builder.key_terms, &group.key_terms);
        let current_duration = builder.duration();

        let forced_merge = current_duration < config.min_clip_duration;
        let coherent_merge = current_duration < config.target_clip_duration
            && similarity >= config.semantic_coherence_threshold;

        if projected <= config.max_clip_duration && (forced_merge || coherent_merge) {
            builder.absorb(group);
            current = Some(builder);
        } else {
            clips.push(builder.finish(clips.len() as u32 + 1));
            current = Some(ClipBuilder::start(group, candidate.clone()));
        }
    }

    if let Some(builder) = current {
        clips.push(builder.finish(clips.len() as u32 + 1));
    }

    clips
}
