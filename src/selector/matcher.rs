//! 基于嵌入相关度与多样性惩罚的素材匹配器。
//!
//! 纯粹按相关度取最优会让相近主题的词组反复选中同一段素材，
//! 画面单调。这里采用 MMR 式的折中：近期用过的候选被扣除一个
//! 多样性惩罚，但当相邻词组主题完全一致时允许沿用同一素材，
//! 避免在一个概念中途生硬切换画面。

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::{
    config::SelectionConfig,
    embedding::cosine_similarity,
    pool::CandidatePool,
    selector::types::{MatchedAssignment, PhraseGroup, SelectError},
};

/// 统计候选描述中命中了多少个关键词。
///
/// 单词级关键词按小写后的 Unicode 词集合做精确匹配；
/// 含空白的多词关键词按小写子串匹配。
fn keyword_match_count(description: &str, key_terms: &BTreeSet<String>) -> u32 {
    let description_lower = description.to_lowercase();
    let description_words: HashSet<&str> = description_lower.unicode_words().collect();

    key_terms
        .iter()
        .filter(|term| {
            let term_lower = term.to_lowercase();
            if term_lower.contains(char::is_whitespace) {
                description_lower.contains(&term_lower)
            } else {
                description_words.contains(term_lower.as_str())
            }
        })
        .count() as u32
}

/// 为每个词组从候选池中挑选最合适的素材。
///
/// 对每个词组依次执行：
/// 1. 相关度 = 候选描述向量与词组查询向量的余弦相似度；
/// 2. 描述中每精确命中一个关键词，相关度乘以 `keyword_boost`
///    （逐次叠乘）；
/// 3. 最近 `recency_window` 次分配中用过的候选扣除
///    `diversity_penalty`，但词组主题与上一个词组完全相同时
///    不扣（主题延续优先于多样性）；
/// 4. 取最终得分最高者；得分相同则取池中下标最小的候选，
///    保证结果可复现。
///
/// 输出顺序与输入词组顺序一致。候选池为空时每个分配的
/// `candidate` 都是 `None`，由调用方记入诊断报告，不视为错误。
///
/// # 参数
/// * `groups` - 按时间排列的词组列表。
/// * `pool` - 已完成嵌入的候选池。
/// * `query_embeddings` - 与 `groups` 等长的查询向量列表。
/// * `config` - 选配配置。
pub fn match_groups(
    groups: &[PhraseGroup],
    pool: &CandidatePool,
    query_embeddings: &[Vec<f32>],
    config: &SelectionConfig,
) -> Result<Vec<MatchedAssignment>, SelectError> {
    if groups.len() != query_embeddings.len() {
        return Err(SelectError::EmbeddingCountMismatch {
            expected: groups.len(),
            actual: query_embeddings.len(),
        });
    }

    if pool.is_empty() && !groups.is_empty() {
        warn!("候选池为空，{} 个词组全部无法填充", groups.len());
    }

    let mut assignments: Vec<MatchedAssignment> = Vec::with_capacity(groups.len());
    let mut history: Vec<usize> = Vec::new();

    for (group_index, group) in groups.iter().enumerate() {
        let query = &query_embeddings[group_index];

        let topic_continuation = group_index > 0
            && !group.topic.is_empty()
            && group.topic == groups[group_index - 1].topic;

        let recent_start = history.len().saturating_sub(config.recency_window);
        let recent = &history[recent_start..];

        let mut best: Option<(usize, f32, f32, f32)> = None;
        for (candidate_index, entry) in pool.entries.iter().enumerate() {
            let relevance = cosine_similarity(&entry.description_embedding, query);

            let matches = keyword_match_count(&entry.candidate.description, &group.key_terms);
            let boosted = relevance * config.keyword_boost.powi(matches as i32);

            let penalty = if !topic_continuation && recent.contains(&candidate_index) {
                config.diversity_penalty
            } else {
                0.0
            };
            let final_score = boosted - penalty;

            // 严格大于才替换，得分相同时保留下标更小的候选
            if best.is_none_or(|(_, _, _, best_score)| final_score > best_score) {
                best = Some((candidate_index, boosted, penalty, final_score));
            }
        }

        let assignment = match best {
            Some((candidate_index, boosted, penalty, final_score))
                if config.min_relevance_floor <= 0.0
                    || final_score >= config.min_relevance_floor =>
            {
                debug!(
                    "词组 #{} ('{}') -> 候选 #{candidate_index} (得分 {final_score:.4})",
                    group.id, group.topic
                );
                history.push(candidate_index);
                MatchedAssignment {
                    phrase_group: group.clone(),
                    candidate: Some(pool.entries[candidate_index].candidate.clone()),
                    relevance_score: boosted,
                    diversity_penalty: penalty,
                    final_score,
                }
            }
            Some((_, boosted, penalty, final_score)) => {
                warn!(
                    "词组 #{} ('{}') 的最佳得分 {final_score:.4} 低于下限 {}，视为无法填充",
                    group.id, group.topic, config.min_relevance_floor
                );
                MatchedAssignment {
                    phrase_group: group.clone(),
                    candidate: None,
                    relevance_score: boosted,
                    diversity_penalty: penalty,
                    final_score,
                }
            }
            None => MatchedAssignment {
                phrase_group: group.clone(),
                candidate: None,
                relevance_score: 0.0,
                diversity_penalty: 0.0,
                final_score: 0.0,
            },
        };
        assignments.push(assignment);
    }

    Ok(assignments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::media::{MediaCandidate, MediaType, ThumbnailRef},
        pool::PreparedCandidate,
    };

    fn candidate(url: &str, description: &str) -> MediaCandidate {
        MediaCandidate {
            url: url.to_string(),
            description: description.to_string(),
            media_type: MediaType::Video,
            thumbnail_ref: ThumbnailRef::Url(format!("{url}.jpg")),
            local_path: None,
        }
    }

    fn prepared(url: &str, description: &str, embedding: Vec<f32>) -> PreparedCandidate {
        PreparedCandidate {
            candidate: candidate(url, description),
            description_embedding: embedding,
            thumbnail_embedding: None,
        }
    }

    fn group(id: u32, topic: &str, terms: &[&str]) -> PhraseGroup {
        PhraseGroup {
            id,
            topic: topic.to_string(),
            key_terms: terms.iter().map(|t| t.to_string()).collect(),
            phrases: vec![topic.to_string()],
            words: vec![],
            start_time: f64::from(id - 1),
            end_time: f64::from(id),
        }
    }

    fn pool(entries: Vec<PreparedCandidate>) -> CandidatePool {
        CandidatePool {
            entries,
            dropped: vec![],
        }
    }

    #[test]
    fn test_empty_groups_yield_empty_assignments() {
        let pool = pool(vec![prepared("a", "anything", vec![1.0, 0.0])]);
        let assignments =
            match_groups(&[], &pool, &[], &SelectionConfig::default()).unwrap();
        assert!(assignments.is_empty());
    }

    #[test]
    fn test_empty_pool_yields_unfilled_assignments() {
        let groups = vec![group(1, "ocean", &["waves"])];
        let assignments = match_groups(
            &groups,
            &pool(vec![]),
            &[vec![1.0, 0.0]],
            &SelectionConfig::default(),
        )
        .unwrap();
        assert_eq!(assignments.len(), 1);
        assert!(assignments[0].candidate.is_none());
    }

    #[test]
    fn test_mismatched_embedding_count_is_rejected() {
        let groups = vec![group(1, "ocean", &[])];
        let result = match_groups(
            &groups,
            &pool(vec![]),
            &[],
            &SelectionConfig::default(),
        );
        assert!(matches!(
            result,
            Err(SelectError::EmbeddingCountMismatch { .. })
        ));
    }

    #[test]
    fn test_highest_relevance_wins() {
        let pool = pool(vec![
            prepared("a", "desert dunes", vec![0.0, 1.0]),
            prepared("b", "ocean waves", vec![1.0, 0.0]),
        ]);
        let groups = vec![group(1, "ocean", &[])];
        let assignments = match_groups(
            &groups,
            &pool,
            &[vec![1.0, 0.0]],
            &SelectionConfig::default(),
        )
        .unwrap();
        assert_eq!(assignments[0].candidate.as_ref().unwrap().url, "b");
    }

    #[test]
    fn test_keyword_boost_compounds_per_match() {
        // 两个候选向量相同，关键词命中数决定胜负
        let pool = pool(vec![
            prepared("a", "city lights at night", vec![1.0, 0.0]),
            prepared("b", "ocean waves under moonlight", vec![1.0, 0.0]),
        ]);
        let groups = vec![group(1, "sea", &["ocean", "waves"])];
        let config = SelectionConfig::default();
        let assignments =
            match_groups(&groups, &pool, &[vec![1.0, 0.0]], &config).unwrap();

        let assignment = &assignments[0];
        assert_eq!(assignment.candidate.as_ref().unwrap().url, "b");
        // 余弦 1.0 × 2.0 × 2.0
        assert!((assignment.relevance_score - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_keyword_match_is_case_insensitive_and_word_exact() {
        let terms: BTreeSet<String> =
            ["Ocean".to_string(), "wave".to_string()].into_iter().collect();
        // "waves" 不应匹配关键词 "wave"
        assert_eq!(keyword_match_count("OCEAN waves crashing", &terms), 1);
    }

    #[test]
    fn test_multiword_key_term_matches_as_substring() {
        let terms: BTreeSet<String> = ["northern lights".to_string()].into_iter().collect();
        assert_eq!(keyword_match_count("The Northern Lights dance", &terms), 1);
        assert_eq!(keyword_match_count("northern winds", &terms), 0);
    }

    #[test_log::test]
    fn test_recency_penalty_forces_variety() {
        // 候选 a 对两个词组都略优，但第二次分配时惩罚应让 b 胜出
        let pool = pool(vec![
            prepared("a", "forest canopy", vec![1.0, 0.0]),
            prepared("b", "forest floor", vec![0.999, 0.0447]),
        ]);
        let groups = vec![group(1, "forest", &[]), group(2, "trees", &[])];
        let config = SelectionConfig::default();
        let assignments = match_groups(
            &groups,
            &pool,
            &[vec![1.0, 0.0], vec![1.0, 0.0]],
            &config,
        )
        .unwrap();

        assert_eq!(assignments[0].candidate.as_ref().unwrap().url, "a");
        assert_eq!(assignments[1].candidate.as_ref().unwrap().url, "b");
        assert_eq!(assignments[1].diversity_penalty, 0.0);
    }

    #[test_log::test]
    fn test_topic_continuation_overrides_penalty() {
        let pool = pool(vec![
            prepared("a", "forest canopy", vec![1.0, 0.0]),
            prepared("b", "forest floor", vec![0.999, 0.0447]),
        ]);
        // 主题完全相同，允许沿用同一素材
        let groups = vec![group(1, "forest", &[]), group(2, "forest", &[])];
        let config = SelectionConfig::default();
        let assignments = match_groups(
            &groups,
            &pool,
            &[vec![1.0, 0.0], vec![1.0, 0.0]],
            &config,
        )
        .unwrap();

        assert_eq!(assignments[0].candidate.as_ref().unwrap().url, "a");
        assert_eq!(assignments[1].candidate.as_ref().unwrap().url, "a");
    }

    #[test]
    fn test_ties_resolve_to_lowest_index() {
        let pool = pool(vec![
            prepared("first", "same description", vec![1.0, 0.0]),
            prepared("second", "same description", vec![1.0, 0.0]),
        ]);
        let groups = vec![group(1, "anything", &[])];
        let assignments = match_groups(
            &groups,
            &pool,
            &[vec![1.0, 0.0]],
            &SelectionConfig::default(),
        )
        .unwrap();
        assert_eq!(assignments[0].candidate.as_ref().unwrap().url, "first");
    }

    #[test]
    fn test_relevance_floor_marks_group_unfillable() {
        let pool = pool(vec![prepared("a", "desert dunes", vec![0.0, 1.0])]);
        let groups = vec![group(1, "ocean", &[])];
        let config = SelectionConfig {
            min_relevance_floor: 0.5,
            ..Default::default()
        };
        let assignments =
            match_groups(&groups, &pool, &[vec![1.0, 0.0]], &config).unwrap();
        assert!(assignments[0].candidate.is_none());
    }
}
