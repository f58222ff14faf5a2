//! 把匹配与合并的结果装配为最终的同步视觉方案。

use tracing::{info, warn};

use crate::{
    config::SelectionConfig,
    model::plan::{Shot, SynchronizedPlan, Transition},
    pool::CandidatePool,
    selector::{
        consolidator::consolidate,
        matcher::match_groups,
        types::{
            ConsolidatedClip, MatchedAssignment, PhraseGroup, SelectError, SelectionReport,
            UnfillableGroup,
        },
    },
};

/// 一次选配运行的完整产出：方案本体加诊断报告。
///
/// 方案是普通的自有数据，人工审核方（curator）如需覆盖某个镜头的
/// 素材，直接复制修改方案即可，匹配算法不参与覆盖流程。
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    /// 最终方案。
    pub plan: SynchronizedPlan,
    /// 诊断报告。
    pub report: SelectionReport,
}

/// 执行匹配 → 合并 → 装配，产出最终方案。
///
/// 词组切分通常已由上游完成，本阶段专注于匹配与合并。
/// 配置关闭合并时，每个有素材的分配直接包装成单词组片段，
/// 复用同一套镜头构造逻辑，而不是另写一条生成路径。
///
/// # 参数
/// * `groups` - 按时间排列、已补全主题与关键词的词组。
/// * `pool` - 已完成嵌入的候选池。
/// * `query_embeddings` - 与 `groups` 等长的查询向量。
/// * `config` - 选配配置（调用方需已通过校验）。
pub fn build_plan(
    groups: &[PhraseGroup],
    pool: &CandidatePool,
    query_embeddings: &[Vec<f32>],
    config: &SelectionConfig,
) -> Result<PlanOutcome, SelectError> {
    let assignments = match_groups(groups, pool, query_embeddings, config)?;

    let mut report = SelectionReport {
        dropped_candidates: pool.dropped.clone(),
        ..Default::default()
    };
    for assignment in &assignments {
        if assignment.candidate.is_none() {
            report.unfillable_groups.push(UnfillableGroup {
                group_id: assignment.phrase_group.id,
                topic: assignment.phrase_group.topic.clone(),
                reason: if pool.is_empty() {
                    "候选池为空".to_string()
                } else {
                    format!("最佳得分 {:.4} 低于相关度下限", assignment.final_score)
                },
            });
        }
    }

    let clips = if config.consolidation_enabled {
        consolidate(&assignments, config)
    } else {
        single_member_clips(&assignments)
    };

    let shots = shots_from_clips(clips);
    let total_duration = shots.last().map_or(0.0, |shot| shot.end_time);

    if shots.is_empty() {
        warn!("没有产出任何镜头，返回空方案");
    } else {
        info!(
            "方案装配完成: {} 个镜头, 总时长 {total_duration:.2} 秒",
            shots.len()
        );
    }

    Ok(PlanOutcome {
        plan: SynchronizedPlan {
            shots,
            total_duration,
        },
        report,
    })
}

/// 合并被关闭时的退化路径：每个分配包装为单成员片段。
fn single_member_clips(assignments: &[MatchedAssignment]) -> Vec<ConsolidatedClip> {
    let mut clips: Vec<ConsolidatedClip> = Vec::new();
    for assignment in assignments {
        let Some(candidate) = assignment.candidate.clone() else {
            continue;
        };
        let group = &assignment.phrase_group;
        clips.push(ConsolidatedClip {
            id: clips.len() as u32 + 1,
            start_time: group.start_time,
            end_time: group.end_time,
            duration: group.duration(),
            candidate,
            topics: vec![group.topic.clone()],
            key_terms: group.key_terms.clone(),
            member_groups: vec![group.clone()],
        });
    }
    clips
}

/// 把片段列表转换为镜头列表并标注转场。
///
/// 第一个与最后一个镜头使用淡入淡出，中间镜头一律交叉溶解。
fn shots_from_clips(clips: Vec<ConsolidatedClip>) -> Vec<Shot> {
    let last_index = clips.len().saturating_sub(1);
    clips
        .into_iter()
        .enumerate()
        .map(|(index, clip)| {
            let transition = if index == 0 || index == last_index {
                Transition::Fade
            } else {
                Transition::Crossfade
            };
            Shot {
                id: clip.id,
                local_path: clip.candidate.local_path.clone(),
                media_type: clip.candidate.media_type,
                description: clip.candidate.description.clone(),
                start_time: clip.start_time,
                end_time: clip.end_time,
                duration: clip.duration,
                topics: clip.topics,
                key_terms: clip.key_terms,
                transition,
                member_groups: clip.member_groups,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::media::{MediaCandidate, MediaType, ThumbnailRef},
        model::transcript::Word,
        pool::PreparedCandidate,
    };
    use std::collections::BTreeSet;

    fn prepared(url: &str, description: &str, embedding: Vec<f32>) -> PreparedCandidate {
        PreparedCandidate {
            candidate: MediaCandidate {
                url: url.to_string(),
                description: description.to_string(),
                media_type: MediaType::Video,
                thumbnail_ref: ThumbnailRef::Url(format!("{url}.jpg")),
                local_path: Some(format!("/tmp/{url}.mp4")),
            },
            description_embedding: embedding,
            thumbnail_embedding: None,
        }
    }

    fn group(id: u32, start: f64, end: f64, topic: &str, terms: &[&str]) -> PhraseGroup {
        PhraseGroup {
            id,
            topic: topic.to_string(),
            key_terms: terms.iter().map(|t| t.to_string()).collect(),
            phrases: vec![topic.to_string()],
            words: vec![Word {
                text: topic.to_string(),
                start,
                end,
            }],
            start_time: start,
            end_time: end,
        }
    }

    fn pool(entries: Vec<PreparedCandidate>) -> CandidatePool {
        CandidatePool {
            entries,
            dropped: vec![],
        }
    }

    #[test]
    fn test_empty_groups_yield_empty_plan() {
        let outcome = build_plan(
            &[],
            &pool(vec![prepared("a", "anything", vec![1.0])]),
            &[],
            &SelectionConfig::default(),
        )
        .unwrap();
        assert!(outcome.plan.shots.is_empty());
        assert_eq!(outcome.plan.total_duration, 0.0);
        assert!(outcome.report.is_empty());
    }

    #[test]
    fn test_transitions_fade_at_edges() {
        let pool = pool(vec![
            prepared("a", "ocean", vec![1.0, 0.0]),
            prepared("b", "desert", vec![0.0, 1.0]),
        ]);
        let groups = vec![
            group(1, 0.0, 5.0, "ocean", &["ocean"]),
            group(2, 5.0, 10.0, "desert", &["desert"]),
            group(3, 10.0, 15.0, "ocean", &["ocean"]),
        ];
        let queries = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]];
        let outcome =
            build_plan(&groups, &pool, &queries, &SelectionConfig::default()).unwrap();

        let shots = &outcome.plan.shots;
        assert_eq!(shots.len(), 3);
        assert_eq!(shots[0].transition, Transition::Fade);
        assert_eq!(shots[1].transition, Transition::Crossfade);
        assert_eq!(shots[2].transition, Transition::Fade);
        assert_eq!(outcome.plan.total_duration, 15.0);
    }

    #[test]
    fn test_single_shot_uses_fade() {
        let pool = pool(vec![prepared("a", "ocean", vec![1.0])]);
        let groups = vec![group(1, 0.0, 5.0, "ocean", &[])];
        let outcome = build_plan(
            &groups,
            &pool,
            &[vec![1.0]],
            &SelectionConfig::default(),
        )
        .unwrap();
        assert_eq!(outcome.plan.shots.len(), 1);
        assert_eq!(outcome.plan.shots[0].transition, Transition::Fade);
    }

    #[test]
    fn test_disabled_consolidation_emits_one_shot_per_group() {
        let pool = pool(vec![prepared("a", "rain", vec![1.0])]);
        let groups = vec![
            group(1, 0.0, 1.0, "rain", &["rain"]),
            group(2, 1.0, 2.0, "rain", &["rain"]),
            group(3, 2.0, 3.0, "rain", &["rain"]),
        ];
        let queries = vec![vec![1.0]; 3];
        let config = SelectionConfig {
            consolidation_enabled: false,
            ..Default::default()
        };
        let outcome = build_plan(&groups, &pool, &queries, &config).unwrap();

        assert_eq!(outcome.plan.shots.len(), 3);
        for (shot, group) in outcome.plan.shots.iter().zip(&groups) {
            assert_eq!(shot.member_groups.len(), 1);
            assert_eq!(shot.start_time, group.start_time);
            assert_eq!(shot.end_time, group.end_time);
        }
    }

    #[test]
    fn test_empty_pool_reports_unfillable_groups() {
        let groups = vec![group(1, 0.0, 5.0, "ocean", &[])];
        let outcome = build_plan(
            &groups,
            &pool(vec![]),
            &[vec![1.0]],
            &SelectionConfig::default(),
        )
        .unwrap();
        assert!(outcome.plan.shots.is_empty());
        assert_eq!(outcome.report.unfillable_groups.len(), 1);
        assert_eq!(outcome.report.unfillable_groups[0].group_id, 1);
    }

    #[test]
    fn test_shot_carries_candidate_metadata() {
        let pool = pool(vec![prepared("a", "ocean waves", vec![1.0])]);
        let groups = vec![group(1, 0.0, 5.0, "ocean", &["ocean"])];
        let outcome = build_plan(
            &groups,
            &pool,
            &[vec![1.0]],
            &SelectionConfig::default(),
        )
        .unwrap();

        let shot = &outcome.plan.shots[0];
        assert_eq!(shot.local_path.as_deref(), Some("/tmp/a.mp4"));
        assert_eq!(shot.description, "ocean waves");
        assert_eq!(shot.media_type, MediaType::Video);
        let expected_terms: BTreeSet<String> = ["ocean".to_string()].into_iter().collect();
        assert_eq!(shot.key_terms, expected_terms);
    }
}
