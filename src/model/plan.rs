//! 定义了流水线的最终产物：同步视觉方案。

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    model::media::MediaType,
    selector::types::PhraseGroup,
};

/// 镜头切换时使用的转场效果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// 淡入淡出，用于整个方案的第一个和最后一个镜头。
    Fade,
    /// 交叉溶解，用于所有中间镜头。
    Crossfade,
}

/// 最终方案中的一个镜头。
///
/// 镜头保留了自己的成员词组（连同原始单词时间戳），
/// 字幕生成据此独立切分时间轴，不受镜头切点影响。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    /// 镜头编号，从 1 开始。
    pub id: u32,
    /// 素材在本地的文件路径（如果已下载）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    /// 素材的媒体类型。
    pub media_type: MediaType,
    /// 素材描述，供人工审核与日志使用。
    pub description: String,
    /// 镜头开始时间（秒）。
    pub start_time: f64,
    /// 镜头结束时间（秒）。
    pub end_time: f64,
    /// 镜头时长（秒）。
    pub duration: f64,
    /// 镜头覆盖的词组主题列表。
    pub topics: Vec<String>,
    /// 镜头覆盖的关键词并集。
    pub key_terms: BTreeSet<String>,
    /// 转场效果。
    pub transition: Transition,
    /// 镜头覆盖的词组，保留原始单词时间戳供字幕使用。
    pub member_groups: Vec<PhraseGroup>,
}

/// 代表整条歌曲的同步视觉方案，交给下游的视频装配环节消费。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynchronizedPlan {
    /// 按时间顺序排列的镜头列表。
    pub shots: Vec<Shot>,
    /// 方案总时长，等于最后一个镜头的结束时间（没有镜头时为 0）。
    pub total_duration: f64,
}

impl SynchronizedPlan {
    /// 将方案序列化为稳定的 pretty JSON。
    ///
    /// 所有集合字段都使用有序容器，因此相同输入在任何一次运行中
    /// 都会得到逐字节一致的输出。
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_plan_serializes_with_zero_duration() {
        let plan = SynchronizedPlan::default();
        let json = plan.to_pretty_json().unwrap();
        assert!(json.contains("\"total_duration\": 0.0"));
        assert!(json.contains("\"shots\": []"));
    }

    #[test]
    fn test_plan_round_trips_through_json() {
        let plan = SynchronizedPlan {
            shots: vec![],
            total_duration: 12.5,
        };
        let json = plan.to_pretty_json().unwrap();
        let parsed: SynchronizedPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, plan);
    }
}
