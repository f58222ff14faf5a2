//! 定义了候选视觉素材的数据结构。

use serde::{Deserialize, Serialize};
use strum_macros::EnumString;
use tracing::warn;

use crate::error::Result;

/// 候选素材的媒体类型。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Serialize, Deserialize, Default,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// 静态图片。
    Image,
    /// 视频片段。
    #[default]
    Video,
}

/// 候选素材缩略图的来源。
///
/// 检索层有时直接内联缩略图字节，有时只给出一个可下载的链接，
/// 两种形态在 `candidates.json` 中都会出现。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThumbnailRef {
    /// 指向缩略图的 URL（支持 `data:` 形式的内联链接）。
    Url(String),
    /// 内联的原始图片字节。
    Bytes(Vec<u8>),
}

/// 代表一个可取用的候选视觉素材。
///
/// 由上游的素材检索层产出，加载后只读。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaCandidate {
    /// 素材的唯一标识，通常是其来源 URL。
    pub url: String,
    /// 素材内容的文字描述，作为文本嵌入的输入。
    pub description: String,
    /// 媒体类型。
    pub media_type: MediaType,
    /// 缩略图来源。
    pub thumbnail_ref: ThumbnailRef,
    /// 已下载到本地的文件路径（如果检索层已经下载过）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
}

/// 从 `candidates.json` 内容中加载候选素材列表。
///
/// 与 [`crate::model::transcript::load_words`] 相同的宽容策略：
/// 单条记录解析失败或关键字段为空时只丢弃该条并记录警告。
pub fn load_candidates(content: &str) -> Result<Vec<MediaCandidate>> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(content)?;
    let mut candidates: Vec<MediaCandidate> = Vec::with_capacity(raw.len());

    for (index, value) in raw.into_iter().enumerate() {
        let candidate: MediaCandidate = match serde_json::from_value(value) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!("已丢弃第 {index} 条无法解析的候选素材记录: {e}");
                continue;
            }
        };
        if candidate.url.trim().is_empty() || candidate.description.trim().is_empty() {
            warn!("已丢弃第 {index} 条缺少 url 或描述的候选素材");
            continue;
        }
        candidates.push(candidate);
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_media_type_from_str_case_insensitive() {
        assert_eq!(MediaType::from_str("IMAGE").unwrap(), MediaType::Image);
        assert_eq!(MediaType::from_str("video").unwrap(), MediaType::Video);
    }

    #[test]
    fn test_load_candidates_mixed_thumbnail_forms() {
        let content = r#"[
            {
                "url": "https://example.com/a.mp4",
                "description": "ocean waves at dusk",
                "media_type": "video",
                "thumbnail_ref": "https://example.com/a.jpg"
            },
            {
                "url": "https://example.com/b.jpg",
                "description": "green leaves",
                "media_type": "image",
                "thumbnail_ref": [137, 80, 78, 71]
            }
        ]"#;
        let candidates = load_candidates(content).unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(matches!(candidates[0].thumbnail_ref, ThumbnailRef::Url(_)));
        assert!(matches!(
            candidates[1].thumbnail_ref,
            ThumbnailRef::Bytes(_)
        ));
    }

    #[test]
    fn test_load_candidates_drops_empty_description() {
        let content = r#"[
            {
                "url": "https://example.com/a.mp4",
                "description": "  ",
                "media_type": "video",
                "thumbnail_ref": "https://example.com/a.jpg"
            }
        ]"#;
        assert!(load_candidates(content).unwrap().is_empty());
    }
}
