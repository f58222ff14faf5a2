//! 候选素材池的准备：缩略图获取、批量嵌入与近似重复剔除。

use std::sync::LazyLock;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use futures::StreamExt;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::{
    config::SelectionConfig,
    embedding::{TextImageEmbedder, cosine_similarity},
    error::{LyricVisualsError, Result},
    model::media::{MediaCandidate, ThumbnailRef},
    selector::types::DroppedCandidate,
};

/// 一个完成了嵌入计算、可以参与匹配的候选素材。
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCandidate {
    /// 原始候选素材。
    pub candidate: MediaCandidate,
    /// 描述文本的嵌入向量。
    pub description_embedding: Vec<f32>,
    /// 缩略图的嵌入向量（与文本共享向量空间）。
    pub thumbnail_embedding: Option<Vec<f32>>,
}

/// 已准备完毕的候选素材池。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidatePool {
    /// 保持输入顺序的候选条目。
    pub entries: Vec<PreparedCandidate>,
    /// 准备阶段被剔除的候选及原因，会并入最终的诊断报告。
    pub dropped: Vec<DroppedCandidate>,
}

impl CandidatePool {
    /// 池中可参与匹配的候选数量。
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 池是否为空。
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 用于从 `data:` 链接中提取 Base64 负载
static DATA_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:[^;,]*;base64,(?P<payload>.*)$").expect("未能编译 DATA_URL_REGEX")
});

/// 单张缩略图下载的超时时间。
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// 解析一个缩略图引用，返回原始图片字节。
///
/// 内联字节与 `data:` 链接在本地解码，其余 URL 走网络下载。
async fn resolve_thumbnail(client: &reqwest::Client, thumbnail: &ThumbnailRef) -> Result<Vec<u8>> {
    match thumbnail {
        ThumbnailRef::Bytes(bytes) => Ok(bytes.clone()),
        ThumbnailRef::Url(url) if url.starts_with("data:") => {
            let captures = DATA_URL_REGEX.captures(url).ok_or_else(|| {
                LyricVisualsError::InvalidInput("data: 链接缺少 base64 负载".to_string())
            })?;
            Ok(BASE64_STANDARD.decode(&captures["payload"])?)
        }
        ThumbnailRef::Url(url) => {
            let response = tokio::time::timeout(
                FETCH_TIMEOUT,
                client.get(url).send(),
            )
            .await
            .map_err(|_| {
                LyricVisualsError::Internal(format!("下载 '{url}' 超过 {FETCH_TIMEOUT:?}"))
            })??;
            let bytes = response.error_for_status()?.bytes().await?;
            Ok(bytes.to_vec())
        }
    }
}

/// 下载全部缩略图，失败的候选被剔除。
///
/// 下载以固定并发上限进行，每个任务把结果写回按候选下标预分配的
/// 槽位，因此输出顺序与完成顺序无关。单个候选的失败（超时、
/// 图片损坏）只会剔除它自己，绝不会中断其余候选，也绝不会用
/// 其它图片顶替。
async fn fetch_thumbnails(
    client: &reqwest::Client,
    candidates: &[MediaCandidate],
    max_concurrent: usize,
    dropped: &mut Vec<DroppedCandidate>,
) -> Vec<Option<Vec<u8>>> {
    let mut slots: Vec<Option<Vec<u8>>> = vec![None; candidates.len()];

    let results: Vec<(usize, Result<Vec<u8>>)> =
        futures::stream::iter(candidates.iter().enumerate().map(|(index, candidate)| {
            let client = client.clone();
            async move {
                let result = resolve_thumbnail(&client, &candidate.thumbnail_ref).await;
                (index, result)
            }
        }))
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    for (index, result) in results {
        match result {
            Ok(bytes) if !bytes.is_empty() => slots[index] = Some(bytes),
            Ok(_) => {
                warn!("候选 '{}' 的缩略图为空，已剔除", candidates[index].url);
                dropped.push(DroppedCandidate {
                    url: candidates[index].url.clone(),
                    reason: "缩略图为空".to_string(),
                });
            }
            Err(e) => {
                warn!(
                    "候选 '{}' 的缩略图获取失败，已剔除: {e}",
                    candidates[index].url
                );
                dropped.push(DroppedCandidate {
                    url: candidates[index].url.clone(),
                    reason: format!("缩略图获取失败: {e}"),
                });
            }
        }
    }

    slots
}

/// 准备候选素材池。
///
/// 1. 以 `max_concurrent_downloads` 为上限并发获取全部缩略图；
/// 2. 对幸存候选的描述与缩略图各执行一次批量嵌入调用
///    （批量而非逐条，既摊薄推理开销也保证向量确定性）；
/// 3. 缩略图向量余弦相似度超过 `dedup_similarity_threshold` 的
///    近似重复素材按先到先留的原则剔除靠后者。
///
/// # 返回
/// 候选池（可能为空，这不是错误）。被剔除的候选连同原因记录在
/// [`CandidatePool::dropped`] 中。
pub async fn prepare_candidates(
    client: &reqwest::Client,
    embedder: &dyn TextImageEmbedder,
    candidates: &[MediaCandidate],
    config: &SelectionConfig,
) -> Result<CandidatePool> {
    if candidates.is_empty() {
        warn!("候选素材列表为空");
        return Ok(CandidatePool::default());
    }

    let mut dropped: Vec<DroppedCandidate> = Vec::new();
    let slots = fetch_thumbnails(
        client,
        candidates,
        config.max_concurrent_downloads,
        &mut dropped,
    )
    .await;

    let survivors: Vec<(usize, Vec<u8>)> = slots
        .into_iter()
        .enumerate()
        .filter_map(|(index, slot)| slot.map(|bytes| (index, bytes)))
        .collect();

    if survivors.is_empty() {
        warn!("没有任何候选的缩略图可用，候选池为空");
        return Ok(CandidatePool {
            entries: Vec::new(),
            dropped,
        });
    }

    let descriptions: Vec<String> = survivors
        .iter()
        .map(|(index, _)| candidates[*index].description.clone())
        .collect();
    let images: Vec<Vec<u8>> = survivors.iter().map(|(_, bytes)| bytes.clone()).collect();

    let description_embeddings = embedder.embed_texts(&descriptions).await?;
    let thumbnail_embeddings = embedder.embed_images(&images).await?;
    if description_embeddings.len() != survivors.len()
        || thumbnail_embeddings.len() != survivors.len()
    {
        return Err(LyricVisualsError::Embedding(
            "嵌入结果数量与候选数量不一致".to_string(),
        ));
    }

    let dedup_enabled = config.dedup_similarity_threshold <= 1.0;
    let mut entries: Vec<PreparedCandidate> = Vec::with_capacity(survivors.len());
    for (slot, (index, _)) in survivors.iter().enumerate() {
        let candidate = &candidates[*index];
        let thumbnail_embedding = &thumbnail_embeddings[slot];

        let duplicate_of = if dedup_enabled {
            entries.iter().find(|kept| {
                kept.thumbnail_embedding.as_ref().is_some_and(|kept_vec| {
                    cosine_similarity(kept_vec, thumbnail_embedding)
                        > config.dedup_similarity_threshold
                })
            })
        } else {
            None
        };

        if let Some(kept) = duplicate_of {
            debug!(
                "候选 '{}' 与 '{}' 画面近似重复，已剔除",
                candidate.url, kept.candidate.url
            );
            dropped.push(DroppedCandidate {
                url: candidate.url.clone(),
                reason: format!("与 '{}' 画面近似重复", kept.candidate.url),
            });
            continue;
        }

        entries.push(PreparedCandidate {
            candidate: candidate.clone(),
            description_embedding: description_embeddings[slot].clone(),
            thumbnail_embedding: Some(thumbnail_embedding.clone()),
        });
    }

    info!(
        "候选池准备完成: {} 个可用, {} 个被剔除",
        entries.len(),
        dropped.len()
    );
    Ok(CandidatePool { entries, dropped })
}
