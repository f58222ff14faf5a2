//! 文本/图像联合嵌入的抽象接口与通用工具。
//!
//! 嵌入模型是进程级资源：在启动时构造一次，之后以只读引用的方式
//! 注入各个纯函数。库自身不持有任何模块级全局状态，
//! 测试可以通过 [`TextImageEmbedder`] 注入确定性的假实现。

pub mod clip_server;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;

/// 文本/图像联合嵌入模型的统一接口。
///
/// 两个方法都是批量接口：调用方应当把一整批输入一次性递交，
/// 而不是逐条调用，这样既摊薄推理开销，也保证相同输入
/// 总是得到相同的向量。
#[async_trait]
pub trait TextImageEmbedder: Send + Sync {
    /// 为一批文本计算嵌入向量。
    ///
    /// # 返回
    /// 与输入等长、顺序一致的向量列表。
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// 为一批图片字节计算嵌入向量，向量空间与文本共享。
    async fn embed_images(&self, images: &[Vec<u8>]) -> Result<Vec<Vec<f32>>>;
}

/// 计算两个向量的余弦相似度。
///
/// 长度不一致或任一向量为零向量时返回 `0.0`。
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// 给任意嵌入实现加一层文本向量缓存。
///
/// 同一个进程内重复出现的主题文本（例如整首歌反复咏唱的副歌）
/// 只会真正请求模型一次。图片输入体积大且极少重复，不做缓存。
pub struct EmbeddingCache<E> {
    inner: E,
    texts: DashMap<String, Vec<f32>>,
}

impl<E> EmbeddingCache<E> {
    /// 包装一个嵌入实现。
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            texts: DashMap::new(),
        }
    }
}

#[async_trait]
impl<E: TextImageEmbedder> TextImageEmbedder for EmbeddingCache<E> {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = texts
            .iter()
            .map(|text| self.texts.get(text).map(|entry| entry.value().clone()))
            .collect();

        let misses: Vec<(usize, String)> = results
            .iter()
            .enumerate()
            .filter(|(_, cached)| cached.is_none())
            .map(|(index, _)| (index, texts[index].clone()))
            .collect();

        if !misses.is_empty() {
            let miss_texts: Vec<String> = misses.iter().map(|(_, t)| t.clone()).collect();
            let embedded = self.inner.embed_texts(&miss_texts).await?;
            for ((index, text), vector) in misses.into_iter().zip(embedded) {
                self.texts.insert(text, vector.clone());
                results[index] = Some(vector);
            }
        }

        Ok(results.into_iter().map(|v| v.expect("缓存填充不完整")).collect())
    }

    async fn embed_images(&self, images: &[Vec<u8>]) -> Result<Vec<Vec<f32>>> {
        self.inner.embed_images(images).await
    }
}
