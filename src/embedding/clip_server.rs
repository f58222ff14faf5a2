//! 通过 HTTP 访问 CLIP 推理服务的嵌入实现。

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    embedding::TextImageEmbedder,
    error::{LyricVisualsError, Result},
};

/// 文本嵌入请求体。
#[derive(Serialize)]
struct TextEmbedRequest<'a> {
    texts: &'a [String],
}

/// 图片嵌入请求体，图片以 Base64 编码传输。
#[derive(Serialize)]
struct ImageEmbedRequest {
    images_base64: Vec<String>,
}

/// 推理服务的统一响应体。
#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// 访问 CLIP 推理边车服务的嵌入客户端。
///
/// 服务在进程启动时加载一次模型，之后对相同输入总是返回相同向量。
/// 本客户端只是无状态的转发层，可以被多处共享。
pub struct ClipServerEmbedder {
    client: reqwest::Client,
    base_url: String,
}

impl ClipServerEmbedder {
    /// 创建一个指向给定服务地址的客户端。
    ///
    /// # 参数
    /// * `base_url` - 推理服务的根地址，例如 `http://127.0.0.1:9123`。
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// 使用外部构造好的 `reqwest::Client` 创建客户端。
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    async fn post_embed<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}{path}", self.base_url);
        debug!("正在请求嵌入服务: {url} (批大小 {expected})");

        let response: EmbedResponse = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.embeddings.len() != expected {
            return Err(LyricVisualsError::Embedding(format!(
                "嵌入服务返回的向量数量不正确: 期望 {expected}, 实际 {}",
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }
}

#[async_trait]
impl TextImageEmbedder for ClipServerEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.post_embed("/embed/text", &TextEmbedRequest { texts }, texts.len())
            .await
    }

    async fn embed_images(&self, images: &[Vec<u8>]) -> Result<Vec<Vec<f32>>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }
        let body = ImageEmbedRequest {
            images_base64: images
                .iter()
                .map(|bytes| BASE64_STANDARD.encode(bytes))
                .collect(),
        };
        self.post_embed("/embed/image", &body, images.len()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_stripped() {
        let embedder = ClipServerEmbedder::new("http://localhost:9123//");
        assert_eq!(embedder.base_url, "http://localhost:9123");
    }
}
