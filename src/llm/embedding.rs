//! 嵌入：索引与向量检索使用
//!
//! - OpenAiEmbedder：调用 OpenAI 兼容的 /embeddings 端点
//! - HashEmbedder：离线确定性特征哈希（词袋），无需 API Key

use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::embeddings::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::openai::openai_config;
use crate::memory::tokenizer;

/// 选择离线哈希嵌入的模型名
pub const LOCAL_EMBEDDING_MODELS: [&str; 3] = ["local", "hash", "bow"];

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 写入索引的模型名，检索时据此重建同一嵌入器
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, String>;
}

pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        Self {
            client: Client::with_config(openai_config(base_url, api_key)),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(vec![]);
        }
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(text.to_string()))
            .build()
            .map_err(|e| e.to_string())?;
        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| e.to_string())?;
        Ok(response
            .data
            .first()
            .map(|e| e.embedding.clone())
            .unwrap_or_default())
    }
}

/// 特征哈希嵌入：每个词哈希到固定维度的一个桶，符号位由哈希高位决定，结果 L2 归一化
pub struct HashEmbedder {
    model: String,
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model: model.into(),
            dimensions: dimensions.max(8),
        }
    }

    /// 没有可用词时返回空向量
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let tokens = tokenizer::tokenize(text);
        if tokens.is_empty() {
            return Vec::new();
        }
        let mut v = vec![0.0f32; self.dimensions];
        for token in tokens {
            let h = seahash::hash(token.as_bytes());
            let idx = (h % self.dimensions as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        Ok(self.embed_text(text))
    }
}

/// 按模型名创建嵌入器：本地模型名或没有 OPENAI_API_KEY 时退回 HashEmbedder
pub fn create_embedder(
    model: &str,
    base_url: Option<&str>,
    hash_dimensions: usize,
) -> Arc<dyn EmbeddingProvider> {
    let model = model.trim();
    let is_local = LOCAL_EMBEDDING_MODELS
        .iter()
        .any(|m| m.eq_ignore_ascii_case(model));
    let key = std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.is_empty() && k != "sk-placeholder");

    match key {
        Some(key) if !is_local => {
            tracing::info!(model, "using OpenAI-compatible embeddings");
            Arc::new(OpenAiEmbedder::new(base_url, model, Some(&key)))
        }
        _ => {
            if !is_local {
                tracing::warn!(model, "no OPENAI_API_KEY, falling back to hash embeddings");
            }
            Arc::new(HashEmbedder::new(model, hash_dimensions))
        }
    }
}

/// 余弦相似度；维度不一致或零向量时为 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
