//! 本地检索执行器：向量 / 关键词 / 混合检索 + 重排
//!
//! 混合检索用 RRF（Reciprocal Rank Fusion，k = 60）融合两路排名。
//! 重排：`none` 保持检索顺序；其余模型名按查询词覆盖率与归一化检索分数各占一半重排。
//! 查询与入库的 chunk 使用同一套规范化（小写、去标点），否则 "Self-RAG" 与 "selfrag" 对不上。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::executors::documents::normalize_text;
use crate::executors::index::{IndexFile, INDEX_FILE};
use crate::executors::{RankedDocument, RetrievalExecutor};
use crate::llm::{cosine_similarity, create_embedder};
use crate::memory::tokenizer;

const RRF_K: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Vector,
    Keyword,
    Hybrid,
}

impl SearchType {
    /// 未知取值退回 Hybrid
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "vector" | "semantic" | "dense" => SearchType::Vector,
            "keyword" | "sparse" | "bm25" | "lexical" => SearchType::Keyword,
            "hybrid" => SearchType::Hybrid,
            other => {
                tracing::warn!("unknown search type '{}', using hybrid", other);
                SearchType::Hybrid
            }
        }
    }
}

/// (entry 下标, 分数)，按分数降序
type Ranking = Vec<(usize, f32)>;

fn sort_desc(ranking: &mut Ranking) {
    ranking.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
}

pub fn vector_rank(index: &IndexFile, query_embedding: &[f32]) -> Ranking {
    let mut ranking: Ranking = index
        .entries
        .iter()
        .enumerate()
        .map(|(i, e)| (i, cosine_similarity(query_embedding, &e.embedding)))
        .filter(|(_, s)| *s > 0.0)
        .collect();
    sort_desc(&mut ranking);
    ranking
}

pub fn keyword_rank(index: &IndexFile, query: &str) -> Ranking {
    let q = tokenizer::tokenize_to_set(query);
    let mut ranking: Ranking = index
        .entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let d = tokenizer::tokenize_to_set(&e.chunk.text);
            (i, tokenizer::jaccard_similarity(&q, &d))
        })
        .filter(|(_, s)| *s > 0.0)
        .collect();
    sort_desc(&mut ranking);
    ranking
}

/// RRF：score(d) = Σ 1 / (k + rank)
pub fn reciprocal_rank_fusion(rankings: &[Ranking]) -> Ranking {
    let mut fused: HashMap<usize, f32> = HashMap::new();
    for ranking in rankings {
        for (rank, (idx, _)) in ranking.iter().enumerate() {
            *fused.entry(*idx).or_insert(0.0) += 1.0 / (RRF_K + rank as f32);
        }
    }
    let mut ranking: Ranking = fused.into_iter().collect();
    // 分数相同时按下标，保证结果稳定
    ranking.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    ranking
}

pub fn rerank(query: &str, mut docs: Vec<RankedDocument>, reranking_model: &str) -> Vec<RankedDocument> {
    let model = reranking_model.trim();
    if model.is_empty() || model.eq_ignore_ascii_case("none") {
        return docs;
    }
    let q = tokenizer::tokenize_to_set(&normalize_text(query));
    let max = docs.iter().map(|d| d.score).fold(0.0f32, f32::max);
    for doc in &mut docs {
        let coverage = tokenizer::query_coverage(&q, &tokenizer::tokenize_to_set(&doc.text));
        let normalized = if max > 0.0 { doc.score / max } else { 0.0 };
        doc.score = 0.5 * coverage + 0.5 * normalized;
    }
    docs.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    docs
}

pub struct LocalRetrievalExecutor {
    index_path: PathBuf,
    embedding_base_url: Option<String>,
    hash_dimensions: usize,
    top_k: usize,
}

impl LocalRetrievalExecutor {
    pub fn new(
        data_dir: &Path,
        embedding_base_url: Option<String>,
        hash_dimensions: usize,
        top_k: usize,
    ) -> Self {
        Self {
            index_path: data_dir.join(INDEX_FILE),
            embedding_base_url,
            hash_dimensions,
            top_k: top_k.max(1),
        }
    }

    async fn candidates(&self, index: &IndexFile, query: &str, search_type: SearchType) -> Ranking {
        let embed = || async {
            let embedder = create_embedder(
                &index.embedding_model,
                self.embedding_base_url.as_deref(),
                self.hash_dimensions,
            );
            match embedder.embed(query).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!("query embedding failed: {}", e);
                    Vec::new()
                }
            }
        };

        match search_type {
            SearchType::Vector => vector_rank(index, &embed().await),
            SearchType::Keyword => keyword_rank(index, query),
            SearchType::Hybrid => {
                let vector = vector_rank(index, &embed().await);
                let keyword = keyword_rank(index, query);
                reciprocal_rank_fusion(&[vector, keyword])
            }
        }
    }
}

#[async_trait]
impl RetrievalExecutor for LocalRetrievalExecutor {
    async fn retrieve_rerank(
        &self,
        query: &str,
        search_type: &str,
        reranking_model: &str,
    ) -> Vec<RankedDocument> {
        let index = match IndexFile::load(&self.index_path) {
            Ok(i) => i,
            Err(e) => {
                tracing::warn!("could not load index {}: {}", self.index_path.display(), e);
                return Vec::new();
            }
        };

        let normalized = normalize_text(query);
        let ranking = self
            .candidates(&index, &normalized, SearchType::parse(search_type))
            .await;
        let docs: Vec<RankedDocument> = ranking
            .into_iter()
            .take(self.top_k * 2)
            .map(|(i, score)| {
                let chunk = &index.entries[i].chunk;
                RankedDocument {
                    chunk_id: chunk.id.clone(),
                    source: chunk.source.clone(),
                    text: chunk.text.clone(),
                    score,
                }
            })
            .collect();

        let mut docs = rerank(&normalized, docs, reranking_model);
        docs.truncate(self.top_k);
        tracing::info!(
            "Retrieved {} documents (search_type={}, reranker={})",
            docs.len(),
            search_type,
            reranking_model
        );
        docs
    }
}
