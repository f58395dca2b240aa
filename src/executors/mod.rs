//! 任务执行器：编排核心之外的外部协作方
//!
//! 编排层只依赖这里的三个 trait；执行器内部失败在边界处记录日志并返回空结果，不向上传播。
//! 附带一套基于本地文件的实现（documents / index / retrieval），以及答案合成（synthesis）。

pub mod chunker;
pub mod documents;
pub mod index;
pub mod retrieval;
pub mod synthesis;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use chunker::Chunker;
pub use documents::LocalDocumentExecutor;
pub use index::{IndexEntry, IndexFile, LocalIndexExecutor};
pub use retrieval::{LocalRetrievalExecutor, SearchType};
pub use synthesis::{AnswerSynthesizer, ANSWER_TEMPLATE};

/// 预处理产出的文本块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkedUnit {
    pub id: String,
    pub text: String,
    /// 来源文件（相对 input_dir 的路径）
    pub source: String,
    /// 在规范化文本中的字符偏移
    pub offset: usize,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// 索引确认
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexAck {
    pub indexed: usize,
    pub skipped: usize,
    /// 写入位置；失败时为 None
    pub location: Option<PathBuf>,
}

impl IndexAck {
    pub fn is_empty(&self) -> bool {
        self.indexed == 0
    }
}

/// 检索并重排后的文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDocument {
    pub chunk_id: String,
    pub source: String,
    pub text: String,
    pub score: f32,
}

#[async_trait]
pub trait DocumentExecutor: Send + Sync {
    /// 读取、规范化并分块，结果落盘到固定位置；失败时返回空 Vec
    async fn transform_and_chunk(
        &self,
        input_dir: &str,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Vec<ChunkedUnit>;

    /// 读取上一次落盘的文本块（供索引使用）
    async fn load_persisted(&self) -> Vec<ChunkedUnit>;
}

#[async_trait]
pub trait IndexExecutor: Send + Sync {
    async fn embed_and_index(&self, chunks: &[ChunkedUnit], embedding_model: &str) -> IndexAck;
}

#[async_trait]
pub trait RetrievalExecutor: Send + Sync {
    async fn retrieve_rerank(
        &self,
        query: &str,
        search_type: &str,
        reranking_model: &str,
    ) -> Vec<RankedDocument>;
}

/// 派发器持有的执行器集合，可跨智能体共享
#[derive(Clone)]
pub struct Executors {
    pub documents: Arc<dyn DocumentExecutor>,
    pub index: Arc<dyn IndexExecutor>,
    pub retrieval: Arc<dyn RetrievalExecutor>,
}

impl Executors {
    /// 本地文件实现：所有产物写在 data_dir 下
    pub fn local(
        data_dir: impl Into<PathBuf>,
        embedding_base_url: Option<String>,
        hash_dimensions: usize,
        top_k: usize,
    ) -> Self {
        let data_dir = data_dir.into();
        Self {
            documents: Arc::new(LocalDocumentExecutor::new(&data_dir)),
            index: Arc::new(LocalIndexExecutor::new(
                &data_dir,
                embedding_base_url.clone(),
                hash_dimensions,
            )),
            retrieval: Arc::new(LocalRetrievalExecutor::new(
                &data_dir,
                embedding_base_url,
                hash_dimensions,
                top_k,
            )),
        }
    }
}
