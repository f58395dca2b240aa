//! 本地向量索引：嵌入文本块并写入 `<data_dir>/index.json`
//!
//! 索引文件记录使用的嵌入模型名，检索时据此重建同一嵌入器。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::executors::{ChunkedUnit, IndexAck, IndexExecutor};
use crate::llm::create_embedder;

pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: ChunkedUnit,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFile {
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<IndexEntry>,
}

impl IndexFile {
    pub fn load(path: &Path) -> Result<Self, AgentError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), AgentError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }
}

pub struct LocalIndexExecutor {
    index_path: PathBuf,
    embedding_base_url: Option<String>,
    hash_dimensions: usize,
}

impl LocalIndexExecutor {
    pub fn new(data_dir: &Path, embedding_base_url: Option<String>, hash_dimensions: usize) -> Self {
        Self {
            index_path: data_dir.join(INDEX_FILE),
            embedding_base_url,
            hash_dimensions,
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }
}

#[async_trait]
impl IndexExecutor for LocalIndexExecutor {
    async fn embed_and_index(&self, chunks: &[ChunkedUnit], embedding_model: &str) -> IndexAck {
        let embedder = create_embedder(
            embedding_model,
            self.embedding_base_url.as_deref(),
            self.hash_dimensions,
        );

        let mut entries = Vec::with_capacity(chunks.len());
        let mut skipped = 0;
        for chunk in chunks {
            match embedder.embed(&chunk.text).await {
                Ok(embedding) if !embedding.is_empty() => entries.push(IndexEntry {
                    chunk: chunk.clone(),
                    embedding,
                }),
                Ok(_) => skipped += 1,
                Err(e) => {
                    tracing::warn!("embedding failed for {}: {}", chunk.id, e);
                    skipped += 1;
                }
            }
        }

        if entries.is_empty() {
            tracing::warn!("nothing to index ({} chunks skipped)", skipped);
            return IndexAck {
                indexed: 0,
                skipped,
                location: None,
            };
        }

        let file = IndexFile {
            embedding_model: embedder.model_name().to_string(),
            created_at: Utc::now(),
            entries,
        };
        match file.save(&self.index_path) {
            Ok(()) => {
                tracing::info!(
                    "Indexed {} chunks into {}",
                    file.entries.len(),
                    self.index_path.display()
                );
                IndexAck {
                    indexed: file.entries.len(),
                    skipped,
                    location: Some(self.index_path.clone()),
                }
            }
            Err(e) => {
                tracing::warn!("writing index failed: {}", e);
                IndexAck {
                    indexed: 0,
                    skipped: skipped + file.entries.len(),
                    location: None,
                }
            }
        }
    }
}
