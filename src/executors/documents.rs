//! 本地文档执行器：读取目录 -> 规范化 -> 分块 -> 写入 `<data_dir>/nodes.json`
//!
//! 规范化：小写、合并空白、去除标点。单个文件读取失败时跳过该文件；
//! 整体失败（目录不存在、落盘失败）记录日志并返回空结果。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use walkdir::WalkDir;

use crate::core::AgentError;
use crate::executors::{Chunker, ChunkedUnit, DocumentExecutor};

const TEXT_EXTENSIONS: [&str; 7] = ["txt", "md", "markdown", "rst", "csv", "json", "html"];
pub const NODES_FILE: &str = "nodes.json";

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

fn punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("static regex"))
}

/// 小写、去除标点、合并空白
pub fn normalize_text(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let stripped = punctuation_re().replace_all(&lowered, "");
    whitespace_re().replace_all(&stripped, " ").trim().to_string()
}

/// 读取目录下所有文本文件：(相对路径, 内容)，按路径排序
pub fn load_documents(input_dir: &Path) -> Result<Vec<(String, String)>, AgentError> {
    if !input_dir.is_dir() {
        return Err(AgentError::Executor(format!(
            "input directory not found: {}",
            input_dir.display()
        )));
    }

    let mut docs = Vec::new();
    for entry in WalkDir::new(input_dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        let path = entry.path();
        let is_text = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| TEXT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if !entry.file_type().is_file() || !is_text {
            continue;
        }
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let rel = path
                    .strip_prefix(input_dir)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .replace('\\', "/");
                docs.push((rel, content));
            }
            Err(e) => tracing::warn!("skipping {}: {}", path.display(), e),
        }
    }
    Ok(docs)
}

/// 在原文上分块（句末标点、换行仍可作为断点），再逐块规范化；id 为 `<source>#<序号>`
pub fn chunk_documents(
    docs: &[(String, String)],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<ChunkedUnit> {
    let chunker = Chunker::new(chunk_size, chunk_overlap);
    docs.iter()
        .flat_map(|(source, content)| {
            chunker
                .split(content)
                .into_iter()
                .map(|(offset, piece)| (offset, normalize_text(&piece)))
                .filter(|(_, text)| !text.is_empty())
                .enumerate()
                .map(move |(i, (offset, text))| {
                    let mut metadata = BTreeMap::new();
                    metadata.insert("chunk_size".to_string(), chunk_size.to_string());
                    metadata.insert("chunk_overlap".to_string(), chunk_overlap.to_string());
                    ChunkedUnit {
                        id: format!("{}#{}", source, i),
                        text,
                        source: source.clone(),
                        offset,
                        metadata,
                    }
                })
        })
        .collect()
}

pub struct LocalDocumentExecutor {
    nodes_path: PathBuf,
}

impl LocalDocumentExecutor {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            nodes_path: data_dir.join(NODES_FILE),
        }
    }

    pub fn nodes_path(&self) -> &Path {
        &self.nodes_path
    }

    fn save(&self, chunks: &[ChunkedUnit]) -> Result<(), AgentError> {
        if let Some(parent) = self.nodes_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.nodes_path, serde_json::to_string_pretty(chunks)?)?;
        Ok(())
    }

    fn run(
        &self,
        input_dir: &str,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Vec<ChunkedUnit>, AgentError> {
        let docs = load_documents(Path::new(input_dir))?;
        tracing::info!("Loaded {} documents from {}", docs.len(), input_dir);
        let chunks = chunk_documents(&docs, chunk_size, chunk_overlap);
        self.save(&chunks)?;
        tracing::info!(
            "Saved {} chunks to {}",
            chunks.len(),
            self.nodes_path.display()
        );
        Ok(chunks)
    }
}

#[async_trait]
impl DocumentExecutor for LocalDocumentExecutor {
    async fn transform_and_chunk(
        &self,
        input_dir: &str,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Vec<ChunkedUnit> {
        match self.run(input_dir, chunk_size, chunk_overlap) {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!("document preprocessing failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn load_persisted(&self) -> Vec<ChunkedUnit> {
        let loaded = std::fs::read_to_string(&self.nodes_path)
            .map_err(AgentError::from)
            .and_then(|data| serde_json::from_str(&data).map_err(AgentError::from));
        match loaded {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(
                    "could not load chunks from {}: {}",
                    self.nodes_path.display(),
                    e
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_text() {
        assert_eq!(
            normalize_text("Hello,   World!\n\nSelf-RAG is\tgreat."),
            "hello world selfrag is great"
        );
    }

    #[test]
    fn test_chunks_break_after_sentences() {
        let docs = vec![(
            "notes.txt".to_string(),
            "First sentence here. Second one follows.".to_string(),
        )];
        let chunks = chunk_documents(&docs, 25, 0);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first sentence here", "second one follows"]);
        assert_eq!(chunks[1].offset, 21);
        assert_eq!(chunks[1].id, "notes.txt#1");
    }

    #[test]
    fn test_punctuation_only_pieces_are_dropped() {
        let docs = vec![("a.txt".to_string(), "!!! ??? ...".to_string())];
        assert!(chunk_documents(&docs, 4, 0).is_empty());
    }

    #[tokio::test]
    async fn test_transform_and_chunk_persists_nodes() {
        let input = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        std::fs::write(input.path().join("a.txt"), "One two three four five six seven.").unwrap();
        std::fs::write(input.path().join("b.md"), "# Title\nEight nine ten.").unwrap();
        std::fs::write(input.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let exec = LocalDocumentExecutor::new(data.path());
        let chunks = exec
            .transform_and_chunk(input.path().to_str().unwrap(), 16, 4)
            .await;

        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.source == "a.txt" || c.source == "b.md"));
        assert!(exec.nodes_path().exists());

        let reloaded = exec.load_persisted().await;
        assert_eq!(reloaded, chunks);
    }

    #[tokio::test]
    async fn test_missing_directory_yields_empty_result() {
        let data = TempDir::new().unwrap();
        let exec = LocalDocumentExecutor::new(data.path());
        let chunks = exec.transform_and_chunk("/definitely/not/here", 100, 10).await;
        assert!(chunks.is_empty());
        assert!(!exec.nodes_path().exists());
        assert!(exec.load_persisted().await.is_empty());
    }
}
