//! 共享状态：任务参数与控制标志
//!
//! 由编排循环独占持有，每轮以 `&mut` 借给恰好一个智能体。
//! 参数字段在被设置前均为 None；门控谓词只检查「是否已设置」。

use serde::Serialize;

use crate::core::Speaker;

/// 所有智能体读写的唯一事实来源
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SharedState {
    pub input_dir: Option<String>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub embedding_model: Option<String>,
    pub reranking_model: Option<String>,
    pub search_type: Option<String>,
    pub query: Option<String>,
    /// 持有发言权的智能体；None 表示下一轮需要重新路由
    pub current_speaker: Option<Speaker>,
    /// 任务智能体完成后置位，仅在紧随其后的一次循环迭代中为 true
    pub just_finished: bool,
}

/// 非空白文本才算有效取值
fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_input_dir(&self) -> bool {
        self.input_dir.is_some()
    }

    pub fn has_chunk_size(&self) -> bool {
        self.chunk_size.is_some()
    }

    pub fn has_chunk_overlap(&self) -> bool {
        self.chunk_overlap.is_some()
    }

    pub fn has_embedding_model(&self) -> bool {
        self.embedding_model.is_some()
    }

    pub fn has_reranking_model(&self) -> bool {
        self.reranking_model.is_some()
    }

    pub fn has_search_type(&self) -> bool {
        self.search_type.is_some()
    }

    pub fn has_query(&self) -> bool {
        self.query.is_some()
    }

    /// input_dir、chunk_size、chunk_overlap 均已设置
    pub fn preprocessing_ready(&self) -> bool {
        self.has_input_dir() && self.has_chunk_size() && self.has_chunk_overlap()
    }

    pub fn generation_ready(&self) -> bool {
        self.has_query() && self.has_search_type() && self.has_reranking_model()
    }

    pub fn missing_preprocessing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.has_input_dir() {
            missing.push("input_dir");
        }
        if !self.has_chunk_size() {
            missing.push("chunk_size");
        }
        if !self.has_chunk_overlap() {
            missing.push("chunk_overlap");
        }
        missing
    }

    pub fn missing_generation(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.has_query() {
            missing.push("query");
        }
        if !self.has_search_type() {
            missing.push("search_type");
        }
        if !self.has_reranking_model() {
            missing.push("reranking_model");
        }
        missing
    }

    // 参数设置：空值不覆盖已有取值，返回该字段当前是否已设置

    pub fn record_input_dir(&mut self, value: Option<&str>) -> bool {
        if let Some(v) = non_empty(value) {
            self.input_dir = Some(v);
        }
        self.has_input_dir()
    }

    /// chunk_size 为 0 视为无效
    pub fn record_chunk_size(&mut self, value: Option<usize>) -> bool {
        if let Some(v) = value.filter(|v| *v > 0) {
            self.chunk_size = Some(v);
        }
        self.has_chunk_size()
    }

    pub fn record_chunk_overlap(&mut self, value: Option<usize>) -> bool {
        if let Some(v) = value {
            self.chunk_overlap = Some(v);
        }
        self.has_chunk_overlap()
    }

    pub fn record_embedding_model(&mut self, value: Option<&str>) -> bool {
        if let Some(v) = non_empty(value) {
            self.embedding_model = Some(v);
        }
        self.has_embedding_model()
    }

    pub fn record_reranking_model(&mut self, value: Option<&str>) -> bool {
        if let Some(v) = non_empty(value) {
            self.reranking_model = Some(v);
        }
        self.has_reranking_model()
    }

    pub fn record_search_type(&mut self, value: Option<&str>) -> bool {
        if let Some(v) = non_empty(value) {
            self.search_type = Some(v);
        }
        self.has_search_type()
    }

    pub fn record_query(&mut self, value: Option<&str>) -> bool {
        if let Some(v) = non_empty(value) {
            self.query = Some(v);
        }
        self.has_query()
    }

    /// 派发时由编排循环调用：任务智能体获得发言权，Concierge 不占用
    pub fn claim(&mut self, speaker: Speaker) {
        if speaker.is_sticky() {
            self.current_speaker = Some(speaker);
        }
    }

    /// 任务智能体完成：交还发言权并通知编排循环询问续接智能体
    pub fn finish(&mut self) {
        self.current_speaker = None;
        self.just_finished = true;
    }

    /// 读取并清除 just_finished（每次完成只被消费一次）
    pub fn take_just_finished(&mut self) -> bool {
        std::mem::take(&mut self.just_finished)
    }

    /// 拼入 system prompt 的状态快照
    pub fn to_prompt_string(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}
