//! 发言者标识与路由决策
//!
//! 决策服务返回的自由文本只在这里被解析为封闭集合中的 Speaker 或显式的 Invalid，
//! 原始文本不会越过这一边界。

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// 可以接管某一轮对话的智能体（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Speaker {
    Preprocessing,
    Indexing,
    Generation,
    Concierge,
}

impl Speaker {
    pub const ALL: [Speaker; 4] = [
        Speaker::Preprocessing,
        Speaker::Indexing,
        Speaker::Generation,
        Speaker::Concierge,
    ];

    /// 决策服务使用的线上标识
    pub fn id(&self) -> &'static str {
        match self {
            Speaker::Preprocessing => "data_pre_processing",
            Speaker::Indexing => "indexing",
            Speaker::Generation => "generation",
            Speaker::Concierge => "Concierge",
        }
    }

    /// 任务智能体被派发后持有发言权；Concierge 每轮都重新路由
    pub fn is_sticky(&self) -> bool {
        !matches!(self, Speaker::Concierge)
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// 序列化为线上标识，与决策服务看到的一致
impl Serialize for Speaker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

impl FromStr for Speaker {
    type Err = String;

    /// 去除首尾空白后精确匹配，不做大小写折叠
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Speaker::ALL
            .into_iter()
            .find(|sp| sp.id() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// 路由结果：封闭集合中的发言者，或保留原文的 Invalid
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    Route(Speaker),
    Invalid(String),
}

impl RoutingDecision {
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<Speaker>() {
            Ok(speaker) => RoutingDecision::Route(speaker),
            Err(raw) => RoutingDecision::Invalid(raw),
        }
    }
}
