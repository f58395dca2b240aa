//! 文本分块（UTF-8 安全，按字符计数）
//!
//! 每块至多 chunk_size 个字符，优先在分隔符后断开；相邻块重叠 chunk_overlap 个字符。

const SEPARATORS: [&str; 6] = ["\n\n", "\n", "。", ". ", "? ", " "];

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// overlap 被限制在 chunk_size - 1 以内，保证每块至少前进一个字符
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    /// 返回 (字符偏移, 块文本)；空白块被丢弃
    pub fn split(&self, text: &str) -> Vec<(usize, String)> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut pieces = Vec::new();
        let mut start = 0;

        while start < total {
            let hard_end = (start + self.chunk_size).min(total);
            let end = if hard_end < total {
                soft_break(&chars[start..hard_end])
                    .map(|k| start + k)
                    .unwrap_or(hard_end)
            } else {
                hard_end
            };

            let piece: String = chars[start..end].iter().collect();
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                pieces.push((start, trimmed.to_string()));
            }

            if end >= total {
                break;
            }
            let next = end.saturating_sub(self.chunk_overlap);
            start = if next > start { next } else { end };
        }

        pieces
    }
}

/// 窗口内最后一个分隔符之后的位置（按 SEPARATORS 优先级）
fn soft_break(window: &[char]) -> Option<usize> {
    for sep in SEPARATORS {
        let sep: Vec<char> = sep.chars().collect();
        if sep.len() > window.len() {
            continue;
        }
        let found = (0..=window.len() - sep.len())
            .rev()
            .find(|&i| window[i..i + sep.len()] == sep[..]);
        if let Some(i) = found {
            let cut = i + sep.len();
            if cut > 0 {
                return Some(cut);
            }
        }
    }
    None
}
