// 文档分块模块
// 按段落聚合文本，超长段落按句子或字符切分，并在相邻块之间保留重叠

use serde::{Deserialize, Serialize};
use tracing::debug;

/// 分块器配置（以字符计）
///
/// `max_chunk_size` 包含前一块带来的重叠部分。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    pub max_chunk_size: usize,
    pub overlap_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            overlap_size: 100,
        }
    }
}

/// 文本块
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub index: usize,
    pub content: String,
    /// 粗略的 token 估算（约 4 字符 1 token）
    pub token_count: usize,
}

/// 段落感知分块器
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        // 重叠必须小于块大小，否则无法前进
        let overlap_size = config.overlap_size.min(config.max_chunk_size / 2);
        Self {
            config: ChunkerConfig {
                max_chunk_size: config.max_chunk_size.max(1),
                overlap_size,
            },
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(ChunkerConfig::default())
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// 约 4 个字符计 1 个 token
    pub fn estimate_tokens(text: &str) -> usize {
        char_len(text).div_ceil(4)
    }

    /// 正文可用的字符数，为重叠预留空间
    fn body_size(&self) -> usize {
        self.config.max_chunk_size - self.config.overlap_size
    }

    /// 将文本分块
    pub fn chunk(&self, content: &str) -> Vec<TextChunk> {
        let max = self.body_size();
        let mut pieces: Vec<String> = Vec::new();
        let mut current = String::new();

        for paragraph in split_paragraphs(content) {
            for segment in self.split_long(paragraph) {
                let separator = if current.is_empty() { 0 } else { 2 };
                if !current.is_empty() && char_len(&current) + separator + char_len(&segment) > max {
                    pieces.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push_str("\n\n");
                }
                current.push_str(&segment);
            }
        }

        if !current.trim().is_empty() {
            pieces.push(current);
        }

        let chunks: Vec<TextChunk> = pieces
            .iter()
            .enumerate()
            .map(|(index, piece)| {
                let content = if index > 0 && self.config.overlap_size > 0 {
                    let overlap = tail_chars(&pieces[index - 1], self.config.overlap_size);
                    format!("{}{}", overlap, piece)
                } else {
                    piece.clone()
                };
                let token_count = Self::estimate_tokens(&content);
                TextChunk {
                    index,
                    content,
                    token_count,
                }
            })
            .collect();

        debug!(
            chunks = chunks.len(),
            max_chunk_size = self.config.max_chunk_size,
            "文档分块完成"
        );
        chunks
    }

    /// 超长段落先按句子切，句子仍然过长则按字符硬切
    fn split_long(&self, paragraph: &str) -> Vec<String> {
        let max = self.body_size();
        if char_len(paragraph) <= max {
            return vec![paragraph.to_string()];
        }

        let mut parts = Vec::new();
        let mut current = String::new();

        for sentence in split_sentences(paragraph) {
            if char_len(sentence) > max {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
                let chars: Vec<char> = sentence.chars().collect();
                parts.extend(chars.chunks(max).map(|c| c.iter().collect::<String>()));
                continue;
            }

            if !current.is_empty() && char_len(&current) + 1 + char_len(sentence) > max {
                parts.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
        }

        if !current.is_empty() {
            parts.push(current);
        }

        parts
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// 取末尾若干字符，尽量从单词边界开始
///
/// 结果带一个分隔空格，总长不超过 `count`。
fn tail_chars(text: &str, count: usize) -> String {
    let budget = count.saturating_sub(1);
    let text = text.trim_end();
    let total = char_len(text);
    if budget == 0 || total == 0 {
        return String::new();
    }
    if total <= budget {
        return format!("{} ", text);
    }
    let tail: String = text.chars().skip(total - budget).collect();
    let tail = match tail.char_indices().find(|(_, c)| c.is_whitespace()) {
        Some((pos, c)) if pos + c.len_utf8() < tail.len() => tail[pos + c.len_utf8()..].to_string(),
        _ => tail,
    };
    let tail = tail.trim();
    if tail.is_empty() {
        String::new()
    } else {
        format!("{} ", tail)
    }
}

fn split_paragraphs(content: &str) -> Vec<&str> {
    content
        .split("\n\n")
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect()
}

fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for (pos, ch) in paragraph.char_indices() {
        if matches!(ch, '.' | '!' | '?' | '。' | '！' | '？') {
            let end = pos + ch.len_utf8();
            let sentence = paragraph[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let rest = paragraph[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }

    sentences
}
