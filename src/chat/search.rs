// 会话内搜索
// 在已载入的消息上做不区分大小写的子串匹配，光标循环移动

use std::ops::Range;

use serde::Serialize;

use crate::models::Message;

/// 高亮片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub matched: bool,
}

/// 从 haystack 开头匹配 needle（逐字符忽略大小写），返回匹配的字节长度
fn match_len(haystack: &str, needle: &[char]) -> Option<usize> {
    let mut chars = haystack.char_indices();
    for n in needle {
        let (_, c) = chars.next()?;
        if !c.to_lowercase().eq(n.to_lowercase()) {
            return None;
        }
    }
    Some(chars.next().map(|(i, _)| i).unwrap_or(haystack.len()))
}

/// 查询在文本中所有不重叠出现的位置（字节区间）
pub fn occurrences(text: &str, query: &str) -> Vec<Range<usize>> {
    let needle: Vec<char> = query.chars().collect();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut ranges = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let rest = &text[start..];
        match match_len(rest, &needle) {
            Some(len) => {
                ranges.push(start..start + len);
                start += len;
            }
            None => start += rest.chars().next().map(char::len_utf8).unwrap_or(1),
        }
    }
    ranges
}

/// 把文本切成普通片段和命中片段，命中所有出现位置
pub fn highlight<'a>(text: &'a str, query: &str) -> Vec<Segment<'a>> {
    let mut segments = Vec::new();
    let mut last = 0;
    for range in occurrences(text, query.trim()) {
        if range.start > last {
            segments.push(Segment {
                text: &text[last..range.start],
                matched: false,
            });
        }
        segments.push(Segment {
            text: &text[range.clone()],
            matched: true,
        });
        last = range.end;
    }
    if last < text.len() {
        segments.push(Segment {
            text: &text[last..],
            matched: false,
        });
    }
    segments
}

/// 搜索状态
#[derive(Debug, Clone, Default)]
pub struct ConversationSearch {
    query: String,
    matches: Vec<usize>,
    cursor: usize,
}

impl ConversationSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// 修改查询，光标回到第一个结果
    pub fn set_query(&mut self, query: &str, messages: &[Message]) {
        self.query = query.to_string();
        self.cursor = 0;
        self.rebuild(messages);
    }

    /// 消息列表变化后重新匹配，光标保持在范围内
    pub fn refresh(&mut self, messages: &[Message]) {
        self.rebuild(messages);
        if self.cursor >= self.matches.len() {
            self.cursor = 0;
        }
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.matches.clear();
        self.cursor = 0;
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_active(&self) -> bool {
        !self.query.trim().is_empty()
    }

    /// 命中的消息下标，按消息顺序
    pub fn matches(&self) -> &[usize] {
        &self.matches
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// 下一个结果，越过末尾回到开头
    pub fn next(&mut self) {
        if !self.matches.is_empty() {
            self.cursor = (self.cursor + 1) % self.matches.len();
        }
    }

    /// 上一个结果，越过开头回到末尾
    pub fn prev(&mut self) {
        if !self.matches.is_empty() {
            self.cursor = (self.cursor + self.matches.len() - 1) % self.matches.len();
        }
    }

    /// 跳到第 position 个结果，越界时循环
    pub fn seek(&mut self, position: usize) {
        if !self.matches.is_empty() {
            self.cursor = position % self.matches.len();
        }
    }

    /// 需要滚动到视图中央的消息下标
    pub fn focus(&self) -> Option<usize> {
        self.matches.get(self.cursor).copied()
    }

    pub fn is_current(&self, message_index: usize) -> bool {
        self.focus() == Some(message_index)
    }

    /// 结果计数文案，没有查询时为 None
    pub fn label(&self) -> Option<String> {
        if !self.is_active() {
            return None;
        }
        if self.matches.is_empty() {
            Some("No results".to_string())
        } else {
            Some(format!("{}/{}", self.cursor + 1, self.matches.len()))
        }
    }

    fn rebuild(&mut self, messages: &[Message]) {
        let query = self.query.trim();
        self.matches = if query.is_empty() {
            Vec::new()
        } else {
            messages
                .iter()
                .enumerate()
                .filter(|(_, m)| !occurrences(&m.text, query).is_empty())
                .map(|(i, _)| i)
                .collect()
        };
    }
}
