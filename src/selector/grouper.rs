//! 将带时间戳的单词序列切分为语义连贯的词组。

use std::collections::BTreeSet;

use unicode_segmentation::UnicodeSegmentation;

use crate::{model::transcript::Word, selector::types::PhraseGroup};

/// 关键词提取时忽略的常见虚词。
static STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "i", "if", "in", "is",
    "it", "me", "my", "no", "not", "of", "oh", "on", "or", "so", "that", "the", "this", "to", "up",
    "was", "we", "were", "with", "you", "your",
];

/// 判断一段文本是否以终结性标点收尾。
fn ends_with_terminal_punctuation(text: &str) -> bool {
    matches!(text.trim_end().chars().last(), Some('.' | '!' | '?'))
}

/// 将单词序列切分为词组。
///
/// 遍历过程中，满足以下任一条件即在当前单词之后开启新词组：
/// 1. 当前单词与下一个单词之间的停顿超过 `gap_threshold` 秒；
/// 2. 当前词组文本以终结性标点（`.` `!` `?`）收尾；
/// 3. 词组已经容纳了 `max_words_per_group` 个单词。
///
/// 产出的词组只携带时间与原文；主题与关键词由调用方在匹配之前
/// 通过 [`PhraseGroup::enriched`] 补全。没有闭合标点的末尾单词
/// 同样会构成最后一个词组，其结束时间就是整首歌的最后时间戳。
///
/// # 参数
/// * `words` - 按时间排列、互不重叠的单词序列。空序列产出空列表。
/// * `gap_threshold` - 切分词组的停顿阈值（秒）。
/// * `max_words_per_group` - 单个词组的单词数上限。
pub fn group_words(
    words: &[Word],
    gap_threshold: f64,
    max_words_per_group: usize,
) -> Vec<PhraseGroup> {
    let mut groups: Vec<PhraseGroup> = Vec::new();
    let mut current: Vec<Word> = Vec::new();

    for (index, word) in words.iter().enumerate() {
        current.push(word.clone());

        let gap_break = words
            .get(index + 1)
            .is_some_and(|next| next.start - word.end > gap_threshold);
        let punctuation_break = ends_with_terminal_punctuation(&word.text);
        let full = current.len() >= max_words_per_group;

        if gap_break || punctuation_break || full {
            groups.push(close_group(groups.len() as u32 + 1, std::mem::take(&mut current)));
        }
    }

    if !current.is_empty() {
        groups.push(close_group(groups.len() as u32 + 1, current));
    }

    groups
}

/// 把累积的单词封装为一个词组。
fn close_group(id: u32, words: Vec<Word>) -> PhraseGroup {
    let start_time = words.first().map_or(0.0, |w| w.start);
    let end_time = words.last().map_or(0.0, |w| w.end);
    let phrase = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    PhraseGroup {
        id,
        topic: String::new(),
        key_terms: BTreeSet::new(),
        phrases: vec![phrase],
        words,
        start_time,
        end_time,
    }
}

/// 从一段文本中启发式地提取关键词。
///
/// 这是没有接入 LLM 收集器时的兜底方案：按 Unicode 词边界切分、
/// 统一小写、过滤虚词和过短的碎片。
#[must_use]
pub fn extract_key_terms(text: &str) -> BTreeSet<String> {
    text.unicode_words()
        .map(str::to_lowercase)
        .filter(|word| word.chars().count() > 1 && !STOP_WORDS.contains(&word.as_str()))
        .collect()
}
