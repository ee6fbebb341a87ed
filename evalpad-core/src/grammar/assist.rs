use std::ops::Range;

use super::LanguageDefinition;

const STATEMENT_TAGS: &[&str] = &[
    "if", "for", "block", "macro", "filter", "call", "set", "with", "trans", "raw", "autoescape",
    "extends", "include", "import", "from",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Keyword,
    Snippet,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionKind,
    pub insert_text: String,
    /// Cursor position (empty range) or placeholder selection inside
    /// `insert_text` after insertion.
    pub selection: Option<Range<usize>>,
}

impl CompletionItem {
    fn keyword(label: String, insert_text: String, selection: Option<Range<usize>>) -> Self {
        Self {
            label,
            kind: CompletionKind::Keyword,
            insert_text,
            selection,
        }
    }

    /// The word a user would type to reach this item.
    pub fn filter_text(&self) -> &str {
        self.label
            .trim_start_matches("{%")
            .trim_start_matches('|')
            .trim_start_matches("{{")
            .trim_end_matches("%}")
            .trim_end_matches("}}")
            .trim()
    }
}

/// Completion items for `lang` whose keyword starts with `prefix`.
/// An empty prefix yields every item.
pub fn completions(lang: &LanguageDefinition, prefix: &str) -> Vec<CompletionItem> {
    let mut items = Vec::new();

    for tag in STATEMENT_TAGS {
        let insert_text = format!("{{% {}  %}}", tag);
        let cursor = tag.len() + 4;
        items.push(CompletionItem::keyword(
            format!("{{% {} %}}", tag),
            insert_text,
            Some(cursor..cursor),
        ));
    }

    for block in lang.block_keywords {
        let tag = format!("{{% end{} %}}", block);
        items.push(CompletionItem::keyword(tag.clone(), tag, None));
    }

    items.push(CompletionItem {
        label: "{{ … }}".to_string(),
        kind: CompletionKind::Snippet,
        insert_text: "{{ var }}".to_string(),
        selection: Some(3..6),
    });

    for filter in lang.filters {
        let text = format!("| {}", filter);
        items.push(CompletionItem {
            label: text.clone(),
            kind: CompletionKind::Function,
            insert_text: text,
            selection: None,
        });
    }

    let prefix = prefix.trim();
    if !prefix.is_empty() {
        items.retain(|item| item.filter_text().starts_with(prefix) || item.label.starts_with(prefix));
    }
    items
}

/// Markdown hover text for a keyword, filter or test.
pub fn hover(lang: &LanguageDefinition, word: &str) -> Option<String> {
    if lang.is_keyword(word) {
        Some(format!("**Jinja2 keyword**: `{}`", word))
    } else if lang.is_filter(word) {
        Some(format!("**Jinja2 filter/test**: `{}`", word))
    } else {
        None
    }
}

/// The identifier touching byte offset `at`, with its byte range.
pub fn word_at(text: &str, at: usize) -> Option<(Range<usize>, &str)> {
    let at = at.min(text.len());
    if !text.is_char_boundary(at) {
        return None;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';

    let start = text[..at]
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_word(c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(at);
    let end = text[at..]
        .char_indices()
        .find(|&(_, c)| !is_word(c))
        .map(|(i, _)| at + i)
        .unwrap_or(text.len());

    (start < end).then(|| (start..end, &text[start..end]))
}
