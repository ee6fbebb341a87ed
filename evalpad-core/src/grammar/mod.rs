//! Declarative description of the Jinja2 template language, plus the
//! small amount of machinery that consumes it: a tokenizer for syntax
//! colouring, folding ranges, completions/hover and a document formatter.

pub mod assist;
pub mod folding;
pub mod formatter;
pub mod tokenizer;

pub use assist::{completions, hover, word_at, CompletionItem, CompletionKind};
pub use folding::{folding_ranges, FoldingRange};
pub use formatter::format_document;
pub use tokenizer::{Token, TokenKind, Tokenizer, MAX_DEPTH};

use crate::config::ToolKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketPair {
    pub open: &'static str,
    pub close: &'static str,
    pub token: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoClosingPair {
    pub open: &'static str,
    pub close: &'static str,
    /// Suppressed inside strings.
    pub not_in_string: bool,
}

#[derive(Debug)]
pub struct LanguageDefinition {
    pub id: &'static str,
    pub extensions: &'static [&'static str],
    pub aliases: &'static [&'static str],
    pub mimetypes: &'static [&'static str],
    pub token_postfix: &'static str,

    pub keywords: &'static [&'static str],
    pub filters: &'static [&'static str],
    pub operators: &'static [&'static str],

    pub brackets: &'static [BracketPair],
    pub auto_closing_pairs: &'static [AutoClosingPair],
    pub surrounding_pairs: &'static [(&'static str, &'static str)],
    pub block_comment: (&'static str, &'static str),

    /// Statement keywords that open a region closed by `end<keyword>`.
    pub block_keywords: &'static [&'static str],
    /// Keywords that continue an open block at its own level.
    pub branch_keywords: &'static [&'static str],
}

impl LanguageDefinition {
    pub fn is_keyword(&self, word: &str) -> bool {
        self.keywords.contains(&word)
    }

    pub fn is_filter(&self, word: &str) -> bool {
        self.filters.contains(&word)
    }

    pub fn is_operator(&self, symbol: &str) -> bool {
        self.operators.contains(&symbol)
    }

    pub fn is_block_opener(&self, word: &str) -> bool {
        self.block_keywords.contains(&word)
    }

    /// `endif` → `Some("if")` when `if` is a block keyword.
    pub fn block_closer_of<'w>(&self, word: &'w str) -> Option<&'w str> {
        word.strip_prefix("end").filter(|kind| self.is_block_opener(kind))
    }

    pub fn is_branch(&self, word: &str) -> bool {
        self.branch_keywords.contains(&word)
    }
}

pub static JINJA2: LanguageDefinition = LanguageDefinition {
    id: "jinja2",
    extensions: &[".j2", ".jinja", ".jinja2", ".html.j2", ".tpl"],
    aliases: &["Jinja2", "Jinja"],
    mimetypes: &["text/x-jinja2", "text/jinja2"],
    token_postfix: ".jinja2",

    keywords: &[
        "if", "elif", "else", "endif",
        "for", "endfor", "in", "recursive", "reversed", "loop",
        "block", "endblock", "extends", "include", "import", "from", "with", "without", "context",
        "macro", "endmacro", "call", "endcall",
        "filter", "endfilter", "set",
        "raw", "endraw", "trans", "endtrans", "do",
        "autoescape", "endautoescape", "scoped",
        "as", "true", "false", "none", "is", "not", "and", "or", "test", "capture",
    ],
    filters: &[
        "safe", "escape", "e", "capitalize", "lower", "upper", "title", "trim", "striptags", "replace",
        "default", "d", "join", "list", "length", "reverse", "sort", "unique", "first", "last", "random",
        "slice", "abs", "round", "int", "float", "string", "format", "urlencode", "json", "tojson",
        "map", "select", "reject", "selectattr", "rejectattr", "min", "max",
        "file_exists", "defined", "undefined", "equalto", "odd", "even", "divisibleby", "iterable",
    ],
    operators: &[
        "+", "-", "*", "/", "//", "%", "**", "~",
        "==", "!=", ">", "<", ">=", "<=",
        "=", "|", ":", ",", ".", "?", "??",
    ],

    brackets: &[
        BracketPair { open: "{", close: "}", token: "delimiter.curly" },
        BracketPair { open: "(", close: ")", token: "delimiter.parenthesis" },
        BracketPair { open: "[", close: "]", token: "delimiter.bracket" },
    ],
    auto_closing_pairs: &[
        AutoClosingPair { open: "{", close: "}", not_in_string: false },
        AutoClosingPair { open: "[", close: "]", not_in_string: false },
        AutoClosingPair { open: "(", close: ")", not_in_string: false },
        AutoClosingPair { open: "\"", close: "\"", not_in_string: true },
        AutoClosingPair { open: "'", close: "'", not_in_string: true },
        AutoClosingPair { open: "`", close: "`", not_in_string: true },
        AutoClosingPair { open: "{{ ", close: " }}", not_in_string: false },
        AutoClosingPair { open: "{% ", close: " %}", not_in_string: false },
        AutoClosingPair { open: "{# ", close: " #}", not_in_string: false },
    ],
    surrounding_pairs: &[("{", "}"), ("[", "]"), ("(", ")"), ("\"", "\""), ("'", "'"), ("`", "`")],
    block_comment: ("{#", "#}"),

    block_keywords: &["if", "for", "macro", "block", "filter", "call", "raw", "autoescape"],
    branch_keywords: &["elif", "else"],
};

/// Language of a tool's primary pane. The predicate tool edits plain text.
pub fn language_for(tool: ToolKind) -> Option<&'static LanguageDefinition> {
    match tool {
        ToolKind::Jinja => Some(&JINJA2),
        ToolKind::Predicate => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_tables() {
        assert!(JINJA2.is_keyword("endfor"));
        assert!(!JINJA2.is_keyword("message"));
        assert!(JINJA2.is_filter("tojson"));
        assert!(JINJA2.is_operator("//"));
        assert!(!JINJA2.is_operator("&&"));
    }

    #[test]
    fn test_block_closers() {
        assert_eq!(JINJA2.block_closer_of("endif"), Some("if"));
        assert_eq!(JINJA2.block_closer_of("endautoescape"), Some("autoescape"));
        // `set` has no block form here, so `endset` is not a closer.
        assert_eq!(JINJA2.block_closer_of("endset"), None);
        assert_eq!(JINJA2.block_closer_of("if"), None);
    }

    #[test]
    fn test_every_block_keyword_has_an_end_keyword() {
        for kw in JINJA2.block_keywords {
            assert!(JINJA2.is_keyword(&format!("end{}", kw)), "missing end{}", kw);
        }
    }

    #[test]
    fn test_language_for_tool() {
        assert_eq!(language_for(ToolKind::Jinja).map(|l| l.id), Some("jinja2"));
        assert!(language_for(ToolKind::Predicate).is_none());
    }
}
