//! Syntax colouring for the editor panes, driven by the core tokenizer.

use egui::text::LayoutJob;
use egui::{Color32, FontId, TextFormat};

use evalpad_core::grammar::{Token, TokenKind, Tokenizer, JINJA2, MAX_DEPTH};

/// How a pane's content is coloured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneLanguage {
    Template,
    Json,
    Plain,
}

#[derive(Debug, Clone)]
pub struct SyntaxTheme {
    pub text_color: Color32,
    pub comment_color: Color32,
    pub expression_delimiter_color: Color32,
    pub statement_delimiter_color: Color32,
    pub raw_delimiter_color: Color32,
    pub filter_color: Color32,
    pub type_color: Color32,
    pub variable_color: Color32,
    pub string_color: Color32,
    pub number_color: Color32,
    pub operator_color: Color32,
    pub delimiter_color: Color32,
    pub invalid_color: Color32,
    /// Keyword colour per nesting depth; JSON brackets use the same ramp.
    pub depth_colors: [Color32; MAX_DEPTH as usize + 1],
}

impl Default for SyntaxTheme {
    fn default() -> Self {
        Self::jinja_dark()
    }
}

impl SyntaxTheme {
    pub fn jinja_dark() -> Self {
        Self {
            text_color: Color32::from_rgb(212, 212, 212),
            comment_color: Color32::from_rgb(106, 153, 85),
            expression_delimiter_color: Color32::from_rgb(255, 0, 255), // Magenta
            statement_delimiter_color: Color32::from_rgb(255, 0, 255),
            raw_delimiter_color: Color32::from_rgb(197, 134, 192),
            filter_color: Color32::from_rgb(220, 220, 170),
            type_color: Color32::from_rgb(78, 201, 176),
            variable_color: Color32::from_rgb(156, 220, 254),
            string_color: Color32::from_rgb(206, 145, 120),
            number_color: Color32::from_rgb(181, 206, 168),
            operator_color: Color32::from_rgb(212, 212, 212),
            delimiter_color: Color32::from_rgb(255, 215, 0),
            invalid_color: Color32::from_rgb(244, 71, 71),
            depth_colors: [
                Color32::from_rgb(86, 156, 214),  // Blue
                Color32::from_rgb(197, 134, 192), // Purple
                Color32::from_rgb(78, 201, 176),  // Teal
                Color32::from_rgb(255, 180, 100), // Orange
                Color32::from_rgb(220, 220, 170), // Pale yellow
                Color32::from_rgb(244, 135, 113), // Salmon
            ],
        }
    }
}

pub struct Highlighter {
    theme: SyntaxTheme,
    tokenizer: Tokenizer<'static>,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new(SyntaxTheme::default())
    }
}

impl Highlighter {
    pub fn new(theme: SyntaxTheme) -> Self {
        Self {
            theme,
            tokenizer: Tokenizer::new(&JINJA2),
        }
    }

    pub fn theme(&self) -> &SyntaxTheme {
        &self.theme
    }

    fn depth_color(&self, depth: u8) -> Color32 {
        self.theme.depth_colors[(depth as usize).min(MAX_DEPTH as usize)]
    }

    pub fn color_for(&self, token: &Token, language: PaneLanguage) -> Color32 {
        let theme = &self.theme;
        match token.kind {
            TokenKind::Text | TokenKind::Whitespace => theme.text_color,
            TokenKind::Comment => theme.comment_color,
            TokenKind::ExpressionDelimiter => theme.expression_delimiter_color,
            TokenKind::StatementDelimiter => theme.statement_delimiter_color,
            TokenKind::RawDelimiter => theme.raw_delimiter_color,
            TokenKind::Keyword => self.depth_color(token.depth),
            TokenKind::Filter => theme.filter_color,
            TokenKind::TypeIdentifier => theme.type_color,
            TokenKind::Variable => theme.variable_color,
            TokenKind::String => theme.string_color,
            TokenKind::Number => theme.number_color,
            TokenKind::Operator => theme.operator_color,
            TokenKind::Delimiter if language == PaneLanguage::Json => self.depth_color(token.depth),
            TokenKind::Delimiter => theme.delimiter_color,
            TokenKind::Invalid => theme.invalid_color,
        }
    }

    pub fn tokens(&self, text: &str, language: PaneLanguage) -> Vec<Token> {
        match language {
            PaneLanguage::Template => self.tokenizer.tokenize(text),
            PaneLanguage::Json => self.tokenizer.tokenize_expression(text),
            PaneLanguage::Plain => Vec::new(),
        }
    }

    /// Coloured layout for `text`, one section per token.
    pub fn layout_job(&self, text: &str, language: PaneLanguage, font: FontId) -> LayoutJob {
        let mut job = LayoutJob::default();
        let tokens = self.tokens(text, language);

        if tokens.is_empty() {
            job.append(text, 0.0, TextFormat::simple(font, self.theme.text_color));
            return job;
        }

        for token in &tokens {
            let color = self.color_for(token, language);
            job.append(token.text(text), 0.0, TextFormat::simple(font.clone(), color));
        }
        job
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section_texts(job: &LayoutJob) -> Vec<&str> {
        job.sections.iter().map(|s| &job.text[s.byte_range.clone()]).collect()
    }

    #[test]
    fn test_layout_keeps_text_intact() {
        let highlighter = Highlighter::default();
        let text = "Hello {{ name | upper }}\n{% if x %}ok{% endif %}";
        let job = highlighter.layout_job(text, PaneLanguage::Template, FontId::monospace(13.0));
        assert_eq!(job.text, text);
        assert!(job.sections.len() > 5);
    }

    #[test]
    fn test_delimiters_are_magenta() {
        let highlighter = Highlighter::default();
        let job = highlighter.layout_job("{{ x }}", PaneLanguage::Template, FontId::monospace(13.0));
        assert_eq!(section_texts(&job)[0], "{{");
        assert_eq!(job.sections[0].format.color, Color32::from_rgb(255, 0, 255));
    }

    #[test]
    fn test_keyword_colour_follows_depth() {
        let highlighter = Highlighter::default();
        let text = "{% for a in b %}{% if a %}{% endif %}{% endfor %}";
        let tokens = highlighter.tokens(text, PaneLanguage::Template);
        let color_of = |word: &str| {
            let token = tokens.iter().find(|t| t.text(text) == word).unwrap();
            highlighter.color_for(token, PaneLanguage::Template)
        };
        let theme = highlighter.theme();
        assert_eq!(color_of("for"), theme.depth_colors[0]);
        assert_eq!(color_of("if"), theme.depth_colors[1]);
        assert_eq!(color_of("endif"), theme.depth_colors[1]);
        assert_eq!(color_of("endfor"), theme.depth_colors[0]);
    }

    #[test]
    fn test_plain_text_is_one_section() {
        let highlighter = Highlighter::default();
        let job = highlighter.layout_job("x > 5 and y < 30", PaneLanguage::Plain, FontId::monospace(13.0));
        assert_eq!(job.sections.len(), 1);
        assert_eq!(job.text, "x > 5 and y < 30");
    }

    #[test]
    fn test_json_brackets_use_depth_ramp() {
        let highlighter = Highlighter::default();
        let text = r#"{"a": [1]}"#;
        let job = highlighter.layout_job(text, PaneLanguage::Json, FontId::monospace(13.0));
        let theme = highlighter.theme();
        let color_of = |needle: &str| {
            let idx = section_texts(&job).iter().position(|s| *s == needle).unwrap();
            job.sections[idx].format.color
        };
        assert_eq!(color_of("{"), theme.depth_colors[0]);
        assert_eq!(color_of("["), theme.depth_colors[1]);
    }
}
