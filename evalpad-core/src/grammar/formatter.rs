use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

lazy_static! {
    static ref TEMPLATE_TAG: Regex = Regex::new(r"\{\{.*?\}\}|\{%(?s:.*?)%\}").expect("tag pattern is valid");
    static ref END_TAG: Regex = Regex::new(r"^\{%-?\s*end\w+").expect("end tag pattern is valid");
    static ref OPEN_TAG: Regex =
        Regex::new(r"^\{%-?\s*(if|for|block|macro|filter|call|raw|autoescape)\b").expect("open tag pattern is valid");
    static ref ANY_END: Regex = Regex::new(r"end\w+").expect("end word pattern is valid");
}

/// Reformat a template that produces JSON.
///
/// Literal text between template tags that parses as a JSON object or
/// array is pretty-printed with `indent` spaces on lines of its own.
/// Multi-line tags have their lines trimmed and re-indented by block
/// nesting within the tag. Everything else is left untouched.
pub fn format_document(text: &str, indent: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for tag in TEMPLATE_TAG.find_iter(text) {
        if tag.start() > last {
            out.push_str(&format_literal(&text[last..tag.start()], indent));
        }
        out.push_str(&format_tag(tag.as_str(), indent));
        last = tag.end();
    }
    if last < text.len() {
        out.push_str(&format_literal(&text[last..], indent));
    }

    out
}

fn format_literal(segment: &str, indent: usize) -> String {
    let trimmed = segment.trim();
    if trimmed.is_empty() {
        return segment.to_string();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => match pretty_with_indent(&value, indent) {
            Some(pretty) => format!("\n{}\n", pretty),
            None => segment.to_string(),
        },
        _ => segment.to_string(),
    }
}

fn format_tag(tag: &str, indent: usize) -> String {
    if !tag.contains('\n') {
        return tag.to_string();
    }

    let mut level = 0usize;
    tag.split('\n')
        .map(|line| {
            let trimmed = line.trim();
            if END_TAG.is_match(trimmed) {
                level = level.saturating_sub(1);
            }
            let formatted = format!("{}{}", " ".repeat(level * indent), trimmed);
            if OPEN_TAG.is_match(trimmed) && !ANY_END.is_match(trimmed) {
                level += 1;
            }
            formatted
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn pretty_with_indent(value: &Value, indent: usize) -> Option<String> {
    if indent == 0 {
        return serde_json::to_string(value).ok();
    }
    let indent = vec![b' '; indent];
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(&indent));
    value.serialize(&mut ser).ok()?;
    String::from_utf8(buf).ok()
}
