use crate::draft::OutputFormat;

/// What ends up in the output pane, plus the text the path query runs
/// against (absent when formatting failed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedOutput {
    pub text: String,
    pub query_source: Option<String>,
}

pub fn format_output(raw: &str, format: OutputFormat) -> FormattedOutput {
    match format {
        OutputFormat::Json => match pretty_json(raw) {
            Ok(pretty) => FormattedOutput {
                text: pretty.clone(),
                query_source: Some(pretty),
            },
            Err(e) => FormattedOutput {
                text: format!("// Template error\n{}\n\n{}", e, raw),
                query_source: None,
            },
        },
        OutputFormat::Text => {
            let decoded = decode_unicode_escapes(raw);
            FormattedOutput {
                text: decoded.clone(),
                query_source: Some(decoded),
            }
        }
    }
}

/// Re-serialize JSON with a two-space indent, keeping key order.
pub fn pretty_json(raw: &str) -> Result<String, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    serde_json::to_string_pretty(&value)
}

/// Replace literal `\uXXXX` sequences with the characters they encode.
/// Surrogate pairs are combined; a lone surrogate is left as written.
pub fn decode_unicode_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find("\\u") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        let Some(unit) = parse_unit(tail) else {
            out.push_str("\\u");
            rest = &tail[2..];
            continue;
        };

        if (0xD800..0xDC00).contains(&unit) {
            if let Some(low) = parse_unit(&tail[6..]).filter(|u| (0xDC00..0xE000).contains(u)) {
                let code = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                if let Some(ch) = char::from_u32(code) {
                    out.push(ch);
                    rest = &tail[12..];
                    continue;
                }
            }
            out.push_str(&tail[..6]);
        } else {
            match char::from_u32(unit) {
                Some(ch) => out.push(ch),
                None => out.push_str(&tail[..6]),
            }
        }
        rest = &tail[6..];
    }

    out.push_str(rest);
    out
}

/// Parse `\uXXXX` at the start of `s`.
fn parse_unit(s: &str) -> Option<u32> {
    let hex = s.strip_prefix("\\u")?.get(..4)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_pretty_print_two_spaces() {
        let out = format_output("{\"a\":1}", OutputFormat::Json);
        assert_eq!(out.text, "{\n  \"a\": 1\n}");
        assert_eq!(out.query_source.as_deref(), Some("{\n  \"a\": 1\n}"));
    }

    #[test]
    fn test_json_keeps_key_order() {
        let out = format_output(r#"{"z":1,"a":2}"#, OutputFormat::Json);
        assert!(out.text.find("\"z\"").unwrap() < out.text.find("\"a\"").unwrap());
    }

    #[test]
    fn test_json_failure_is_prefixed_to_raw() {
        let out = format_output("not json", OutputFormat::Json);
        assert!(out.text.starts_with("// Template error\n"));
        assert!(out.text.ends_with("\n\nnot json"));
        assert!(out.query_source.is_none());
    }

    #[test]
    fn test_text_decodes_escapes() {
        let out = format_output("say \\u0041\\u0042!", OutputFormat::Text);
        assert_eq!(out.text, "say AB!");
    }

    #[test]
    fn test_decode_cyrillic_and_surrogate_pair() {
        assert_eq!(decode_unicode_escapes("\\u041f\\u0440\\u0438"), "При");
        assert_eq!(decode_unicode_escapes("\\ud83d\\ude00"), "😀");
    }

    #[test]
    fn test_decode_leaves_malformed_sequences() {
        assert_eq!(decode_unicode_escapes("\\u12"), "\\u12");
        assert_eq!(decode_unicode_escapes("\\uZZZZ x"), "\\uZZZZ x");
        assert_eq!(decode_unicode_escapes("\\ud83d alone"), "\\ud83d alone");
        assert_eq!(decode_unicode_escapes("no escapes"), "no escapes");
    }
}
