use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BLOCK_TAG: Regex =
        Regex::new(r"\{%-?\s*(end)?(if|for|macro|block|filter|call|raw|autoescape)\b")
            .expect("block tag pattern is valid");
}

/// Lines `start_line..=end_line` (0-based) can be collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldingRange {
    pub start_line: usize,
    pub end_line: usize,
}

/// Regions between a block tag and its matching `end` tag on a later line.
/// An end tag with no open block of its kind is ignored.
pub fn folding_ranges(text: &str) -> Vec<FoldingRange> {
    let mut open: Vec<(&str, usize)> = Vec::new();
    let mut ranges = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        for caps in BLOCK_TAG.captures_iter(line) {
            let Some(kind) = caps.get(2).map(|m| m.as_str()) else {
                continue;
            };

            if caps.get(1).is_none() {
                open.push((kind, line_no));
                continue;
            }

            // Blocks opened inside this one and never closed are dropped.
            if let Some(idx) = open.iter().rposition(|(k, _)| *k == kind) {
                let (_, start_line) = open[idx];
                open.truncate(idx);
                if line_no > start_line {
                    ranges.push(FoldingRange {
                        start_line,
                        end_line: line_no,
                    });
                }
            }
        }
    }

    ranges.sort_by_key(|r| (r.start_line, r.end_line));
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(text: &str) -> Vec<(usize, usize)> {
        folding_ranges(text)
            .into_iter()
            .map(|r| (r.start_line, r.end_line))
            .collect()
    }

    #[test]
    fn test_nested_blocks() {
        let text = "\
{% for item in items %}
  {%- if item.ok %}
    {{ item }}
  {%- endif %}
{% endfor %}";
        assert_eq!(pairs(text), vec![(0, 4), (1, 3)]);
    }

    #[test]
    fn test_unmatched_end_is_discarded() {
        let text = "{% endif %}\n{% if a %}\nx\n{% endif %}\n{% endfor %}";
        assert_eq!(pairs(text), vec![(1, 3)]);
    }

    #[test]
    fn test_single_line_block_does_not_fold() {
        assert!(pairs("{% if a %}yes{% endif %}").is_empty());
    }

    #[test]
    fn test_end_closes_matching_kind() {
        // The unclosed `if` inside the `for` is dropped when the `for` ends.
        let text = "{% for x in y %}\n{% if x %}\n{% endfor %}\n{% endif %}";
        assert_eq!(pairs(text), vec![(0, 2)]);
    }

    #[test]
    fn test_non_block_tags_ignored() {
        assert!(pairs("{% set x = 1 %}\n{% include 'a' %}\n{% endset %}").is_empty());
        // `format` starts with `for` but is not a block keyword.
        assert!(pairs("{% format %}\n{% endfor %}").is_empty());
    }
}
