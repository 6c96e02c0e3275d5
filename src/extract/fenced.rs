//! Fenced-block and brace-span strategies.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::ExtractionStrategy;

/// A Markdown code fence: its language hint and raw body.
#[derive(Debug, Clone, PartialEq)]
pub struct FencedBlock<'a> {
    pub tag: &'a str,
    pub body: &'a str,
}

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```([A-Za-z0-9_+-]*)([\s\S]*?)```").expect("fence regex"))
}

/// Every fenced block in document order.
pub fn fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    fence_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            Some(FencedBlock {
                tag: caps.get(1)?.as_str(),
                body: caps.get(2)?.as_str(),
            })
        })
        .collect()
}

fn parse_container(body: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(body.trim()) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

/// Longest `json` or untagged fence whose body parses as an object or array.
pub struct FencedBlockStrategy;

impl ExtractionStrategy for FencedBlockStrategy {
    fn name(&self) -> &'static str {
        "fenced_block"
    }

    fn extract(&self, text: &str) -> Option<Value> {
        let mut candidates: Vec<&str> = fenced_blocks(text)
            .into_iter()
            .filter(|block| block.tag.is_empty() || block.tag.eq_ignore_ascii_case("json"))
            .map(|block| block.body.trim())
            .filter(|body| !body.is_empty())
            .collect();
        // stable: equal lengths keep document order
        candidates.sort_by(|a, b| b.len().cmp(&a.len()));
        candidates.into_iter().find_map(parse_container)
    }
}

/// Everything from the first `{` to the last `}`.
pub struct BraceSpanStrategy;

impl ExtractionStrategy for BraceSpanStrategy {
    fn name(&self) -> &'static str {
        "brace_span"
    }

    fn extract(&self, text: &str) -> Option<Value> {
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        if end <= start {
            return None;
        }
        parse_container(&text[start..=end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_blocks_capture_tag_and_body() {
        let text = "intro\n```markdown\n# Title\n```\n```json\n[1]\n```\n```\n{}\n```";
        let blocks = fenced_blocks(text);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].tag, "markdown");
        assert_eq!(blocks[1].tag, "json");
        assert_eq!(blocks[1].body.trim(), "[1]");
        assert_eq!(blocks[2].tag, "");
    }

    #[test]
    fn test_other_tags_are_ignored() {
        let text = "```markdown\n{\"a\": 1, \"long\": \"ignored block\"}\n```\n```JSON\n{\"b\": 2}\n```";
        assert_eq!(FencedBlockStrategy.extract(text), Some(json!({"b": 2})));
    }

    #[test]
    fn test_longest_valid_body_wins() {
        let text = "```json\n{\"broken\": \"a long unterminated value\n```\n```json\n{\"ok\": true}\n```";
        // the longer block is malformed, so the shorter one is used
        assert_eq!(FencedBlockStrategy.extract(text), Some(json!({"ok": true})));
    }

    #[test]
    fn test_scalars_do_not_count() {
        assert_eq!(FencedBlockStrategy.extract("```json\n42\n```"), None);
        assert_eq!(BraceSpanStrategy.extract("} backwards {"), None);
    }

    #[test]
    fn test_brace_span_ignores_surrounding_prose() {
        let text = "Claro! Aqui está: {\"objective_id\": \"Obj.1\"} Espero ter ajudado.";
        assert_eq!(
            BraceSpanStrategy.extract(text),
            Some(json!({"objective_id": "Obj.1"}))
        );
    }
}
