//! Locating labeled Markdown sections in a response.

use super::fenced::fenced_blocks;

pub const DEVELOPMENT_REPORT_HEADINGS: &[&str] =
    &["Relatório de Desenvolvimento", "Development Report"];

pub const VALIDATED_QUESTIONS_HEADINGS: &[&str] = &["Questões Validadas", "Validated Questions"];

/// Headings that end a section found by the line-prefix fallback.
const KNOWN_HEADINGS: &[&[&str]] = &[DEVELOPMENT_REPORT_HEADINGS, VALIDATED_QUESTIONS_HEADINGS];

const MAX_HEADING_LEVEL: usize = 6;

/// Title of an ATX heading (`#` to `######`), or `None` for other lines.
fn heading_title(line: &str) -> Option<&str> {
    let line = line.trim_start();
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > MAX_HEADING_LEVEL {
        return None;
    }
    Some(line[level..].trim())
}

fn title_matches(title: &str, headings: &[&str]) -> bool {
    let title = title.to_lowercase();
    headings
        .iter()
        .any(|heading| title.starts_with(&heading.to_lowercase()))
}

/// Find a section by its heading title, at any heading level.
///
/// Fenced blocks are searched first: the first one whose trimmed body starts
/// with one of the headings is returned whole. Otherwise the text is scanned
/// for a heading line with the title; the section then runs to the next
/// known heading or the end of the text.
pub fn find_labeled_section(text: &str, headings: &[&str]) -> Option<String> {
    for block in fenced_blocks(text) {
        let body = block.body.trim();
        let first_line = body.lines().next().unwrap_or_default();
        if heading_title(first_line).is_some_and(|title| title_matches(title, headings)) {
            return Some(body.to_string());
        }
    }

    let mut offset = 0;
    let mut start = None;
    let mut end = text.len();
    for line in text.split_inclusive('\n') {
        if let Some(title) = heading_title(line) {
            match start {
                None if title_matches(title, headings) => start = Some(offset),
                Some(_)
                    if KNOWN_HEADINGS
                        .iter()
                        .any(|known| title_matches(title, known)) =>
                {
                    end = offset;
                    break;
                }
                _ => {}
            }
        }
        offset += line.len();
    }

    let section = text[start?..end].trim();
    let section = section.strip_suffix("```").unwrap_or(section).trim_end();
    Some(section.to_string())
}

/// The validator's development report section.
pub fn development_report(text: &str) -> Option<String> {
    find_labeled_section(text, DEVELOPMENT_REPORT_HEADINGS)
}

/// The validator's final document section.
pub fn validated_questions(text: &str) -> Option<String> {
    find_labeled_section(text, VALIDATED_QUESTIONS_HEADINGS)
}
