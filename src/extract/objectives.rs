//! Learning-objective parsing.

use std::sync::OnceLock;

use regex::Regex;

const OBJECTIVE_VERBS: &[&str] = &[
    "identificar",
    "descrever",
    "analisar",
    "avaliar",
    "compreender",
    "identify",
    "describe",
    "analyze",
    "evaluate",
    "understand",
];

fn objective_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^[\s\-*]*obj(?:etivo|ective)?\.?\s*(\d+)\s*[:.)]\s*").expect("objective regex")
    })
}

/// Parse an objectives text into `"Obj.N: text"` lines.
///
/// Numbered entries (`Obj.1:`, `Objetivo 2.`, `Objective 3)`) may span
/// several lines. Without any, lines carrying an objective verb are taken in
/// order and numbered from 1.
pub fn parse_objectives(text: &str) -> Vec<String> {
    let headers: Vec<(usize, usize, String)> = objective_header()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.start(), whole.end(), caps.get(1)?.as_str().to_string()))
        })
        .collect();

    if !headers.is_empty() {
        return headers
            .iter()
            .enumerate()
            .map(|(i, (_, start, number))| {
                let end = headers.get(i + 1).map(|h| h.0).unwrap_or(text.len());
                let content = text[*start..end]
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("Obj.{}: {}", number, content)
            })
            .collect();
    }

    text.lines()
        .map(str::trim)
        .filter(|line| {
            let lower = line.to_lowercase();
            OBJECTIVE_VERBS.iter().any(|verb| lower.contains(verb))
        })
        .enumerate()
        .map(|(i, line)| format!("Obj.{}: {}", i + 1, line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_objectives() {
        let text = "Obj.1: Identificar as etapas do ciclo da água.\nObj.2: Descrever a condensação\n  em nuvens.\nObjetivo 3) Avaliar impactos.";
        assert_eq!(
            parse_objectives(text),
            vec![
                "Obj.1: Identificar as etapas do ciclo da água.",
                "Obj.2: Descrever a condensação em nuvens.",
                "Obj.3: Avaliar impactos.",
            ]
        );
    }

    #[test]
    fn test_bulleted_objectives() {
        let text = "- Obj 4: Analyze erosion\n* Obj.5. Understand runoff";
        assert_eq!(
            parse_objectives(text),
            vec!["Obj.4: Analyze erosion", "Obj.5: Understand runoff"]
        );
    }

    #[test]
    fn test_verb_fallback() {
        let text = "Objetivos do curso\nCompreender o ciclo da água\nLer o capítulo 2\nAnalisar gráficos de chuva";
        assert_eq!(
            parse_objectives(text),
            vec![
                "Obj.1: Compreender o ciclo da água",
                "Obj.2: Analisar gráficos de chuva",
            ]
        );
    }

    #[test]
    fn test_nothing_parseable() {
        assert!(parse_objectives("   \n").is_empty());
        assert!(parse_objectives("Ler o capítulo").is_empty());
    }
}
