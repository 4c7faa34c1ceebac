//! Wikilink extraction.
//!
//! # Responsibility
//! - Find `[[Target]]` / `[[Target|Alias]]` spans in note text.
//! - Derive link targets and the character intervals of each raw occurrence.
//!
//! # Invariants
//! - Link bodies never contain `[`, `]` or a newline; nested brackets do not match.
//! - Intervals are character offsets, not byte offsets.
//! - Both functions are pure and deterministic.

use crate::model::note::LinkInterval;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static WIKILINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\[\]\n]+)\]\]").expect("valid wikilink regex"));

/// Returns link targets in first-occurrence order, deduplicated by exact match.
///
/// Rules:
/// - an `|alias` suffix is stripped;
/// - surrounding whitespace is trimmed;
/// - empty targets are dropped.
pub fn extract_link_targets(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for caps in WIKILINK_RE.captures_iter(text) {
        let Some(body) = caps.get(1) else {
            continue;
        };
        let target = strip_alias(body.as_str());
        if target.is_empty() || !seen.insert(target) {
            continue;
        }
        targets.push(target.to_string());
    }
    targets
}

/// Same as [`extract_link_targets`] for nullable note bodies.
pub fn extract_link_targets_opt(text: Option<&str>) -> Vec<String> {
    text.map(extract_link_targets).unwrap_or_default()
}

/// Returns one interval per raw `[[...]]` occurrence, delimiters included.
pub fn extract_link_intervals(text: &str) -> Vec<LinkInterval> {
    let mut intervals = Vec::new();
    let mut byte_cursor = 0;
    let mut char_cursor = 0;
    for found in WIKILINK_RE.find_iter(text) {
        char_cursor += text[byte_cursor..found.start()].chars().count();
        let start = char_cursor;
        char_cursor += found.as_str().chars().count();
        byte_cursor = found.end();
        intervals.push(LinkInterval::new(start, char_cursor));
    }
    intervals
}

fn strip_alias(body: &str) -> &str {
    let trimmed = body.trim();
    match trimmed.split_once('|') {
        Some((target, _alias)) => target.trim(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_link_intervals, extract_link_targets, extract_link_targets_opt};
    use crate::model::note::LinkInterval;

    #[test]
    fn targets_are_deduplicated_and_alias_stripped() {
        let targets = extract_link_targets("[[Apple]] and [[Banana|fruit]] and [[Apple]]");
        assert_eq!(targets, vec!["Apple".to_string(), "Banana".to_string()]);
    }

    #[test]
    fn targets_are_trimmed() {
        let targets = extract_link_targets("see [[  Child | alias ]] and [[ Child]]");
        assert_eq!(targets, vec!["Child".to_string()]);
    }

    #[test]
    fn nested_or_multiline_brackets_do_not_match() {
        assert!(extract_link_targets("[[a\nb]]").is_empty());
        assert_eq!(extract_link_targets("[[[Inner]]]"), vec!["Inner".to_string()]);
        assert!(extract_link_targets("[[ | alias]]").is_empty());
    }

    #[test]
    fn empty_and_missing_text_yield_nothing() {
        assert!(extract_link_targets("").is_empty());
        assert!(extract_link_targets_opt(None).is_empty());
        assert!(extract_link_intervals("").is_empty());
    }

    #[test]
    fn intervals_cover_every_raw_occurrence() {
        let text = "[[Apple]] and [[Banana|fruit]] and [[Apple]]";
        let intervals = extract_link_intervals(text);
        assert_eq!(
            intervals,
            vec![
                LinkInterval::new(0, 9),
                LinkInterval::new(14, 30),
                LinkInterval::new(35, 44),
            ]
        );
        let chars: Vec<char> = text.chars().collect();
        for interval in intervals {
            let span: String = chars[interval.start..interval.end].iter().collect();
            assert!(span.starts_with("[[") && span.ends_with("]]"));
        }
    }

    #[test]
    fn intervals_use_character_offsets() {
        let intervals = extract_link_intervals("héllo [[Ünï]]");
        assert_eq!(intervals, vec![LinkInterval::new(6, 13)]);
    }
}
