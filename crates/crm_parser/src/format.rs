//! C1: pre-parse normalization of v0 recipe text.

use regex::Regex;
use std::sync::OnceLock;

use crate::schema::SchemaVersion;

pub struct FormatResult {
    pub text: String,
    pub top_of_file_comment_count: usize,
}

/// Runs the v0 text formatter. v1 text is passed through unchanged — the structural grammar
/// has no excessive-indentation or comment-alignment ambiguity to fix.
pub fn format_text(text: &str) -> FormatResult {
    if SchemaVersion::detect(text) == SchemaVersion::V1 {
        return FormatResult {
            top_of_file_comment_count: count_top_of_file_comments(text),
            text: text.to_string(),
        };
    }

    let fixed = fix_excessive_indentation(text);
    let aligned = align_comments(&fixed);
    let retabbed = align_list_bodies_to_headers(&aligned);
    FormatResult {
        top_of_file_comment_count: count_top_of_file_comments(&retabbed),
        text: retabbed,
    }
}

fn count_top_of_file_comments(text: &str) -> usize {
    text.lines().take_while(|l| l.trim_start().starts_with('#') || l.trim().is_empty()).filter(|l| l.trim_start().starts_with('#')).count()
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Clamps each non-blank line's indentation to `parent_indent + 2`, iterating to a fixpoint.
/// A line that dedents past every entry on the parent stack leaves the pass untouched for that
/// line (the original text is kept) rather than panicking — matching the "abandon formatting
/// for that pass" escape hatch.
fn fix_excessive_indentation(text: &str) -> String {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();

    for _pass in 0..lines.len().max(1) {
        let mut changed = false;
        // Stack of (indent, is_list_dash) for ancestor lines.
        let mut stack: Vec<usize> = Vec::new();

        for i in 0..lines.len() {
            let line = &lines[i];
            if is_blank(line) || is_comment(line) {
                continue;
            }
            let indent = indent_of(line);

            while let Some(&top) = stack.last() {
                if indent <= top {
                    stack.pop();
                } else {
                    break;
                }
            }

            let parent_indent = stack.last().copied();
            if let Some(parent) = parent_indent {
                let expected = parent + 2;
                if indent > expected {
                    let content = line.trim_start_matches(' ').to_string();
                    lines[i] = format!("{}{}", " ".repeat(expected), content);
                    changed = true;
                }
            }

            let new_indent = indent_of(&lines[i]);
            stack.push(new_indent);
        }

        if !changed {
            break;
        }
    }

    lines.join("\n") + if text.ends_with('\n') { "\n" } else { "" }
}

/// A "comment block" is a run of consecutive full-line comments; the whole run is re-indented
/// to match the first following non-blank, non-comment line.
fn align_comments(text: &str) -> String {
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    let mut out = lines.clone();
    let mut i = 0;
    while i < lines.len() {
        if is_comment(&lines[i]) {
            let start = i;
            let mut end = i;
            while end < lines.len() && is_comment(&lines[end]) {
                end += 1;
            }
            // Find the next non-blank, non-comment line for target indent.
            let mut target = None;
            let mut j = end;
            while j < lines.len() {
                if !is_blank(&lines[j]) && !is_comment(&lines[j]) {
                    target = Some(indent_of(&lines[j]));
                    break;
                }
                j += 1;
            }
            if let Some(target_indent) = target {
                for k in start..end {
                    let content = lines[k].trim_start_matches(' ').to_string();
                    out[k] = format!("{}{}", " ".repeat(target_indent), content);
                }
            }
            i = end;
        } else {
            i += 1;
        }
    }
    out.join("\n") + if text.ends_with('\n') { "\n" } else { "" }
}

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^[A-Za-z0-9_"']+:\s*$"#).unwrap())
}

/// When a section-header key is immediately followed by an under-indented list, retabs the
/// list items to `header_indent + 2` until a non-`-`-led line ends the list.
fn align_list_bodies_to_headers(text: &str) -> String {
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    let mut out = lines.clone();
    for i in 0..lines.len() {
        let trimmed = lines[i].trim_start();
        if !header_re().is_match(trimmed) {
            continue;
        }
        let header_indent = indent_of(&lines[i]);
        let mut j = i + 1;
        while j < lines.len() {
            if is_blank(&lines[j]) {
                j += 1;
                continue;
            }
            let content = lines[j].trim_start();
            if !content.starts_with('-') {
                break;
            }
            let cur_indent = indent_of(&lines[j]);
            if cur_indent <= header_indent {
                let retabbed = header_indent + 2;
                out[j] = format!("{}{}", " ".repeat(retabbed), content);
            }
            j += 1;
        }
    }
    out.join("\n") + if text.ends_with('\n') { "\n" } else { "" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_excessive_indentation_to_parent_plus_two() {
        let input = "build:\n      number: 0\n";
        let result = format_text(input);
        assert_eq!(result.text, "build:\n  number: 0\n");
    }

    #[test]
    fn v1_text_is_passed_through_unchanged() {
        let input = "schema_version: 1\nbuild:\n      number: 0\n";
        let result = format_text(input);
        assert_eq!(result.text, input);
    }

    #[test]
    fn aligns_under_indented_list_to_its_header() {
        let input = "requirements:\nhost:\n- python\n- pip\nbuild:\n";
        let out = align_list_bodies_to_headers(input);
        assert!(out.contains("  - python"));
    }
}
