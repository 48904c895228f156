//! Suppression file parsing and matching.
//!
//! Line-oriented `{`/`}`-delimited records, a `tool1,tool2,...:kind` second
//! line, and up to [`MAX_SUPP_CALLERS`] `fun:`/`obj:` lines, matched
//! innermost-outward. The glob matcher is hand-rolled rather than pulling
//! in an external crate for it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::kind::ErrorKind;

/// Maximum caller patterns a single suppression may carry.
pub const MAX_SUPP_CALLERS: usize = 24;

/// Which frame-name field a caller pattern matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerPatternKind {
    Fun,
    Obj,
}

/// A single `fun:glob` or `obj:glob` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerPattern {
    pub kind: CallerPatternKind,
    pub glob: String,
}

/// A parsed suppression record. `counter` increments every time an error
/// matches; it is reported in the run-end summary.
#[derive(Debug)]
pub struct Suppression {
    pub name: String,
    pub tool_list: Vec<String>,
    pub kind: String,
    pub extra: Option<String>,
    pub callers: Vec<CallerPattern>,
    pub counter: AtomicU64,
}

impl Clone for Suppression {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tool_list: self.tool_list.clone(),
            kind: self.kind.clone(),
            extra: self.extra.clone(),
            callers: self.callers.clone(),
            counter: AtomicU64::new(self.counter.load(Ordering::Relaxed)),
        }
    }
}

/// Error raised while parsing a suppression file.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SuppressionParseError {
    #[error("record {0}: expected '{{' to open a suppression")]
    MissingOpenBrace(usize),
    #[error("record {0}: missing suppression name line")]
    MissingName(usize),
    #[error("record {0}: kind line must have the form 'tool1,tool2,...:kind'")]
    MalformedKindLine(usize),
    #[error("record {0}: caller line must start with 'fun:' or 'obj:'")]
    MalformedCallerLine(usize),
    #[error("record {0}: unterminated suppression (missing closing '}}')")]
    UnterminatedRecord(usize),
    #[error("record {0}: more than {MAX_SUPP_CALLERS} caller patterns")]
    TooManyCallers(usize),
}

/// Parse a suppression file's full text into an ordered list of records, in
/// the order they appear in the file. Blank lines and `#`-comments between
/// records are skipped.
pub fn parse_suppressions(text: &str, running_tool: &str) -> Result<Vec<Suppression>, SuppressionParseError> {
    let mut lines = text.lines().peekable();
    let mut out = Vec::new();
    let mut record_no = 0usize;

    while lines.peek().is_some() {
        let Some(line) = next_significant(&mut lines) else {
            break;
        };
        record_no += 1;
        if line.trim() != "{" {
            return Err(SuppressionParseError::MissingOpenBrace(record_no));
        }

        let name = next_significant(&mut lines).ok_or(SuppressionParseError::MissingName(record_no))?;

        let kind_line =
            next_significant(&mut lines).ok_or(SuppressionParseError::MalformedKindLine(record_no))?;
        let (tool_list, kind) = kind_line
            .split_once(':')
            .ok_or(SuppressionParseError::MalformedKindLine(record_no))?;
        let tool_list: Vec<String> = tool_list.split(',').map(|s| s.trim().to_string()).collect();
        if !tool_list.iter().any(|t| t == running_tool || t == "core") {
            // Suppression is for a different tool; skip its caller lines and
            // don't record it, mirroring `load_one_suppressions_file`'s
            // "ignore rest of suppression" branch.
            skip_to_close_brace(&mut lines);
            continue;
        }

        let mut callers = Vec::new();
        loop {
            let Some(raw) = next_significant(&mut lines) else {
                return Err(SuppressionParseError::UnterminatedRecord(record_no));
            };
            if raw.trim() == "}" {
                break;
            }
            let raw = raw.trim();
            let (kind, glob) = if let Some(g) = raw.strip_prefix("fun:") {
                (CallerPatternKind::Fun, g)
            } else if let Some(g) = raw.strip_prefix("obj:") {
                (CallerPatternKind::Obj, g)
            } else {
                return Err(SuppressionParseError::MalformedCallerLine(record_no));
            };
            if callers.len() >= MAX_SUPP_CALLERS {
                return Err(SuppressionParseError::TooManyCallers(record_no));
            }
            callers.push(CallerPattern { kind, glob: glob.to_string() });
        }

        out.push(Suppression {
            name: name.trim().to_string(),
            tool_list,
            kind: kind.trim().to_string(),
            extra: None,
            callers,
            counter: AtomicU64::new(0),
        });
    }

    Ok(out)
}

fn next_significant<'a>(lines: &mut std::iter::Peekable<std::str::Lines<'a>>) -> Option<&'a str> {
    for line in lines.by_ref() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        return Some(line);
    }
    None
}

fn skip_to_close_brace(lines: &mut std::iter::Peekable<std::str::Lines<'_>>) {
    for line in lines.by_ref() {
        if line.trim() == "}" {
            break;
        }
    }
}

/// A resolved stack frame, as presented to the matcher: innermost caller
/// first, matching the fingerprint's frame order.
#[derive(Debug, Clone)]
pub struct FrameName {
    pub fun: Option<String>,
    pub obj: Option<String>,
}

/// Glob supporting `*`, `?`, and `\`-escape, matched over the whole string
/// (not a substring search).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = unescape(pattern).collect();
    let txt: Vec<char> = text.chars().collect();
    glob_match_rec(&pat, &txt)
}

fn unescape(pattern: &str) -> impl Iterator<Item = char> + '_ {
    let mut chars = pattern.chars().peekable();
    std::iter::from_fn(move || match chars.next() {
        Some('\\') => chars.next(),
        other => other,
    })
}

fn glob_match_rec(pat: &[char], txt: &[char]) -> bool {
    match pat.first() {
        None => txt.is_empty(),
        Some('*') => glob_match_rec(&pat[1..], txt) || (!txt.is_empty() && glob_match_rec(pat, &txt[1..])),
        Some('?') => !txt.is_empty() && glob_match_rec(&pat[1..], &txt[1..]),
        Some(c) => !txt.is_empty() && txt[0] == *c && glob_match_rec(&pat[1..], &txt[1..]),
    }
}

/// Does suppression `su` match an error of kind `err_kind` with the given
/// innermost-to-outermost resolved call chain? On match, increments `su`'s
/// counter.
pub fn matches(su: &Suppression, err_kind: &ErrorKind, frames: &[FrameName]) -> bool {
    if su.kind != err_kind.suppression_key() {
        return false;
    }
    if su.callers.len() > frames.len() {
        return false;
    }
    for (pattern, frame) in su.callers.iter().zip(frames.iter()) {
        let candidate = match pattern.kind {
            CallerPatternKind::Fun => frame.fun.as_deref(),
            CallerPatternKind::Obj => frame.obj.as_deref(),
        };
        match candidate {
            Some(name) if glob_match(&pattern.glob, name) => continue,
            _ => return false,
        }
    }
    su.counter.fetch_add(1, Ordering::Relaxed);
    true
}

/// Find the first suppression in `list` (in file order) that matches, if
/// any.
pub fn find_match<'a>(list: &'a [Suppression], err_kind: &ErrorKind, frames: &[FrameName]) -> Option<&'a Suppression> {
    list.iter().find(|su| matches(su, err_kind, frames))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(fun: &str) -> FrameName {
        FrameName { fun: Some(fun.to_string()), obj: None }
    }

    #[test]
    fn parses_single_record() {
        let text = "{\n   s1\n   core:AddressError\n   fun:libc_strlen\n   fun:caller\n}\n";
        let supps = parse_suppressions(text, "core").unwrap();
        assert_eq!(supps.len(), 1);
        assert_eq!(supps[0].name, "s1");
        assert_eq!(supps[0].kind, "AddressError");
        assert_eq!(supps[0].callers.len(), 2);
    }

    #[test]
    fn skips_blank_and_comment_lines_between_records() {
        let text = "\n# a comment\n{\n   s1\n   core:AddressError\n   fun:f\n}\n\n# trailing\n";
        let supps = parse_suppressions(text, "core").unwrap();
        assert_eq!(supps.len(), 1);
    }

    #[test]
    fn malformed_kind_line_is_an_error() {
        let text = "{\n   s1\n   bogus-line-no-colon\n   fun:f\n}\n";
        assert_eq!(
            parse_suppressions(text, "core").unwrap_err(),
            SuppressionParseError::MalformedKindLine(1)
        );
    }

    #[test]
    fn tool_not_in_list_is_silently_skipped() {
        let text = "{\n   s1\n   othertool:AddressError\n   fun:f\n}\n";
        let supps = parse_suppressions(text, "memcheck").unwrap();
        assert!(supps.is_empty());
    }

    #[test]
    fn matches_with_strlen_caller_pattern() {
        let text = "{\n   s1\n   core:AddressError\n   fun:libc_strlen\n   fun:caller\n}\n";
        let supps = parse_suppressions(text, "core").unwrap();
        let frames = vec![frame("libc_strlen"), frame("caller"), frame("main")];
        assert!(find_match(&supps, &ErrorKind::AddressError, &frames).is_some());
        assert_eq!(supps[0].counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn kind_mismatch_does_not_match() {
        let text = "{\n   s1\n   core:AddressError\n   fun:f\n}\n";
        let supps = parse_suppressions(text, "core").unwrap();
        let frames = vec![frame("f")];
        assert!(find_match(&supps, &ErrorKind::ValueError, &frames).is_none());
    }

    #[test]
    fn glob_supports_star_and_question_and_escape() {
        assert!(glob_match("lib*.so", "libc.so"));
        assert!(glob_match("fun_?", "fun_1"));
        assert!(!glob_match("fun_?", "fun_12"));
        assert!(glob_match(r"literal\*star", "literal*star"));
    }

    #[test]
    fn shorter_frame_chain_than_pattern_fails() {
        let text = "{\n   s1\n   core:AddressError\n   fun:a\n   fun:b\n   fun:c\n}\n";
        let supps = parse_suppressions(text, "core").unwrap();
        let frames = vec![frame("a"), frame("b")];
        assert!(find_match(&supps, &ErrorKind::AddressError, &frames).is_none());
    }

    #[test]
    fn first_mismatch_in_pattern_chain_fails() {
        let text = "{\n   s1\n   core:AddressError\n   fun:a\n   fun:WRONG\n}\n";
        let supps = parse_suppressions(text, "core").unwrap();
        let frames = vec![frame("a"), frame("b")];
        assert!(find_match(&supps, &ErrorKind::AddressError, &frames).is_none());
    }
}
