//! Unicode-aware token splitting and phrase/prefix matching (spec.md §4.A).
//!
//! This is the kernel shared by the textual match path, the dictionary match
//! path, and the string-rendered match paths for numeric/IP/time columns —
//! every encoding eventually funnels through [`match_phrase`],
//! [`match_prefix`], or [`match_any_case_phrase`].

/// A rune is a *token rune* iff it is a letter, digit, or underscore. This is
/// the single predicate shared by the tokeniser and the boundary checks in
/// the matchers below — spec.md requires one definition, not two.
#[inline]
pub fn is_token_rune(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Splits `s` on maximal runs of non-token-runes, yielding each non-empty
/// token-rune run as a distinct token. Used to query bloom filters.
pub fn tokenize(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in s.char_indices() {
        if is_token_rune(c) {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(b) = start.take() {
            out.push(&s[b..i]);
        }
    }
    if let Some(b) = start {
        out.push(&s[b..]);
    }
    out
}

/// Trims any trailing token-rune run from `s`, then tokenises the remainder.
///
/// A bloom filter query for a prefix like `foo:abc` must only require tokens
/// strictly *before* the possibly-partial final word `abc` — `abc` itself
/// might be a prefix of a longer token that was indexed as a whole.
pub fn tokenize_skip_last(s: &str) -> Vec<&str> {
    let trimmed_end = s
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_token_rune(*c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    tokenize(&s[..trimmed_end])
}

fn boundary_ok_before(s: &str, pos: usize, needs_boundary: bool) -> bool {
    if !needs_boundary {
        return true;
    }
    match s[..pos].chars().next_back() {
        None => true,
        Some(c) => !is_token_rune(c),
    }
}

fn boundary_ok_after(s: &str, pos: usize, needs_boundary: bool) -> bool {
    if !needs_boundary {
        return true;
    }
    match s[pos..].chars().next() {
        None => true,
        Some(c) => !is_token_rune(c),
    }
}

/// Returns true iff `phrase` occurs in `s` at a position where, if `phrase`
/// starts with a token rune, the preceding rune in `s` is absent or
/// non-token; and if `phrase` ends with a token rune, the following rune is
/// absent or non-token. An empty phrase matches only the empty string.
pub fn match_phrase(s: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return s.is_empty();
    }
    let left_needs = phrase.chars().next().is_some_and(is_token_rune);
    let right_needs = phrase.chars().next_back().is_some_and(is_token_rune);

    let mut search_from = 0usize;
    while let Some(rel) = s[search_from..].find(phrase) {
        let start = search_from + rel;
        let end = start + phrase.len();
        if boundary_ok_before(s, start, left_needs) && boundary_ok_after(s, end, right_needs) {
            return true;
        }
        // Restart from one byte past the candidate's start, not the end —
        // this preserves matches of shorter occurrences within longer runs
        // (e.g. prefix-matching `abc` in `x.abcabcy`).
        search_from = start + next_char_len(s, start);
    }
    false
}

/// Like [`match_phrase`] but only the left boundary is enforced. An empty
/// prefix matches any non-empty `s`.
pub fn match_prefix(s: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return !s.is_empty();
    }
    let left_needs = prefix.chars().next().is_some_and(is_token_rune);

    let mut search_from = 0usize;
    while let Some(rel) = s[search_from..].find(prefix) {
        let start = search_from + rel;
        if boundary_ok_before(s, start, left_needs) {
            return true;
        }
        search_from = start + next_char_len(s, start);
    }
    false
}

fn next_char_len(s: &str, byte_pos: usize) -> usize {
    s[byte_pos..]
        .chars()
        .next()
        .map(char::len_utf8)
        .unwrap_or(1)
}

/// Matches `s` against `phrase_lowercase`, which must already be lowercased
/// ASCII-style by the caller (precondition, not checked here).
///
/// Fast path: if `s` contains no byte `>= 0x80` and no ASCII uppercase
/// letter, it's already lowercase and [`match_phrase`] is called directly.
/// Otherwise `s` is lower-cased into a scratch buffer first. Both paths must
/// agree (P6).
pub fn match_any_case_phrase(s: &str, phrase_lowercase: &str) -> bool {
    if is_ascii_lowercase_only(s) {
        return match_phrase(s, phrase_lowercase);
    }
    let lowered = s.to_lowercase();
    match_phrase(&lowered, phrase_lowercase)
}

fn is_ascii_lowercase_only(s: &str) -> bool {
    s.bytes().all(|b| b < 0x80 && !b.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_non_word_runs() {
        assert_eq!(tokenize("error: disk full"), vec!["error", "disk", "full"]);
        assert_eq!(tokenize("foo_bar-123"), vec!["foo_bar", "123"]);
        assert_eq!(tokenize(""), Vec::<&str>::new());
    }

    #[test]
    fn tokenize_skip_last_drops_trailing_partial_word() {
        assert_eq!(tokenize_skip_last("foo:abc"), vec!["foo"]);
        assert_eq!(tokenize_skip_last("abc"), Vec::<&str>::new());
        assert_eq!(tokenize_skip_last("foo bar:"), vec!["foo", "bar"]);
    }

    // P5
    #[test]
    fn phrase_boundary() {
        assert!(match_phrase("foo-bar", "foo"));
        assert!(!match_phrase("foobar", "foo"));
        assert!(match_prefix("foo-bar", "foo"));
        assert!(!match_prefix("xfoo", "foo"));
    }

    #[test]
    fn phrase_restarts_after_failed_boundary() {
        // `abc` fails the boundary inside `xabcy` but a later occurrence
        // still must be found if boundary-valid.
        assert!(!match_prefix("xabcy", "abc"));
        assert!(match_prefix("x.abcy", "abc"));
        assert!(match_prefix("xabc.abcy", "abc"));
    }

    #[test]
    fn empty_phrase_matches_only_empty_string() {
        assert!(match_phrase("", ""));
        assert!(!match_phrase("x", ""));
    }

    #[test]
    fn empty_prefix_matches_any_nonempty() {
        assert!(match_prefix("x", ""));
        assert!(!match_prefix("", ""));
    }

    #[test]
    fn disk_full_scenario() {
        assert!(match_phrase("error: disk full", "disk full"));
        assert!(!match_phrase("disk-ok", "disk full"));
        assert!(match_phrase("disk full today", "disk full"));
    }

    // P6
    #[test]
    fn any_case_fast_and_slow_paths_agree() {
        let cases = [
            ("DISK FULL", "disk full"),
            ("disk full", "disk full"),
            ("Disk-Füll", "disk-füll"),
            ("MIXEDCase123_", "mixedcase123_"),
        ];
        for (s, p) in cases {
            let fast = is_ascii_lowercase_only(s);
            let lowered = s.to_lowercase();
            let slow_result = match_phrase(&lowered, p);
            let result = match_any_case_phrase(s, p);
            assert_eq!(result, slow_result, "mismatch for {s:?}/{p:?}");
            if fast {
                assert_eq!(result, match_phrase(s, p));
            }
        }
    }
}
