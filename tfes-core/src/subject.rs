//! Subject grammar: validation and pattern matching.
//!
//! A subject is a non-empty `.`-delimited sequence of tokens. A token is
//! either a run of ASCII alphanumerics, the single-wildcard `*`, or the
//! tail-wildcard `>` (legal only as the final token of a pattern). Concrete
//! subjects (as published) must not carry wildcards, but `matches` does not
//! enforce that — publishing a literal `*` or `>` subject only ever matches
//! a subscriber pattern with the same literal token, which is a documented
//! quirk, not a rejected case.

use crate::error::TfesError;

/// Validates that `pattern` conforms to the subject/pattern token grammar.
///
/// Legal tokens: a non-empty run of `[A-Za-z0-9]`, the single-wildcard `*`
/// (anywhere), or the tail-wildcard `>` (only as the last token). Empty
/// tokens — from an empty string, a leading/trailing `.`, or `..` — are
/// invalid.
///
/// # Errors
///
/// Returns [`TfesError::InvalidSubject`] if any token violates the grammar.
pub fn validate(pattern: &str) -> Result<(), TfesError> {
    let tokens: Vec<&str> = pattern.split('.').collect();
    let last = tokens.len() - 1;

    for (i, token) in tokens.iter().enumerate() {
        if *token == ">" {
            if i != last {
                return Err(TfesError::invalid_subject(format!(
                    "'>' is only legal as the final token: {pattern:?}"
                )));
            }
            continue;
        }
        if *token == "*" {
            continue;
        }
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(TfesError::invalid_subject(format!(
                "invalid token {token:?} in {pattern:?}"
            )));
        }
    }

    Ok(())
}

/// Matches a concrete `subject` against a subscription `pattern`.
///
/// This is total: it never fails, even if `pattern` would be rejected by
/// [`validate`] (a stray `>` is simply treated as a terminal wildcard
/// wherever it occurs). Only subscribing validates a pattern; matching a
/// publish against an already-accepted pattern never needs to.
#[must_use]
pub fn matches(subject: &str, pattern: &str) -> bool {
    let s: Vec<&str> = subject.split('.').collect();
    let p: Vec<&str> = pattern.split('.').collect();

    let mut i = 0;
    while i < s.len() {
        let Some(&pt) = p.get(i) else {
            return false;
        };
        if pt == ">" {
            // `>` consumes one or more remaining tokens; i < s.len() here
            // guarantees at least one token is actually being consumed.
            return true;
        }
        if pt != "*" && pt != s[i] {
            return false;
        }
        i += 1;
    }

    p.len() <= s.len()
}
